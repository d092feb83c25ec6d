use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::conversion::{ExchangeRate, DEFAULT_RATE};
use crate::format::Locale;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm_provider: LLMProvider,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_url: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub default_rate: f64,
    pub locale: Locale,
    pub max_image_bytes: u64,
    /// `None` leaves the transport default in place.
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LLMProvider {
    Gemini,
    OpenAI,
    Ollama,
}

impl LLMProvider {
    pub fn name(self) -> &'static str {
        match self {
            LLMProvider::Gemini => "Gemini",
            LLMProvider::OpenAI => "OpenAI",
            LLMProvider::Ollama => "Ollama",
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" => Ok(LLMProvider::Gemini),
            "openai" => Ok(LLMProvider::OpenAI),
            "ollama" => Ok(LLMProvider::Ollama),
            other => Err(format!("Unknown provider: {other}")),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm_provider: LLMProvider::Gemini,
            gemini_api_key: String::new(),
            gemini_model: "gemini-2.5-flash".to_string(),
            gemini_url: "https://generativelanguage.googleapis.com".to_string(),
            openai_api_key: String::new(),
            openai_model: "gpt-4o-mini".to_string(),
            openai_url: "https://api.openai.com".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llava".to_string(),
            default_rate: DEFAULT_RATE,
            locale: Locale::KoKr,
            max_image_bytes: 20 * 1024 * 1024,
            request_timeout_secs: None,
        }
    }
}

impl AppConfig {
    /// Platform config directory for this app, e.g. `~/.config/baht-won`.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("baht-won"))
    }

    /// Reads `config.json` from `dir`, writing defaults on first run, then
    /// applies credential overrides from the environment.
    pub fn load(dir: &Path) -> Self {
        let config_path = dir.join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    log::warn!("Ignoring malformed {}: {}", config_path.display(), e);
                    Self::default()
                }),
                Err(e) => {
                    log::warn!("Could not read {}: {}", config_path.display(), e);
                    Self::default()
                }
            }
        } else {
            let c = Self::default();
            if let Err(e) = c.save(dir) {
                log::debug!("Could not write default config: {:#}", e);
            }
            c
        };

        config.apply_env(|name| std::env::var(name).ok());
        log::info!(
            "Config loaded from {} (provider: {})",
            dir.display(),
            config.llm_provider.name()
        );
        config
    }

    /// Environment credentials win over the file. `lookup` is injected so
    /// tests don't touch the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY")) {
            self.gemini_api_key = key;
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.openai_api_key = key;
        }
    }

    /// Empty credentials are left out of the file.
    pub fn save(&self, dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating config dir {}", dir.display()))?;
        let config_path = dir.join(CONFIG_FILE);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("writing {}", config_path.display()))?;
        Ok(())
    }

    pub fn default_exchange_rate(&self) -> ExchangeRate {
        ExchangeRate::new(self.default_rate).unwrap_or_default()
    }

    /// The credential for the active provider, if that provider needs one.
    pub fn credential(&self) -> Option<&str> {
        let key = match self.llm_provider {
            LLMProvider::Gemini => &self.gemini_api_key,
            LLMProvider::OpenAI => &self.openai_api_key,
            LLMProvider::Ollama => return None,
        };
        (!key.is_empty()).then_some(key.as_str())
    }

    pub fn active_model(&self) -> &str {
        match self.llm_provider {
            LLMProvider::Gemini => &self.gemini_model,
            LLMProvider::OpenAI => &self.openai_model,
            LLMProvider::Ollama => &self.ollama_model,
        }
    }

    pub fn http_client(&self) -> reqwest::Client {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = self.request_timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }
        builder.build().unwrap_or_else(|e| {
            log::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
    }
}
