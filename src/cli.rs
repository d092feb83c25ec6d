use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{AppConfig, LLMProvider};
use crate::format::Locale;

#[derive(Debug, Parser)]
#[command(name = "baht-won", version, about = "Convert Thai Baht to Korean Won")]
pub struct Cli {
    /// Inference endpoint used for photo detection (gemini, openai, ollama).
    #[arg(long, global = true, env = "BAHT_WON_PROVIDER")]
    pub provider: Option<LLMProvider>,

    /// Model identifier for the selected provider.
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Number formatting locale, e.g. ko-KR.
    #[arg(long, global = true)]
    pub locale: Option<Locale>,

    /// KRW per THB. Non-numeric or non-positive values use the default.
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub rate: Option<String>,

    /// Directory holding config.json.
    #[arg(long, global = true, env = "BAHT_WON_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert a single THB amount.
    Convert {
        #[arg(allow_hyphen_values = true)]
        amount: String,
    },
    /// Detect THB prices in a photo and convert each one.
    Detect { image: PathBuf },
    /// Interactive session (the default).
    Shell,
}

impl Cli {
    /// Flags win over the config file.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(provider) = self.provider {
            config.llm_provider = provider;
        }
        if let Some(model) = &self.model {
            match config.llm_provider {
                LLMProvider::Gemini => config.gemini_model = model.clone(),
                LLMProvider::OpenAI => config.openai_model = model.clone(),
                LLMProvider::Ollama => config.ollama_model = model.clone(),
            }
        }
        if let Some(locale) = self.locale {
            config.locale = locale;
        }
    }
}
