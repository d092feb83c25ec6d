use serde::Serialize;

use super::gemini::GeminiClient;
use super::ollama::OllamaClient;
use super::openai::OpenAIClient;
use super::{AmountExtractor, Detection, ExtractionRequest};
use crate::capture::EncodedImage;
use crate::config::{AppConfig, LLMProvider};
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub needs_credential: bool,
    pub models: Vec<String>,
}

pub fn extractor_for(config: &AppConfig) -> Box<dyn AmountExtractor> {
    match config.llm_provider {
        LLMProvider::Gemini => Box::new(GeminiClient::from_config(config)),
        LLMProvider::OpenAI => Box::new(OpenAIClient::from_config(config)),
        LLMProvider::Ollama => Box::new(OllamaClient::from_config(config)),
    }
}

/// Runs one extraction with whichever endpoint the config selects.
pub async fn extract_amounts(config: &AppConfig, image: EncodedImage) -> Result<Detection> {
    let extractor = extractor_for(config);
    detect_with(extractor.as_ref(), image).await
}

pub async fn detect_with(extractor: &dyn AmountExtractor, image: EncodedImage) -> Result<Detection> {
    let request = ExtractionRequest::new(image, extractor.shape());
    log::debug!(
        "Sending ~{} byte {} image to {} ({})",
        request.image.decoded_len(),
        request.image.mime_type,
        extractor.provider(),
        extractor.model()
    );

    let amounts = extractor.extract(&request).await.map_err(|e| {
        log::error!("{} detection failed: {}", extractor.provider(), e);
        e
    })?;
    log::info!(
        "{} detected {} amount(s)",
        extractor.provider(),
        amounts.len()
    );

    Ok(Detection {
        amounts,
        model: extractor.model().to_string(),
        provider: extractor.provider().to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub fn get_available_providers() -> Vec<ProviderInfo> {
    vec![
        ProviderInfo {
            name: "Gemini".to_string(),
            needs_credential: true,
            models: vec![
                "gemini-2.5-flash".to_string(),
                "gemini-2.5-pro".to_string(),
                "gemini-2.0-flash".to_string(),
            ],
        },
        ProviderInfo {
            name: "OpenAI".to_string(),
            needs_credential: true,
            models: vec!["gpt-4o-mini".to_string(), "gpt-4o".to_string()],
        },
        ProviderInfo {
            name: "Ollama".to_string(),
            needs_credential: false,
            models: vec!["llava".to_string(), "llama3.2-vision".to_string()],
        },
    ]
}
