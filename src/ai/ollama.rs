use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{parse_amounts, AmountExtractor, ExtractionRequest, ResponseShape};
use crate::config::AppConfig;
use crate::conversion::MonetaryAmount;
use crate::error::{AppError, Result};

const PROVIDER: &str = "Ollama";

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    format: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Option<OllamaMessageResponse>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessageResponse {
    content: String,
}

/// Local vision model; no credential involved.
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(client: Client, base_url: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.http_client(), &config.ollama_url, &config.ollama_model)
    }
}

#[async_trait]
impl AmountExtractor for OllamaClient {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn shape(&self) -> ResponseShape {
        ResponseShape::wrapped()
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<Vec<MonetaryAmount>> {
        let body = OllamaRequest {
            model: self.model.clone(),
            messages: vec![OllamaMessage {
                role: "user".to_string(),
                content: request.instruction.to_string(),
                images: vec![request.image.data.clone()],
            }],
            stream: false,
            format: request.shape.json_schema(),
        };

        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AppError::Detection(format!("Ollama request failed: {}. Is Ollama running?", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Detection(format!(
                "Ollama API error ({}): {}",
                status, body
            )));
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| AppError::Detection(format!("Failed to parse Ollama response: {}", e)))?;

        parse_amounts(
            PROVIDER,
            body.message.as_ref().map(|m| m.content.as_str()),
            request.shape,
        )
    }
}
