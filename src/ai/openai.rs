use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{parse_amounts, AmountExtractor, Credential, ExtractionRequest, ResponseShape};
use crate::config::AppConfig;
use crate::conversion::MonetaryAmount;
use crate::error::{AppError, Result};

const PROVIDER: &str = "OpenAI";

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    temperature: f32,
    response_format: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

pub struct OpenAIClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<Credential>,
}

impl OpenAIClient {
    pub fn new(client: Client, base_url: &str, model: &str, api_key: Option<Credential>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.http_client(),
            &config.openai_url,
            &config.openai_model,
            Credential::new(config.openai_api_key.clone()),
        )
    }

    fn build_request(&self, request: &ExtractionRequest) -> OpenAIRequest {
        OpenAIRequest {
            model: self.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: serde_json::json!([
                    {
                        "type": "text",
                        "text": request.instruction
                    },
                    {
                        "type": "image_url",
                        "image_url": {
                            "url": request.image.data_url(),
                            "detail": "high"
                        }
                    }
                ]),
            }],
            max_tokens: 512,
            temperature: 0.0,
            response_format: serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "thb_amounts",
                    "strict": true,
                    "schema": request.shape.json_schema()
                }
            }),
        }
    }
}

#[async_trait]
impl AmountExtractor for OpenAIClient {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    // Strict structured outputs need an object at the root.
    fn shape(&self) -> ResponseShape {
        ResponseShape::wrapped()
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<Vec<MonetaryAmount>> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| AppError::missing_credential(PROVIDER))?;

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key.expose()))
            .header("Content-Type", "application/json")
            .json(&self.build_request(request))
            .send()
            .await
            .map_err(|e| {
                AppError::from_endpoint(PROVIDER, format!("OpenAI request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::from_endpoint(
                PROVIDER,
                format!("OpenAI API error ({}): {}", status, body),
            ));
        }

        let body: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| AppError::Detection(format!("Failed to parse OpenAI response: {}", e)))?;

        let content = body.choices.first().and_then(|c| c.message.content.as_deref());
        parse_amounts(PROVIDER, content, request.shape)
    }
}
