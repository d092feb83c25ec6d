use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{parse_amounts, AmountExtractor, Credential, ExtractionRequest, ResponseShape};
use crate::config::AppConfig;
use crate::conversion::MonetaryAmount;
use crate::error::{AppError, Result};

const PROVIDER: &str = "Gemini";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum GeminiPart {
    InlineData(InlineData),
    Text(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate, `None` if there is none.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let texts: Vec<&str> = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!texts.is_empty()).then(|| texts.concat())
    }
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<Credential>,
}

impl GeminiClient {
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
            &config.gemini_url,
            &config.gemini_model,
            Credential::new(config.gemini_api_key.clone()),
        )
    }

    fn build_request(request: &ExtractionRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart::InlineData(InlineData {
                        mime_type: request.image.mime_type.clone(),
                        data: request.image.data.clone(),
                    }),
                    GeminiPart::Text(request.instruction.to_string()),
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: request.shape.gemini_schema(),
            },
        }
    }
}

#[async_trait]
impl AmountExtractor for GeminiClient {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn shape(&self) -> ResponseShape {
        ResponseShape::Array
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<Vec<MonetaryAmount>> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| AppError::missing_credential(PROVIDER))?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key.expose())
            .json(&Self::build_request(request))
            .send()
            .await
            .map_err(|e| {
                AppError::from_endpoint(PROVIDER, format!("Gemini request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::from_endpoint(
                PROVIDER,
                format!("Gemini API error ({}): {}", status, body),
            ));
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AppError::Detection(format!("Failed to parse Gemini response: {}", e)))?;

        parse_amounts(PROVIDER, body.text().as_deref(), request.shape)
    }
}
