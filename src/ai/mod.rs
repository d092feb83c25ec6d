pub mod gemini;
pub mod llm;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

use crate::capture::EncodedImage;
use crate::conversion::MonetaryAmount;
use crate::error::{AppError, Result};

pub const EXTRACTION_INSTRUCTION: &str =
    "Extract all distinct numbers in this image that plausibly represent prices in Thai Baht (THB). \
     Ignore dates, times, quantities, phone numbers, and any other numbers that are not prices. \
     Return the prices as plain numbers without currency symbols or thousands separators.";

/// Field name used when the reply is wrapped in an object.
pub const AMOUNTS_FIELD: &str = "amounts";

/// Secret for an inference endpoint. Never printed.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    /// Blank strings count as absent.
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        (!secret.trim().is_empty()).then_some(Self(secret))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// The JSON shape the endpoint is told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `[120, 45.5]`
    Array,
    /// `{"amounts": [120, 45.5]}`
    Object { field: &'static str },
}

impl ResponseShape {
    pub fn wrapped() -> Self {
        ResponseShape::Object {
            field: AMOUNTS_FIELD,
        }
    }

    /// Standard JSON Schema, as OpenAI and Ollama take it.
    pub fn json_schema(self) -> Value {
        let numbers = json!({ "type": "array", "items": { "type": "number" } });
        match self {
            ResponseShape::Array => numbers,
            ResponseShape::Object { field } => json!({
                "type": "object",
                "properties": { field: numbers },
                "required": [field],
                "additionalProperties": false
            }),
        }
    }

    /// Gemini's OpenAPI-style schema dialect.
    pub fn gemini_schema(self) -> Value {
        let numbers = json!({ "type": "ARRAY", "items": { "type": "NUMBER" } });
        match self {
            ResponseShape::Array => numbers,
            ResponseShape::Object { field } => json!({
                "type": "OBJECT",
                "properties": { field: numbers },
                "required": [field]
            }),
        }
    }
}

/// One detection attempt's payload. Built per action, never stored.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub image: EncodedImage,
    pub instruction: &'static str,
    pub shape: ResponseShape,
}

impl ExtractionRequest {
    pub fn new(image: EncodedImage, shape: ResponseShape) -> Self {
        Self {
            image,
            instruction: EXTRACTION_INSTRUCTION,
            shape,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub amounts: Vec<MonetaryAmount>,
    pub model: String,
    pub provider: String,
    pub timestamp: String,
}

impl Detection {
    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }
}

#[async_trait]
pub trait AmountExtractor: Send + Sync {
    fn provider(&self) -> &'static str;

    fn model(&self) -> &str;

    /// Shape this endpoint is asked to produce.
    fn shape(&self) -> ResponseShape {
        ResponseShape::Array
    }

    /// One request, no retries. An empty vec means nothing was found.
    async fn extract(&self, request: &ExtractionRequest) -> Result<Vec<MonetaryAmount>>;
}

/// Turns the model's reply text into amounts. `None` means the endpoint sent
/// no reply at all, which is a hard failure; anything else that doesn't parse
/// degrades to an empty result.
pub fn parse_amounts(
    provider: &str,
    text: Option<&str>,
    shape: ResponseShape,
) -> Result<Vec<MonetaryAmount>> {
    let text = text.ok_or_else(|| AppError::Detection(format!("No response from {provider}")))?;
    let body = strip_code_fence(text.trim());
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("{} returned non-JSON text, treating as no amounts: {}", provider, e);
            return Ok(Vec::new());
        }
    };

    let items: &[Value] = match (&value, shape) {
        (Value::Array(items), _) => items.as_slice(),
        (Value::Object(map), ResponseShape::Object { field }) if map.contains_key(field) => {
            map[field].as_array().map(Vec::as_slice).unwrap_or_default()
        }
        (Value::Object(map), _) => map
            .values()
            .find_map(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => {
            log::warn!("{} returned an unexpected JSON shape", provider);
            &[]
        }
    };

    let mut amounts: Vec<MonetaryAmount> = Vec::with_capacity(items.len());
    for item in items {
        let number = match item {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
            _ => None,
        };
        let Some(amount) = number.and_then(|n| MonetaryAmount::new(n).ok()) else {
            log::debug!("Skipping non-amount entry {}", item);
            continue;
        };
        if !amounts.contains(&amount) {
            amounts.push(amount);
        }
    }
    Ok(amounts)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
