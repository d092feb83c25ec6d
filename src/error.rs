use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Error wording that points at a bad or missing credential rather than a
/// transient endpoint failure.
static CREDENTIAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)api[\s_-]?key|unauthori[sz]ed|permission[\s_-]denied|invalid[\s_-]credential")
        .expect("credential pattern is a valid regex")
});

#[derive(Debug, Error)]
pub enum AppError {
    /// Bad manual input or an unacceptable image file.
    #[error("{0}")]
    Validation(String),

    /// Missing or rejected inference credential.
    #[error("{0}")]
    Configuration(String),

    /// Endpoint or transport failure during amount detection.
    #[error("Failed to detect amounts: {0}")]
    Detection(String),

    #[error("Failed to read image {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    pub fn missing_credential(provider: &str) -> Self {
        AppError::Configuration(format!(
            "{provider} API key is not configured. Set it in the environment or the config file."
        ))
    }

    /// Classify an endpoint failure: credential problems get their own variant
    /// since the fix is a configuration change, not a retry.
    pub fn from_endpoint(provider: &str, message: String) -> Self {
        if is_credential_failure(&message) {
            AppError::Configuration(format!(
                "{provider} rejected the API key. Check your configuration. ({message})"
            ))
        } else {
            AppError::Detection(message)
        }
    }

    /// Inline text shown next to the control that triggered the action.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Read { .. } => {
                "Failed to detect amounts: the image could not be read.".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub fn is_credential_failure(message: &str) -> bool {
    CREDENTIAL_PATTERN.is_match(message)
}

pub type Result<T> = std::result::Result<T, AppError>;
