//! Error types for the OpenAI adapter

use relay_application::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenAiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid proxy '{0}'")]
    InvalidProxy(String),

    #[error("Response contained no {0}")]
    Empty(&'static str),
}

impl From<OpenAiError> for ProviderError {
    fn from(error: OpenAiError) -> Self {
        match error {
            OpenAiError::Http(e) if e.is_timeout() => ProviderError::Timeout,
            OpenAiError::Http(e) if e.is_connect() => ProviderError::Connection(e.to_string()),
            OpenAiError::Http(e) => ProviderError::RequestFailed(e.to_string()),
            OpenAiError::Api { status, message } => ProviderError::Api { status, message },
            OpenAiError::Json(e) => ProviderError::InvalidResponse(e.to_string()),
            OpenAiError::Base64(e) => ProviderError::InvalidResponse(e.to_string()),
            OpenAiError::Empty(what) => {
                ProviderError::InvalidResponse(format!("response contained no {what}"))
            }
            other => ProviderError::Other(other.to_string()),
        }
    }
}
