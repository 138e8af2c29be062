use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures that end a chat request cycle.
///
/// Every variant rolls the conversation back to its state before the request was
/// dispatched. Cancellation is not an error and never shows up here.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum ChatError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Provider error: {0}")]
    Provider(String),
}

impl ChatError {
    pub fn transport<E: std::fmt::Display>(err: E) -> Self {
        ChatError::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ChatError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None => ChatError::transport(err),
        }
    }
}

impl From<ProviderError> for ChatError {
    fn from(err: ProviderError) -> Self {
        ChatError::Provider(err.to_string())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

/// Errors a provider adapter may report for `generate` or `stream`.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum ProviderError {
    #[error("Unsupported setting: {setting}")]
    UnsupportedSetting { setting: String },

    #[error("Unsupported functionality: {0}")]
    UnsupportedFunctionality(String),

    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("API call failed: {0}")]
    Api(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Error published through a streamable cell and surfaced to its reader.
#[derive(Error, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[error("{message}")]
pub struct StreamableError {
    pub message: String,
}

impl StreamableError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}
