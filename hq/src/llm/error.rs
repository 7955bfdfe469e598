//! LLM error types

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during generative model calls
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited")]
    RateLimited,

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("API key not found. Set the {0} environment variable.")]
    MissingApiKey(String),
}

/// How the plan orchestrator treats a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// 429: back off, then retry the same model
    RateLimited,
    /// 400/404: the model cannot serve the request
    ModelIncompatible,
    /// Network, 5xx, empty or unreadable payloads
    Transport,
}

impl LlmError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LlmError::RateLimited => FailureKind::RateLimited,
            LlmError::ApiError { status: 400 | 404, .. } => FailureKind::ModelIncompatible,
            _ => FailureKind::Transport,
        }
    }
}
