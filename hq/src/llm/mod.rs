//! Generative model client module for HabitQuest
//!
//! Provides the provider trait, the Gemini implementation and response
//! text utilities.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod gemini;
mod types;

pub use client::GenerativeClient;
pub use error::{FailureKind, LlmError};
pub use gemini::{GeminiClient, supports_structured_output};
pub use types::{ConversationTurn, GenerateRequest, Role};

use crate::config::AiConfig;

/// Create the production generative client from config
pub fn create_client(config: &AiConfig) -> Result<Arc<dyn GenerativeClient>, LlmError> {
    debug!(base_url = %config.base_url, "create_client: called");
    Ok(Arc::new(GeminiClient::from_config(config)?))
}

/// Remove markdown code fences a model may wrap around JSON, then trim
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[]\n```"), "[]");
    }
}
