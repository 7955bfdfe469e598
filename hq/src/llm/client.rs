//! GenerativeClient trait definition

use async_trait::async_trait;

use super::{GenerateRequest, LlmError};

/// Stateless generative model client
///
/// Each call is independent; the caller passes the whole conversation.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Model names the provider currently serves, as the provider reports them
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;

    /// Generate a response from `model`, returning its raw text
    async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<String, LlmError>;
}
