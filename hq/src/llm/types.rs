//! Request types shared by generative clients

use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a planning conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A generation request: system instruction plus the conversation so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub system_prompt: String,
    pub turns: Vec<ConversationTurn>,
    /// Ask for a JSON-only response when the model supports it
    pub structured_output: bool,
}
