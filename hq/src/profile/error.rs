//! Profile service error types

use thiserror::Error;

use crate::state::StateError;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Display name cannot be empty")]
    EmptyDisplayName,

    #[error("State error: {0}")]
    State(#[from] StateError),
}
