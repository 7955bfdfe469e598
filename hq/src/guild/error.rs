//! Guild error types

use thiserror::Error;

use crate::state::StateError;

#[derive(Debug, Error)]
pub enum GuildError {
    #[error("Party name cannot be empty")]
    EmptyName,

    #[error("Invite code cannot be empty")]
    EmptyCode,

    #[error("No party with invite code {0}")]
    NotFound(String),

    #[error("Already a member of party {0}")]
    AlreadyInParty(String),

    #[error("Not a member of any party")]
    NotInParty,

    #[error("Could not find a free invite code after {0} tries")]
    CodeExhausted(usize),

    #[error("State error: {0}")]
    State(#[from] StateError),
}
