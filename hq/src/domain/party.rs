//! Guild party records

use serde::{Deserialize, Serialize};

use super::id::generate_id;
use super::now_ms;

/// A party of users that share a guild hall
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: String,

    pub name: String,

    /// Short uppercase code other users join with
    pub invite_code: String,

    /// User who created the party
    pub created_by: String,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl Party {
    pub fn new(name: impl Into<String>, invite_code: impl Into<String>, created_by: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: generate_id("party", &name),
            name,
            invite_code: invite_code.into(),
            created_by: created_by.into(),
            created_at: now_ms(),
        }
    }
}

/// Membership of one user in one party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyMember {
    pub party_id: String,
    pub user_id: String,
    pub joined_at: i64,
}

impl PartyMember {
    pub fn new(party_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            party_id: party_id.into(),
            user_id: user_id.into(),
            joined_at: now_ms(),
        }
    }
}
