//! Quest domain type
//!
//! A Quest is a titled collection of tasks representing one habit-building
//! plan. At most one quest per user is active at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::generate_id;
use super::{now_ms, ms_to_utc};

/// Title used when a quest is created without one
pub const DEFAULT_QUEST_TITLE: &str = "New Quest";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    /// Unique identifier (e.g., "9f1c02ab-quest-run-5k")
    pub id: String,

    /// Owning user
    pub user_id: String,

    pub title: String,

    /// Whether this is the user's equipped quest
    pub is_active: bool,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl Quest {
    /// Create a new, inactive Quest
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        let title = title.into();
        let title = if title.trim().is_empty() {
            DEFAULT_QUEST_TITLE.to_string()
        } else {
            title.trim().to_string()
        };
        Self {
            id: generate_id("quest", &title),
            user_id: user_id.into(),
            title,
            is_active: false,
            created_at: now_ms(),
        }
    }

    /// Creation time as a UTC datetime
    pub fn created_at_utc(&self) -> DateTime<Utc> {
        ms_to_utc(self.created_at)
    }
}
