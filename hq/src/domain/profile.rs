//! Profile and per-user preference records

use serde::{Deserialize, Serialize};

use super::now_ms;
use crate::progression;

/// Name shown for users who have not picked a display name
pub const DEFAULT_DISPLAY_NAME: &str = "Adventurer";

/// A user's public profile and cumulative XP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Identity reference of the owning user
    pub id: String,

    pub display_name: Option<String>,

    pub email: Option<String>,

    /// Cumulative XP, never decreases
    pub xp: u64,

    /// Avatar reference (image URL or preset name)
    pub avatar: Option<String>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl Profile {
    /// Create an empty profile for a user
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            email: None,
            xp: 0,
            avatar: None,
            created_at: now_ms(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Display name, falling back to the default adventurer name
    pub fn name_or_default(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(DEFAULT_DISPLAY_NAME)
    }

    /// Current level derived from XP
    pub fn level(&self) -> u32 {
        progression::level(self.xp)
    }
}

/// Explicit per-user preferences (replaces client-side global flags)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub user_id: String,

    /// User has acknowledged the onboarding honor code
    pub onboarding_acknowledged: bool,
}

impl Preferences {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            onboarding_acknowledged: false,
        }
    }
}
