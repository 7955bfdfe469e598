//! Domain types for HabitQuest
//!
//! Core records: Profile, Quest, Task, Preferences, Party.
//! Timestamps are stored as Unix milliseconds.

mod id;
mod party;
mod profile;
mod quest;
mod task;

use chrono::{DateTime, Utc};

pub use id::generate_id;
pub use party::{Party, PartyMember};
pub use profile::{DEFAULT_DISPLAY_NAME, Preferences, Profile};
pub use quest::{DEFAULT_QUEST_TITLE, Quest};
pub use task::{Task, TaskDraft, TaskType, UnknownTaskType};

/// Current time in Unix milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert Unix milliseconds to a UTC datetime, clamping out-of-range values to the epoch
pub fn ms_to_utc(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
