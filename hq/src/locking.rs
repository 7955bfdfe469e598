//! Task locking policy
//!
//! Weekly and Milestone tasks are time-gated by the age of their quest.
//! The lock is a read-time policy: it is recomputed on every read and never
//! stored on the task.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::domain::TaskType;

/// Days a quest must have run before its Weekly tasks unlock
pub const WEEKLY_UNLOCK_DAY: i64 = 6;

/// Days a quest must have run before its Milestone tasks unlock
pub const MILESTONE_UNLOCK_DAY: i64 = 10;

/// Whether a task can currently be completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockState {
    Unlocked,
    Locked { unlocks_in_days: i64 },
}

impl LockState {
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }
}

/// Calendar days since a quest started: `ceil(|now - created_at| / 1 day)`
///
/// Uses the ceiling of the absolute difference, so a quest created at 23:59
/// counts a second day one minute later.
pub fn days_since_start(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let elapsed_ms = (now - created_at).num_milliseconds().unsigned_abs();
    let day_ms = Duration::days(1).num_milliseconds().unsigned_abs();
    let days = elapsed_ms.div_ceil(day_ms);
    i64::try_from(days).unwrap_or(i64::MAX)
}

/// Day on which a task type unlocks, `None` if it is never locked
pub fn unlock_day(task_type: TaskType) -> Option<i64> {
    match task_type {
        TaskType::Daily => None,
        TaskType::Weekly => Some(WEEKLY_UNLOCK_DAY),
        TaskType::Milestone => Some(MILESTONE_UNLOCK_DAY),
    }
}

/// Lock decision for a task of `task_type` on a quest created at `quest_created_at`
///
/// Unscoped tasks (no quest) are never locked.
pub fn lock_state(task_type: TaskType, quest_created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> LockState {
    let (Some(created_at), Some(unlock_day)) = (quest_created_at, unlock_day(task_type)) else {
        return LockState::Unlocked;
    };

    let days = days_since_start(created_at, now);
    if days < unlock_day {
        LockState::Locked {
            unlocks_in_days: unlock_day - days,
        }
    } else {
        LockState::Unlocked
    }
}
