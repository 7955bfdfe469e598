//! Quest lifecycle error types

use thiserror::Error;

use crate::state::StateError;

/// Errors from quest and task operations
#[derive(Debug, Error)]
pub enum QuestError {
    #[error("Quest not found: {0}")]
    QuestNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task {task_id} is locked for {unlocks_in_days} more day(s)")]
    TaskLocked { task_id: String, unlocks_in_days: i64 },

    #[error("Task {0} is already complete")]
    AlreadyComplete(String),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The quest row was written but its task batch was not
    #[error("Quest {quest_id} was saved but its tasks were not: {source}")]
    PartialPersistence { quest_id: String, source: StateError },

    #[error("State error: {0}")]
    State(#[from] StateError),
}

impl QuestError {
    /// Quest id left behind by a partially persisted create, if any
    pub fn orphaned_quest(&self) -> Option<&str> {
        match self {
            Self::PartialPersistence { quest_id, .. } => Some(quest_id),
            _ => None,
        }
    }
}
