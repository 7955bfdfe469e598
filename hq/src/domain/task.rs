//! Task domain type
//!
//! A Task is an individual completable unit worth a fixed XP reward. Tasks
//! either belong to a Quest or sit in the unscoped "general" bucket.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::generate_id;
use super::now_ms;

/// Error returned when a task type string is not recognised
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown task type: '{0}'. Expected Daily, Weekly or Milestone")]
pub struct UnknownTaskType(pub String);

/// Task cadence, ordered from easiest to hardest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum TaskType {
    #[default]
    Daily,
    Weekly,
    Milestone,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Milestone => "Milestone",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = UnknownTaskType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "milestone" => Ok(Self::Milestone),
            _ => Err(UnknownTaskType(s.to_string())),
        }
    }
}

/// The title, cadence and reward of a task that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub task_type: TaskType,
    pub xp: u32,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, task_type: TaskType, xp: u32) -> Self {
        Self {
            title: title.into(),
            task_type,
            xp,
        }
    }
}

/// A persisted task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: String,

    /// Owning user
    pub user_id: String,

    /// Owning quest, `None` for the general bucket
    pub quest_id: Option<String>,

    pub title: String,

    pub task_type: TaskType,

    /// XP awarded on completion
    pub xp: u32,

    pub is_complete: bool,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl Task {
    /// Create a new incomplete Task from a draft
    pub fn from_draft(user_id: impl Into<String>, quest_id: Option<String>, draft: TaskDraft) -> Self {
        Self {
            id: generate_id("task", &draft.title),
            user_id: user_id.into(),
            quest_id,
            title: draft.title,
            task_type: draft.task_type,
            xp: draft.xp,
            is_complete: false,
            created_at: now_ms(),
        }
    }

    /// Check if the task lives in the unscoped general bucket
    pub fn is_general(&self) -> bool {
        self.quest_id.is_none()
    }
}
