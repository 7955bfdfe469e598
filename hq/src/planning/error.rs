//! Planning error types

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::domain::TaskType;
use crate::llm::FailureKind;
use crate::quest::QuestError;

/// The coach's response could not be turned into a valid reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("unknown response_type '{0}'")]
    UnknownResponseType(String),

    #[error("plan response is missing plan_data")]
    MissingPlanData,

    #[error("plan_data is missing quest_title")]
    MissingQuestTitle,

    #[error("plan_data is only allowed on plan responses")]
    UnexpectedPlanData,

    #[error("plan has no tasks")]
    EmptyTaskList,

    #[error("task {index} has an empty title")]
    EmptyTaskTitle { index: usize },

    #[error("task {index} has unknown task_type '{value}'")]
    UnknownTaskType { index: usize, value: String },

    #[error("task {index} has invalid xp {value}")]
    InvalidXp { index: usize, value: String },

    #[error("task {index} ({found}) is ordered after a {previous} task")]
    OutOfOrder {
        index: usize,
        previous: TaskType,
        found: TaskType,
    },
}

/// Last failure seen for one candidate model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelFailure {
    pub model: String,
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for ModelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}): {}", self.model, self.kind, self.message)
    }
}

fn summarize(failures: &[ModelFailure]) -> String {
    if failures.is_empty() {
        return "no candidate models".to_string();
    }
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Errors from plan generation and the planning session
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("All models failed: {}", summarize(.failures))]
    Exhausted { failures: Vec<ModelFailure> },

    #[error("Could not understand the coach's reply: {0}")]
    Parse(#[from] ParseError),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("No plan proposal is staged")]
    NoProposal,

    #[error("Could not save the plan: {0}")]
    Persistence(#[from] QuestError),
}
