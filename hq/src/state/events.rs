//! Change notifications broadcast after successful writes

use serde::Serialize;

use crate::store::ChangeRecord;

/// Kind of record a change touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Entity {
    Profile,
    Quest,
    Task,
    Party,
    Preferences,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "Profile",
            Self::Quest => "Quest",
            Self::Task => "Task",
            Self::Party => "Party",
            Self::Preferences => "Preferences",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "Profile" => Some(Self::Profile),
            "Quest" => Some(Self::Quest),
            "Task" => Some(Self::Task),
            "Party" => Some(Self::Party),
            "Preferences" => Some(Self::Preferences),
            _ => None,
        }
    }
}

/// What happened to the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "Insert",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "Insert" => Some(Self::Insert),
            "Update" => Some(Self::Update),
            "Delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// A change to one user's records
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub user_id: String,
    pub entity: Entity,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(user_id: impl Into<String>, entity: Entity, kind: ChangeKind) -> Self {
        Self {
            user_id: user_id.into(),
            entity,
            kind,
        }
    }

    /// Rebuild an event from a journal row; unknown names yield `None`
    pub fn from_record(record: &ChangeRecord) -> Option<Self> {
        Some(Self::new(
            record.user_id.clone(),
            Entity::parse(&record.entity)?,
            ChangeKind::parse(&record.kind)?,
        ))
    }

    /// Columns written to the change journal
    pub(crate) fn journal_columns(&self) -> (String, String, String) {
        (
            self.user_id.clone(),
            self.entity.as_str().to_string(),
            self.kind.as_str().to_string(),
        )
    }
}
