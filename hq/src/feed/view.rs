//! Dashboard snapshot published by the feed coordinator

use std::collections::BTreeSet;

use serde::Serialize;

use crate::domain::{Profile, Quest, Task};
use crate::progression::ProgressionSnapshot;
use crate::state::Entity;

/// Independently refreshed part of the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Aggregate {
    Profile,
    Quests,
    Tasks,
}

impl Aggregate {
    pub const ALL: [Aggregate; 3] = [Aggregate::Profile, Aggregate::Quests, Aggregate::Tasks];

    /// Aggregate invalidated by a change to `entity`, if the dashboard shows it
    pub fn for_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Profile => Some(Self::Profile),
            Entity::Quest => Some(Self::Quests),
            Entity::Task => Some(Self::Tasks),
            Entity::Party | Entity::Preferences => None,
        }
    }
}

/// What a user's dashboard shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub user_id: String,
    pub profile: Option<Profile>,
    pub progression: ProgressionSnapshot,
    pub quests: Vec<Quest>,
    pub tasks: Vec<Task>,
    /// Aggregates holding optimistic local edits not yet confirmed by a refresh
    pub pending: BTreeSet<Aggregate>,
    /// Bumped on every change to the view
    pub revision: u64,
}

impl DashboardView {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            profile: None,
            progression: ProgressionSnapshot::from_xp(0),
            quests: Vec::new(),
            tasks: Vec::new(),
            pending: BTreeSet::new(),
            revision: 0,
        }
    }

    pub fn is_provisional(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn xp(&self) -> u64 {
        self.profile.as_ref().map(|p| p.xp).unwrap_or(0)
    }

    pub fn active_quest(&self) -> Option<&Quest> {
        self.quests.iter().find(|q| q.is_active)
    }

    pub(super) fn set_profile(&mut self, profile: Option<Profile>) {
        self.progression = ProgressionSnapshot::from_xp(profile.as_ref().map(|p| p.xp).unwrap_or(0));
        self.profile = profile;
    }

    /// Mark a task complete locally and credit its XP; false if the task is
    /// unknown or already complete
    pub(super) fn apply_completion(&mut self, task_id: &str) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id && !t.is_complete) else {
            return false;
        };
        task.is_complete = true;
        let xp = u64::from(task.xp);
        if let Some(profile) = self.profile.as_mut() {
            profile.xp = profile.xp.saturating_add(xp);
            self.progression = ProgressionSnapshot::from_xp(profile.xp);
            self.pending.insert(Aggregate::Profile);
        }
        self.pending.insert(Aggregate::Tasks);
        true
    }
}
