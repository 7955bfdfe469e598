//! QuestManager - quest lifecycle, task completion and daily reset

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{Quest, Task, TaskDraft, TaskType};
use crate::locking::{LockState, lock_state};
use crate::progression;
use crate::state::{Persistence, StateError};

use super::error::QuestError;

/// XP of a task created through quick-add
pub const QUICK_ADD_XP: u32 = 10;

/// Result of a successful task completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionOutcome {
    pub task_id: String,
    pub xp_awarded: u32,
    pub xp_before: u64,
    pub xp_after: u64,
}

impl CompletionOutcome {
    pub fn level_before(&self) -> u32 {
        progression::level(self.xp_before)
    }

    pub fn level_after(&self) -> u32 {
        progression::level(self.xp_after)
    }

    pub fn leveled_up(&self) -> bool {
        self.level_after() > self.level_before()
    }
}

/// A task paired with its lock decision at read time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    pub task: Task,
    pub lock: LockState,
}

/// Drives quests and tasks through the persistence collaborator
#[derive(Clone)]
pub struct QuestManager {
    store: Arc<dyn Persistence>,
}

impl QuestManager {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        debug!("QuestManager::new: called");
        Self { store }
    }

    /// Quest owned by `user_id`; anything else reads as not found
    async fn owned_quest(&self, user_id: &str, quest_id: &str) -> Result<Quest, QuestError> {
        match self.store.get_quest(quest_id).await? {
            Some(quest) if quest.user_id == user_id => Ok(quest),
            Some(_) => {
                debug!(%user_id, %quest_id, "owned_quest: owned by another user");
                Err(QuestError::QuestNotFound(quest_id.to_string()))
            }
            None => Err(QuestError::QuestNotFound(quest_id.to_string())),
        }
    }

    async fn owned_task(&self, user_id: &str, task_id: &str) -> Result<Task, QuestError> {
        match self.store.get_task(task_id).await? {
            Some(task) if task.user_id == user_id => Ok(task),
            Some(_) => {
                debug!(%user_id, %task_id, "owned_task: owned by another user");
                Err(QuestError::TaskNotFound(task_id.to_string()))
            }
            None => Err(QuestError::TaskNotFound(task_id.to_string())),
        }
    }

    // === Quests ===

    /// Insert an inactive quest, then its task batch
    ///
    /// A failed batch leaves the quest in place and reports
    /// [`QuestError::PartialPersistence`]; use [`Self::retry_task_batch`] to
    /// finish the write.
    pub async fn create_quest(&self, user_id: &str, title: &str, drafts: Vec<TaskDraft>) -> Result<Quest, QuestError> {
        debug!(%user_id, %title, task_count = drafts.len(), "create_quest: called");
        let quest = Quest::new(user_id, title);
        self.store.insert_quest(quest.clone()).await?;

        let tasks = build_tasks(user_id, &quest.id, drafts);
        if let Err(source) = self.store.insert_tasks(tasks).await {
            warn!(quest_id = %quest.id, error = %source, "create_quest: task batch failed after quest insert");
            return Err(QuestError::PartialPersistence {
                quest_id: quest.id,
                source,
            });
        }

        info!(quest_id = %quest.id, "Quest created");
        Ok(quest)
    }

    /// Re-run only the task batch step of a partially persisted quest
    pub async fn retry_task_batch(
        &self,
        user_id: &str,
        quest_id: &str,
        drafts: Vec<TaskDraft>,
    ) -> Result<Vec<Task>, QuestError> {
        debug!(%user_id, %quest_id, task_count = drafts.len(), "retry_task_batch: called");
        let quest = self.owned_quest(user_id, quest_id).await?;
        let tasks = build_tasks(user_id, &quest.id, drafts);
        self.store
            .insert_tasks(tasks.clone())
            .await
            .map_err(|source| QuestError::PartialPersistence {
                quest_id: quest.id.clone(),
                source,
            })?;
        Ok(tasks)
    }

    /// Make `quest_id` the user's only active quest
    pub async fn equip(&self, user_id: &str, quest_id: &str) -> Result<Quest, QuestError> {
        debug!(%user_id, %quest_id, "equip: called");
        self.owned_quest(user_id, quest_id).await?;
        let quest = self.store.equip_quest(quest_id).await.map_err(|e| match e {
            StateError::NotFound(_) => QuestError::QuestNotFound(quest_id.to_string()),
            StateError::Invariant(what) => {
                warn!(%user_id, %what, "equip: transition rejected");
                QuestError::InvariantViolation(what)
            }
            other => QuestError::State(other),
        })?;

        info!(%quest_id, "Quest equipped");
        Ok(quest)
    }

    /// Deactivate a quest without activating any other
    pub async fn unequip(&self, user_id: &str, quest_id: &str) -> Result<Quest, QuestError> {
        debug!(%user_id, %quest_id, "unequip: called");
        self.owned_quest(user_id, quest_id).await?;
        Ok(self.store.deactivate_quest(quest_id).await?)
    }

    /// Delete a quest and its tasks; returns the number of tasks removed
    pub async fn delete_quest(&self, user_id: &str, quest_id: &str) -> Result<usize, QuestError> {
        debug!(%user_id, %quest_id, "delete_quest: called");
        self.owned_quest(user_id, quest_id).await?;
        let removed = self.store.delete_quest(quest_id).await?;
        info!(%quest_id, removed, "Quest deleted");
        Ok(removed)
    }

    pub async fn quests(&self, user_id: &str) -> Result<Vec<Quest>, QuestError> {
        debug!(%user_id, "quests: called");
        Ok(self.store.list_quests(user_id).await?)
    }

    pub async fn active_quest(&self, user_id: &str) -> Result<Option<Quest>, QuestError> {
        debug!(%user_id, "active_quest: called");
        Ok(self.store.list_quests(user_id).await?.into_iter().find(|q| q.is_active))
    }

    // === Tasks ===

    /// Quick-add a Daily task worth [`QUICK_ADD_XP`]
    pub async fn add_task(&self, user_id: &str, quest_id: Option<&str>, title: &str) -> Result<Task, QuestError> {
        self.add_task_with(user_id, quest_id, TaskDraft::new(title, TaskType::Daily, QUICK_ADD_XP))
            .await
    }

    pub async fn add_task_with(
        &self,
        user_id: &str,
        quest_id: Option<&str>,
        draft: TaskDraft,
    ) -> Result<Task, QuestError> {
        debug!(%user_id, ?quest_id, title = %draft.title, "add_task_with: called");
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(QuestError::InvalidTask("title is empty".to_string()));
        }
        if draft.xp == 0 {
            return Err(QuestError::InvalidTask("xp must be positive".to_string()));
        }
        if let Some(quest_id) = quest_id {
            self.owned_quest(user_id, quest_id).await?;
        }

        let draft = TaskDraft::new(title, draft.task_type, draft.xp);
        let task = Task::from_draft(user_id, quest_id.map(String::from), draft);
        self.store.insert_tasks(vec![task.clone()]).await?;
        Ok(task)
    }

    pub async fn delete_task(&self, user_id: &str, task_id: &str) -> Result<(), QuestError> {
        debug!(%user_id, %task_id, "delete_task: called");
        self.owned_task(user_id, task_id).await?;
        Ok(self.store.delete_task(task_id).await?)
    }

    /// Tasks of a user, incomplete first then newest first
    pub async fn tasks(&self, user_id: &str) -> Result<Vec<Task>, QuestError> {
        debug!(%user_id, "tasks: called");
        Ok(self.store.list_tasks(user_id).await?)
    }

    /// Tasks with their lock state recomputed at `now`
    pub async fn task_views(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<TaskView>, QuestError> {
        debug!(%user_id, "task_views: called");
        let started: HashMap<String, DateTime<Utc>> = self
            .store
            .list_quests(user_id)
            .await?
            .into_iter()
            .map(|q| (q.id.clone(), q.created_at_utc()))
            .collect();

        let views = self
            .store
            .list_tasks(user_id)
            .await?
            .into_iter()
            .map(|task| {
                let quest_start = task.quest_id.as_ref().and_then(|id| started.get(id).copied());
                let lock = lock_state(task.task_type, quest_start, now);
                TaskView { task, lock }
            })
            .collect();
        Ok(views)
    }

    // === Completion ===

    pub async fn complete_task(&self, user_id: &str, task_id: &str) -> Result<CompletionOutcome, QuestError> {
        self.complete_task_at(user_id, task_id, Utc::now()).await
    }

    /// Complete a task and award its XP, with the lock policy evaluated at `now`
    pub async fn complete_task_at(
        &self,
        user_id: &str,
        task_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome, QuestError> {
        debug!(%user_id, %task_id, "complete_task_at: called");
        let task = self.owned_task(user_id, task_id).await?;
        if task.is_complete {
            debug!(%task_id, "complete_task_at: already complete");
            return Err(QuestError::AlreadyComplete(task_id.to_string()));
        }

        let quest_start = match &task.quest_id {
            Some(quest_id) => self.store.get_quest(quest_id).await?.map(|q| q.created_at_utc()),
            None => None,
        };
        if let LockState::Locked { unlocks_in_days } = lock_state(task.task_type, quest_start, now) {
            debug!(%task_id, unlocks_in_days, "complete_task_at: task locked");
            return Err(QuestError::TaskLocked {
                task_id: task_id.to_string(),
                unlocks_in_days,
            });
        }

        let award = self
            .store
            .complete_task_and_award_xp(task_id, task.xp)
            .await
            .map_err(|e| match e {
                // Lost a race with another completion of the same task
                StateError::Conflict(_) => QuestError::AlreadyComplete(task_id.to_string()),
                StateError::NotFound(_) => QuestError::TaskNotFound(task_id.to_string()),
                other => QuestError::State(other),
            })?;

        let outcome = CompletionOutcome {
            task_id: award.task_id,
            xp_awarded: award.xp_awarded,
            xp_before: award.xp_before,
            xp_after: award.xp_after,
        };
        info!(
            %task_id,
            xp = outcome.xp_awarded,
            level = outcome.level_after(),
            leveled_up = outcome.leveled_up(),
            "Task completed"
        );
        Ok(outcome)
    }

    /// Reopen every Daily task of a user; returns how many were reopened
    pub async fn reset_daily(&self, user_id: &str) -> Result<usize, QuestError> {
        debug!(%user_id, "reset_daily: called");
        let reopened = self.store.reset_daily(user_id).await?;
        info!(%user_id, reopened, "Daily tasks reset");
        Ok(reopened)
    }
}

fn build_tasks(user_id: &str, quest_id: &str, drafts: Vec<TaskDraft>) -> Vec<Task> {
    drafts
        .into_iter()
        .map(|draft| Task::from_draft(user_id, Some(quest_id.to_string()), draft))
        .collect()
}
