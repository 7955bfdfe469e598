//! Record store - SQLite persistence for profiles, quests, tasks and parties
//!
//! The Store is synchronous and owned by the StateManager actor. Operations
//! that must be atomic (equip, complete-and-award, cascades) run inside a
//! single SQLite transaction.

mod schema;

use std::fs;
use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{Party, PartyMember, Preferences, Profile, Quest, Task, TaskType, now_ms};
use schema::{
    CHANGE_COLUMNS, PARTY_COLUMNS, PROFILE_COLUMNS, QUEST_COLUMNS, TASK_COLUMNS, member_from_row, party_from_row,
    change_from_row, preferences_from_row, profile_from_row, quest_from_row, task_from_row,
};

/// Journal rows kept for other processes to catch up on
const CHANGE_JOURNAL_KEEP: i64 = 1024;

/// How long a write waits on another process holding the database lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the record store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

/// Map constraint violations to `Conflict`, everything else to `Sqlite`
fn classify(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, ref message) if failure.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict(message.clone().unwrap_or_else(|| failure.to_string()))
        }
        other => StoreError::Sqlite(other),
    }
}

/// Result of the atomic complete-and-award operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XpAward {
    pub user_id: String,
    pub task_id: String,
    pub xp_awarded: u32,
    pub xp_before: u64,
    pub xp_after: u64,
}

/// One row of the change journal
///
/// Every process that writes to the database appends here, so a process can
/// pick up changes made by others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub seq: i64,
    /// Id of the process-local manager that made the change
    pub origin: String,
    pub user_id: String,
    pub entity: String,
    pub kind: String,
}

/// SQLite-backed record store
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) a store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Store::open: called");
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        schema::migrate(&conn)?;
        info!(path = %path.display(), "Store opened");
        Ok(Self { conn })
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("Store::open_in_memory: called");
        let conn = Connection::open_in_memory()?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    // === Profiles ===

    pub fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1");
        Ok(self.conn.query_row(&sql, params![id], profile_from_row).optional()?)
    }

    /// Insert a profile or update its name, email and avatar on id conflict.
    /// XP is never written here.
    pub fn upsert_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        debug!(id = %profile.id, "Store::upsert_profile: called");
        self.conn
            .execute(
                "INSERT INTO profiles (id, display_name, email, xp, avatar, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    display_name = COALESCE(excluded.display_name, profiles.display_name),
                    email = COALESCE(excluded.email, profiles.email),
                    avatar = COALESCE(excluded.avatar, profiles.avatar)",
                params![
                    profile.id,
                    profile.display_name,
                    profile.email,
                    profile.avatar,
                    profile.created_at
                ],
            )
            .map_err(classify)?;
        Ok(())
    }

    /// Update the editable fields of an existing profile
    pub fn update_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        debug!(id = %profile.id, "Store::update_profile: called");
        let changed = self.conn.execute(
            "UPDATE profiles SET display_name = ?2, email = ?3, avatar = ?4 WHERE id = ?1",
            params![profile.id, profile.display_name, profile.email, profile.avatar],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("Profile {}", profile.id)));
        }
        Ok(())
    }

    /// Profiles ordered by XP, highest first
    pub fn top_profiles(&self, limit: usize) -> Result<Vec<Profile>, StoreError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY xp DESC, created_at ASC LIMIT ?1");
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit], profile_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // === Quests ===

    pub fn insert_quest(&self, quest: &Quest) -> Result<(), StoreError> {
        debug!(id = %quest.id, user_id = %quest.user_id, "Store::insert_quest: called");
        self.conn
            .execute(
                "INSERT INTO quests (id, user_id, title, is_active, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![quest.id, quest.user_id, quest.title, quest.is_active, quest.created_at],
            )
            .map_err(classify)?;
        Ok(())
    }

    pub fn get_quest(&self, id: &str) -> Result<Option<Quest>, StoreError> {
        let sql = format!("SELECT {QUEST_COLUMNS} FROM quests WHERE id = ?1");
        Ok(self.conn.query_row(&sql, params![id], quest_from_row).optional()?)
    }

    /// Quests of a user, newest first
    pub fn list_quests(&self, user_id: &str) -> Result<Vec<Quest>, StoreError> {
        let sql = format!("SELECT {QUEST_COLUMNS} FROM quests WHERE user_id = ?1 ORDER BY created_at DESC, id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], quest_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Activate one quest and deactivate every other quest of its owner
    pub fn equip_quest(&mut self, id: &str) -> Result<Quest, StoreError> {
        debug!(%id, "Store::equip_quest: called");
        let tx = self.conn.transaction()?;
        let user_id: String = tx
            .query_row("SELECT user_id FROM quests WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("Quest {}", id)))?;
        tx.execute(
            "UPDATE quests SET is_active = CASE WHEN id = ?1 THEN 1 ELSE 0 END WHERE user_id = ?2",
            params![id, user_id],
        )?;
        // Checked before commit; dropping the transaction rolls the update back
        let active: i64 = tx.query_row(
            "SELECT COUNT(*) FROM quests WHERE user_id = ?1 AND is_active = 1",
            params![user_id],
            |row| row.get(0),
        )?;
        if active != 1 {
            return Err(StoreError::Invariant(format!(
                "expected exactly one active quest for {}, found {}",
                user_id, active
            )));
        }
        let sql = format!("SELECT {QUEST_COLUMNS} FROM quests WHERE id = ?1");
        let quest = tx.query_row(&sql, params![id], quest_from_row)?;
        tx.commit()?;
        Ok(quest)
    }

    pub fn deactivate_quest(&self, id: &str) -> Result<Quest, StoreError> {
        debug!(%id, "Store::deactivate_quest: called");
        let changed = self
            .conn
            .execute("UPDATE quests SET is_active = 0 WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("Quest {}", id)));
        }
        self.get_quest(id)?
            .ok_or_else(|| StoreError::NotFound(format!("Quest {}", id)))
    }

    /// Delete a quest and every task referencing it.
    /// Returns the removed quest and the number of tasks removed with it.
    pub fn delete_quest(&mut self, id: &str) -> Result<(Quest, usize), StoreError> {
        debug!(%id, "Store::delete_quest: called");
        let tx = self.conn.transaction()?;
        let sql = format!("SELECT {QUEST_COLUMNS} FROM quests WHERE id = ?1");
        let quest = tx
            .query_row(&sql, params![id], quest_from_row)
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("Quest {}", id)))?;
        let removed_tasks = tx.execute("DELETE FROM tasks WHERE quest_id = ?1", params![id])?;
        tx.execute("DELETE FROM quests WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok((quest, removed_tasks))
    }

    // === Tasks ===

    /// Insert a batch of tasks; all or nothing
    pub fn insert_tasks(&mut self, tasks: &[Task]) -> Result<(), StoreError> {
        debug!(count = tasks.len(), "Store::insert_tasks: called");
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO tasks (id, user_id, quest_id, title, task_type, xp, is_complete, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for task in tasks {
                stmt.execute(params![
                    task.id,
                    task.user_id,
                    task.quest_id,
                    task.title,
                    task.task_type.as_str(),
                    i64::from(task.xp),
                    task.is_complete,
                    task.created_at
                ])
                .map_err(classify)?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        Ok(self.conn.query_row(&sql, params![id], task_from_row).optional()?)
    }

    /// Tasks of a user: incomplete first, then newest first
    pub fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, StoreError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 ORDER BY is_complete ASC, created_at DESC, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], task_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Delete a task, returning the removed record
    pub fn delete_task(&self, id: &str) -> Result<Task, StoreError> {
        debug!(%id, "Store::delete_task: called");
        let task = self
            .get_task(id)?
            .ok_or_else(|| StoreError::NotFound(format!("Task {}", id)))?;
        self.conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(task)
    }

    /// Mark a task complete and add `xp` to its owner's profile in one transaction
    pub fn complete_task_and_award_xp(&mut self, task_id: &str, xp: u32) -> Result<XpAward, StoreError> {
        debug!(%task_id, xp, "Store::complete_task_and_award_xp: called");
        let tx = self.conn.transaction()?;

        let (user_id, is_complete): (String, bool) = tx
            .query_row(
                "SELECT user_id, is_complete FROM tasks WHERE id = ?1",
                params![task_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("Task {}", task_id)))?;

        if is_complete {
            debug!(%task_id, "Store::complete_task_and_award_xp: already complete");
            return Err(StoreError::Conflict(format!("Task {} is already complete", task_id)));
        }

        tx.execute("UPDATE tasks SET is_complete = 1 WHERE id = ?1", params![task_id])?;

        // Award must land even if the profile row was never created
        tx.execute(
            "INSERT OR IGNORE INTO profiles (id, xp, created_at) VALUES (?1, 0, ?2)",
            params![user_id, now_ms()],
        )?;
        let xp_before: i64 = tx.query_row("SELECT xp FROM profiles WHERE id = ?1", params![user_id], |row| {
            row.get(0)
        })?;
        tx.execute(
            "UPDATE profiles SET xp = xp + ?2 WHERE id = ?1",
            params![user_id, i64::from(xp)],
        )?;
        tx.commit()?;

        let xp_before = u64::try_from(xp_before).unwrap_or(0);
        Ok(XpAward {
            user_id,
            task_id: task_id.to_string(),
            xp_awarded: xp,
            xp_before,
            xp_after: xp_before + u64::from(xp),
        })
    }

    /// Reopen every completed Daily task of a user. Returns the number reopened.
    pub fn reset_daily(&self, user_id: &str) -> Result<usize, StoreError> {
        debug!(%user_id, "Store::reset_daily: called");
        Ok(self.conn.execute(
            "UPDATE tasks SET is_complete = 0 WHERE user_id = ?1 AND task_type = ?2 AND is_complete = 1",
            params![user_id, TaskType::Daily.as_str()],
        )?)
    }

    // === Preferences ===

    pub fn get_preferences(&self, user_id: &str) -> Result<Option<Preferences>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT user_id, onboarding_acknowledged FROM preferences WHERE user_id = ?1",
                params![user_id],
                preferences_from_row,
            )
            .optional()?)
    }

    pub fn upsert_preferences(&self, preferences: &Preferences) -> Result<(), StoreError> {
        debug!(user_id = %preferences.user_id, "Store::upsert_preferences: called");
        self.conn.execute(
            "INSERT INTO preferences (user_id, onboarding_acknowledged) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET onboarding_acknowledged = excluded.onboarding_acknowledged",
            params![preferences.user_id, preferences.onboarding_acknowledged],
        )?;
        Ok(())
    }

    // === Parties ===

    /// Insert a party together with its creator's membership
    pub fn create_party(&mut self, party: &Party, creator: &PartyMember) -> Result<(), StoreError> {
        debug!(id = %party.id, code = %party.invite_code, "Store::create_party: called");
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO parties (id, name, invite_code, created_by, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![party.id, party.name, party.invite_code, party.created_by, party.created_at],
        )
        .map_err(classify)?;
        tx.execute(
            "INSERT INTO party_members (user_id, party_id, joined_at) VALUES (?1, ?2, ?3)",
            params![creator.user_id, creator.party_id, creator.joined_at],
        )
        .map_err(classify)?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_party(&self, id: &str) -> Result<Option<Party>, StoreError> {
        let sql = format!("SELECT {PARTY_COLUMNS} FROM parties WHERE id = ?1");
        Ok(self.conn.query_row(&sql, params![id], party_from_row).optional()?)
    }

    pub fn find_party_by_code(&self, invite_code: &str) -> Result<Option<Party>, StoreError> {
        let sql = format!("SELECT {PARTY_COLUMNS} FROM parties WHERE invite_code = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![invite_code], party_from_row)
            .optional()?)
    }

    pub fn membership(&self, user_id: &str) -> Result<Option<PartyMember>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT user_id, party_id, joined_at FROM party_members WHERE user_id = ?1",
                params![user_id],
                member_from_row,
            )
            .optional()?)
    }

    pub fn insert_member(&self, member: &PartyMember) -> Result<(), StoreError> {
        debug!(user_id = %member.user_id, party_id = %member.party_id, "Store::insert_member: called");
        self.conn
            .execute(
                "INSERT INTO party_members (user_id, party_id, joined_at) VALUES (?1, ?2, ?3)",
                params![member.user_id, member.party_id, member.joined_at],
            )
            .map_err(classify)?;
        Ok(())
    }

    /// Remove a user's membership; an emptied party is deleted with it
    pub fn delete_member(&mut self, user_id: &str) -> Result<PartyMember, StoreError> {
        debug!(%user_id, "Store::delete_member: called");
        let tx = self.conn.transaction()?;
        let member = tx
            .query_row(
                "SELECT user_id, party_id, joined_at FROM party_members WHERE user_id = ?1",
                params![user_id],
                member_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("Membership for {}", user_id)))?;
        tx.execute("DELETE FROM party_members WHERE user_id = ?1", params![user_id])?;
        let remaining: i64 = tx.query_row(
            "SELECT COUNT(*) FROM party_members WHERE party_id = ?1",
            params![member.party_id],
            |row| row.get(0),
        )?;
        if remaining == 0 {
            debug!(party_id = %member.party_id, "Store::delete_member: party empty, removing");
            tx.execute("DELETE FROM parties WHERE id = ?1", params![member.party_id])?;
        }
        tx.commit()?;
        Ok(member)
    }

    /// Members of a party, oldest membership first
    pub fn list_members(&self, party_id: &str) -> Result<Vec<PartyMember>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, party_id, joined_at FROM party_members WHERE party_id = ?1 ORDER BY joined_at, user_id",
        )?;
        let rows = stmt.query_map(params![party_id], member_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // === Change journal ===

    /// Append changes made by `origin`, pruning the oldest rows
    pub fn record_changes(&mut self, origin: &str, changes: &[(String, String, String)]) -> Result<(), StoreError> {
        debug!(%origin, count = changes.len(), "Store::record_changes: called");
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT INTO changes (origin, user_id, entity, kind) VALUES (?1, ?2, ?3, ?4)")?;
            for (user_id, entity, kind) in changes {
                stmt.execute(params![origin, user_id, entity, kind])?;
            }
        }
        tx.execute(
            "DELETE FROM changes WHERE seq <= (SELECT MAX(seq) FROM changes) - ?1",
            params![CHANGE_JOURNAL_KEEP],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Journal rows after `seq`, oldest first
    pub fn changes_since(&self, seq: i64) -> Result<Vec<ChangeRecord>, StoreError> {
        let sql = format!("SELECT {CHANGE_COLUMNS} FROM changes WHERE seq > ?1 ORDER BY seq ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![seq], change_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Highest journal sequence number, 0 when empty
    pub fn latest_change(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT COALESCE(MAX(seq), 0) FROM changes", [], |row| row.get(0))?)
    }

    // === Account ===

    /// Remove every record owned by a user
    pub fn delete_account(&mut self, user_id: &str) -> Result<(), StoreError> {
        debug!(%user_id, "Store::delete_account: called");
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM tasks WHERE user_id = ?1", params![user_id])?;
        tx.execute("DELETE FROM quests WHERE user_id = ?1", params![user_id])?;
        tx.execute("DELETE FROM preferences WHERE user_id = ?1", params![user_id])?;
        let party_id: Option<String> = tx
            .query_row(
                "SELECT party_id FROM party_members WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        tx.execute("DELETE FROM party_members WHERE user_id = ?1", params![user_id])?;
        if let Some(party_id) = party_id {
            tx.execute(
                "DELETE FROM parties WHERE id = ?1 AND NOT EXISTS (SELECT 1 FROM party_members WHERE party_id = ?1)",
                params![party_id],
            )?;
        }
        tx.execute("DELETE FROM profiles WHERE id = ?1", params![user_id])?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskDraft;
    use tempfile::TempDir;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn daily(user: &str, quest: Option<&str>, title: &str, xp: u32) -> Task {
        Task::from_draft(user, quest.map(String::from), TaskDraft::new(title, TaskType::Daily, xp))
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("hq.db");
        let store = Store::open(&path).unwrap();
        assert!(path.exists());
        assert!(store.get_profile("nobody").unwrap().is_none());
    }

    #[test]
    fn test_upsert_profile_preserves_xp() {
        let mut store = store();
        store.upsert_profile(&Profile::new("u1")).unwrap();
        let task = daily("u1", None, "Stretch", 10);
        store.insert_tasks(std::slice::from_ref(&task)).unwrap();
        store.complete_task_and_award_xp(&task.id, 10).unwrap();

        store
            .upsert_profile(&Profile::new("u1").with_display_name("Sam"))
            .unwrap();
        let profile = store.get_profile("u1").unwrap().unwrap();
        assert_eq!(profile.xp, 10);
        assert_eq!(profile.display_name.as_deref(), Some("Sam"));
    }

    #[test]
    fn test_equip_quest_deactivates_others() {
        let mut store = store();
        let a = Quest::new("u1", "A");
        let b = Quest::new("u1", "B");
        let other = Quest::new("u2", "Other");
        for q in [&a, &b, &other] {
            store.insert_quest(q).unwrap();
        }
        store.equip_quest(&other.id).unwrap();
        store.equip_quest(&a.id).unwrap();
        store.equip_quest(&b.id).unwrap();

        let active: Vec<_> = store
            .list_quests("u1")
            .unwrap()
            .into_iter()
            .filter(|q| q.is_active)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, b.id);
        // Other users are untouched
        assert!(store.get_quest(&other.id).unwrap().unwrap().is_active);
    }

    #[test]
    fn test_equip_missing_quest() {
        let mut store = store();
        assert!(matches!(store.equip_quest("missing"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_insert_tasks_is_all_or_nothing() {
        let mut store = store();
        let good = daily("u1", None, "Good", 10);
        let bad = daily("u1", None, "Bad", 0);
        let result = store.insert_tasks(&[good, bad]);
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert!(store.list_tasks("u1").unwrap().is_empty());
    }

    #[test]
    fn test_task_requires_existing_quest() {
        let mut store = store();
        let task = daily("u1", Some("no-such-quest"), "Orphan", 10);
        assert!(store.insert_tasks(&[task]).is_err());
    }

    #[test]
    fn test_complete_and_award() {
        let mut store = store();
        let task = daily("u1", None, "Walk", 15);
        store.insert_tasks(std::slice::from_ref(&task)).unwrap();

        let award = store.complete_task_and_award_xp(&task.id, 15).unwrap();
        assert_eq!(award.xp_before, 0);
        assert_eq!(award.xp_after, 15);
        assert!(store.get_task(&task.id).unwrap().unwrap().is_complete);
        assert_eq!(store.get_profile("u1").unwrap().unwrap().xp, 15);

        let again = store.complete_task_and_award_xp(&task.id, 15);
        assert!(matches!(again, Err(StoreError::Conflict(_))));
        assert_eq!(store.get_profile("u1").unwrap().unwrap().xp, 15);
    }

    #[test]
    fn test_delete_quest_cascades() {
        let mut store = store();
        let quest = Quest::new("u1", "Guitar");
        store.insert_quest(&quest).unwrap();
        store
            .insert_tasks(&[
                daily("u1", Some(&quest.id), "Tune", 10),
                daily("u1", Some(&quest.id), "Scales", 10),
                daily("u1", None, "General", 10),
            ])
            .unwrap();

        assert_eq!(store.delete_quest(&quest.id).unwrap().1, 2);
        let remaining = store.list_tasks("u1").unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].is_general());
    }

    #[test]
    fn test_list_tasks_incomplete_first() {
        let mut store = store();
        let done = daily("u1", None, "Done", 10);
        let open = daily("u1", None, "Open", 10);
        store.insert_tasks(&[done.clone(), open.clone()]).unwrap();
        store.complete_task_and_award_xp(&done.id, 10).unwrap();

        let tasks = store.list_tasks("u1").unwrap();
        assert_eq!(tasks[0].id, open.id);
        assert_eq!(tasks[1].id, done.id);
    }

    #[test]
    fn test_change_journal_reads_after_seq() {
        let mut store = store();
        assert_eq!(store.latest_change().unwrap(), 0);
        let change = |user: &str| (user.to_string(), "Task".to_string(), "Insert".to_string());

        store.record_changes("a", &[change("u1"), change("u2")]).unwrap();
        let mark = store.latest_change().unwrap();
        store.record_changes("b", &[change("u3")]).unwrap();

        let after = store.changes_since(mark).unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].origin, "b");
        assert_eq!(after[0].user_id, "u3");
        assert_eq!(store.changes_since(0).unwrap().len(), 3);
    }

    #[test]
    fn test_change_journal_is_pruned() {
        let mut store = store();
        let batch: Vec<_> = (0..CHANGE_JOURNAL_KEEP + 10)
            .map(|i| (format!("u{i}"), "Quest".to_string(), "Update".to_string()))
            .collect();
        store.record_changes("a", &batch).unwrap();

        let kept = store.changes_since(0).unwrap();
        assert_eq!(kept.len(), usize::try_from(CHANGE_JOURNAL_KEEP).unwrap());
        assert_eq!(kept.last().unwrap().seq, store.latest_change().unwrap());
    }

    #[test]
    fn test_delete_member_removes_empty_party() {
        let mut store = store();
        let party = Party::new("Owls", "ABCDE", "u1");
        store.create_party(&party, &PartyMember::new(&party.id, "u1")).unwrap();
        store.delete_member("u1").unwrap();
        assert!(store.get_party(&party.id).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_invite_code_conflicts() {
        let mut store = store();
        let a = Party::new("A", "ABCDE", "u1");
        let b = Party::new("B", "ABCDE", "u2");
        store.create_party(&a, &PartyMember::new(&a.id, "u1")).unwrap();
        let result = store.create_party(&b, &PartyMember::new(&b.id, "u2"));
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_delete_account_removes_everything() {
        let mut store = store();
        store.upsert_profile(&Profile::new("u1")).unwrap();
        let quest = Quest::new("u1", "Q");
        store.insert_quest(&quest).unwrap();
        store.insert_tasks(&[daily("u1", Some(&quest.id), "T", 10)]).unwrap();
        store.upsert_preferences(&Preferences::new("u1")).unwrap();

        store.delete_account("u1").unwrap();
        assert!(store.get_profile("u1").unwrap().is_none());
        assert!(store.list_quests("u1").unwrap().is_empty());
        assert!(store.list_tasks("u1").unwrap().is_empty());
        assert!(store.get_preferences("u1").unwrap().is_none());
    }
}
