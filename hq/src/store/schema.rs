//! SQLite schema and row mapping

use rusqlite::types::Type;
use rusqlite::{Connection, Row};

use crate::domain::{Party, PartyMember, Preferences, Profile, Quest, Task, TaskType};

use super::ChangeRecord;

pub(super) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY,
    display_name TEXT,
    email TEXT,
    xp INTEGER NOT NULL DEFAULT 0 CHECK (xp >= 0),
    avatar TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS quests (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_quests_user ON quests(user_id);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    quest_id TEXT REFERENCES quests(id),
    title TEXT NOT NULL,
    task_type TEXT NOT NULL CHECK (task_type IN ('Daily', 'Weekly', 'Milestone')),
    xp INTEGER NOT NULL CHECK (xp > 0),
    is_complete INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id);
CREATE INDEX IF NOT EXISTS idx_tasks_quest ON tasks(quest_id);

CREATE TABLE IF NOT EXISTS preferences (
    user_id TEXT PRIMARY KEY,
    onboarding_acknowledged INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS parties (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    invite_code TEXT NOT NULL UNIQUE,
    created_by TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS party_members (
    user_id TEXT PRIMARY KEY,
    party_id TEXT NOT NULL REFERENCES parties(id),
    joined_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_party_members_party ON party_members(party_id);

CREATE TABLE IF NOT EXISTS changes (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    origin TEXT NOT NULL,
    user_id TEXT NOT NULL,
    entity TEXT NOT NULL,
    kind TEXT NOT NULL
);
"#;

pub(super) fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)
}

pub(super) const PROFILE_COLUMNS: &str = "id, display_name, email, xp, avatar, created_at";
pub(super) const QUEST_COLUMNS: &str = "id, user_id, title, is_active, created_at";
pub(super) const TASK_COLUMNS: &str = "id, user_id, quest_id, title, task_type, xp, is_complete, created_at";
pub(super) const PARTY_COLUMNS: &str = "id, name, invite_code, created_by, created_at";
pub(super) const CHANGE_COLUMNS: &str = "seq, origin, user_id, entity, kind";

pub(super) fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    let xp: i64 = row.get(3)?;
    Ok(Profile {
        id: row.get(0)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        xp: u64::try_from(xp).unwrap_or(0),
        avatar: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub(super) fn quest_from_row(row: &Row<'_>) -> rusqlite::Result<Quest> {
    Ok(Quest {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        is_active: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(super) fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let task_type: String = row.get(4)?;
    let task_type: TaskType = task_type
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    let xp: i64 = row.get(5)?;
    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        quest_id: row.get(2)?,
        title: row.get(3)?,
        task_type,
        xp: u32::try_from(xp).unwrap_or(0),
        is_complete: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub(super) fn preferences_from_row(row: &Row<'_>) -> rusqlite::Result<Preferences> {
    Ok(Preferences {
        user_id: row.get(0)?,
        onboarding_acknowledged: row.get(1)?,
    })
}

pub(super) fn party_from_row(row: &Row<'_>) -> rusqlite::Result<Party> {
    Ok(Party {
        id: row.get(0)?,
        name: row.get(1)?,
        invite_code: row.get(2)?,
        created_by: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(super) fn member_from_row(row: &Row<'_>) -> rusqlite::Result<PartyMember> {
    Ok(PartyMember {
        user_id: row.get(0)?,
        party_id: row.get(1)?,
        joined_at: row.get(2)?,
    })
}

pub(super) fn change_from_row(row: &Row<'_>) -> rusqlite::Result<ChangeRecord> {
    Ok(ChangeRecord {
        seq: row.get(0)?,
        origin: row.get(1)?,
        user_id: row.get(2)?,
        entity: row.get(3)?,
        kind: row.get(4)?,
    })
}
