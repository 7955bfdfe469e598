//! State manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{Party, PartyMember, Preferences, Profile, Quest, Task};
use crate::store::{StoreError, XpAward};

use super::events::ChangeEvent;

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

impl From<StoreError> for StateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Conflict(what) => Self::Conflict(what),
            StoreError::Invariant(what) => Self::Invariant(what),
            other => Self::StoreError(other.to_string()),
        }
    }
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

type Reply<T> = oneshot::Sender<StateResponse<T>>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    // Profiles
    GetProfile {
        id: String,
        reply: Reply<Option<Profile>>,
    },
    UpsertProfile {
        profile: Profile,
        reply: Reply<()>,
    },
    UpdateProfile {
        profile: Profile,
        reply: Reply<()>,
    },
    TopProfiles {
        limit: usize,
        reply: Reply<Vec<Profile>>,
    },

    // Quests
    InsertQuest {
        quest: Quest,
        reply: Reply<()>,
    },
    GetQuest {
        id: String,
        reply: Reply<Option<Quest>>,
    },
    ListQuests {
        user_id: String,
        reply: Reply<Vec<Quest>>,
    },
    EquipQuest {
        id: String,
        reply: Reply<Quest>,
    },
    DeactivateQuest {
        id: String,
        reply: Reply<Quest>,
    },
    DeleteQuest {
        id: String,
        reply: Reply<(Quest, usize)>,
    },

    // Tasks
    InsertTasks {
        tasks: Vec<Task>,
        reply: Reply<()>,
    },
    GetTask {
        id: String,
        reply: Reply<Option<Task>>,
    },
    ListTasks {
        user_id: String,
        reply: Reply<Vec<Task>>,
    },
    DeleteTask {
        id: String,
        reply: Reply<Task>,
    },
    CompleteTaskAndAwardXp {
        task_id: String,
        xp: u32,
        reply: Reply<XpAward>,
    },
    ResetDaily {
        user_id: String,
        reply: Reply<usize>,
    },

    // Preferences
    GetPreferences {
        user_id: String,
        reply: Reply<Option<Preferences>>,
    },
    UpsertPreferences {
        preferences: Preferences,
        reply: Reply<()>,
    },

    // Parties
    CreateParty {
        party: Party,
        creator: PartyMember,
        reply: Reply<()>,
    },
    GetParty {
        id: String,
        reply: Reply<Option<Party>>,
    },
    FindPartyByCode {
        invite_code: String,
        reply: Reply<Option<Party>>,
    },
    Membership {
        user_id: String,
        reply: Reply<Option<PartyMember>>,
    },
    InsertMember {
        member: PartyMember,
        reply: Reply<()>,
    },
    DeleteMember {
        user_id: String,
        reply: Reply<PartyMember>,
    },
    ListMembers {
        party_id: String,
        reply: Reply<Vec<PartyMember>>,
    },

    // Account
    DeleteAccount {
        user_id: String,
        reply: Reply<()>,
    },

    // Change journal (fire and forget)
    RecordChanges {
        events: Vec<ChangeEvent>,
    },
}
