//! HabitQuest - progression and quest orchestration for habit building
//!
//! Users equip one quest at a time, complete Daily, Weekly and Milestone
//! tasks for XP, climb levels and earn badges. An AI coach turns a goal into
//! a staged quest plan through a short conversation.
//!
//! # Core Concepts
//!
//! - **One Active Quest**: `equip` is the only way a quest becomes active
//! - **Atomic Rewards**: completing a task and crediting XP is one transaction
//! - **Read-time Locks**: Weekly and Milestone tasks unlock as the quest ages
//! - **Resilient Coach**: candidate models are tried in order with 429 backoff
//!
//! # Modules
//!
//! - [`progression`] - Level, XP curve and badge math
//! - [`locking`] - Task locking policy
//! - [`store`] - SQLite record store
//! - [`state`] - Actor owning the store, plus the change feed
//! - [`quest`] - Quest lifecycle, completion and daily reset
//! - [`feed`] - Live dashboard kept in sync with the change feed
//! - [`llm`] - Generative model client trait and Gemini implementation
//! - [`planning`] - Coach orchestration, response classification and sessions
//! - [`profile`] - Profiles, stats, leaderboard and preferences
//! - [`guild`] - Parties and invite codes
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod feed;
pub mod guild;
pub mod llm;
pub mod locking;
pub mod planning;
pub mod profile;
pub mod progression;
pub mod quest;
pub mod state;
pub mod store;

// Re-export commonly used types
pub use config::{AiConfig, Config, StorageConfig};
pub use domain::{Party, PartyMember, Preferences, Profile, Quest, Task, TaskDraft, TaskType};
pub use feed::{Aggregate, DashboardView, FeedHandle};
pub use guild::{GuildError, GuildManager, GuildOverview};
pub use llm::{ConversationTurn, GeminiClient, GenerateRequest, GenerativeClient, LlmError, Role, create_client};
pub use locking::LockState;
pub use planning::{
    OrchestratorConfig, ParseError, PlanError, PlanOrchestrator, PlanProposal, PlanResponse, PlanningSession, classify,
};
pub use profile::{LeaderboardEntry, ProfileError, ProfileService, ProfileStats};
pub use progression::ProgressionSnapshot;
pub use quest::{CompletionOutcome, QuestError, QuestManager, TaskView};
pub use state::{ChangeEvent, ChangeKind, Entity, Persistence, StateError, StateManager};
pub use store::{Store, StoreError};
