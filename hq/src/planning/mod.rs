//! Planning module - AI coach conversation and plan proposals
//!
//! # Architecture
//!
//! ```text
//! User → PlanningSession → PlanOrchestrator → GenerativeClient
//!              ↓                  (model resolution, 429 backoff)
//!        classify() → PlanResponse
//!              ↓ (Plan)
//!        staged PlanProposal → accept → QuestManager::create_quest + equip
//! ```
//!
//! Generation failures and parse failures surface as distinct `PlanError`
//! variants. A proposal is never persisted without explicit acceptance.

mod classifier;
mod error;
mod orchestrator;
mod prompt;
mod session;

pub use classifier::{PlanProposal, PlanResponse, classify};
pub use error::{ModelFailure, ParseError, PlanError};
pub use orchestrator::{OrchestratorConfig, PlanOrchestrator};
pub use prompt::{COACH_GREETING, COACH_QUICK_REPLIES, GARBLED_NOTICE, SILENT_NOTICE, coach_system_prompt};
pub use session::{PlanningSession, TranscriptEntry};
