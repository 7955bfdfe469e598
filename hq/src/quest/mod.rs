//! Quest lifecycle: creation, equip/unequip, task completion, daily reset

mod error;
mod manager;

pub use error::QuestError;
pub use manager::{CompletionOutcome, QUICK_ADD_XP, QuestManager, TaskView};
