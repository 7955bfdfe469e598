//! State management with actor pattern
//!
//! StateManager owns the record Store and processes messages via channels,
//! providing serialized access to persistent state and a change feed.

mod events;
mod manager;
mod messages;
mod persistence;

pub use events::{ChangeEvent, ChangeKind, Entity};
pub use manager::StateManager;
pub use messages::{StateCommand, StateError, StateResponse};
pub use persistence::Persistence;
