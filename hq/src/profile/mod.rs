//! Profiles: identity records, stats, leaderboard, preferences and account removal

mod error;
mod service;

pub use error::ProfileError;
pub use service::{LeaderboardEntry, ProfileService, ProfileStats};
