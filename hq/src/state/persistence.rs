//! Persistence seam used by the engine's managers

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{Party, PartyMember, Preferences, Profile, Quest, Task};
use crate::store::XpAward;

use super::events::ChangeEvent;
use super::messages::StateResponse;

/// Record store operations plus the change feed
///
/// Every write that succeeds is followed by a [`ChangeEvent`] on the
/// subscription channel.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Subscribe to change notifications for every user
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    // Profiles
    async fn get_profile(&self, id: &str) -> StateResponse<Option<Profile>>;
    /// Insert, or on id conflict update name/email/avatar; XP is preserved
    async fn upsert_profile(&self, profile: Profile) -> StateResponse<()>;
    async fn update_profile(&self, profile: Profile) -> StateResponse<()>;
    async fn top_profiles(&self, limit: usize) -> StateResponse<Vec<Profile>>;

    // Quests
    async fn insert_quest(&self, quest: Quest) -> StateResponse<()>;
    async fn get_quest(&self, id: &str) -> StateResponse<Option<Quest>>;
    async fn list_quests(&self, user_id: &str) -> StateResponse<Vec<Quest>>;
    /// Activate a quest and deactivate every other quest of its owner, atomically
    async fn equip_quest(&self, id: &str) -> StateResponse<Quest>;
    async fn deactivate_quest(&self, id: &str) -> StateResponse<Quest>;
    /// Delete a quest and its tasks; returns the number of tasks removed
    async fn delete_quest(&self, id: &str) -> StateResponse<usize>;

    // Tasks
    async fn insert_tasks(&self, tasks: Vec<Task>) -> StateResponse<()>;
    async fn get_task(&self, id: &str) -> StateResponse<Option<Task>>;
    async fn list_tasks(&self, user_id: &str) -> StateResponse<Vec<Task>>;
    async fn delete_task(&self, id: &str) -> StateResponse<()>;
    /// Mark complete and add XP to the owner's profile in one transaction
    async fn complete_task_and_award_xp(&self, task_id: &str, xp: u32) -> StateResponse<XpAward>;
    async fn reset_daily(&self, user_id: &str) -> StateResponse<usize>;

    // Preferences
    async fn get_preferences(&self, user_id: &str) -> StateResponse<Option<Preferences>>;
    async fn upsert_preferences(&self, preferences: Preferences) -> StateResponse<()>;

    // Parties
    async fn create_party(&self, party: Party, creator: PartyMember) -> StateResponse<()>;
    async fn get_party(&self, id: &str) -> StateResponse<Option<Party>>;
    async fn find_party_by_code(&self, invite_code: &str) -> StateResponse<Option<Party>>;
    async fn membership(&self, user_id: &str) -> StateResponse<Option<PartyMember>>;
    async fn insert_member(&self, member: PartyMember) -> StateResponse<()>;
    async fn delete_member(&self, user_id: &str) -> StateResponse<PartyMember>;
    async fn list_members(&self, party_id: &str) -> StateResponse<Vec<PartyMember>>;

    // Account
    async fn delete_account(&self, user_id: &str) -> StateResponse<()>;
}
