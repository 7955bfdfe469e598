//! ProfileService - identity records, stats, leaderboard and preferences

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{Preferences, Profile};
use crate::progression::ProgressionSnapshot;
use crate::state::Persistence;

use super::error::ProfileError;

/// Completion statistics for one user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileStats {
    pub profile: Profile,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// Completed over total, as a rounded percentage
    pub completion_rate: u32,
    pub progression: ProgressionSnapshot,
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: usize,
    pub user_id: String,
    pub display_name: String,
    pub xp: u64,
    pub level: u32,
}

fn completion_rate(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u32
}

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn Persistence>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        debug!("ProfileService::new: called");
        Self { store }
    }

    async fn require(&self, user_id: &str) -> Result<Profile, ProfileError> {
        self.store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| ProfileError::NotFound(user_id.to_string()))
    }

    /// Create the profile on first sign-in; an existing profile keeps its XP
    pub async fn ensure_profile(&self, user_id: &str, email: Option<&str>) -> Result<Profile, ProfileError> {
        debug!(%user_id, "ensure_profile: called");
        let mut profile = Profile::new(user_id);
        profile.email = email.map(String::from);
        self.store.upsert_profile(profile).await?;
        self.require(user_id).await
    }

    pub async fn profile(&self, user_id: &str) -> Result<Option<Profile>, ProfileError> {
        debug!(%user_id, "profile: called");
        Ok(self.store.get_profile(user_id).await?)
    }

    pub async fn set_display_name(&self, user_id: &str, name: &str) -> Result<Profile, ProfileError> {
        debug!(%user_id, "set_display_name: called");
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::EmptyDisplayName);
        }
        let profile = self.require(user_id).await?.with_display_name(name);
        self.store.update_profile(profile.clone()).await?;
        info!(%user_id, "Display name updated");
        Ok(profile)
    }

    pub async fn set_avatar(&self, user_id: &str, avatar: &str) -> Result<Profile, ProfileError> {
        debug!(%user_id, %avatar, "set_avatar: called");
        let mut profile = self.require(user_id).await?;
        profile.avatar = Some(avatar.trim().to_string()).filter(|a| !a.is_empty());
        self.store.update_profile(profile.clone()).await?;
        Ok(profile)
    }

    /// True until the user has picked a display name
    pub async fn needs_display_name(&self, user_id: &str) -> Result<bool, ProfileError> {
        debug!(%user_id, "needs_display_name: called");
        let profile = self.store.get_profile(user_id).await?;
        Ok(profile
            .and_then(|p| p.display_name)
            .is_none_or(|name| name.trim().is_empty()))
    }

    pub async fn stats(&self, user_id: &str) -> Result<ProfileStats, ProfileError> {
        debug!(%user_id, "stats: called");
        let profile = self.require(user_id).await?;
        let tasks = self.store.list_tasks(user_id).await?;
        let total_tasks = tasks.len();
        let completed_tasks = tasks.iter().filter(|t| t.is_complete).count();
        Ok(ProfileStats {
            progression: ProgressionSnapshot::from_xp(profile.xp),
            profile,
            total_tasks,
            completed_tasks,
            completion_rate: completion_rate(completed_tasks, total_tasks),
        })
    }

    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, ProfileError> {
        debug!(limit, "leaderboard: called");
        let profiles = self.store.top_profiles(limit).await?;
        Ok(profiles
            .into_iter()
            .enumerate()
            .map(|(i, p)| LeaderboardEntry {
                rank: i + 1,
                display_name: p.name_or_default().to_string(),
                level: p.level(),
                xp: p.xp,
                user_id: p.id,
            })
            .collect())
    }

    // === Preferences ===

    /// Stored preferences, or the defaults when none were saved
    pub async fn preferences(&self, user_id: &str) -> Result<Preferences, ProfileError> {
        debug!(%user_id, "preferences: called");
        Ok(self
            .store
            .get_preferences(user_id)
            .await?
            .unwrap_or_else(|| Preferences::new(user_id)))
    }

    pub async fn acknowledge_onboarding(&self, user_id: &str) -> Result<Preferences, ProfileError> {
        debug!(%user_id, "acknowledge_onboarding: called");
        self.set_onboarding(user_id, true).await
    }

    pub async fn reset_onboarding(&self, user_id: &str) -> Result<Preferences, ProfileError> {
        debug!(%user_id, "reset_onboarding: called");
        self.set_onboarding(user_id, false).await
    }

    async fn set_onboarding(&self, user_id: &str, acknowledged: bool) -> Result<Preferences, ProfileError> {
        let mut preferences = self.preferences(user_id).await?;
        preferences.onboarding_acknowledged = acknowledged;
        self.store.upsert_preferences(preferences.clone()).await?;
        Ok(preferences)
    }

    /// Remove the profile and everything the user owns
    pub async fn delete_account(&self, user_id: &str) -> Result<(), ProfileError> {
        debug!(%user_id, "delete_account: called");
        self.store.delete_account(user_id).await?;
        info!(%user_id, "Account deleted");
        Ok(())
    }
}
