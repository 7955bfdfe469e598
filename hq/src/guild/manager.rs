//! GuildManager - parties, invite codes and membership

use std::sync::Arc;

use rand::seq::IndexedRandom;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{Party, PartyMember};
use crate::progression;
use crate::state::{Persistence, StateError};

use super::error::GuildError;

/// Length of a generated invite code
pub const INVITE_CODE_LEN: usize = 5;

const INVITE_CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Fresh codes tried before giving up on a create
const MAX_CODE_ATTEMPTS: usize = 5;

/// Random uppercase alphanumeric invite code
pub fn generate_invite_code() -> String {
    let mut rng = rand::rng();
    (0..INVITE_CODE_LEN)
        .filter_map(|_| INVITE_CODE_ALPHABET.choose(&mut rng).map(|b| *b as char))
        .collect()
}

/// A party member as shown in the guild hall
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSummary {
    pub user_id: String,
    pub display_name: String,
    pub xp: u64,
    pub level: u32,
    pub joined_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuildOverview {
    pub party: Party,
    /// Oldest membership first
    pub members: Vec<MemberSummary>,
}

#[derive(Clone)]
pub struct GuildManager {
    store: Arc<dyn Persistence>,
}

impl GuildManager {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        debug!("GuildManager::new: called");
        Self { store }
    }

    async fn ensure_free(&self, user_id: &str) -> Result<(), GuildError> {
        match self.store.membership(user_id).await? {
            Some(member) => Err(GuildError::AlreadyInParty(member.party_id)),
            None => Ok(()),
        }
    }

    /// Create a party with a fresh invite code and make `user_id` its first member
    pub async fn create_party(&self, user_id: &str, name: &str) -> Result<Party, GuildError> {
        debug!(%user_id, %name, "create_party: called");
        let name = name.trim();
        if name.is_empty() {
            return Err(GuildError::EmptyName);
        }
        self.ensure_free(user_id).await?;

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let party = Party::new(name, generate_invite_code(), user_id);
            let creator = PartyMember::new(&party.id, user_id);
            match self.store.create_party(party.clone(), creator).await {
                Ok(()) => {
                    info!(party_id = %party.id, code = %party.invite_code, "Party created");
                    return Ok(party);
                }
                Err(StateError::Conflict(reason)) => {
                    warn!(attempt, %reason, "Invite code collision, retrying");
                    // A concurrent join would also conflict; recheck before the next code
                    self.ensure_free(user_id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(GuildError::CodeExhausted(MAX_CODE_ATTEMPTS))
    }

    /// Join by invite code, case-insensitively
    pub async fn join_party(&self, user_id: &str, code: &str) -> Result<Party, GuildError> {
        debug!(%user_id, %code, "join_party: called");
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(GuildError::EmptyCode);
        }
        let party = self
            .store
            .find_party_by_code(&code)
            .await?
            .ok_or_else(|| GuildError::NotFound(code.clone()))?;
        self.ensure_free(user_id).await?;

        match self.store.insert_member(PartyMember::new(&party.id, user_id)).await {
            Ok(()) => {
                info!(%user_id, party_id = %party.id, "Joined party");
                Ok(party)
            }
            Err(StateError::Conflict(_)) => Err(GuildError::AlreadyInParty(party.id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Leave the current party; the last member out removes the party
    pub async fn leave_party(&self, user_id: &str) -> Result<PartyMember, GuildError> {
        debug!(%user_id, "leave_party: called");
        match self.store.delete_member(user_id).await {
            Ok(member) => {
                info!(%user_id, party_id = %member.party_id, "Left party");
                Ok(member)
            }
            Err(StateError::NotFound(_)) => Err(GuildError::NotInParty),
            Err(e) => Err(e.into()),
        }
    }

    /// The user's party and its members, or `None` outside any party
    pub async fn overview(&self, user_id: &str) -> Result<Option<GuildOverview>, GuildError> {
        debug!(%user_id, "overview: called");
        let Some(membership) = self.store.membership(user_id).await? else {
            return Ok(None);
        };
        let Some(party) = self.store.get_party(&membership.party_id).await? else {
            warn!(party_id = %membership.party_id, "Membership points at a missing party");
            return Ok(None);
        };

        let mut members = Vec::new();
        for member in self.store.list_members(&party.id).await? {
            let profile = self.store.get_profile(&member.user_id).await?;
            let (display_name, xp) = match profile {
                Some(p) => (p.name_or_default().to_string(), p.xp),
                None => (crate::domain::DEFAULT_DISPLAY_NAME.to_string(), 0),
            };
            members.push(MemberSummary {
                user_id: member.user_id,
                display_name,
                xp,
                level: progression::level(xp),
                joined_at: member.joined_at,
            });
        }
        Ok(Some(GuildOverview { party, members }))
    }
}
