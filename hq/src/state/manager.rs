//! StateManager - actor that owns the record Store
//!
//! Processes commands via channels for serialized access to persistent state.
//! Equip and complete-and-award never interleave because the actor handles
//! one command at a time.
//!
//! Every successful write is broadcast to local subscribers and appended to
//! the store's change journal. The actor polls the journal and rebroadcasts
//! changes written by other processes sharing the same database file.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{Party, PartyMember, Preferences, Profile, Quest, Task};
use crate::store::{Store, XpAward};

use super::events::{ChangeEvent, ChangeKind, Entity};
use super::messages::{StateCommand, StateError, StateResponse};
use super::persistence::Persistence;

/// How often the actor checks the journal for changes from other processes
const CHANGE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
    /// Broadcast sender for change notifications
    event_tx: broadcast::Sender<ChangeEvent>,
}

impl StateManager {
    /// Spawn a new StateManager actor over an on-disk store
    pub fn spawn(store_path: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(store_path = %store_path.as_ref().display(), "spawn: called");
        let store = Store::open(store_path.as_ref())?;
        Self::with_store(store)
    }

    /// Spawn a new StateManager actor over an in-memory store
    pub fn spawn_in_memory() -> eyre::Result<Self> {
        debug!("spawn_in_memory: called");
        let store = Store::open_in_memory()?;
        Self::with_store(store)
    }

    fn with_store(store: Store) -> eyre::Result<Self> {
        let (tx, rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(64);

        let relay = ChangeRelay {
            origin: Uuid::now_v7().to_string(),
            last_seq: store.latest_change()?,
            event_tx: event_tx.clone(),
        };
        tokio::spawn(actor_loop(store, rx, relay));

        info!("StateManager spawned");
        Ok(Self { tx, event_tx })
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    async fn notify(&self, user_id: &str, entities: &[Entity], kind: ChangeKind) {
        debug!(%user_id, ?entities, ?kind, "notify: called");
        let events: Vec<ChangeEvent> = entities
            .iter()
            .map(|entity| ChangeEvent::new(user_id, *entity, kind))
            .collect();
        for event in &events {
            // No receivers is fine
            let _ = self.event_tx.send(event.clone());
        }
        if self.tx.send(StateCommand::RecordChanges { events }).await.is_err() {
            debug!("notify: actor gone, change not journaled");
        }
    }
}

#[async_trait]
impl Persistence for StateManager {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.event_tx.subscribe()
    }

    // === Profiles ===

    async fn get_profile(&self, id: &str) -> StateResponse<Option<Profile>> {
        debug!(%id, "get_profile: called");
        let id = id.to_string();
        self.request(|reply| StateCommand::GetProfile { id, reply }).await
    }

    async fn upsert_profile(&self, profile: Profile) -> StateResponse<()> {
        debug!(id = %profile.id, "upsert_profile: called");
        let user_id = profile.id.clone();
        self.request(|reply| StateCommand::UpsertProfile { profile, reply })
            .await?;
        self.notify(&user_id, &[Entity::Profile], ChangeKind::Update).await;
        Ok(())
    }

    async fn update_profile(&self, profile: Profile) -> StateResponse<()> {
        debug!(id = %profile.id, "update_profile: called");
        let user_id = profile.id.clone();
        self.request(|reply| StateCommand::UpdateProfile { profile, reply })
            .await?;
        self.notify(&user_id, &[Entity::Profile], ChangeKind::Update).await;
        Ok(())
    }

    async fn top_profiles(&self, limit: usize) -> StateResponse<Vec<Profile>> {
        debug!(limit, "top_profiles: called");
        self.request(|reply| StateCommand::TopProfiles { limit, reply }).await
    }

    // === Quests ===

    async fn insert_quest(&self, quest: Quest) -> StateResponse<()> {
        debug!(id = %quest.id, "insert_quest: called");
        let user_id = quest.user_id.clone();
        self.request(|reply| StateCommand::InsertQuest { quest, reply }).await?;
        self.notify(&user_id, &[Entity::Quest], ChangeKind::Insert).await;
        Ok(())
    }

    async fn get_quest(&self, id: &str) -> StateResponse<Option<Quest>> {
        debug!(%id, "get_quest: called");
        let id = id.to_string();
        self.request(|reply| StateCommand::GetQuest { id, reply }).await
    }

    async fn list_quests(&self, user_id: &str) -> StateResponse<Vec<Quest>> {
        debug!(%user_id, "list_quests: called");
        let user_id = user_id.to_string();
        self.request(|reply| StateCommand::ListQuests { user_id, reply }).await
    }

    async fn equip_quest(&self, id: &str) -> StateResponse<Quest> {
        debug!(%id, "equip_quest: called");
        let id = id.to_string();
        let quest = self.request(|reply| StateCommand::EquipQuest { id, reply }).await?;
        self.notify(&quest.user_id, &[Entity::Quest], ChangeKind::Update).await;
        Ok(quest)
    }

    async fn deactivate_quest(&self, id: &str) -> StateResponse<Quest> {
        debug!(%id, "deactivate_quest: called");
        let id = id.to_string();
        let quest = self
            .request(|reply| StateCommand::DeactivateQuest { id, reply })
            .await?;
        self.notify(&quest.user_id, &[Entity::Quest], ChangeKind::Update).await;
        Ok(quest)
    }

    async fn delete_quest(&self, id: &str) -> StateResponse<usize> {
        debug!(%id, "delete_quest: called");
        let id = id.to_string();
        let (quest, removed_tasks) = self.request(|reply| StateCommand::DeleteQuest { id, reply }).await?;
        self.notify(&quest.user_id, &[Entity::Quest], ChangeKind::Delete).await;
        if removed_tasks > 0 {
            self.notify(&quest.user_id, &[Entity::Task], ChangeKind::Delete).await;
        }
        Ok(removed_tasks)
    }

    // === Tasks ===

    async fn insert_tasks(&self, tasks: Vec<Task>) -> StateResponse<()> {
        debug!(count = tasks.len(), "insert_tasks: called");
        let mut owners: Vec<String> = tasks.iter().map(|t| t.user_id.clone()).collect();
        owners.sort();
        owners.dedup();
        self.request(|reply| StateCommand::InsertTasks { tasks, reply }).await?;
        for user_id in owners {
            self.notify(&user_id, &[Entity::Task], ChangeKind::Insert).await;
        }
        Ok(())
    }

    async fn get_task(&self, id: &str) -> StateResponse<Option<Task>> {
        debug!(%id, "get_task: called");
        let id = id.to_string();
        self.request(|reply| StateCommand::GetTask { id, reply }).await
    }

    async fn list_tasks(&self, user_id: &str) -> StateResponse<Vec<Task>> {
        debug!(%user_id, "list_tasks: called");
        let user_id = user_id.to_string();
        self.request(|reply| StateCommand::ListTasks { user_id, reply }).await
    }

    async fn delete_task(&self, id: &str) -> StateResponse<()> {
        debug!(%id, "delete_task: called");
        let id = id.to_string();
        let task = self.request(|reply| StateCommand::DeleteTask { id, reply }).await?;
        self.notify(&task.user_id, &[Entity::Task], ChangeKind::Delete).await;
        Ok(())
    }

    async fn complete_task_and_award_xp(&self, task_id: &str, xp: u32) -> StateResponse<XpAward> {
        debug!(%task_id, xp, "complete_task_and_award_xp: called");
        let task_id = task_id.to_string();
        let award = self
            .request(|reply| StateCommand::CompleteTaskAndAwardXp { task_id, xp, reply })
            .await?;
        self.notify(&award.user_id, &[Entity::Task, Entity::Profile], ChangeKind::Update)
            .await;
        Ok(award)
    }

    async fn reset_daily(&self, user_id: &str) -> StateResponse<usize> {
        debug!(%user_id, "reset_daily: called");
        let owner = user_id.to_string();
        let reopened = self
            .request(|reply| StateCommand::ResetDaily { user_id: owner, reply })
            .await?;
        if reopened > 0 {
            self.notify(user_id, &[Entity::Task], ChangeKind::Update).await;
        }
        Ok(reopened)
    }

    // === Preferences ===

    async fn get_preferences(&self, user_id: &str) -> StateResponse<Option<Preferences>> {
        debug!(%user_id, "get_preferences: called");
        let user_id = user_id.to_string();
        self.request(|reply| StateCommand::GetPreferences { user_id, reply }).await
    }

    async fn upsert_preferences(&self, preferences: Preferences) -> StateResponse<()> {
        debug!(user_id = %preferences.user_id, "upsert_preferences: called");
        let user_id = preferences.user_id.clone();
        self.request(|reply| StateCommand::UpsertPreferences { preferences, reply })
            .await?;
        self.notify(&user_id, &[Entity::Preferences], ChangeKind::Update).await;
        Ok(())
    }

    // === Parties ===

    async fn create_party(&self, party: Party, creator: PartyMember) -> StateResponse<()> {
        debug!(id = %party.id, "create_party: called");
        let user_id = creator.user_id.clone();
        self.request(|reply| StateCommand::CreateParty { party, creator, reply })
            .await?;
        self.notify(&user_id, &[Entity::Party], ChangeKind::Insert).await;
        Ok(())
    }

    async fn get_party(&self, id: &str) -> StateResponse<Option<Party>> {
        debug!(%id, "get_party: called");
        let id = id.to_string();
        self.request(|reply| StateCommand::GetParty { id, reply }).await
    }

    async fn find_party_by_code(&self, invite_code: &str) -> StateResponse<Option<Party>> {
        debug!(%invite_code, "find_party_by_code: called");
        let invite_code = invite_code.to_string();
        self.request(|reply| StateCommand::FindPartyByCode { invite_code, reply })
            .await
    }

    async fn membership(&self, user_id: &str) -> StateResponse<Option<PartyMember>> {
        debug!(%user_id, "membership: called");
        let user_id = user_id.to_string();
        self.request(|reply| StateCommand::Membership { user_id, reply }).await
    }

    async fn insert_member(&self, member: PartyMember) -> StateResponse<()> {
        debug!(user_id = %member.user_id, "insert_member: called");
        let user_id = member.user_id.clone();
        self.request(|reply| StateCommand::InsertMember { member, reply }).await?;
        self.notify(&user_id, &[Entity::Party], ChangeKind::Insert).await;
        Ok(())
    }

    async fn delete_member(&self, user_id: &str) -> StateResponse<PartyMember> {
        debug!(%user_id, "delete_member: called");
        let owner = user_id.to_string();
        let member = self
            .request(|reply| StateCommand::DeleteMember { user_id: owner, reply })
            .await?;
        self.notify(user_id, &[Entity::Party], ChangeKind::Delete).await;
        Ok(member)
    }

    async fn list_members(&self, party_id: &str) -> StateResponse<Vec<PartyMember>> {
        debug!(%party_id, "list_members: called");
        let party_id = party_id.to_string();
        self.request(|reply| StateCommand::ListMembers { party_id, reply }).await
    }

    // === Account ===

    async fn delete_account(&self, user_id: &str) -> StateResponse<()> {
        debug!(%user_id, "delete_account: called");
        let owner = user_id.to_string();
        self.request(|reply| StateCommand::DeleteAccount { user_id: owner, reply })
            .await?;
        self.notify(
            user_id,
            &[
                Entity::Task,
                Entity::Quest,
                Entity::Preferences,
                Entity::Party,
                Entity::Profile,
            ],
            ChangeKind::Delete,
        )
        .await;
        Ok(())
    }
}

/// Forwards journal rows written by other processes to local subscribers
struct ChangeRelay {
    /// Id stamped on this actor's journal rows
    origin: String,
    last_seq: i64,
    event_tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeRelay {
    fn poll(&mut self, store: &Store) {
        let records = match store.changes_since(self.last_seq) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to read change journal");
                return;
            }
        };
        for record in records {
            self.last_seq = record.seq;
            if record.origin == self.origin {
                continue;
            }
            match ChangeEvent::from_record(&record) {
                Some(event) => {
                    debug!(seq = record.seq, ?event, "ChangeRelay::poll: change from another process");
                    let _ = self.event_tx.send(event);
                }
                None => debug!(seq = record.seq, "ChangeRelay::poll: unknown change skipped"),
            }
        }
    }
}

/// The actor loop that processes commands
async fn actor_loop(mut store: Store, mut rx: mpsc::Receiver<StateCommand>, mut relay: ChangeRelay) {
    debug!("actor_loop: called");

    let mut ticker = tokio::time::interval(CHANGE_POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(cmd) => handle_command(&mut store, &relay, cmd),
                None => break,
            },
            _ = ticker.tick() => relay.poll(&store),
        }
    }

    info!("StateManager actor shutting down");
}

fn handle_command(store: &mut Store, relay: &ChangeRelay, cmd: StateCommand) {
    match cmd {
        // Profiles
        StateCommand::GetProfile { id, reply } => {
            debug!(%id, "actor_loop: GetProfile command");
            let _ = reply.send(store.get_profile(&id).map_err(StateError::from));
        }
        StateCommand::UpsertProfile { profile, reply } => {
            debug!(id = %profile.id, "actor_loop: UpsertProfile command");
            let _ = reply.send(store.upsert_profile(&profile).map_err(StateError::from));
        }
        StateCommand::UpdateProfile { profile, reply } => {
            debug!(id = %profile.id, "actor_loop: UpdateProfile command");
            let _ = reply.send(store.update_profile(&profile).map_err(StateError::from));
        }
        StateCommand::TopProfiles { limit, reply } => {
            debug!(limit, "actor_loop: TopProfiles command");
            let _ = reply.send(store.top_profiles(limit).map_err(StateError::from));
        }

        // Quests
        StateCommand::InsertQuest { quest, reply } => {
            debug!(id = %quest.id, "actor_loop: InsertQuest command");
            let _ = reply.send(store.insert_quest(&quest).map_err(StateError::from));
        }
        StateCommand::GetQuest { id, reply } => {
            debug!(%id, "actor_loop: GetQuest command");
            let _ = reply.send(store.get_quest(&id).map_err(StateError::from));
        }
        StateCommand::ListQuests { user_id, reply } => {
            debug!(%user_id, "actor_loop: ListQuests command");
            let _ = reply.send(store.list_quests(&user_id).map_err(StateError::from));
        }
        StateCommand::EquipQuest { id, reply } => {
            debug!(%id, "actor_loop: EquipQuest command");
            let _ = reply.send(store.equip_quest(&id).map_err(StateError::from));
        }
        StateCommand::DeactivateQuest { id, reply } => {
            debug!(%id, "actor_loop: DeactivateQuest command");
            let _ = reply.send(store.deactivate_quest(&id).map_err(StateError::from));
        }
        StateCommand::DeleteQuest { id, reply } => {
            debug!(%id, "actor_loop: DeleteQuest command");
            let _ = reply.send(store.delete_quest(&id).map_err(StateError::from));
        }

        // Tasks
        StateCommand::InsertTasks { tasks, reply } => {
            debug!(count = tasks.len(), "actor_loop: InsertTasks command");
            let _ = reply.send(store.insert_tasks(&tasks).map_err(StateError::from));
        }
        StateCommand::GetTask { id, reply } => {
            debug!(%id, "actor_loop: GetTask command");
            let _ = reply.send(store.get_task(&id).map_err(StateError::from));
        }
        StateCommand::ListTasks { user_id, reply } => {
            debug!(%user_id, "actor_loop: ListTasks command");
            let _ = reply.send(store.list_tasks(&user_id).map_err(StateError::from));
        }
        StateCommand::DeleteTask { id, reply } => {
            debug!(%id, "actor_loop: DeleteTask command");
            let _ = reply.send(store.delete_task(&id).map_err(StateError::from));
        }
        StateCommand::CompleteTaskAndAwardXp { task_id, xp, reply } => {
            debug!(%task_id, xp, "actor_loop: CompleteTaskAndAwardXp command");
            let result = store
                .complete_task_and_award_xp(&task_id, xp)
                .map_err(StateError::from);
            let _ = reply.send(result);
        }
        StateCommand::ResetDaily { user_id, reply } => {
            debug!(%user_id, "actor_loop: ResetDaily command");
            let _ = reply.send(store.reset_daily(&user_id).map_err(StateError::from));
        }

        // Preferences
        StateCommand::GetPreferences { user_id, reply } => {
            debug!(%user_id, "actor_loop: GetPreferences command");
            let _ = reply.send(store.get_preferences(&user_id).map_err(StateError::from));
        }
        StateCommand::UpsertPreferences { preferences, reply } => {
            debug!(user_id = %preferences.user_id, "actor_loop: UpsertPreferences command");
            let _ = reply.send(store.upsert_preferences(&preferences).map_err(StateError::from));
        }

        // Parties
        StateCommand::CreateParty { party, creator, reply } => {
            debug!(id = %party.id, "actor_loop: CreateParty command");
            let _ = reply.send(store.create_party(&party, &creator).map_err(StateError::from));
        }
        StateCommand::GetParty { id, reply } => {
            debug!(%id, "actor_loop: GetParty command");
            let _ = reply.send(store.get_party(&id).map_err(StateError::from));
        }
        StateCommand::FindPartyByCode { invite_code, reply } => {
            debug!(%invite_code, "actor_loop: FindPartyByCode command");
            let _ = reply.send(store.find_party_by_code(&invite_code).map_err(StateError::from));
        }
        StateCommand::Membership { user_id, reply } => {
            debug!(%user_id, "actor_loop: Membership command");
            let _ = reply.send(store.membership(&user_id).map_err(StateError::from));
        }
        StateCommand::InsertMember { member, reply } => {
            debug!(user_id = %member.user_id, "actor_loop: InsertMember command");
            let _ = reply.send(store.insert_member(&member).map_err(StateError::from));
        }
        StateCommand::DeleteMember { user_id, reply } => {
            debug!(%user_id, "actor_loop: DeleteMember command");
            let _ = reply.send(store.delete_member(&user_id).map_err(StateError::from));
        }
        StateCommand::ListMembers { party_id, reply } => {
            debug!(%party_id, "actor_loop: ListMembers command");
            let _ = reply.send(store.list_members(&party_id).map_err(StateError::from));
        }

        // Account
        StateCommand::DeleteAccount { user_id, reply } => {
            debug!(%user_id, "actor_loop: DeleteAccount command");
            let _ = reply.send(store.delete_account(&user_id).map_err(StateError::from));
        }

        // Change journal
        StateCommand::RecordChanges { events } => {
            debug!(count = events.len(), "actor_loop: RecordChanges command");
            let columns: Vec<_> = events.iter().map(ChangeEvent::journal_columns).collect();
            if let Err(e) = store.record_changes(&relay.origin, &columns) {
                warn!(error = %e, "Failed to journal changes");
            }
        }
    }
}
