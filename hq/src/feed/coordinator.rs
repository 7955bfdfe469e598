//! FeedCoordinator - keeps a user's dashboard in sync with the change feed
//!
//! Every change notification invalidates one aggregate, which is re-fetched
//! in full. Optimistic edits are overwritten by the next refresh.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::{ChangeEvent, Persistence, StateError};

use super::view::{Aggregate, DashboardView};

/// Owner side of a running feed
pub struct FeedHandle {
    view_tx: Arc<watch::Sender<DashboardView>>,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Subscribe to the store, load the dashboard, then follow changes
    ///
    /// The subscription is taken before the initial fetch so no change
    /// between the two is missed.
    pub async fn spawn(store: Arc<dyn Persistence>, user_id: &str) -> Result<Self, StateError> {
        debug!(%user_id, "FeedHandle::spawn: called");
        let events = store.subscribe();

        let coordinator = FeedCoordinator {
            store,
            user_id: user_id.to_string(),
        };
        let mut view = DashboardView::empty(user_id);
        for aggregate in Aggregate::ALL {
            coordinator.fetch_into(&mut view, aggregate).await?;
        }

        let (view_tx, _) = watch::channel(view);
        let view_tx = Arc::new(view_tx);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(coordinator.run(events, view_tx.clone(), shutdown_rx));

        info!(%user_id, "Feed started");
        Ok(Self {
            view_tx,
            shutdown_tx,
            task,
        })
    }

    /// Latest dashboard snapshot
    pub fn view(&self) -> DashboardView {
        self.view_tx.borrow().clone()
    }

    /// Receiver that wakes on every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.view_tx.subscribe()
    }

    /// Show a task as complete before the store confirms it
    pub fn optimistic_complete(&self, task_id: &str) -> bool {
        debug!(%task_id, "optimistic_complete: called");
        let mut applied = false;
        self.view_tx.send_if_modified(|view| {
            applied = view.apply_completion(task_id);
            if applied {
                view.revision += 1;
            }
            applied
        });
        applied
    }

    /// Stop following changes and wait for the feed task to finish
    pub async fn shutdown(self) {
        debug!("FeedHandle::shutdown: called");
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Feed task ended abnormally");
        }
    }
}

struct FeedCoordinator {
    store: Arc<dyn Persistence>,
    user_id: String,
}

impl FeedCoordinator {
    async fn run(
        self,
        mut events: broadcast::Receiver<ChangeEvent>,
        view_tx: Arc<watch::Sender<DashboardView>>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        debug!(user_id = %self.user_id, "run: called");
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("run: shutdown requested");
                    break;
                }
                event = events.recv() => match event {
                    Ok(event) if event.user_id == self.user_id => {
                        if let Some(aggregate) = Aggregate::for_entity(event.entity) {
                            debug!(?aggregate, kind = ?event.kind, "run: refreshing aggregate");
                            self.refresh(&view_tx, aggregate).await;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Change feed lagged, refreshing everything");
                        for aggregate in Aggregate::ALL {
                            self.refresh(&view_tx, aggregate).await;
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("run: change stream closed");
                        break;
                    }
                }
            }
        }
        info!(user_id = %self.user_id, "Feed stopped");
    }

    /// Re-fetch one aggregate and publish it, replacing any optimistic state
    async fn refresh(&self, view_tx: &watch::Sender<DashboardView>, aggregate: Aggregate) {
        let mut fresh = DashboardView::empty(&self.user_id);
        if let Err(e) = self.fetch_into(&mut fresh, aggregate).await {
            warn!(?aggregate, error = %e, "Refresh failed, keeping previous view");
            return;
        }
        view_tx.send_modify(|view| {
            match aggregate {
                Aggregate::Profile => view.set_profile(fresh.profile.take()),
                Aggregate::Quests => view.quests = std::mem::take(&mut fresh.quests),
                Aggregate::Tasks => view.tasks = std::mem::take(&mut fresh.tasks),
            }
            view.pending.remove(&aggregate);
            view.revision += 1;
        });
    }

    async fn fetch_into(&self, view: &mut DashboardView, aggregate: Aggregate) -> Result<(), StateError> {
        match aggregate {
            Aggregate::Profile => view.set_profile(self.store.get_profile(&self.user_id).await?),
            Aggregate::Quests => view.quests = self.store.list_quests(&self.user_id).await?,
            Aggregate::Tasks => view.tasks = self.store.list_tasks(&self.user_id).await?,
        }
        Ok(())
    }
}
