//! Realtime bridge
//!
//! Subscribes to the backend's change streams and reconciles the entity
//! cache with changes made elsewhere (other users, other tabs). Each
//! subscribed table gets one listener task; the bridge owns those tasks and
//! tears them down on `stop()` or when dropped.
//!
//! A table whose subscription fails is reported as `ChannelStatus::Error`
//! and the other tables keep working. The client then runs degraded: its
//! own submissions still update the cache, remote changes to that table are
//! not seen until the next `start()`.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use percept_common::events::{ChangeEvent, ChangeKind, ChangeRecord, ChangeSubscription, Table};
use percept_common::Backend;

use crate::cache::EntityCache;
use crate::session::SessionContext;
use crate::view::{RefreshBus, RefreshTarget};

/// Subscription state of one table's channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Subscribed,
    Error,
}

#[derive(Default)]
struct BridgeState {
    running: bool,
    tasks: Vec<JoinHandle<()>>,
    status: HashMap<Table, ChannelStatus>,
}

pub struct RealtimeBridge {
    backend: Arc<dyn Backend>,
    reactor: Arc<Reactor>,
    state: Mutex<BridgeState>,
}

impl RealtimeBridge {
    pub fn new(
        backend: Arc<dyn Backend>,
        cache: Arc<EntityCache>,
        session: Arc<SessionContext>,
        refresh: RefreshBus,
    ) -> Self {
        Self {
            backend,
            reactor: Arc::new(Reactor {
                cache,
                session,
                refresh,
            }),
            state: Mutex::new(BridgeState::default()),
        }
    }

    /// (Re)subscribe every table
    ///
    /// Any previous subscriptions are torn down first, so calling this twice
    /// leaves exactly one listener per table. Returns the number of tables
    /// that subscribed successfully.
    pub async fn start(&self) -> usize {
        let mut state = self.state.lock().await;
        shutdown_tasks(&mut state).await;

        let mut subscribed = 0;
        for table in Table::ALL {
            match self.backend.subscribe(table).await {
                Ok(subscription) => {
                    let reactor = Arc::clone(&self.reactor);
                    state.tasks.push(tokio::spawn(listen(subscription, reactor)));
                    state.status.insert(table, ChannelStatus::Subscribed);
                    subscribed += 1;
                    info!(table = %table, "Realtime channel subscribed");
                }
                Err(e) => {
                    state.status.insert(table, ChannelStatus::Error);
                    warn!(table = %table, "Realtime channel unavailable, continuing without it: {}", e);
                }
            }
        }
        state.running = true;
        subscribed
    }

    /// Tear down every listener; safe to call when not started
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        shutdown_tasks(&mut state).await;
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    /// `None` when the table has not been subscribed since the last stop
    pub async fn status(&self, table: Table) -> Option<ChannelStatus> {
        self.state.lock().await.status.get(&table).copied()
    }
}

impl Drop for RealtimeBridge {
    fn drop(&mut self) {
        for task in self.state.get_mut().tasks.drain(..) {
            task.abort();
        }
    }
}

async fn shutdown_tasks(state: &mut BridgeState) {
    if !state.running && state.tasks.is_empty() {
        return;
    }
    let tasks: Vec<_> = state.tasks.drain(..).collect();
    for task in &tasks {
        task.abort();
    }
    for task in tasks {
        // Cancellation is the expected outcome here
        let _ = task.await;
    }
    state.status.clear();
    state.running = false;
    debug!("Realtime channels stopped");
}

async fn listen(mut subscription: ChangeSubscription, reactor: Arc<Reactor>) {
    let table = subscription.table();
    loop {
        match subscription.recv().await {
            Ok(event) => reactor.handle(event).await,
            Err(RecvError::Lagged(missed)) => {
                warn!(table = %table, missed, "Realtime listener lagged, resynchronising");
                reactor.resync().await;
            }
            Err(RecvError::Closed) => {
                info!(table = %table, "Realtime channel closed");
                break;
            }
        }
    }
}

/// Cache reconciliation and refresh requests for incoming change events
///
/// Every reaction is idempotent, so redelivery or echoes of this client's
/// own writes are harmless.
struct Reactor {
    cache: Arc<EntityCache>,
    session: Arc<SessionContext>,
    refresh: RefreshBus,
}

impl Reactor {
    async fn handle(&self, event: ChangeEvent) {
        debug!(
            table = %event.table,
            event_type = event.event_type(),
            profession_id = %event.profession_id(),
            "Change received"
        );

        match (event.table, event.kind, event.record) {
            (Table::Ratings, ChangeKind::Insert, ChangeRecord::Rating(rating)) => {
                self.refresh.request_all([
                    RefreshTarget::DashboardStats,
                    RefreshTarget::ActivityFeed,
                    RefreshTarget::PerceptionChart,
                ]);
                self.refresh_detail_if_open(rating.profession_id).await;
            }
            (Table::Messages, ChangeKind::Insert, ChangeRecord::Message(comment)) => {
                self.cache.invalidate_comments(comment.profession_id).await;
                self.refresh.request(RefreshTarget::ActivityFeed);
                self.refresh_detail_if_open(comment.profession_id).await;
            }
            (Table::Professions, _, record) => {
                let id = match record {
                    ChangeRecord::Profession(profession) => {
                        let id = profession.id;
                        self.cache.put(id, profession).await;
                        id
                    }
                    ChangeRecord::ProfessionDeleted { id } => {
                        self.cache.invalidate(id).await;
                        id
                    }
                    other => {
                        warn!("Unexpected record on professions channel: {:?}", other);
                        return;
                    }
                };
                self.refresh.request_all([
                    RefreshTarget::DashboardStats,
                    RefreshTarget::PopularProfessions,
                    RefreshTarget::CategoryChart,
                ]);
                self.refresh_detail_if_open(id).await;
            }
            (table, kind, _) => {
                debug!(table = %table, ?kind, "Ignoring change");
            }
        }
    }

    /// Events were dropped: nothing cached can be trusted any more
    async fn resync(&self) {
        self.cache.clear().await;
        self.refresh.request_all(RefreshTarget::GLOBAL);
        if let Some(id) = self.session.current_profession().await {
            self.refresh.request(RefreshTarget::ProfessionDetail(id));
        }
    }

    async fn refresh_detail_if_open(&self, profession_id: Uuid) {
        if self.session.is_current(profession_id).await {
            self.refresh.request(RefreshTarget::ProfessionDetail(profession_id));
        }
    }
}
