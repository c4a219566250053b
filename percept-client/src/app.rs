//! Session wiring
//!
//! Builds every coordination component for one client session over a
//! shared backend, cache, session context and refresh channel.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use percept_common::config::ClientConfig;
use percept_common::db::{ChangePoller, SqliteBackend};
use percept_common::Backend;

use crate::activity::{ActivityFeed, ActivityLimits};
use crate::cache::EntityCache;
use crate::comment::CommentCoordinator;
use crate::device::DeviceIdentity;
use crate::directory::ProfessionDirectory;
use crate::prefs::{FileStore, LocalStore, Preferences};
use crate::rating::RatingCoordinator;
use crate::realtime::RealtimeBridge;
use crate::search::SearchIndexQuery;
use crate::session::SessionContext;
use crate::stats::StatsAggregator;
use crate::view::RefreshBus;

pub struct PerceptionApp {
    pub backend: Arc<dyn Backend>,
    pub device: Arc<DeviceIdentity>,
    pub preferences: Preferences,
    pub cache: Arc<EntityCache>,
    pub session: Arc<SessionContext>,
    pub refresh: RefreshBus,
    pub stats: Arc<StatsAggregator>,
    pub ratings: RatingCoordinator,
    pub comments: CommentCoordinator,
    pub search: SearchIndexQuery,
    pub directory: ProfessionDirectory,
    pub activity: ActivityFeed,
    pub realtime: RealtimeBridge,
    /// Set when the session owns a database file other processes may share
    database: Option<SqliteBackend>,
    poll_interval: Duration,
    external_changes: Mutex<Option<ChangePoller>>,
}

impl PerceptionApp {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn LocalStore>, config: &ClientConfig) -> Self {
        let device = Arc::new(DeviceIdentity::new(Arc::clone(&store)));
        let preferences = Preferences::new(store);
        let cache = Arc::new(EntityCache::new());
        let session = Arc::new(SessionContext::new());
        let refresh = RefreshBus::new(config.event_capacity);
        let stats = Arc::new(StatsAggregator::new(Arc::clone(&backend)));

        let ratings = RatingCoordinator::new(
            Arc::clone(&backend),
            Arc::clone(&device),
            Arc::clone(&cache),
            Arc::clone(&stats),
            Arc::clone(&session),
            refresh.clone(),
        );
        let comments = CommentCoordinator::new(
            Arc::clone(&backend),
            Arc::clone(&device),
            Arc::clone(&cache),
            Arc::clone(&stats),
            Arc::clone(&session),
            refresh.clone(),
        );
        let search = SearchIndexQuery::new(Arc::clone(&backend), config.search_limit);
        let directory = ProfessionDirectory::new(
            Arc::clone(&backend),
            Arc::clone(&cache),
            Arc::clone(&session),
            refresh.clone(),
            config.page_size,
            config.comment_limit,
        );
        let activity = ActivityFeed::new(
            Arc::clone(&backend),
            ActivityLimits {
                ratings: config.activity_ratings,
                comments: config.activity_comments,
                total: config.activity_limit,
                scrolling_comments: config.scrolling_comments,
            },
        );
        let realtime = RealtimeBridge::new(
            Arc::clone(&backend),
            Arc::clone(&cache),
            Arc::clone(&session),
            refresh.clone(),
        );

        Self {
            backend,
            device,
            preferences,
            cache,
            session,
            refresh,
            stats,
            ratings,
            comments,
            search,
            directory,
            activity,
            realtime,
            database: None,
            poll_interval: config.poll_interval(),
            external_changes: Mutex::new(None),
        }
    }

    /// Open the SQLite database and preferences file under the root folder
    pub async fn open(config: &ClientConfig) -> percept_common::Result<Self> {
        config.ensure_root_folder()?;
        let backend = SqliteBackend::open(&config.database_path(), config.event_capacity).await?;
        let store = FileStore::open(&config.prefs_path());
        info!(root_folder = %config.root_folder.display(), "Client session opened");
        let mut app = Self::new(Arc::new(backend.clone()), Arc::new(store), config);
        app.database = Some(backend);
        Ok(app)
    }

    /// Subscribe the realtime channels; returns how many are live
    pub async fn start_realtime(&self) -> usize {
        self.realtime.start().await
    }

    /// Also publish writes made by other processes sharing the database file
    ///
    /// Returns false when the session has no database file to watch.
    pub async fn watch_external_changes(&self) -> percept_common::Result<bool> {
        let Some(database) = &self.database else {
            return Ok(false);
        };
        let mut slot = self.external_changes.lock().await;
        if !slot.as_ref().is_some_and(ChangePoller::is_running) {
            *slot = Some(database.watch_external_changes(self.poll_interval).await?);
        }
        Ok(true)
    }

    pub async fn shutdown(&self) {
        self.external_changes.lock().await.take();
        self.realtime.stop().await;
        self.session.close_profession().await;
        info!("Client session closed");
    }
}
