//! Comment submission
//!
//! Comments are shown optimistically: once the insert succeeds the comment
//! is prepended to the cached list and the cached count is bumped before
//! the authoritative aggregates come back from the recompute.

use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use percept_common::db::{Comment, NewComment};
use percept_common::Backend;

use crate::cache::EntityCache;
use crate::device::DeviceIdentity;
use crate::error::{ClientError, ClientResult};
use crate::in_flight::InFlight;
use crate::session::SessionContext;
use crate::stats::StatsAggregator;
use crate::view::{RefreshBus, RefreshTarget};

pub struct CommentCoordinator {
    backend: Arc<dyn Backend>,
    device: Arc<DeviceIdentity>,
    cache: Arc<EntityCache>,
    stats: Arc<StatsAggregator>,
    session: Arc<SessionContext>,
    refresh: RefreshBus,
    in_flight: InFlight,
}

impl CommentCoordinator {
    pub fn new(
        backend: Arc<dyn Backend>,
        device: Arc<DeviceIdentity>,
        cache: Arc<EntityCache>,
        stats: Arc<StatsAggregator>,
        session: Arc<SessionContext>,
        refresh: RefreshBus,
    ) -> Self {
        Self {
            backend,
            device,
            cache,
            stats,
            session,
            refresh,
            in_flight: InFlight::new(),
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_busy()
    }

    /// Post a comment as this device
    ///
    /// On error nothing is cached and the caller should keep the user's
    /// input. The one exception is a failed recompute after a successful
    /// insert: the comment exists, so the optimistic cache update stays and
    /// only the aggregates are stale.
    pub async fn submit(&self, profession_id: Uuid, content: &str) -> ClientResult<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ClientError::Validation("comment is empty".to_string()));
        }
        let _guard = self.in_flight.acquire()?;

        let device_id = self.device.get_or_create();
        let new_comment = NewComment {
            profession_id,
            content: content.to_string(),
            username: device_id.display_name(),
            user_id: device_id.as_str().to_string(),
        };

        let comment = self.backend.insert_comment(&new_comment).await.map_err(|e| {
            error!(profession_id = %profession_id, "Comment insert failed: {}", e);
            ClientError::from(e)
        })?;
        debug!(profession_id = %profession_id, comment_id = %comment.id, "Comment inserted");

        self.cache.prepend_comment(profession_id, comment.clone()).await;
        self.cache.increment_comment_count(profession_id).await;

        let stats = self.stats.recompute_profession_stats(profession_id).await?;
        self.cache.apply_stats(profession_id, &stats).await;

        if self.session.is_current(profession_id).await {
            self.refresh.request(RefreshTarget::ProfessionDetail(profession_id));
        }
        self.refresh.request(RefreshTarget::ActivityFeed);

        info!(
            profession_id = %profession_id,
            comments_count = stats.comments_count,
            "Comment submitted"
        );
        Ok(comment)
    }
}
