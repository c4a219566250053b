//! Rating submission
//!
//! Turns a slider position into a 1-5 score and drives the duplicate check,
//! the insert, the aggregate recompute and the cache update as one
//! sequence. Progress is published on a `watch` channel.
//!
//! Duplicate votes are prevented twice: by a lookup before the insert and
//! by the backend's (profession, device) uniqueness constraint, which
//! catches a vote cast concurrently from another tab.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use percept_common::db::{NewRating, ProfessionStats};
use percept_common::{Backend, Error};

use crate::cache::EntityCache;
use crate::device::DeviceIdentity;
use crate::error::{ClientError, ClientResult};
use crate::in_flight::InFlight;
use crate::session::SessionContext;
use crate::stats::StatsAggregator;
use crate::view::{RefreshBus, RefreshTarget};

pub const SLIDER_MIN: i64 = 0;
pub const SLIDER_MAX: i64 = 100;

/// Progress of the most recent submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RatingState {
    #[default]
    Idle,
    CheckingDuplicate,
    AlreadyVoted,
    Submitting,
    Success,
    Failed,
}

/// Result of a submission that reached the backend
#[derive(Debug, Clone, PartialEq)]
pub enum RatingOutcome {
    Submitted {
        score: i64,
        stats: ProfessionStats,
        /// Whether the detail view still showed this profession at completion
        view_current: bool,
    },
    /// This device has already rated the profession; nothing was written
    AlreadyVoted,
}

impl RatingOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RatingOutcome::Submitted { .. })
    }
}

/// Map a slider position in 0..=100 onto the 1-5 score scale
///
/// 0 maps to 1, 50 to 3, 100 to 5; halves round away from zero.
pub fn score_from_slider(slider: i64) -> ClientResult<i64> {
    if !(SLIDER_MIN..=SLIDER_MAX).contains(&slider) {
        return Err(ClientError::Validation(format!(
            "slider value {} outside {}..={}",
            slider, SLIDER_MIN, SLIDER_MAX
        )));
    }
    let score = (1.0 + slider as f64 / 100.0 * 4.0).round() as i64;
    Ok(score.clamp(1, 5))
}

pub struct RatingCoordinator {
    backend: Arc<dyn Backend>,
    device: Arc<DeviceIdentity>,
    cache: Arc<EntityCache>,
    stats: Arc<StatsAggregator>,
    session: Arc<SessionContext>,
    refresh: RefreshBus,
    in_flight: InFlight,
    state_tx: watch::Sender<RatingState>,
    /// Professions whose rating landed but whose aggregates were not rewritten
    stats_pending: Mutex<HashSet<Uuid>>,
}

impl RatingCoordinator {
    pub fn new(
        backend: Arc<dyn Backend>,
        device: Arc<DeviceIdentity>,
        cache: Arc<EntityCache>,
        stats: Arc<StatsAggregator>,
        session: Arc<SessionContext>,
        refresh: RefreshBus,
    ) -> Self {
        let (state_tx, _) = watch::channel(RatingState::Idle);
        Self {
            backend,
            device,
            cache,
            stats,
            session,
            refresh,
            in_flight: InFlight::new(),
            state_tx,
            stats_pending: Mutex::new(HashSet::new()),
        }
    }

    pub fn state(&self) -> RatingState {
        *self.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<RatingState> {
        self.state_tx.subscribe()
    }

    /// Whether the submit control is currently disabled
    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_busy()
    }

    /// Submit this device's rating for a profession
    pub async fn submit(&self, profession_id: Uuid, slider: i64) -> ClientResult<RatingOutcome> {
        let score = score_from_slider(slider)?;
        let _guard = self.in_flight.acquire()?;

        let result = self.run(profession_id, score).await;
        let final_state = match &result {
            Ok(RatingOutcome::Submitted { .. }) => RatingState::Success,
            Ok(RatingOutcome::AlreadyVoted) => RatingState::AlreadyVoted,
            Err(_) => RatingState::Failed,
        };
        self.set_state(final_state);
        result
    }

    async fn run(&self, profession_id: Uuid, score: i64) -> ClientResult<RatingOutcome> {
        let device_id = self.device.get_or_create();

        self.set_state(RatingState::CheckingDuplicate);
        let existing = self
            .backend
            .find_ratings(profession_id, device_id.as_str())
            .await
            .map_err(|e| backend_failure(profession_id, "duplicate check", e))?;
        if !existing.is_empty() {
            warn!(profession_id = %profession_id, "Device already rated this profession");
            self.settle_pending_stats(profession_id).await?;
            return Ok(RatingOutcome::AlreadyVoted);
        }

        self.set_state(RatingState::Submitting);
        let new_rating = NewRating {
            profession_id,
            device_id: device_id.as_str().to_string(),
            user_id: device_id.as_str().to_string(),
            score,
        };
        match self.backend.insert_rating(&new_rating).await {
            Ok(rating) => {
                debug!(profession_id = %profession_id, rating_id = %rating.id, score, "Rating inserted");
            }
            Err(Error::Conflict(msg)) => {
                warn!(profession_id = %profession_id, "Concurrent vote rejected by backend: {}", msg);
                self.settle_pending_stats(profession_id).await?;
                return Ok(RatingOutcome::AlreadyVoted);
            }
            Err(e) => return Err(backend_failure(profession_id, "insert rating", e)),
        }

        let stats = match self.stats.recompute_profession_stats(profession_id).await {
            Ok(stats) => stats,
            Err(e) => {
                // The vote is stored; the next submit for this profession retries
                self.stats_pending.lock().await.insert(profession_id);
                return Err(e);
            }
        };
        self.stats_pending.lock().await.remove(&profession_id);
        let view_current = self.publish_stats(profession_id, &stats).await;

        info!(
            profession_id = %profession_id,
            score,
            avg_rating = stats.avg_rating,
            total_ratings = stats.total_ratings,
            "Rating submitted"
        );
        Ok(RatingOutcome::Submitted {
            score,
            stats,
            view_current,
        })
    }

    /// Whether a recompute is owed for a profession after an earlier failure
    pub async fn has_pending_stats(&self, profession_id: Uuid) -> bool {
        self.stats_pending.lock().await.contains(&profession_id)
    }

    async fn settle_pending_stats(&self, profession_id: Uuid) -> ClientResult<()> {
        if !self.has_pending_stats(profession_id).await {
            return Ok(());
        }

        self.set_state(RatingState::Submitting);
        let stats = self.stats.recompute_profession_stats(profession_id).await?;
        self.stats_pending.lock().await.remove(&profession_id);
        self.publish_stats(profession_id, &stats).await;
        info!(
            profession_id = %profession_id,
            avg_rating = stats.avg_rating,
            total_ratings = stats.total_ratings,
            "Pending profession stats recomputed"
        );
        Ok(())
    }

    /// Apply aggregates to the cache and request the dependent refreshes.
    /// Returns whether the profession is the one on screen.
    async fn publish_stats(&self, profession_id: Uuid, stats: &ProfessionStats) -> bool {
        self.cache.apply_stats(profession_id, stats).await;

        let view_current = self.session.is_current(profession_id).await;
        if view_current {
            self.refresh.request(RefreshTarget::ProfessionDetail(profession_id));
        }
        self.refresh.request_all([
            RefreshTarget::DashboardStats,
            RefreshTarget::PopularProfessions,
        ]);
        view_current
    }

    fn set_state(&self, state: RatingState) {
        self.state_tx.send_replace(state);
    }
}

fn backend_failure(profession_id: Uuid, step: &str, err: Error) -> ClientError {
    error!(profession_id = %profession_id, "Rating {} failed: {}", step, err);
    ClientError::from(err)
}
