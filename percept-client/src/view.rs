//! Refresh requests from the coordination layer to the presentation layer
//!
//! Coordinators and the realtime bridge never render anything. They publish
//! which view regions are stale and the presentation layer re-reads them.

use std::fmt;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// A view region that should re-read its data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTarget {
    DashboardStats,
    ActivityFeed,
    PerceptionChart,
    CategoryChart,
    PopularProfessions,
    /// Detail view of one profession
    ProfessionDetail(Uuid),
}

impl RefreshTarget {
    /// Every target that does not depend on a specific profession
    pub const GLOBAL: [RefreshTarget; 5] = [
        RefreshTarget::DashboardStats,
        RefreshTarget::ActivityFeed,
        RefreshTarget::PerceptionChart,
        RefreshTarget::CategoryChart,
        RefreshTarget::PopularProfessions,
    ];
}

impl fmt::Display for RefreshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshTarget::DashboardStats => f.write_str("dashboard_stats"),
            RefreshTarget::ActivityFeed => f.write_str("activity_feed"),
            RefreshTarget::PerceptionChart => f.write_str("perception_chart"),
            RefreshTarget::CategoryChart => f.write_str("category_chart"),
            RefreshTarget::PopularProfessions => f.write_str("popular_professions"),
            RefreshTarget::ProfessionDetail(id) => write!(f, "profession_detail:{}", id),
        }
    }
}

/// Broadcast channel of refresh requests
///
/// Sending never blocks and never fails; requests sent while nobody listens
/// are dropped.
#[derive(Clone)]
pub struct RefreshBus {
    tx: broadcast::Sender<RefreshTarget>,
}

impl RefreshBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshTarget> {
        self.tx.subscribe()
    }

    pub fn request(&self, target: RefreshTarget) {
        trace!(%target, "Refresh requested");
        let _ = self.tx.send(target);
    }

    pub fn request_all<I>(&self, targets: I)
    where
        I: IntoIterator<Item = RefreshTarget>,
    {
        for target in targets {
            self.request(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requests_reach_every_subscriber() {
        let bus = RefreshBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let id = Uuid::new_v4();
        bus.request(RefreshTarget::ProfessionDetail(id));

        assert_eq!(a.recv().await.unwrap(), RefreshTarget::ProfessionDetail(id));
        assert_eq!(b.recv().await.unwrap(), RefreshTarget::ProfessionDetail(id));
    }

    #[test]
    fn test_request_without_subscribers() {
        let bus = RefreshBus::new(8);
        bus.request(RefreshTarget::DashboardStats);

        // Only requests made after subscribing are delivered
        let mut late = bus.subscribe();
        assert!(late.try_recv().is_err());
    }
}
