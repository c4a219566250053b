//! Recent activity feed and the scrolling comment banner

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

use percept_common::db::{Comment, RatingActivity};
use percept_common::human_time::format_relative;
use percept_common::Backend;

use crate::error::ClientResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActivityItem {
    Rating(RatingActivity),
    Message(Comment),
}

impl ActivityItem {
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            ActivityItem::Rating(r) => r.created_at,
            ActivityItem::Message(c) => c.created_at,
        }
    }

    /// One-line description for the feed
    pub fn describe(&self, now: DateTime<Utc>) -> String {
        let when = format_relative(self.created_at(), now);
        match self {
            ActivityItem::Rating(r) => format!(
                "User rated {} > {}: {} points ({})",
                r.profession_category, r.profession_name, r.score, when
            ),
            ActivityItem::Message(c) => format!("New comment: \"{}\" ({})", c.content, when),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ActivityLimits {
    pub ratings: i64,
    pub comments: i64,
    /// Items kept after merging
    pub total: usize,
    pub scrolling_comments: i64,
}

impl Default for ActivityLimits {
    fn default() -> Self {
        Self {
            ratings: 10,
            comments: 5,
            total: 10,
            scrolling_comments: 20,
        }
    }
}

pub struct ActivityFeed {
    backend: Arc<dyn Backend>,
    limits: ActivityLimits,
}

impl ActivityFeed {
    pub fn new(backend: Arc<dyn Backend>, limits: ActivityLimits) -> Self {
        Self { backend, limits }
    }

    /// Latest ratings and comments merged, newest first
    pub async fn recent_activity(&self) -> ClientResult<Vec<ActivityItem>> {
        let ratings = self.backend.recent_ratings(self.limits.ratings).await.map_err(|e| {
            error!("Failed to load recent ratings: {}", e);
            e
        })?;
        let comments = self.backend.recent_comments(self.limits.comments).await.map_err(|e| {
            error!("Failed to load recent comments: {}", e);
            e
        })?;

        let items = merge_activity(ratings, comments, self.limits.total);
        debug!(items = items.len(), "Activity feed loaded");
        Ok(items)
    }

    /// Comments for the scrolling banner, newest first
    pub async fn scrolling_comments(&self) -> ClientResult<Vec<Comment>> {
        let comments = self
            .backend
            .recent_comments(self.limits.scrolling_comments)
            .await
            .map_err(|e| {
                error!("Failed to load banner comments: {}", e);
                e
            })?;
        Ok(comments)
    }
}

fn merge_activity(ratings: Vec<RatingActivity>, comments: Vec<Comment>, limit: usize) -> Vec<ActivityItem> {
    let mut items: Vec<ActivityItem> = ratings
        .into_iter()
        .map(ActivityItem::Rating)
        .chain(comments.into_iter().map(ActivityItem::Message))
        .collect();
    // Stable: on equal timestamps ratings stay ahead of comments
    items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    items.truncate(limit);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn rating(minutes_ago: i64) -> RatingActivity {
        RatingActivity {
            id: Uuid::new_v4(),
            score: 4,
            created_at: base() - Duration::minutes(minutes_ago),
            profession_name: "Nurse".to_string(),
            profession_category: "healthcare".to_string(),
        }
    }

    fn comment(minutes_ago: i64) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            profession_id: Uuid::new_v4(),
            content: "hello".to_string(),
            username: "anon-abcdef".to_string(),
            user_id: "device".to_string(),
            created_at: base() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_merge_is_newest_first_and_truncated() {
        let ratings = (0..10).map(|i| rating(i * 2 + 1)).collect();
        let comments = (0..5).map(|i| comment(i * 2)).collect();

        let items = merge_activity(ratings, comments, 10);
        assert_eq!(items.len(), 10);
        assert!(matches!(items[0], ActivityItem::Message(_)));
        assert!(matches!(items[1], ActivityItem::Rating(_)));
        assert!(items.windows(2).all(|w| w[0].created_at() >= w[1].created_at()));
    }

    #[test]
    fn test_describe() {
        let now = base();
        assert_eq!(
            ActivityItem::Rating(rating(5)).describe(now),
            "User rated healthcare > Nurse: 4 points (5 minutes ago)"
        );
        assert_eq!(
            ActivityItem::Message(comment(0)).describe(now),
            "New comment: \"hello\" (moments ago)"
        );
    }
}
