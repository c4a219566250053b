//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Profession row as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profession {
    pub id: Uuid,
    pub category: String,
    pub name: String,
    pub description: Option<String>,
    /// Mean score on the 1.0-5.0 scale, 0.0 before the first vote
    pub avg_rating: f64,
    pub total_ratings: i64,
    pub comments_count: i64,
}

impl Profession {
    /// Whether at least one rating has been folded into `avg_rating`
    pub fn has_rating(&self) -> bool {
        self.total_ratings > 0 && self.avg_rating > 0.0
    }
}

/// Input for the add-profession path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProfession {
    pub category: String,
    pub name: String,
    pub description: Option<String>,
}

/// Rating row (one per profession and device)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: Uuid,
    pub profession_id: Uuid,
    pub device_id: String,
    pub user_id: String,
    /// Integer score 1-5
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRating {
    pub profession_id: Uuid,
    pub device_id: String,
    pub user_id: String,
    pub score: i64,
}

/// Comment row from the `messages` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub profession_id: Uuid,
    pub content: String,
    pub username: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub profession_id: Uuid,
    pub content: String,
    pub username: String,
    pub user_id: String,
}

/// Aggregates recomputed for a single profession
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfessionStats {
    pub avg_rating: f64,
    pub total_ratings: i64,
    pub comments_count: i64,
}

/// Dashboard figures, derived on demand and never cached
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_votes: i64,
    /// Unweighted mean of per-profession averages
    pub mean_perception: f64,
    pub profession_count: i64,
}

/// Rating joined with the profession it belongs to, for the activity feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingActivity {
    pub id: Uuid,
    pub score: i64,
    pub created_at: DateTime<Utc>,
    pub profession_name: String,
    pub profession_category: String,
}

/// One profession's contribution to the category chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total_ratings: i64,
}
