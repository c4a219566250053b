//! Backend seam
//!
//! The hosted data + realtime service is consumed through this trait. The
//! client never talks to storage directly, so the coordination logic can be
//! exercised against any implementation (SQLite, a remote service, a test
//! double).

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::models::{
    CategoryTotal, Comment, NewComment, NewProfession, NewRating, Profession, ProfessionStats,
    Rating, RatingActivity,
};
use crate::events::{ChangeSubscription, Table};
use crate::Result;

#[async_trait]
pub trait Backend: Send + Sync {
    // --- professions ---

    /// Select one profession by id
    async fn get_profession(&self, id: Uuid) -> Result<Option<Profession>>;

    /// Select a range of professions ordered by `total_ratings` descending
    async fn list_professions(&self, offset: i64, limit: i64) -> Result<Vec<Profession>>;

    /// Case-insensitive substring match on name OR category OR description,
    /// ordered by `total_ratings` descending
    async fn search_professions(&self, term: &str, limit: i64) -> Result<Vec<Profession>>;

    /// Insert a profession with zeroed aggregates
    async fn insert_profession(&self, new: &NewProfession) -> Result<Profession>;

    /// Write recomputed aggregates back to the profession row
    async fn update_profession_stats(&self, id: Uuid, stats: &ProfessionStats) -> Result<()>;

    async fn count_professions(&self) -> Result<i64>;

    /// `avg_rating` column of every profession
    async fn profession_averages(&self) -> Result<Vec<f64>>;

    /// `(category, total_ratings)` of every profession
    async fn category_totals(&self) -> Result<Vec<CategoryTotal>>;

    // --- ratings ---

    /// Ratings already cast by a device for a profession (duplicate check)
    async fn find_ratings(&self, profession_id: Uuid, device_id: &str) -> Result<Vec<Rating>>;

    /// Insert a rating; a (profession, device) uniqueness violation is
    /// reported as `Error::Conflict`
    async fn insert_rating(&self, new: &NewRating) -> Result<Rating>;

    async fn count_ratings(&self) -> Result<i64>;

    /// Scores of one profession, or of every rating when `None`
    async fn rating_scores(&self, profession_id: Option<Uuid>) -> Result<Vec<i64>>;

    /// Newest ratings joined with their profession
    async fn recent_ratings(&self, limit: i64) -> Result<Vec<RatingActivity>>;

    // --- messages ---

    /// Newest comments of one profession
    async fn list_comments(&self, profession_id: Uuid, limit: i64) -> Result<Vec<Comment>>;

    /// Newest comments across all professions
    async fn recent_comments(&self, limit: i64) -> Result<Vec<Comment>>;

    async fn count_comments(&self, profession_id: Uuid) -> Result<i64>;

    async fn insert_comment(&self, new: &NewComment) -> Result<Comment>;

    // --- realtime ---

    /// Subscribe to change notifications of one table
    ///
    /// An `Err` means the channel could not be established.
    async fn subscribe(&self, table: Table) -> Result<ChangeSubscription>;
}
