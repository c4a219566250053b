//! SQLite implementation of the `Backend` trait
//!
//! Stands in for the hosted data + realtime service: every successful
//! mutation is followed by a change notification on the EventBus, the same
//! way the hosted service pushes row changes to subscribed clients.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::init::{init_database, init_memory_database};
use super::poller::ChangePoller;
use super::models::{
    CategoryTotal, Comment, NewComment, NewProfession, NewRating, Profession, ProfessionStats,
    Rating, RatingActivity,
};
use crate::backend::Backend;
use crate::events::{ChangeEvent, ChangeKind, ChangeSubscription, EventBus, Table};
use crate::{Error, Result};

pub(super) const PROFESSION_COLUMNS: &str =
    "id, category, name, description, avg_rating, total_ratings, comments_count";

#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    bus: EventBus,
}

impl SqliteBackend {
    pub fn new(pool: SqlitePool, bus: EventBus) -> Self {
        Self { pool, bus }
    }

    /// Open (or create) the database file and attach a fresh EventBus
    pub async fn open(db_path: &Path, event_capacity: usize) -> Result<Self> {
        let pool = init_database(db_path).await?;
        Ok(Self::new(pool, EventBus::new(event_capacity)))
    }

    /// Private in-memory database, used by tests and demos
    pub async fn in_memory(event_capacity: usize) -> Result<Self> {
        let pool = init_memory_database().await?;
        Ok(Self::new(pool, EventBus::new(event_capacity)))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Publish changes other processes write to the same database file
    ///
    /// Writes made through this backend are announced twice while the
    /// poller runs: once on write and once when the poller reads them.
    pub async fn watch_external_changes(&self, every: Duration) -> Result<ChangePoller> {
        ChangePoller::start(self.pool.clone(), self.bus.clone(), every).await
    }

    /// Delete a profession and its ratings and comments
    ///
    /// Not used by the client; exists so that DELETE notifications can be
    /// produced by administrative tooling and tests.
    pub async fn delete_profession(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM ratings WHERE profession_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM messages WHERE profession_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM professions WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        if deleted > 0 {
            self.bus.emit_lossy(ChangeEvent::profession_deleted(id));
        }
        Ok(deleted > 0)
    }
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("Malformed id {:?}: {}", raw, e)))
}

pub(super) fn profession_from_row(row: &SqliteRow) -> Result<Profession> {
    let id: String = row.try_get("id")?;
    Ok(Profession {
        id: parse_id(&id)?,
        category: row.try_get("category")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        avg_rating: row.try_get("avg_rating")?,
        total_ratings: row.try_get("total_ratings")?,
        comments_count: row.try_get("comments_count")?,
    })
}

pub(super) fn rating_from_row(row: &SqliteRow) -> Result<Rating> {
    let id: String = row.try_get("id")?;
    let profession_id: String = row.try_get("profession_id")?;
    Ok(Rating {
        id: parse_id(&id)?,
        profession_id: parse_id(&profession_id)?,
        device_id: row.try_get("device_id")?,
        user_id: row.try_get("user_id")?,
        score: row.try_get("score")?,
        created_at: row.try_get("created_at")?,
    })
}

pub(super) fn comment_from_row(row: &SqliteRow) -> Result<Comment> {
    let id: String = row.try_get("id")?;
    let profession_id: String = row.try_get("profession_id")?;
    Ok(Comment {
        id: parse_id(&id)?,
        profession_id: parse_id(&profession_id)?,
        content: row.try_get("content")?,
        username: row.try_get("username")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Build a `%term%` LIKE pattern with `\` escaping the wildcards
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn get_profession(&self, id: Uuid) -> Result<Option<Profession>> {
        let sql = format!("SELECT {} FROM professions WHERE id = ?", PROFESSION_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(profession_from_row).transpose()
    }

    async fn list_professions(&self, offset: i64, limit: i64) -> Result<Vec<Profession>> {
        let sql = format!(
            "SELECT {} FROM professions ORDER BY total_ratings DESC, rowid ASC LIMIT ? OFFSET ?",
            PROFESSION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(profession_from_row).collect()
    }

    async fn search_professions(&self, term: &str, limit: i64) -> Result<Vec<Profession>> {
        let pattern = like_pattern(term);
        debug!(term, "Searching professions");
        let sql = format!(
            "SELECT {} FROM professions
             WHERE lower(name) LIKE ?1 ESCAPE '\\'
                OR lower(category) LIKE ?1 ESCAPE '\\'
                OR lower(COALESCE(description, '')) LIKE ?1 ESCAPE '\\'
             ORDER BY total_ratings DESC, rowid ASC
             LIMIT ?2",
            PROFESSION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(profession_from_row).collect()
    }

    async fn insert_profession(&self, new: &NewProfession) -> Result<Profession> {
        let profession = Profession {
            id: Uuid::new_v4(),
            category: new.category.clone(),
            name: new.name.clone(),
            description: new.description.clone(),
            avg_rating: 0.0,
            total_ratings: 0,
            comments_count: 0,
        };

        sqlx::query(
            "INSERT INTO professions (id, category, name, description, avg_rating, total_ratings, comments_count, created_at)
             VALUES (?, ?, ?, ?, 0, 0, 0, ?)",
        )
        .bind(profession.id.to_string())
        .bind(&profession.category)
        .bind(&profession.name)
        .bind(&profession.description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::from_write(e, "profession insert"))?;

        self.bus
            .emit_lossy(ChangeEvent::profession_changed(ChangeKind::Insert, profession.clone()));
        Ok(profession)
    }

    async fn update_profession_stats(&self, id: Uuid, stats: &ProfessionStats) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE professions SET avg_rating = ?, total_ratings = ?, comments_count = ? WHERE id = ?",
        )
        .bind(stats.avg_rating)
        .bind(stats.total_ratings)
        .bind(stats.comments_count)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(Error::NotFound(format!("profession {}", id)));
        }

        if let Some(profession) = self.get_profession(id).await? {
            self.bus
                .emit_lossy(ChangeEvent::profession_changed(ChangeKind::Update, profession));
        }
        Ok(())
    }

    async fn count_professions(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM professions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn profession_averages(&self) -> Result<Vec<f64>> {
        let averages: Vec<f64> = sqlx::query_scalar("SELECT avg_rating FROM professions")
            .fetch_all(&self.pool)
            .await?;
        Ok(averages)
    }

    async fn category_totals(&self) -> Result<Vec<CategoryTotal>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT category, total_ratings FROM professions ORDER BY rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(category, total_ratings)| CategoryTotal {
                category,
                total_ratings,
            })
            .collect())
    }

    async fn find_ratings(&self, profession_id: Uuid, device_id: &str) -> Result<Vec<Rating>> {
        let rows = sqlx::query(
            "SELECT id, profession_id, device_id, user_id, score, created_at
             FROM ratings WHERE profession_id = ? AND device_id = ?",
        )
        .bind(profession_id.to_string())
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(rating_from_row).collect()
    }

    async fn insert_rating(&self, new: &NewRating) -> Result<Rating> {
        if !(1..=5).contains(&new.score) {
            return Err(Error::InvalidInput(format!("score {} outside 1-5", new.score)));
        }

        let rating = Rating {
            id: Uuid::new_v4(),
            profession_id: new.profession_id,
            device_id: new.device_id.clone(),
            user_id: new.user_id.clone(),
            score: new.score,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO ratings (id, profession_id, device_id, user_id, score, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(rating.id.to_string())
        .bind(rating.profession_id.to_string())
        .bind(&rating.device_id)
        .bind(&rating.user_id)
        .bind(rating.score)
        .bind(rating.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::from_write(e, "rating insert"))?;

        self.bus.emit_lossy(ChangeEvent::rating_inserted(rating.clone()));
        Ok(rating)
    }

    async fn count_ratings(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ratings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn rating_scores(&self, profession_id: Option<Uuid>) -> Result<Vec<i64>> {
        let scores: Vec<i64> = match profession_id {
            Some(id) => {
                sqlx::query_scalar("SELECT score FROM ratings WHERE profession_id = ?")
                    .bind(id.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT score FROM ratings")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(scores)
    }

    async fn recent_ratings(&self, limit: i64) -> Result<Vec<RatingActivity>> {
        let rows = sqlx::query(
            "SELECT r.id, r.score, r.created_at, p.name, p.category
             FROM ratings r JOIN professions p ON p.id = r.profession_id
             ORDER BY r.created_at DESC, r.rowid DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<RatingActivity> {
                let id: String = row.try_get("id")?;
                let created_at: DateTime<Utc> = row.try_get("created_at")?;
                Ok(RatingActivity {
                    id: parse_id(&id)?,
                    score: row.try_get("score")?,
                    created_at,
                    profession_name: row.try_get("name")?,
                    profession_category: row.try_get("category")?,
                })
            })
            .collect()
    }

    async fn list_comments(&self, profession_id: Uuid, limit: i64) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT id, profession_id, content, username, user_id, created_at
             FROM messages WHERE profession_id = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
        )
        .bind(profession_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(comment_from_row).collect()
    }

    async fn recent_comments(&self, limit: i64) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT id, profession_id, content, username, user_id, created_at
             FROM messages
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(comment_from_row).collect()
    }

    async fn count_comments(&self, profession_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE profession_id = ?")
            .bind(profession_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn insert_comment(&self, new: &NewComment) -> Result<Comment> {
        let comment = Comment {
            id: Uuid::new_v4(),
            profession_id: new.profession_id,
            content: new.content.clone(),
            username: new.username.clone(),
            user_id: new.user_id.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO messages (id, profession_id, content, username, user_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(comment.id.to_string())
        .bind(comment.profession_id.to_string())
        .bind(&comment.content)
        .bind(&comment.username)
        .bind(&comment.user_id)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::from_write(e, "message insert"))?;

        self.bus.emit_lossy(ChangeEvent::message_inserted(comment.clone()));
        Ok(comment)
    }

    async fn subscribe(&self, table: Table) -> Result<ChangeSubscription> {
        let subscription = self.bus.subscribe_table(table);
        debug!(
            table = %table,
            subscribers = self.bus.subscriber_count(),
            "Subscribed to change notifications"
        );
        Ok(subscription)
    }
}
