//! Change detection across processes
//!
//! The EventBus only hears about writes made through this process's backend.
//! When several processes share one database file, a `ChangePoller` reads the
//! tables on an interval and republishes what changed since the last pass:
//! ratings and messages by rowid watermark, professions by snapshot diff.

use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::models::Profession;
use super::sqlite::{comment_from_row, profession_from_row, rating_from_row, PROFESSION_COLUMNS};
use crate::events::{ChangeEvent, ChangeKind, EventBus, Table};
use crate::Result;

/// Background task publishing changes written by other processes
///
/// Dropping the poller stops it.
pub struct ChangePoller {
    handle: JoinHandle<()>,
}

impl ChangePoller {
    /// Capture the current state, then poll every `every`
    ///
    /// Only rows written after this call produce events.
    pub async fn start(pool: SqlitePool, bus: EventBus, every: Duration) -> Result<Self> {
        let mut marks = Watermarks::capture(&pool).await?;
        info!(
            interval_ms = every.as_millis() as u64,
            ratings_rowid = marks.ratings,
            messages_rowid = marks.messages,
            professions = marks.professions.len(),
            "Watching database for external changes"
        );

        let handle = tokio::spawn(async move {
            let mut tick = interval(every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            tick.tick().await;

            loop {
                tick.tick().await;
                match marks.advance(&pool, &bus).await {
                    Ok(0) => {}
                    Ok(n) => debug!(events = n, "Published external changes"),
                    Err(e) => warn!("External change poll failed: {}", e),
                }
            }
        });

        Ok(Self { handle })
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for ChangePoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Watermarks {
    ratings: i64,
    messages: i64,
    professions: HashMap<Uuid, Profession>,
}

impl Watermarks {
    async fn capture(pool: &SqlitePool) -> Result<Self> {
        Ok(Self {
            ratings: max_rowid(pool, Table::Ratings).await?,
            messages: max_rowid(pool, Table::Messages).await?,
            professions: load_professions(pool).await?,
        })
    }

    /// Publish everything that changed since the last pass
    ///
    /// Professions go first so that subscribers see a new profession before
    /// the ratings and comments that reference it.
    async fn advance(&mut self, pool: &SqlitePool, bus: &EventBus) -> Result<usize> {
        let mut published = 0;

        let current = load_professions(pool).await?;
        for (id, profession) in &current {
            let kind = match self.professions.get(id) {
                None => ChangeKind::Insert,
                Some(previous) if previous != profession => ChangeKind::Update,
                Some(_) => continue,
            };
            bus.emit_lossy(ChangeEvent::profession_changed(kind, profession.clone()));
            published += 1;
        }
        for id in self.professions.keys().filter(|id| !current.contains_key(id)) {
            bus.emit_lossy(ChangeEvent::profession_deleted(*id));
            published += 1;
        }
        self.professions = current;

        let rows = sqlx::query(
            "SELECT rowid AS seq, id, profession_id, device_id, user_id, score, created_at
             FROM ratings WHERE rowid > ? ORDER BY rowid",
        )
        .bind(self.ratings)
        .fetch_all(pool)
        .await?;
        for row in &rows {
            let rating = rating_from_row(row)?;
            self.ratings = row.try_get("seq")?;
            bus.emit_lossy(ChangeEvent::rating_inserted(rating));
            published += 1;
        }

        let rows = sqlx::query(
            "SELECT rowid AS seq, id, profession_id, content, username, user_id, created_at
             FROM messages WHERE rowid > ? ORDER BY rowid",
        )
        .bind(self.messages)
        .fetch_all(pool)
        .await?;
        for row in &rows {
            let comment = comment_from_row(row)?;
            self.messages = row.try_get("seq")?;
            bus.emit_lossy(ChangeEvent::message_inserted(comment));
            published += 1;
        }

        Ok(published)
    }
}

async fn max_rowid(pool: &SqlitePool, table: Table) -> Result<i64> {
    let sql = format!("SELECT COALESCE(MAX(rowid), 0) FROM {}", table.as_str());
    let max: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
    Ok(max)
}

async fn load_professions(pool: &SqlitePool) -> Result<HashMap<Uuid, Profession>> {
    let sql = format!("SELECT {} FROM professions", PROFESSION_COLUMNS);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    let mut professions = HashMap::with_capacity(rows.len());
    for row in &rows {
        let profession = profession_from_row(row)?;
        professions.insert(profession.id, profession);
    }
    Ok(professions)
}
