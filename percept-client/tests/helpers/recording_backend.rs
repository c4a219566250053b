//! Backend wrapper that counts calls and injects failures or pauses

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

use percept_common::db::{
    CategoryTotal, Comment, NewComment, NewProfession, NewRating, Profession, ProfessionStats,
    Rating, RatingActivity, SqliteBackend,
};
use percept_common::events::{ChangeSubscription, Table};
use percept_common::{Backend, Error, Result};

/// Lets a test hold a backend call open and release it later
#[derive(Clone, Default)]
pub struct PauseHandle {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl PauseHandle {
    /// Wait until the paused call has started
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

pub struct RecordingBackend {
    inner: SqliteBackend,
    calls: Mutex<HashMap<&'static str, usize>>,
    failing: Mutex<HashSet<&'static str>>,
    failing_tables: Mutex<HashSet<Table>>,
    paused: Mutex<HashMap<&'static str, PauseHandle>>,
}

impl RecordingBackend {
    pub async fn in_memory() -> Self {
        Self {
            inner: SqliteBackend::in_memory(256).await.expect("in-memory backend"),
            calls: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            failing_tables: Mutex::new(HashSet::new()),
            paused: Mutex::new(HashMap::new()),
        }
    }

    /// Unrecorded access to the wrapped backend
    pub fn inner(&self) -> &SqliteBackend {
        &self.inner
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Make every later call of `method` fail
    pub fn fail(&self, method: &'static str) {
        self.failing.lock().unwrap().insert(method);
    }

    pub fn recover(&self, method: &'static str) {
        self.failing.lock().unwrap().remove(method);
    }

    /// Make subscriptions to one table fail
    pub fn fail_subscription(&self, table: Table) {
        self.failing_tables.lock().unwrap().insert(table);
    }

    /// Hold the next call of `method` until the handle is released
    pub fn pause(&self, method: &'static str) -> PauseHandle {
        let handle = PauseHandle::default();
        self.paused.lock().unwrap().insert(method, handle.clone());
        handle
    }

    async fn record(&self, method: &'static str) -> Result<()> {
        *self.calls.lock().unwrap().entry(method).or_insert(0) += 1;

        let pause = self.paused.lock().unwrap().remove(method);
        if let Some(handle) = pause {
            handle.entered.notify_one();
            handle.release.notified().await;
        }

        if self.failing.lock().unwrap().contains(method) {
            return Err(Error::Internal(format!("injected failure in {}", method)));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn get_profession(&self, id: Uuid) -> Result<Option<Profession>> {
        self.record("get_profession").await?;
        self.inner.get_profession(id).await
    }

    async fn list_professions(&self, offset: i64, limit: i64) -> Result<Vec<Profession>> {
        self.record("list_professions").await?;
        self.inner.list_professions(offset, limit).await
    }

    async fn search_professions(&self, term: &str, limit: i64) -> Result<Vec<Profession>> {
        self.record("search_professions").await?;
        self.inner.search_professions(term, limit).await
    }

    async fn insert_profession(&self, new: &NewProfession) -> Result<Profession> {
        self.record("insert_profession").await?;
        self.inner.insert_profession(new).await
    }

    async fn update_profession_stats(&self, id: Uuid, stats: &ProfessionStats) -> Result<()> {
        self.record("update_profession_stats").await?;
        self.inner.update_profession_stats(id, stats).await
    }

    async fn count_professions(&self) -> Result<i64> {
        self.record("count_professions").await?;
        self.inner.count_professions().await
    }

    async fn profession_averages(&self) -> Result<Vec<f64>> {
        self.record("profession_averages").await?;
        self.inner.profession_averages().await
    }

    async fn category_totals(&self) -> Result<Vec<CategoryTotal>> {
        self.record("category_totals").await?;
        self.inner.category_totals().await
    }

    async fn find_ratings(&self, profession_id: Uuid, device_id: &str) -> Result<Vec<Rating>> {
        self.record("find_ratings").await?;
        self.inner.find_ratings(profession_id, device_id).await
    }

    async fn insert_rating(&self, new: &NewRating) -> Result<Rating> {
        self.record("insert_rating").await?;
        self.inner.insert_rating(new).await
    }

    async fn count_ratings(&self) -> Result<i64> {
        self.record("count_ratings").await?;
        self.inner.count_ratings().await
    }

    async fn rating_scores(&self, profession_id: Option<Uuid>) -> Result<Vec<i64>> {
        self.record("rating_scores").await?;
        self.inner.rating_scores(profession_id).await
    }

    async fn recent_ratings(&self, limit: i64) -> Result<Vec<RatingActivity>> {
        self.record("recent_ratings").await?;
        self.inner.recent_ratings(limit).await
    }

    async fn list_comments(&self, profession_id: Uuid, limit: i64) -> Result<Vec<Comment>> {
        self.record("list_comments").await?;
        self.inner.list_comments(profession_id, limit).await
    }

    async fn recent_comments(&self, limit: i64) -> Result<Vec<Comment>> {
        self.record("recent_comments").await?;
        self.inner.recent_comments(limit).await
    }

    async fn count_comments(&self, profession_id: Uuid) -> Result<i64> {
        self.record("count_comments").await?;
        self.inner.count_comments(profession_id).await
    }

    async fn insert_comment(&self, new: &NewComment) -> Result<Comment> {
        self.record("insert_comment").await?;
        self.inner.insert_comment(new).await
    }

    async fn subscribe(&self, table: Table) -> Result<ChangeSubscription> {
        self.record("subscribe").await?;
        if self.failing_tables.lock().unwrap().contains(&table) {
            return Err(Error::Subscription(format!("{} channel refused", table)));
        }
        self.inner.subscribe(table).await
    }
}
