//! In-memory entity cache
//!
//! Last-known profession records and comment lists, keyed by profession id.
//! Entries are `Arc` snapshots: every write swaps in a new `Arc`, so a reader
//! holding an older snapshot never observes a half-applied update.
//!
//! Entries are replaced wholesale, except for the two supported incremental
//! updates: `increment_comment_count` (optimistic comment) and `apply_stats`
//! (recomputed aggregates after a submission).

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use percept_common::db::{Comment, Profession, ProfessionStats};

#[derive(Default)]
pub struct EntityCache {
    professions: RwLock<HashMap<Uuid, Arc<Profession>>>,
    comments: RwLock<HashMap<Uuid, Arc<Vec<Comment>>>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Profession>> {
        self.professions.read().await.get(&id).cloned()
    }

    pub async fn put(&self, id: Uuid, profession: Profession) {
        self.professions.write().await.insert(id, Arc::new(profession));
    }

    /// Newest-first comment list
    pub async fn get_comments(&self, id: Uuid) -> Option<Arc<Vec<Comment>>> {
        self.comments.read().await.get(&id).cloned()
    }

    pub async fn put_comments(&self, id: Uuid, comments: Vec<Comment>) {
        self.comments.write().await.insert(id, Arc::new(comments));
    }

    /// Prepend to a cached list; no-op when the list is not cached or
    /// already holds this comment
    pub async fn prepend_comment(&self, id: Uuid, comment: Comment) -> bool {
        let mut comments = self.comments.write().await;
        let Some(current) = comments.get(&id) else {
            return false;
        };
        if current.iter().any(|c| c.id == comment.id) {
            return false;
        }

        let mut next = Vec::with_capacity(current.len() + 1);
        next.push(comment);
        next.extend(current.iter().cloned());
        comments.insert(id, Arc::new(next));
        true
    }

    pub async fn increment_comment_count(&self, id: Uuid) -> bool {
        self.update_profession(id, |p| p.comments_count += 1).await
    }

    /// Write recomputed aggregates into a cached profession
    pub async fn apply_stats(&self, id: Uuid, stats: &ProfessionStats) -> bool {
        self.update_profession(id, |p| {
            p.avg_rating = stats.avg_rating;
            p.total_ratings = stats.total_ratings;
            p.comments_count = stats.comments_count;
        })
        .await
    }

    /// Evict the profession and its comment list
    pub async fn invalidate(&self, id: Uuid) {
        self.professions.write().await.remove(&id);
        self.comments.write().await.remove(&id);
    }

    pub async fn invalidate_comments(&self, id: Uuid) {
        self.comments.write().await.remove(&id);
    }

    pub async fn clear(&self) {
        self.professions.write().await.clear();
        self.comments.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.professions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn update_profession<F>(&self, id: Uuid, apply: F) -> bool
    where
        F: FnOnce(&mut Profession),
    {
        let mut professions = self.professions.write().await;
        match professions.get(&id) {
            Some(current) => {
                let mut next = Profession::clone(current);
                apply(&mut next);
                professions.insert(id, Arc::new(next));
                true
            }
            None => false,
        }
    }
}
