//! Profession directory: popular list, incremental paging, detail view and
//! the add-profession form
//!
//! Every profession fetched here is written to the entity cache so the
//! detail view and the coordinators share one last-known record.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use percept_common::db::{Comment, NewProfession, Profession};
use percept_common::Backend;

use crate::cache::EntityCache;
use crate::error::{ClientError, ClientResult};
use crate::session::SessionContext;
use crate::view::{RefreshBus, RefreshTarget};

/// Perception shown before a profession has any rating
pub const NEUTRAL_PERCEPTION: i64 = 50;

/// Everything the detail view renders for one profession
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfessionDetail {
    pub profession: Profession,
    /// Newest first
    pub comments: Vec<Comment>,
    /// Average rating mapped back onto the 0-100 slider scale
    pub perception_percent: i64,
}

/// Map a 1-5 average onto 0-100, or the neutral midpoint when unrated
pub fn perception_percent(profession: &Profession) -> i64 {
    if profession.has_rating() {
        ((profession.avg_rating - 1.0) / 4.0 * 100.0).round() as i64
    } else {
        NEUTRAL_PERCEPTION
    }
}

pub struct ProfessionDirectory {
    backend: Arc<dyn Backend>,
    cache: Arc<EntityCache>,
    session: Arc<SessionContext>,
    refresh: RefreshBus,
    page_size: i64,
    comment_limit: i64,
}

impl ProfessionDirectory {
    pub fn new(
        backend: Arc<dyn Backend>,
        cache: Arc<EntityCache>,
        session: Arc<SessionContext>,
        refresh: RefreshBus,
        page_size: i64,
        comment_limit: i64,
    ) -> Self {
        Self {
            backend,
            cache,
            session,
            refresh,
            page_size,
            comment_limit,
        }
    }

    /// First page of the most-rated professions; restarts paging
    pub async fn popular(&self) -> ClientResult<Vec<Profession>> {
        self.session.reset_paging().await;
        self.fetch_page(0).await
    }

    /// Next page after the ones already loaded
    ///
    /// Returns an empty list without a backend call while another page is
    /// loading or once the list is exhausted.
    pub async fn load_more(&self) -> ClientResult<Vec<Profession>> {
        let Some(page) = self.session.begin_page_load().await else {
            return Ok(Vec::new());
        };

        match self.fetch_page(page).await {
            Ok(professions) => {
                self.session.finish_page_load(Some(professions.len())).await;
                Ok(professions)
            }
            Err(e) => {
                self.session.finish_page_load(None).await;
                Err(e)
            }
        }
    }

    /// Open the detail view of a profession
    ///
    /// Serves cached data when present and fills the cache otherwise.
    pub async fn open_detail(&self, id: Uuid) -> ClientResult<ProfessionDetail> {
        self.session.open_profession(id).await;

        let profession = match self.cache.get(id).await {
            Some(cached) => (*cached).clone(),
            None => {
                let fetched = self
                    .backend
                    .get_profession(id)
                    .await
                    .map_err(|e| {
                        error!(profession_id = %id, "Failed to load profession: {}", e);
                        e
                    })?
                    .ok_or_else(|| ClientError::NotFound(format!("profession {}", id)))?;
                self.cache.put(id, fetched.clone()).await;
                fetched
            }
        };

        let comments = match self.cache.get_comments(id).await {
            Some(cached) => (*cached).clone(),
            None => {
                let fetched = self
                    .backend
                    .list_comments(id, self.comment_limit)
                    .await
                    .map_err(|e| {
                        error!(profession_id = %id, "Failed to load comments: {}", e);
                        e
                    })?;
                self.cache.put_comments(id, fetched.clone()).await;
                fetched
            }
        };

        debug!(profession_id = %id, comments = comments.len(), "Detail view opened");
        Ok(ProfessionDetail {
            perception_percent: perception_percent(&profession),
            profession,
            comments,
        })
    }

    pub async fn close_detail(&self) {
        self.session.close_profession().await;
    }

    /// Add a profession from the add-profession form
    pub async fn add_profession(&self, new: NewProfession) -> ClientResult<Profession> {
        let category = new.category.trim();
        let name = new.name.trim();
        if category.is_empty() {
            return Err(ClientError::Validation("category is required".to_string()));
        }
        if name.is_empty() {
            return Err(ClientError::Validation("name is required".to_string()));
        }

        let cleaned = NewProfession {
            category: category.to_string(),
            name: name.to_string(),
            description: new
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        };

        let profession = self.backend.insert_profession(&cleaned).await.map_err(|e| {
            error!(category, name, "Failed to add profession: {}", e);
            e
        })?;
        self.cache.put(profession.id, profession.clone()).await;
        self.refresh.request_all([
            RefreshTarget::PopularProfessions,
            RefreshTarget::CategoryChart,
        ]);

        info!(profession_id = %profession.id, category, name, "Profession added");
        Ok(profession)
    }

    async fn fetch_page(&self, page: u32) -> ClientResult<Vec<Profession>> {
        let offset = i64::from(page) * self.page_size;
        let professions = self
            .backend
            .list_professions(offset, self.page_size)
            .await
            .map_err(|e| {
                error!(page, "Failed to load professions: {}", e);
                e
            })?;

        for profession in &professions {
            self.cache.put(profession.id, profession.clone()).await;
        }
        debug!(page, count = professions.len(), "Profession page loaded");
        Ok(professions)
    }
}
