//! Profession search box

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

use percept_common::db::Profession;
use percept_common::Backend;

use crate::error::ClientResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    /// Trimmed query text
    pub query: String,
    pub professions: Vec<Profession>,
    /// The query matched nothing; the UI offers to add a profession instead
    pub offer_create: bool,
    /// Name to pre-fill in the add-profession form when `offer_create` is set
    pub prefill_name: Option<String>,
}

impl SearchResults {
    fn empty(query: String) -> Self {
        Self {
            query,
            professions: Vec::new(),
            offer_create: false,
            prefill_name: None,
        }
    }
}

pub struct SearchIndexQuery {
    backend: Arc<dyn Backend>,
    limit: i64,
}

impl SearchIndexQuery {
    pub fn new(backend: Arc<dyn Backend>, limit: i64) -> Self {
        Self { backend, limit }
    }

    /// Case-insensitive substring search over name, category and description
    ///
    /// A blank query returns empty results without touching the backend.
    pub async fn search(&self, query: &str) -> ClientResult<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchResults::empty(String::new()));
        }

        let professions = self
            .backend
            .search_professions(query, self.limit)
            .await
            .map_err(|e| {
                error!(query, "Profession search failed: {}", e);
                e
            })?;
        debug!(query, results = professions.len(), "Profession search");

        if professions.is_empty() {
            return Ok(SearchResults {
                query: query.to_string(),
                professions,
                offer_create: true,
                prefill_name: Some(query.to_string()),
            });
        }

        Ok(SearchResults {
            query: query.to_string(),
            professions,
            offer_create: false,
            prefill_name: None,
        })
    }
}
