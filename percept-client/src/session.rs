//! Per-session UI context
//!
//! Tracks the profession currently shown in the detail view and the paging
//! state of the profession directory. Passed explicitly to the components
//! that need it; there is no process-global state.

use tokio::sync::RwLock;
use uuid::Uuid;

/// Paging state of the popular-professions list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingState {
    /// Index of the last page loaded, 0 for the first page
    pub current_page: u32,
    pub has_more: bool,
    pub is_loading: bool,
}

impl Default for PagingState {
    fn default() -> Self {
        Self {
            current_page: 0,
            has_more: true,
            is_loading: false,
        }
    }
}

#[derive(Default)]
pub struct SessionContext {
    current: RwLock<Option<Uuid>>,
    paging: RwLock<PagingState>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open_profession(&self, id: Uuid) {
        *self.current.write().await = Some(id);
    }

    pub async fn close_profession(&self) {
        *self.current.write().await = None;
    }

    pub async fn current_profession(&self) -> Option<Uuid> {
        *self.current.read().await
    }

    /// Whether the detail view still shows this profession
    pub async fn is_current(&self, id: Uuid) -> bool {
        self.current_profession().await == Some(id)
    }

    pub async fn paging(&self) -> PagingState {
        *self.paging.read().await
    }

    /// Claim the next page for loading
    ///
    /// Returns the page index to fetch, or `None` while another load runs or
    /// once the list is exhausted.
    pub async fn begin_page_load(&self) -> Option<u32> {
        let mut paging = self.paging.write().await;
        if paging.is_loading || !paging.has_more {
            return None;
        }
        paging.is_loading = true;
        Some(paging.current_page + 1)
    }

    /// Record the outcome of a page load started with `begin_page_load`
    ///
    /// An empty page marks the list as exhausted. A failed load should pass
    /// `None` so the same page is retried next time.
    pub async fn finish_page_load(&self, received: Option<usize>) {
        let mut paging = self.paging.write().await;
        paging.is_loading = false;
        match received {
            Some(0) => paging.has_more = false,
            Some(_) => paging.current_page += 1,
            None => {}
        }
    }

    pub async fn reset_paging(&self) {
        *self.paging.write().await = PagingState::default();
    }
}
