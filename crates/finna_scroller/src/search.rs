//! Search collaborators owned by the host application.

use crate::record::RecordId;
use anyhow::Result;

/// Identifier of a persisted search.
pub type SearchId = i64;

/// A search as it was just executed and displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedSearch {
    pub search_id: SearchId,
    pub page: usize,
    pub limit: usize,
    pub sort: Option<String>,
    pub total: usize,
    /// Whether the backend supports jumping to the first/last record.
    pub first_last_navigation: bool,
    /// Records of the displayed page, in order.
    pub record_ids: Vec<RecordId>,
}

/// A restored search that can be re-run page by page.
///
/// A persisted search does not carry its limit or sort; the scroller
/// reapplies them before fetching.
pub trait SearchHandle {
    fn set_limit(&mut self, limit: usize);
    fn set_sort(&mut self, sort: Option<&str>);
    fn set_page(&mut self, page: usize);
    /// Run the search for the current page and return its record ids.
    fn execute(&mut self) -> Result<Vec<RecordId>>;
    /// Search URL reflecting the current parameters.
    fn url(&self) -> String;
}

/// Restores persisted searches by id.
pub trait SearchRestorer: Send + Sync {
    /// `Ok(None)` when the search does not exist or belongs to another session.
    fn restore(&self, search_id: SearchId) -> Result<Option<Box<dyn SearchHandle>>>;
}

/// Remembers the user's last search.
pub trait SearchMemory: Send + Sync {
    fn last_search_id(&self) -> Option<SearchId>;
    /// Record `url` as the "back to search" link for `search_id`.
    fn remember_search(&self, url: &str, search_id: SearchId) -> Result<()>;
}
