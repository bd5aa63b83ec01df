//! Per-session scroller state and its persistence.

use crate::error::Result;
use crate::record::RecordId;
use crate::search::{ExecutedSearch, SearchId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Session key the scroller state is stored under.
pub const SESSION_KEY: &str = "ResultScroller";

/// Key-value session storage owned by the host.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: String) -> anyhow::Result<()>;
}

/// Navigation window of one tracked search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollState {
    /// 1-based page `curr_ids` belongs to.
    pub page: usize,
    pub limit: usize,
    pub sort: Option<String>,
    pub total: usize,
    pub first_last: bool,
    pub curr_ids: Vec<RecordId>,
    #[serde(default)]
    pub prev_ids: Option<Vec<RecordId>>,
    #[serde(default)]
    pub next_ids: Option<Vec<RecordId>>,
    #[serde(default)]
    pub first_id: Option<RecordId>,
    #[serde(default)]
    pub last_id: Option<RecordId>,
    pub last_access: DateTime<Utc>,
}

impl ScrollState {
    pub fn new(search: &ExecutedSearch, now: DateTime<Utc>) -> Self {
        Self {
            page: search.page.max(1),
            limit: search.limit,
            sort: search.sort.clone(),
            total: search.total,
            first_last: search.first_last_navigation,
            curr_ids: search.record_ids.clone(),
            prev_ids: None,
            next_ids: None,
            first_id: None,
            last_id: None,
            last_access: now,
        }
    }

    /// Page size, never zero.
    pub fn page_size(&self) -> usize {
        self.limit.max(1)
    }

    /// `ceil(total / limit)`, at least 1.
    pub fn last_page(&self) -> usize {
        self.total.div_ceil(self.page_size()).max(1)
    }

    /// 1-based position of the record at `offset` on the current page.
    pub fn position(&self, offset: usize) -> usize {
        (self.page - 1) * self.page_size() + offset + 1
    }
}

/// All searches tracked in one session, bounded and LRU-evicted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollerSession {
    searches: BTreeMap<SearchId, ScrollState>,
}

impl ScrollerSession {
    /// Load from the store. Absent data is an empty session.
    pub fn load(store: &dyn SessionStore) -> Result<Self> {
        match store.get(SESSION_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, store: &dyn SessionStore) -> Result<()> {
        store.set(SESSION_KEY, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn get(&self, search_id: SearchId) -> Option<&ScrollState> {
        self.searches.get(&search_id)
    }

    pub fn len(&self) -> usize {
        self.searches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.searches.is_empty()
    }

    /// Store `state` for `search_id`, evicting the least recently accessed
    /// searches so that at most `capacity` are kept.
    pub fn track(&mut self, search_id: SearchId, state: ScrollState, capacity: usize) {
        self.searches.remove(&search_id);
        while !self.searches.is_empty() && self.searches.len() >= capacity.max(1) {
            let oldest = self
                .searches
                .iter()
                .min_by_key(|(_, s)| s.last_access)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    self.searches.remove(&id);
                }
                None => break,
            }
        }
        self.searches.insert(search_id, state);
    }

    /// Replace the state of an already tracked search.
    pub fn update(&mut self, search_id: SearchId, state: ScrollState) {
        self.searches.insert(search_id, state);
    }
}

/// Process-local [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("session store lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("session store lock poisoned"))?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn search(search_id: SearchId, page: usize) -> ExecutedSearch {
        ExecutedSearch {
            search_id,
            page,
            limit: 10,
            sort: Some("relevance".to_string()),
            total: 25,
            first_last_navigation: true,
            record_ids: vec![RecordId::new("Solr", "1")],
        }
    }

    #[test]
    fn paging_arithmetic() {
        let now = Utc::now();
        let state = ScrollState::new(&search(1, 2), now);
        assert_eq!(state.last_page(), 3);
        assert_eq!(state.position(0), 11);
        assert_eq!(state.position(9), 20);

        let mut empty = state.clone();
        empty.total = 0;
        empty.limit = 0;
        assert_eq!(empty.last_page(), 1);
    }

    #[test]
    fn least_recently_accessed_is_evicted() {
        let start = Utc::now();
        let mut session = ScrollerSession::default();
        for id in 1..=3 {
            let state = ScrollState::new(&search(id, 1), start + Duration::seconds(id));
            session.track(id, state, 3);
        }
        // Touch search 1 so search 2 becomes the oldest.
        let mut touched = session.get(1).cloned().unwrap();
        touched.last_access = start + Duration::seconds(10);
        session.update(1, touched);

        session.track(4, ScrollState::new(&search(4, 1), start + Duration::seconds(11)), 3);
        assert_eq!(session.len(), 3);
        assert!(session.get(2).is_none());
        assert!(session.get(1).is_some());
        assert!(session.get(4).is_some());
    }

    #[test]
    fn retracking_a_search_does_not_evict_others() {
        let now = Utc::now();
        let mut session = ScrollerSession::default();
        session.track(1, ScrollState::new(&search(1, 1), now), 2);
        session.track(2, ScrollState::new(&search(2, 1), now), 2);
        session.track(2, ScrollState::new(&search(2, 2), now), 2);
        assert_eq!(session.len(), 2);
        assert_eq!(session.get(2).unwrap().page, 2);
    }

    #[test]
    fn session_round_trips_through_store() {
        let store = MemorySessionStore::new();
        assert!(ScrollerSession::load(&store).unwrap().is_empty());

        let mut session = ScrollerSession::default();
        session.track(7, ScrollState::new(&search(7, 1), Utc::now()), 10);
        session.save(&store).unwrap();

        let raw = store.get(SESSION_KEY).unwrap().unwrap();
        assert!(raw.contains("\"currIds\""));
        assert_eq!(ScrollerSession::load(&store).unwrap(), session);
    }

    #[test]
    fn corrupt_session_is_an_error() {
        let store = MemorySessionStore::new();
        store.set(SESSION_KEY, "not json".to_string()).unwrap();
        assert!(ScrollerSession::load(&store).is_err());
    }
}
