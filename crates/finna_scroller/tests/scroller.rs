//! Navigation tests against an in-memory search backend.

use finna_scroller::{
    ExecutedSearch, MemorySessionStore, RecordId, ResultScroller, ScrollData, ScrollerConfig,
    ScrollerSession, SearchHandle, SearchId, SearchMemory, SearchRestorer, SessionStore,
    SESSION_KEY,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Fakes
// ============================================================================

fn rid(n: usize) -> RecordId {
    RecordId::new("Solr", &n.to_string())
}

struct FakeSearch {
    total: usize,
    limit: usize,
    page: usize,
    fetches: Arc<AtomicUsize>,
}

impl SearchHandle for FakeSearch {
    fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    fn set_sort(&mut self, _sort: Option<&str>) {}

    fn set_page(&mut self, page: usize) {
        self.page = page;
    }

    fn execute(&mut self) -> anyhow::Result<Vec<RecordId>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let start = (self.page - 1) * self.limit;
        Ok((start + 1..=self.total).take(self.limit).map(rid).collect())
    }

    fn url(&self) -> String {
        format!("/Search/Results?lookfor=x&page={}", self.page)
    }
}

struct FakeRestorer {
    search_id: SearchId,
    total: usize,
    fetches: Arc<AtomicUsize>,
}

impl SearchRestorer for FakeRestorer {
    fn restore(&self, search_id: SearchId) -> anyhow::Result<Option<Box<dyn SearchHandle>>> {
        if search_id != self.search_id {
            return Ok(None);
        }
        Ok(Some(Box::new(FakeSearch {
            total: self.total,
            // Persisted searches come back with the default limit.
            limit: 20,
            page: 1,
            fetches: Arc::clone(&self.fetches),
        })))
    }
}

#[derive(Default)]
struct FakeMemory {
    last: Mutex<Option<SearchId>>,
    urls: Mutex<Vec<String>>,
}

impl SearchMemory for FakeMemory {
    fn last_search_id(&self) -> Option<SearchId> {
        *self.last.lock().unwrap()
    }

    fn remember_search(&self, url: &str, search_id: SearchId) -> anyhow::Result<()> {
        *self.last.lock().unwrap() = Some(search_id);
        self.urls.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

struct Harness {
    scroller: ResultScroller,
    store: Arc<MemorySessionStore>,
    memory: Arc<FakeMemory>,
    fetches: Arc<AtomicUsize>,
    total: usize,
    limit: usize,
}

impl Harness {
    fn new(total: usize, limit: usize) -> Self {
        Self::with_config(total, limit, ScrollerConfig::default())
    }

    fn with_config(total: usize, limit: usize, config: ScrollerConfig) -> Self {
        let fetches = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(MemorySessionStore::new());
        let memory = Arc::new(FakeMemory::default());
        let restorer = Arc::new(FakeRestorer {
            search_id: 42,
            total,
            fetches: Arc::clone(&fetches),
        });
        let scroller = ResultScroller::new(config, store.clone(), restorer, memory.clone());
        Self {
            scroller,
            store,
            memory,
            fetches,
            total,
            limit,
        }
    }

    fn page_ids(&self, page: usize) -> Vec<RecordId> {
        let start = (page - 1) * self.limit;
        (start + 1..=self.total).take(self.limit).map(rid).collect()
    }

    /// Display `page` of search 42, as the results page would.
    fn init(&self, page: usize, first_last: bool) -> bool {
        *self.memory.last.lock().unwrap() = Some(42);
        self.scroller.init(&ExecutedSearch {
            search_id: 42,
            page,
            limit: self.limit,
            sort: Some("relevance".to_string()),
            total: self.total,
            first_last_navigation: first_last,
            record_ids: self.page_ids(page),
        })
    }

    fn scroll(&self, n: usize) -> ScrollData {
        self.scroller.get_scroll_data(&rid(n))
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn urls(&self) -> Vec<String> {
        self.memory.urls.lock().unwrap().clone()
    }

    fn session(&self) -> ScrollerSession {
        ScrollerSession::load(self.store.as_ref()).unwrap()
    }
}

// ============================================================================
// init
// ============================================================================

#[test]
fn test_init_tracks_non_empty_page() {
    let h = Harness::new(25, 10);
    assert!(h.init(1, false));

    let session = h.session();
    let state = session.get(42).unwrap();
    assert_eq!(state.page, 1);
    assert_eq!(state.curr_ids, h.page_ids(1));
    assert!(state.prev_ids.is_none());
    assert!(state.next_ids.is_none());
    assert_eq!(h.fetches(), 0);
}

#[test]
fn test_init_ignores_empty_results_and_disabled_scroller() {
    let h = Harness::new(0, 10);
    assert!(!h.init(1, false));
    assert!(h.session().is_empty());

    let config = ScrollerConfig {
        enabled: false,
        ..ScrollerConfig::default()
    };
    let h = Harness::with_config(25, 10, config);
    assert!(!h.init(1, false));
    assert!(h.scroll(1).is_empty());
}

#[test]
fn test_init_replaces_corrupt_session() {
    let h = Harness::new(25, 10);
    h.store.set(SESSION_KEY, "{broken".to_string()).unwrap();
    assert!(h.init(1, false));
    assert_eq!(h.session().len(), 1);
}

#[test]
fn test_tracked_searches_are_bounded() {
    let config = ScrollerConfig {
        enabled: true,
        max_tracked_searches: 2,
    };
    let h = Harness::with_config(25, 10, config);
    for search_id in 1..=3 {
        h.scroller.init(&ExecutedSearch {
            search_id,
            page: 1,
            limit: 10,
            sort: None,
            total: 25,
            first_last_navigation: false,
            record_ids: h.page_ids(1),
        });
    }
    let session = h.session();
    assert_eq!(session.len(), 2);
    assert!(session.get(1).is_none());
    assert!(session.get(3).is_some());
}

// ============================================================================
// Same page
// ============================================================================

#[test]
fn test_interior_record_needs_no_fetch() {
    let h = Harness::new(25, 10);
    h.init(2, false);

    let data = h.scroll(15);
    assert_eq!(data.previous_record, Some(rid(14)));
    assert_eq!(data.next_record, Some(rid(16)));
    assert_eq!(data.current_position, Some(15));
    assert_eq!(data.result_total, Some(25));
    assert_eq!(data.first_record, None);
    assert_eq!(h.fetches(), 0);
    assert!(h.urls().is_empty());
}

#[test]
fn test_page_edges_fetch_adjacent_pages_once() {
    let h = Harness::new(25, 10);
    h.init(2, false);

    let first = h.scroll(11);
    assert_eq!(first.previous_record, Some(rid(10)));
    assert_eq!(first.next_record, Some(rid(12)));
    let last = h.scroll(20);
    assert_eq!(last.previous_record, Some(rid(19)));
    assert_eq!(last.next_record, Some(rid(21)));
    assert_eq!(h.fetches(), 2);

    // Cached from here on.
    assert_eq!(h.scroll(11), first);
    assert_eq!(h.scroll(20), last);
    assert_eq!(h.fetches(), 2);
}

#[test]
fn test_result_edges_have_no_neighbour() {
    let h = Harness::new(25, 10);
    h.init(1, false);
    assert_eq!(h.scroll(1).previous_record, None);
    assert_eq!(h.fetches(), 0);

    h.init(3, false);
    let data = h.scroll(25);
    assert_eq!(data.next_record, None);
    assert_eq!(data.previous_record, Some(rid(24)));
    assert_eq!(data.current_position, Some(25));
    assert_eq!(h.fetches(), 0);
}

#[test]
fn test_repeated_call_is_cached() {
    let h = Harness::new(95, 10);
    h.init(5, true);

    let first = h.scroll(44);
    let fetched = h.fetches();
    assert_eq!(first.first_record, Some(rid(1)));
    assert_eq!(first.last_record, Some(rid(95)));
    assert_eq!(h.scroll(44), first);
    assert_eq!(h.fetches(), fetched);
}

// ============================================================================
// Slides and jumps
// ============================================================================

#[test]
fn test_slide_forward_rotates_window_and_remembers_page() {
    let h = Harness::new(25, 10);
    h.init(1, false);
    h.scroll(10);

    let data = h.scroll(11);
    assert_eq!(data.previous_record, Some(rid(10)));
    assert_eq!(data.next_record, Some(rid(12)));
    assert_eq!(data.current_position, Some(11));

    let session = h.session();
    let state = session.get(42).unwrap();
    assert_eq!(state.page, 2);
    assert_eq!(state.prev_ids.as_deref(), Some(h.page_ids(1).as_slice()));
    assert!(state.next_ids.is_none());
    assert_eq!(h.urls(), vec!["/Search/Results?lookfor=x&page=2".to_string()]);
}

#[test]
fn test_slide_backward_rotates_window() {
    let h = Harness::new(25, 10);
    h.init(3, false);
    h.scroll(21);

    let data = h.scroll(20);
    assert_eq!(data.previous_record, Some(rid(19)));
    assert_eq!(data.next_record, Some(rid(21)));
    assert_eq!(data.current_position, Some(20));

    let session = h.session();
    let state = session.get(42).unwrap();
    assert_eq!(state.page, 2);
    assert!(state.prev_ids.is_none());
    assert_eq!(state.next_ids.as_deref(), Some(h.page_ids(3).as_slice()));
    assert_eq!(h.urls(), vec!["/Search/Results?lookfor=x&page=2".to_string()]);
}

#[test]
fn test_jump_to_first_and_last() {
    let h = Harness::new(95, 10);
    h.init(5, true);

    let data = h.scroll(1);
    assert_eq!(data.current_position, Some(1));
    assert_eq!(data.previous_record, None);
    assert_eq!(data.next_record, Some(rid(2)));
    {
        let session = h.session();
        let state = session.get(42).unwrap();
        assert_eq!(state.page, 1);
        assert!(state.prev_ids.is_none());
        assert_eq!(state.next_ids.as_deref(), Some(h.page_ids(2).as_slice()));
    }

    let data = h.scroll(95);
    assert_eq!(data.current_position, Some(95));
    assert_eq!(data.previous_record, Some(rid(94)));
    assert_eq!(data.next_record, None);
    let session = h.session();
    let state = session.get(42).unwrap();
    assert_eq!(state.page, 10);
    assert_eq!(state.curr_ids, vec![rid(91), rid(92), rid(93), rid(94), rid(95)]);
    assert_eq!(state.prev_ids.as_deref(), Some(h.page_ids(9).as_slice()));
    assert_eq!(
        h.urls(),
        vec![
            "/Search/Results?lookfor=x&page=1".to_string(),
            "/Search/Results?lookfor=x&page=10".to_string(),
        ]
    );
}

#[test]
fn test_page_size_one_resolves_both_neighbours() {
    let h = Harness::new(3, 1);
    h.init(2, false);

    let data = h.scroll(2);
    assert_eq!(data.previous_record, Some(rid(1)));
    assert_eq!(data.next_record, Some(rid(3)));
    assert_eq!(data.current_position, Some(2));
}

#[test]
fn test_page_size_one_resolves_neighbours_after_sliding() {
    let h = Harness::new(5, 1);
    h.init(1, false);
    h.scroll(1);

    let data = h.scroll(2);
    assert_eq!(data.previous_record, Some(rid(1)));
    assert_eq!(data.next_record, Some(rid(3)));
    {
        let session = h.session();
        let state = session.get(42).unwrap();
        assert_eq!(state.page, 2);
        assert!(state.next_ids.is_none());
    }

    // The neighbour from the uncached page is still reachable.
    let data = h.scroll(3);
    assert_eq!(data.previous_record, Some(rid(2)));
    assert_eq!(data.next_record, Some(rid(4)));
    assert_eq!(data.current_position, Some(3));
    assert_eq!(h.session().get(42).unwrap().page, 3);

    let h = Harness::new(5, 1);
    h.init(4, false);
    h.scroll(4);

    let data = h.scroll(3);
    assert_eq!(data.previous_record, Some(rid(2)));
    assert_eq!(data.next_record, Some(rid(4)));
    let session = h.session();
    let state = session.get(42).unwrap();
    assert_eq!(state.page, 3);
    assert!(state.prev_ids.is_none());
}

#[test]
fn test_page_size_one_walks_whole_result_set() {
    let h = Harness::new(4, 1);
    h.init(1, false);
    let mut data = h.scroll(1);
    for n in 2..=4 {
        let next = data.next_record.clone().unwrap();
        assert_eq!(next, rid(n));
        data = h.scroller.get_scroll_data(&next);
        assert_eq!(data.current_position, Some(n));
    }
    assert_eq!(data.next_record, None);
    assert_eq!(h.urls().len(), 3);
}

// ============================================================================
// Unavailable navigation
// ============================================================================

#[test]
fn test_unknown_record_resolves_only_total() {
    let h = Harness::new(25, 10);
    h.init(1, false);
    let data = h.scroll(99);
    assert_eq!(
        data,
        ScrollData {
            result_total: Some(25),
            ..ScrollData::default()
        }
    );
    assert!(h.urls().is_empty());
}

#[test]
fn test_missing_state_or_search_is_empty() {
    let h = Harness::new(25, 10);
    // Nothing remembered yet.
    assert!(h.scroll(1).is_empty());

    // Remembered search with no tracked state.
    *h.memory.last.lock().unwrap() = Some(42);
    assert!(h.scroll(1).is_empty());

    // Tracked search that can no longer be restored.
    h.scroller.init(&ExecutedSearch {
        search_id: 7,
        page: 1,
        limit: 10,
        sort: None,
        total: 25,
        first_last_navigation: false,
        record_ids: h.page_ids(1),
    });
    *h.memory.last.lock().unwrap() = Some(7);
    assert!(h.scroll(1).is_empty());
}

#[test]
fn test_corrupt_session_is_empty() {
    let h = Harness::new(25, 10);
    h.init(1, false);
    h.store.set(SESSION_KEY, "not json".to_string()).unwrap();
    assert!(h.scroll(2).is_empty());
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_position_matches_page_and_offset(
        limit in 1usize..8,
        pages in 1usize..6,
        page_seed in 0usize..100,
        offset_seed in 0usize..100,
    ) {
        let total = limit * pages;
        let page = page_seed % pages + 1;
        let offset = offset_seed % limit;
        let h = Harness::new(total, limit);
        h.init(page, false);

        let n = (page - 1) * limit + offset + 1;
        let data = h.scroll(n);
        prop_assert_eq!(data.current_position, Some(n));
    }

    #[test]
    fn prop_walking_keeps_one_side_after_slide(
        limit in 1usize..5,
        total in 1usize..30,
        steps in proptest::collection::vec(any::<bool>(), 1..40),
    ) {
        let h = Harness::new(total, limit);
        h.init(1, false);
        let mut current = 1usize;
        let mut data = h.scroll(current);
        for forward in steps {
            let target = if forward { data.next_record.clone() } else { data.previous_record.clone() };
            let Some(target) = target else { continue };
            let page_before = h.session().get(42).unwrap().page;
            data = h.scroller.get_scroll_data(&target);
            current = if forward { current + 1 } else { current - 1 };
            prop_assert_eq!(data.current_position, Some(current));

            let session = h.session();
            let state = session.get(42).unwrap();
            if state.page != page_before {
                prop_assert!(state.prev_ids.is_none() != state.next_ids.is_none());
            }
            prop_assert!(state.page >= 1 && state.page <= state.last_page());
        }
    }
}
