use crate::config::ScrollerConfig;
use crate::error::{Result, ScrollerError};
use crate::record::{RecordId, ScrollData};
use crate::search::{ExecutedSearch, SearchHandle, SearchId, SearchMemory, SearchRestorer};
use crate::session::{ScrollState, ScrollerSession, SessionStore};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Previous/next navigation over the last executed search.
pub struct ResultScroller {
    config: ScrollerConfig,
    session: Arc<dyn SessionStore>,
    restorer: Arc<dyn SearchRestorer>,
    memory: Arc<dyn SearchMemory>,
    // One navigation at a time per session.
    lock: Mutex<()>,
}

/// How a navigation moved the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Movement {
    /// Same page; adjacent pages may have been cached.
    Stay,
    /// `page` changed; the search URL must be remembered again.
    Moved,
}

impl ResultScroller {
    pub fn new(
        config: ScrollerConfig,
        session: Arc<dyn SessionStore>,
        restorer: Arc<dyn SearchRestorer>,
        memory: Arc<dyn SearchMemory>,
    ) -> Self {
        Self {
            config,
            session,
            restorer,
            memory,
            lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ScrollerConfig {
        &self.config
    }

    /// Start tracking a freshly executed search.
    ///
    /// Returns whether the displayed page had any records. Does nothing when
    /// disabled or when the search found nothing.
    pub fn init(&self, search: &ExecutedSearch) -> bool {
        if !self.config.enabled || search.total == 0 {
            return false;
        }
        match self.try_init(search) {
            Ok(tracked) => tracked,
            Err(err) => {
                warn!(search_id = search.search_id, "Result scroller init failed: {}", err);
                false
            }
        }
    }

    /// Navigation data for the displayed record; empty when unavailable.
    pub fn get_scroll_data(&self, current: &RecordId) -> ScrollData {
        if !self.config.enabled {
            return ScrollData::default();
        }
        match self.try_scroll(current) {
            Ok(data) => data,
            Err(err) => {
                warn!(record = %current, "Result scroller unavailable: {}", err);
                ScrollData::default()
            }
        }
    }

    fn try_init(&self, search: &ExecutedSearch) -> Result<bool> {
        let _guard = self.lock.lock().map_err(|_| ScrollerError::LockPoisoned)?;
        let mut session = match ScrollerSession::load(self.session.as_ref()) {
            Ok(session) => session,
            Err(err) => {
                warn!("Discarding scroller session data: {}", err);
                ScrollerSession::default()
            }
        };
        let state = ScrollState::new(search, Utc::now());
        let tracked = !state.curr_ids.is_empty();
        session.track(search.search_id, state, self.config.max_tracked_searches);
        session.save(self.session.as_ref())?;
        debug!(
            search_id = search.search_id,
            page = search.page,
            total = search.total,
            "Result scroller initialised"
        );
        Ok(tracked)
    }

    fn try_scroll(&self, current: &RecordId) -> Result<ScrollData> {
        let _guard = self.lock.lock().map_err(|_| ScrollerError::LockPoisoned)?;
        let Some(search_id) = self.memory.last_search_id() else {
            return Ok(ScrollData::default());
        };
        let mut session = ScrollerSession::load(self.session.as_ref())?;
        let Some(mut state) = session.get(search_id).cloned() else {
            return Ok(ScrollData::default());
        };
        let mut search = self
            .restorer
            .restore(search_id)?
            .ok_or(ScrollerError::SearchNotRestored(search_id))?;
        search.set_limit(state.limit);
        search.set_sort(state.sort.as_deref());

        let (data, movement) = navigate(&mut state, search.as_mut(), current)?;

        // Commit: persist the window, then remember the search URL once.
        state.last_access = Utc::now();
        let page = state.page;
        session.update(search_id, state);
        session.save(self.session.as_ref())?;
        if movement == Movement::Moved {
            self.remember(search.as_mut(), search_id, page)?;
        }
        Ok(data)
    }

    fn remember(&self, search: &mut dyn SearchHandle, search_id: SearchId, page: usize) -> Result<()> {
        search.set_page(page);
        let url = search.url();
        debug!(search_id, page, url = %url, "Remembering search page");
        self.memory.remember_search(&url, search_id)?;
        Ok(())
    }
}

fn fetch_page(search: &mut dyn SearchHandle, page: usize) -> Result<Vec<RecordId>> {
    search.set_page(page);
    Ok(search.execute()?)
}

/// Locate `current` in the window, fetching and sliding as needed.
fn navigate(
    state: &mut ScrollState,
    search: &mut dyn SearchHandle,
    current: &RecordId,
) -> Result<(ScrollData, Movement)> {
    let mut data = ScrollData {
        result_total: Some(state.total),
        ..ScrollData::default()
    };

    if state.first_last {
        if state.first_id.is_none() {
            state.first_id = fetch_page(search, 1)?.into_iter().next();
        }
        if state.last_id.is_none() {
            state.last_id = fetch_page(search, state.last_page())?.pop();
        }
        data.first_record = state.first_id.clone();
        data.last_record = state.last_id.clone();
    }

    if let Some(pos) = state.curr_ids.iter().position(|id| id == current) {
        data.current_position = Some(state.position(pos));
        let count = state.curr_ids.len();
        if pos > 0 {
            data.previous_record = state.curr_ids.get(pos - 1).cloned();
        } else {
            if state.page > 1 && state.prev_ids.is_none() {
                state.prev_ids = Some(fetch_page(search, state.page - 1)?);
            }
            data.previous_record = state.prev_ids.as_ref().and_then(|ids| ids.last().cloned());
        }
        if pos + 1 < count {
            data.next_record = state.curr_ids.get(pos + 1).cloned();
        } else {
            if state.page < state.last_page() && state.next_ids.is_none() {
                state.next_ids = Some(fetch_page(search, state.page + 1)?);
            }
            data.next_record = state.next_ids.as_ref().and_then(|ids| ids.first().cloned());
        }
        return Ok((data, Movement::Stay));
    }

    if slide(state, search, current, &mut data)? {
        return Ok((data, Movement::Moved));
    }

    if state.first_last {
        if data.first_record.as_ref() == Some(current) {
            jump_to_first_record(state, search, &mut data)?;
            return Ok((data, Movement::Moved));
        }
        if data.last_record.as_ref() == Some(current) {
            jump_to_last_record(state, search, &mut data)?;
            return Ok((data, Movement::Moved));
        }
    }

    // A neighbour handed out after a slide may sit on a page that was not kept.
    if fetch_uncached_neighbours(state, search)? && slide(state, search, current, &mut data)? {
        return Ok((data, Movement::Moved));
    }

    debug!(record = %current, page = state.page, "Record not in navigation window");
    Ok((data, Movement::Stay))
}

/// Slide onto whichever cached adjacent page holds `current`.
fn slide(
    state: &mut ScrollState,
    search: &mut dyn SearchHandle,
    current: &RecordId,
    data: &mut ScrollData,
) -> Result<bool> {
    if let Some(pos) = find_in(&state.prev_ids, current) {
        slide_to_previous_page(state, search, pos, data)?;
        return Ok(true);
    }
    if let Some(pos) = find_in(&state.next_ids, current) {
        slide_to_next_page(state, search, pos, data)?;
        return Ok(true);
    }
    Ok(false)
}

/// Fill in missing adjacent pages; returns whether anything was fetched.
fn fetch_uncached_neighbours(state: &mut ScrollState, search: &mut dyn SearchHandle) -> Result<bool> {
    let mut fetched = false;
    if state.page > 1 && state.prev_ids.is_none() {
        state.prev_ids = Some(fetch_page(search, state.page - 1)?);
        fetched = true;
    }
    if state.page < state.last_page() && state.next_ids.is_none() {
        state.next_ids = Some(fetch_page(search, state.page + 1)?);
        fetched = true;
    }
    Ok(fetched)
}

fn find_in(ids: &Option<Vec<RecordId>>, current: &RecordId) -> Option<usize> {
    ids.as_ref()?.iter().position(|id| id == current)
}

/// `prev_ids` become current; the old current page becomes `next_ids`.
///
/// When the record opens its new page, the page before is read for its
/// neighbour but not cached, so `prev_ids` stays empty.
fn slide_to_previous_page(
    state: &mut ScrollState,
    search: &mut dyn SearchHandle,
    pos: usize,
    data: &mut ScrollData,
) -> Result<()> {
    state.page -= 1;
    let previous_page = state.prev_ids.take().unwrap_or_default();
    state.next_ids = Some(std::mem::replace(&mut state.curr_ids, previous_page));

    data.previous_record = if pos > 0 {
        state.curr_ids.get(pos - 1).cloned()
    } else if state.page > 1 {
        fetch_page(search, state.page - 1)?.pop()
    } else {
        None
    };
    data.next_record = state
        .curr_ids
        .get(pos + 1)
        .or_else(|| state.next_ids.as_ref().and_then(|ids| ids.first()))
        .cloned();
    data.current_position = Some(state.position(pos));
    Ok(())
}

/// `next_ids` become current; the old current page becomes `prev_ids`.
///
/// When the record closes its new page, the page after is read for its
/// neighbour but not cached, so `next_ids` stays empty.
fn slide_to_next_page(
    state: &mut ScrollState,
    search: &mut dyn SearchHandle,
    pos: usize,
    data: &mut ScrollData,
) -> Result<()> {
    state.page += 1;
    let next_page = state.next_ids.take().unwrap_or_default();
    state.prev_ids = Some(std::mem::replace(&mut state.curr_ids, next_page));

    data.previous_record = if pos > 0 {
        state.curr_ids.get(pos - 1).cloned()
    } else {
        state.prev_ids.as_ref().and_then(|ids| ids.last().cloned())
    };
    data.next_record = match state.curr_ids.get(pos + 1) {
        Some(id) => Some(id.clone()),
        None if state.page < state.last_page() => {
            fetch_page(search, state.page + 1)?.into_iter().next()
        }
        None => None,
    };
    data.current_position = Some(state.position(pos));
    Ok(())
}

fn jump_to_first_record(
    state: &mut ScrollState,
    search: &mut dyn SearchHandle,
    data: &mut ScrollData,
) -> Result<()> {
    state.page = 1;
    state.curr_ids = fetch_page(search, 1)?;
    state.next_ids = if state.last_page() > 1 {
        Some(fetch_page(search, 2)?)
    } else {
        Some(Vec::new())
    };
    state.prev_ids = None;

    data.previous_record = None;
    data.next_record = state
        .curr_ids
        .get(1)
        .or_else(|| state.next_ids.as_ref().and_then(|ids| ids.first()))
        .cloned();
    data.current_position = Some(1);
    Ok(())
}

fn jump_to_last_record(
    state: &mut ScrollState,
    search: &mut dyn SearchHandle,
    data: &mut ScrollData,
) -> Result<()> {
    state.page = state.last_page();
    state.curr_ids = fetch_page(search, state.page)?;
    state.prev_ids = if state.page > 1 {
        Some(fetch_page(search, state.page - 1)?)
    } else {
        None
    };
    state.next_ids = None;

    let count = state.curr_ids.len();
    data.next_record = None;
    data.previous_record = if count > 1 {
        state.curr_ids.get(count - 2).cloned()
    } else {
        state.prev_ids.as_ref().and_then(|ids| ids.last().cloned())
    };
    data.current_position = Some((state.page - 1) * state.page_size() + count.max(1));
    Ok(())
}
