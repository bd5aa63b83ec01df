//! Record-to-record navigation across paged search results.
//!
//! [`ResultScroller`] remembers the page of record ids a search produced and
//! answers "what comes before and after this record" while the user pages
//! through records one at a time. At most three pages are held at once (the
//! current page and its lazily fetched neighbours); the window slides when
//! the displayed record turns out to live on an adjacent page.
//!
//! Navigation never fails loudly: any problem yields an empty [`ScrollData`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use finna_scroller::{MemorySessionStore, ResultScroller, ScrollerConfig};
//! use std::sync::Arc;
//!
//! let scroller = ResultScroller::new(
//!     ScrollerConfig::default(),
//!     Arc::new(MemorySessionStore::new()),
//!     restorer,
//!     search_memory,
//! );
//! scroller.init(&executed_search);
//! let data = scroller.get_scroll_data(&RecordId::new("Solr", "123"));
//! ```

mod config;
mod error;
mod record;
mod scroller;
mod search;
mod session;

pub use config::ScrollerConfig;
pub use error::ScrollerError;
pub use record::{RecordId, ScrollData};
pub use scroller::ResultScroller;
pub use search::{ExecutedSearch, SearchHandle, SearchId, SearchMemory, SearchRestorer};
pub use session::{MemorySessionStore, ScrollState, ScrollerSession, SessionStore, SESSION_KEY};
