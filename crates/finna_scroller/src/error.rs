use crate::search::SearchId;
use thiserror::Error;

/// Reasons navigation data could not be produced.
///
/// These never reach callers of [`crate::ResultScroller`]; they are logged
/// and turned into an empty [`crate::ScrollData`].
#[derive(Error, Debug)]
pub enum ScrollerError {
    #[error("Search {0} could not be restored")]
    SearchNotRestored(SearchId),

    #[error("Corrupt scroller session data: {0}")]
    CorruptSession(#[from] serde_json::Error),

    #[error("Scroller lock poisoned")]
    LockPoisoned,

    /// Session store, search backend or search memory failure.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ScrollerError>;
