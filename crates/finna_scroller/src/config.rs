use serde::{Deserialize, Serialize};

/// Scroller settings (`[Record] next_prev_navigation`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrollerConfig {
    pub enabled: bool,
    /// Searches tracked per session before the least recently used is evicted.
    pub max_tracked_searches: usize,
}

impl Default for ScrollerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_tracked_searches: 10,
        }
    }
}
