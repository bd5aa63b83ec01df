use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite record identifier, `source|id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(source: &str, id: &str) -> Self {
        Self(format!("{}|{}", source, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Backend part (`Solr`, `Primo`, ...).
    pub fn source(&self) -> &str {
        self.0.split_once('|').map_or("", |(source, _)| source)
    }

    /// Record id within its backend.
    pub fn id(&self) -> &str {
        self.0.split_once('|').map_or(self.0.as_str(), |(_, id)| id)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Navigation data for the displayed record. Unresolvable fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollData {
    pub first_record: Option<RecordId>,
    pub last_record: Option<RecordId>,
    pub previous_record: Option<RecordId>,
    pub next_record: Option<RecordId>,
    /// 1-based position within the whole result set.
    pub current_position: Option<usize>,
    /// Result count captured at initialisation; may be stale.
    pub result_total: Option<usize>,
}

impl ScrollData {
    /// True when nothing could be resolved ("scrolling unavailable").
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
