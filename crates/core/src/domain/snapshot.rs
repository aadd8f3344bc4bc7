// Aggregation Snapshot + summary feed messages

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Point-in-time mapping of queue name to member count
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregationSnapshot(BTreeMap<String, i64>);

impl AggregationSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, queue_name: impl Into<String>, count: i64) {
        self.0.insert(queue_name.into(), count);
    }

    pub fn count(&self, queue_name: &str) -> Option<i64> {
        self.0.get(queue_name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn total(&self) -> i64 {
        self.0.values().sum()
    }
}

impl FromIterator<(String, i64)> for AggregationSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One message on the summary feed
///
/// Serialized as the bare snapshot object, or `{"error": "..."}` when the
/// tick's store read failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SummaryMessage {
    Error { error: String },
    Snapshot(AggregationSnapshot),
}

impl SummaryMessage {
    pub fn is_error(&self) -> bool {
        matches!(self, SummaryMessage::Error { .. })
    }
}

impl From<AggregationSnapshot> for SummaryMessage {
    fn from(snapshot: AggregationSnapshot) -> Self {
        SummaryMessage::Snapshot(snapshot)
    }
}
