//! Last observed value per topic, shared by both directions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use topic_router::Topic;

/// Topic → last observed value.
///
/// Used to deduplicate repeated broker messages and for cross-attribute
/// inference between `switch` and `level`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryCache {
    values: BTreeMap<Topic, String>,
}

impl HistoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value seen on a topic
    pub fn get(&self, topic: &str) -> Option<&str> {
        self.values.get(topic).map(String::as_str)
    }

    /// Last value seen on a topic, parsed as a number
    pub fn numeric(&self, topic: &str) -> Option<f64> {
        self.get(topic)?.trim().parse().ok()
    }

    /// Whether the last value seen on `topic` equals `value`
    pub fn is_same(&self, topic: &str, value: &str) -> bool {
        self.get(topic) == Some(value)
    }

    /// Record a value, returning the previous one
    pub fn record(&mut self, topic: impl Into<Topic>, value: impl Into<String>) -> Option<String> {
        self.values.insert(topic.into(), value.into())
    }

    /// Topics with a recorded value
    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.values.keys()
    }

    /// Number of recorded topics
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
