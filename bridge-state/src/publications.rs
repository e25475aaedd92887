//! Record of topics the bridge itself publishes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use topic_router::Topic;

/// One device attribute publishing to a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub device: String,
    pub attribute: String,
    pub last_value: String,
}

/// Topic → device attributes the bridge published there.
///
/// Every topic in the registry was produced by this bridge for a
/// hub-originated change, never by a device. Inbound messages bound to the
/// same device and attribute on such a topic are echoes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicationRegistry {
    topics: BTreeMap<Topic, Vec<PublicationRecord>>,
}

impl PublicationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a publication, updating the last value of an existing record
    pub fn record(&mut self, topic: &Topic, device: &str, attribute: &str, value: &str) {
        let records = self.topics.entry(topic.clone()).or_default();
        match records
            .iter_mut()
            .find(|r| r.device == device && r.attribute == attribute)
        {
            Some(existing) => existing.last_value = value.to_string(),
            None => records.push(PublicationRecord {
                device: device.to_string(),
                attribute: attribute.to_string(),
                last_value: value.to_string(),
            }),
        }
    }

    /// Whether the bridge published to `topic` for this device attribute
    pub fn contains(&self, topic: &str, device: &str, attribute: &str) -> bool {
        self.records(topic)
            .iter()
            .any(|r| r.device == device && r.attribute == attribute)
    }

    /// Whether the bridge published to `topic` at all
    pub fn is_published(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    /// Records for a topic
    pub fn records(&self, topic: &str) -> &[PublicationRecord] {
        self.topics.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Published topics
    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.topics.keys()
    }

    /// Number of published topics
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Whether nothing has been published
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
