//! Subscription table: which device attribute each subscribed topic feeds.
//!
//! The table is rebuilt from scratch on every hub subscribe request. Its key
//! set, in insertion order, is the topic list the broker is subscribed to.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::convention::{Direction, NamingConvention};
use crate::directory::DeviceDirectory;
use crate::topic::Topic;

/// The hub's declared interest: attribute → device names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionRequest {
    attributes: BTreeMap<String, Vec<String>>,
}

impl SubscriptionRequest {
    /// Create an empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper adding devices for an attribute
    pub fn with(mut self, attribute: impl Into<String>, devices: &[&str]) -> Self {
        self.attributes
            .entry(attribute.into())
            .or_default()
            .extend(devices.iter().map(|d| d.to_string()));
        self
    }

    /// Iterate `(attribute, device)` pairs in request order
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().flat_map(|(attribute, devices)| {
            devices
                .iter()
                .map(move |device| (attribute.as_str(), device.as_str()))
        })
    }

    /// Whether the request names no devices at all
    pub fn is_empty(&self) -> bool {
        self.attributes.values().all(Vec::is_empty)
    }
}

impl From<BTreeMap<String, Vec<String>>> for SubscriptionRequest {
    fn from(attributes: BTreeMap<String, Vec<String>>) -> Self {
        Self { attributes }
    }
}

/// Where a subscription binding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingOrigin {
    /// Topic configured in the device directory
    Directory,
    /// Topic generated by the naming convention
    Convention(Direction),
}

/// What a message on a subscribed topic translates to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionEntry {
    pub device: String,
    pub attribute: String,
    /// Inbound value translation, only present for directory bindings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_map: Option<BTreeMap<String, String>>,
    pub origin: BindingOrigin,
}

impl SubscriptionEntry {
    /// Binding generated by the naming convention
    pub fn convention(device: &str, attribute: &str, direction: Direction) -> Self {
        Self {
            device: device.to_string(),
            attribute: attribute.to_string(),
            value_map: None,
            origin: BindingOrigin::Convention(direction),
        }
    }

    /// Binding configured in the device directory
    pub fn directory(
        device: &str,
        attribute: &str,
        value_map: Option<BTreeMap<String, String>>,
    ) -> Self {
        Self {
            device: device.to_string(),
            attribute: attribute.to_string(),
            value_map,
            origin: BindingOrigin::Directory,
        }
    }

    /// Whether the binding comes from the device directory
    pub fn is_directory(&self) -> bool {
        matches!(self.origin, BindingOrigin::Directory)
    }

    /// Whether messages on this binding are commands for the hub.
    ///
    /// Directory bindings and convention command topics are commands;
    /// convention write-state topics are state reports.
    pub fn is_command(&self) -> bool {
        match self.origin {
            BindingOrigin::Directory => true,
            BindingOrigin::Convention(direction) => direction != Direction::WriteState,
        }
    }

    /// Translate an inbound payload through the value map, if any
    pub fn translate<'a>(&'a self, payload: &'a str) -> &'a str {
        self.value_map
            .as_ref()
            .and_then(|map| map.get(payload))
            .map(String::as_str)
            .unwrap_or(payload)
    }

    fn same_binding(&self, other: &SubscriptionEntry) -> bool {
        self.device == other.device && self.attribute == other.attribute
    }
}

/// Topic → bindings, plus the ordered topic list derived from its keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionTable {
    topics: Vec<Topic>,
    bindings: BTreeMap<Topic, Vec<SubscriptionEntry>>,
}

impl SubscriptionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh table from a hub request.
    ///
    /// Per requested device: a directory `subscribe` mapping for the
    /// attribute supersedes the convention; otherwise the command and
    /// write-state convention topics are bound. Building twice from the same
    /// inputs yields equal tables.
    pub fn build(
        request: &SubscriptionRequest,
        directory: &DeviceDirectory,
        convention: &NamingConvention,
    ) -> Self {
        let mut table = Self::new();

        for (attribute, device) in request.pairs() {
            match directory.subscribe_topics(device, attribute) {
                Some(topics) => {
                    for (topic, binding) in topics {
                        let value_map =
                            (!binding.value_map.is_empty()).then(|| binding.value_map.clone());
                        tracing::debug!(topic = %topic, device, attribute, "Subscribing [directory]");
                        table.insert(
                            topic.clone(),
                            SubscriptionEntry::directory(device, attribute, value_map),
                        );
                    }
                }
                None => {
                    for direction in [Direction::Command, Direction::WriteState] {
                        let topic = convention.resolve(device, attribute, direction);
                        tracing::debug!(topic = %topic, device, attribute, "Subscribing [convention]");
                        table.insert(topic, SubscriptionEntry::convention(device, attribute, direction));
                    }
                }
            }
        }

        table
    }

    /// Bind an entry to a topic.
    ///
    /// A topic keeps one binding per device/attribute pair; the first
    /// binding wins, so identical command and write-state topics resolve as
    /// commands.
    pub fn insert(&mut self, topic: Topic, entry: SubscriptionEntry) {
        if !self.bindings.contains_key(&topic) {
            self.topics.push(topic.clone());
        }
        let entries = self.bindings.entry(topic).or_default();
        if !entries.iter().any(|existing| existing.same_binding(&entry)) {
            entries.push(entry);
        }
    }

    /// Subscribed topics in insertion order
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Bindings for an exact subscription topic
    pub fn entries(&self, topic: &str) -> &[SubscriptionEntry] {
        self.bindings.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the exact topic is a key of the table
    pub fn contains(&self, topic: &str) -> bool {
        self.bindings.contains_key(topic)
    }

    /// Every subscription topic that equals or wildcard-matches `topic`.
    ///
    /// All matches are returned in topic-list order, not just the first.
    pub fn resolve_incoming(&self, topic: &str) -> Vec<&Topic> {
        self.topics
            .iter()
            .filter(|subscribed| subscribed.matches(topic))
            .collect()
    }

    /// Number of subscribed topics
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Whether nothing is subscribed
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convention() -> NamingConvention {
        NamingConvention::new("/smartthings").with_suffixes("", "command", "set_state")
    }

    fn directory() -> DeviceDirectory {
        DeviceDirectory::from_toml(
            r#"
            ["Garage Door".subscribe.door."garage/door/state"]
            command = { OPEN = "open" }
            ["Garage Door".subscribe.door."garage/+/state"]
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_build_convention_topics() {
        let request = SubscriptionRequest::new().with("switch", &["Lamp"]);
        let table = SubscriptionTable::build(&request, &DeviceDirectory::new(), &convention());

        let topics: Vec<&str> = table.topics().iter().map(Topic::as_str).collect();
        assert_eq!(
            topics,
            vec!["/smartthings/Lamp/switch/command", "/smartthings/Lamp/switch/set_state"]
        );

        let command = &table.entries("/smartthings/Lamp/switch/command")[0];
        assert_eq!(command.device, "Lamp");
        assert_eq!(command.attribute, "switch");
        assert!(command.value_map.is_none());
        assert!(command.is_command());

        let write = &table.entries("/smartthings/Lamp/switch/set_state")[0];
        assert!(!write.is_command());
    }

    #[test]
    fn test_directory_supersedes_convention() {
        let request = SubscriptionRequest::new()
            .with("door", &["Garage Door"])
            .with("switch", &["Garage Door"]);
        let table = SubscriptionTable::build(&request, &directory(), &convention());

        assert!(table.contains("garage/door/state"));
        assert!(table.contains("garage/+/state"));
        assert!(!table.contains("/smartthings/Garage Door/door/command"));

        // No subscribe mapping for `switch`, so the convention applies
        assert!(table.contains("/smartthings/Garage Door/switch/command"));

        let entry = &table.entries("garage/door/state")[0];
        assert!(entry.is_directory());
        assert_eq!(entry.translate("OPEN"), "open");
        assert_eq!(entry.translate("STOPPED"), "STOPPED");
        assert!(table.entries("garage/+/state")[0].value_map.is_none());
    }

    #[test]
    fn test_shared_topic_keeps_every_binding() {
        let directory = DeviceDirectory::from_toml(
            r#"
            ["Hall Light".subscribe.switch."zigbee/hall/state"]
            ["Hall Sensor".subscribe.motion."zigbee/hall/state"]
            "#,
        )
        .unwrap();
        let request = SubscriptionRequest::new()
            .with("switch", &["Hall Light"])
            .with("motion", &["Hall Sensor"]);
        let table = SubscriptionTable::build(&request, &directory, &convention());

        assert_eq!(table.len(), 1);
        assert_eq!(table.entries("zigbee/hall/state").len(), 2);
    }

    #[test]
    fn test_identical_direction_topics_collapse() {
        let request = SubscriptionRequest::new().with("switch", &["Lamp"]);
        let table = SubscriptionTable::build(
            &request,
            &DeviceDirectory::new(),
            &NamingConvention::default(),
        );

        assert_eq!(table.topics(), &[Topic::from("/smartthings/Lamp/switch")]);
        let entries = table.entries("/smartthings/Lamp/switch");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_command());
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let request = SubscriptionRequest::new()
            .with("switch", &["Lamp", "Fan", "Garage Door"])
            .with("door", &["Garage Door"])
            .with("level", &["Lamp"]);
        let first = SubscriptionTable::build(&request, &directory(), &convention());
        let second = SubscriptionTable::build(&request, &directory(), &convention());
        assert_eq!(first, second);
        assert_eq!(first.topics(), second.topics());
    }

    #[test]
    fn test_table_keys_match_topic_list() {
        let request = SubscriptionRequest::new()
            .with("switch", &["Lamp", "Fan"])
            .with("door", &["Garage Door"]);
        let table = SubscriptionTable::build(&request, &directory(), &convention());

        for topic in table.topics() {
            assert!(table.contains(topic.as_str()));
        }
        assert_eq!(table.bindings.len(), table.topics().len());
    }

    #[test]
    fn test_resolve_incoming_returns_all_matches() {
        let request = SubscriptionRequest::new().with("door", &["Garage Door"]);
        let table = SubscriptionTable::build(&request, &directory(), &convention());

        let matched: Vec<&str> = table
            .resolve_incoming("garage/door/state")
            .into_iter()
            .map(Topic::as_str)
            .collect();
        assert_eq!(matched, vec!["garage/+/state", "garage/door/state"]);

        let matched = table.resolve_incoming("garage/window/state");
        assert_eq!(matched, vec![&Topic::from("garage/+/state")]);

        assert!(table.resolve_incoming("garage/door/set").is_empty());
    }

    #[test]
    fn test_request_round_trips_as_plain_map() {
        let request: SubscriptionRequest =
            toml::from_str("switch = [\"Lamp\", \"Fan\"]\nlevel = [\"Lamp\"]").unwrap();
        let pairs: Vec<(&str, &str)> = request.pairs().collect();
        assert_eq!(pairs, vec![("level", "Lamp"), ("switch", "Lamp"), ("switch", "Fan")]);
        assert!(!request.is_empty());
        assert!(SubscriptionRequest::new().is_empty());
    }
}
