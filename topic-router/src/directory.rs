//! Device directory: per-device topic overrides.
//!
//! The directory is loaded from external configuration once per subscribe
//! cycle and is immutable during a cycle. A device listed here uses the
//! configured topics instead of the naming convention.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;
use crate::topic::Topic;

/// Value translation and options for one configured topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicBinding {
    /// Maps a source value to the value sent on the other side
    #[serde(default, rename = "command", skip_serializing_if = "BTreeMap::is_empty")]
    pub value_map: BTreeMap<String, String>,
}

impl TopicBinding {
    /// Translate a value, passing unmapped values through
    pub fn translate<'a>(&'a self, value: &'a str) -> &'a str {
        self.value_map.get(value).map(String::as_str).unwrap_or(value)
    }
}

/// Topics configured for one attribute, keyed by topic.
pub type AttributeTopics = BTreeMap<Topic, TopicBinding>;

/// Static configuration of a single device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Overrides the global retain flag for this device's publications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retain: Option<bool>,
    /// attribute → topics the bridge publishes to when the hub changes it
    #[serde(default)]
    pub publish: BTreeMap<String, AttributeTopics>,
    /// attribute → topics the bridge subscribes to for inbound changes
    #[serde(default)]
    pub subscribe: BTreeMap<String, AttributeTopics>,
}

/// All device entries, keyed by device name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceDirectory {
    devices: BTreeMap<String, DeviceEntry>,
}

impl DeviceDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a directory from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DirectoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| DirectoryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a directory, falling back to an empty one on any error.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(directory) => {
                directory.log_bindings();
                directory
            }
            Err(e) => {
                tracing::warn!(error = %e, "Device directory unavailable, continuing without it");
                Self::new()
            }
        }
    }

    /// Parse a directory from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let mut directory: Self = toml::from_str(content)?;
        directory.drop_invalid_filters();
        Ok(directory)
    }

    /// Insert or replace a device entry
    pub fn insert(&mut self, device: impl Into<String>, entry: DeviceEntry) {
        self.devices.insert(device.into(), entry);
    }

    /// Look up a device entry
    pub fn get(&self, device: &str) -> Option<&DeviceEntry> {
        self.devices.get(device)
    }

    /// Whether the device has any directory entry
    pub fn contains(&self, device: &str) -> bool {
        self.devices.contains_key(device)
    }

    /// Inbound topics configured for a device attribute.
    ///
    /// Returns `None` when the device has no entry or no `subscribe`
    /// mapping for the attribute.
    pub fn subscribe_topics(&self, device: &str, attribute: &str) -> Option<&AttributeTopics> {
        self.devices.get(device)?.subscribe.get(attribute)
    }

    /// Outbound topics configured for a device attribute
    pub fn publish_topics(&self, device: &str, attribute: &str) -> Option<&AttributeTopics> {
        self.devices.get(device)?.publish.get(attribute)
    }

    /// Retain flag override for a device
    pub fn retain(&self, device: &str) -> Option<bool> {
        self.devices.get(device)?.retain
    }

    /// Names of all configured devices
    pub fn device_names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    /// Number of configured devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device is configured
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    fn drop_invalid_filters(&mut self) {
        for (device, entry) in self.devices.iter_mut() {
            for (attribute, topics) in entry.subscribe.iter_mut() {
                topics.retain(|topic, _| match topic.validate_filter() {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(
                            device = %device,
                            attribute = %attribute,
                            error = %e,
                            "Ignoring invalid subscription topic in device directory"
                        );
                        false
                    }
                });
            }
        }
    }

    fn log_bindings(&self) {
        for (device, entry) in &self.devices {
            for (attribute, topics) in &entry.subscribe {
                for (topic, binding) in topics {
                    tracing::info!(
                        device = %device,
                        attribute = %attribute,
                        topic = %topic,
                        mapped_values = binding.value_map.len(),
                        "Directory subscription"
                    );
                }
            }
        }
    }
}
