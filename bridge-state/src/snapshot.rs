//! The durable aggregate of all mutable bridge state.

use serde::{Deserialize, Serialize};
use topic_router::{DeviceDirectory, SubscriptionRequest, SubscriptionTable, Topic};

use crate::history::HistoryCache;
use crate::publications::PublicationRegistry;

/// Version tag written into every snapshot.
pub const STATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version tag of a state that was never saved.
pub const UNSAVED_VERSION: &str = "0.0.0";

/// Everything the engine needs to survive a restart.
///
/// `subscriptions` mirrors the key order of `subscribe`; use
/// [`BridgeState::install_table`] to replace both together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeState {
    #[serde(default = "unsaved_version")]
    pub version: String,
    /// `host:port` of the hub, empty until the first subscribe request
    #[serde(default)]
    pub callback: String,
    #[serde(default)]
    pub subscriptions: Vec<Topic>,
    #[serde(default)]
    pub subscribe: SubscriptionTable,
    #[serde(default)]
    pub publications: PublicationRegistry,
    #[serde(default)]
    pub history: HistoryCache,
    #[serde(default, rename = "lastHubSubscribeRequest")]
    pub last_hub_request: Option<SubscriptionRequest>,
    #[serde(default)]
    pub devices: DeviceDirectory,
}

fn unsaved_version() -> String {
    UNSAVED_VERSION.to_string()
}

impl Default for BridgeState {
    fn default() -> Self {
        Self {
            version: unsaved_version(),
            callback: String::new(),
            subscriptions: Vec::new(),
            subscribe: SubscriptionTable::new(),
            publications: PublicationRegistry::new(),
            history: HistoryCache::new(),
            last_hub_request: None,
            devices: DeviceDirectory::new(),
        }
    }
}

impl BridgeState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the subscription table and its topic list, returning the
    /// previous topic list.
    pub fn install_table(&mut self, table: SubscriptionTable) -> Vec<Topic> {
        let previous = std::mem::replace(&mut self.subscriptions, table.topics().to_vec());
        self.subscribe = table;
        previous
    }

    /// Whether a hub callback address is known
    pub fn has_callback(&self) -> bool {
        !self.callback.is_empty()
    }

    /// Re-derive the topic list from the table after loading from disk.
    pub(crate) fn normalize(&mut self) {
        if self.subscriptions.as_slice() != self.subscribe.topics() {
            tracing::debug!(
                stored = self.subscriptions.len(),
                table = self.subscribe.len(),
                "Stored topic list disagrees with subscription table, using table keys"
            );
            self.subscriptions = self.subscribe.topics().to_vec();
        }
    }

    /// Key-list summary for operational inspection.
    pub fn summary(&self) -> StateSummary {
        StateSummary {
            version: self.version.clone(),
            callback: self.callback.clone(),
            subscriptions: self.subscriptions.clone(),
            subscribe: self.subscribe.topics().to_vec(),
            publications: self.publications.topics().cloned().collect(),
            history: self.history.clone(),
            last_hub_request: self.last_hub_request.clone(),
            devices: self.devices.device_names().map(str::to_string).collect(),
        }
    }
}

/// The state with large maps reduced to their key lists; the history is
/// kept whole. Never read back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSummary {
    pub version: String,
    pub callback: String,
    pub subscriptions: Vec<Topic>,
    pub subscribe: Vec<Topic>,
    pub publications: Vec<Topic>,
    pub history: HistoryCache,
    #[serde(rename = "lastHubSubscribeRequest")]
    pub last_hub_request: Option<SubscriptionRequest>,
    pub devices: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use topic_router::NamingConvention;

    fn lamp_table() -> SubscriptionTable {
        let request = SubscriptionRequest::new().with("switch", &["Lamp"]);
        SubscriptionTable::build(
            &request,
            &DeviceDirectory::new(),
            &NamingConvention::new("/st").with_suffixes("", "command", "set_state"),
        )
    }

    #[test]
    fn test_default_state_is_empty() {
        let state = BridgeState::default();
        assert_eq!(state.version, UNSAVED_VERSION);
        assert!(!state.has_callback());
        assert!(state.subscribe.is_empty());
        assert!(state.history.is_empty());
        assert!(state.last_hub_request.is_none());
    }

    #[test]
    fn test_install_table_keeps_topic_list_in_sync() {
        let mut state = BridgeState::new();
        let previous = state.install_table(lamp_table());
        assert!(previous.is_empty());
        assert_eq!(state.subscriptions.as_slice(), state.subscribe.topics());

        let previous = state.install_table(SubscriptionTable::new());
        assert_eq!(previous.len(), 2);
        assert!(state.subscriptions.is_empty());
    }

    #[test]
    fn test_serialized_layout_uses_document_keys() {
        let mut state = BridgeState::new();
        state.install_table(lamp_table());
        state.last_hub_request = Some(SubscriptionRequest::new().with("switch", &["Lamp"]));

        let value = serde_json::to_value(&state).unwrap();
        for key in [
            "version",
            "callback",
            "subscriptions",
            "subscribe",
            "publications",
            "history",
            "lastHubSubscribeRequest",
            "devices",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(value["lastHubSubscribeRequest"]["switch"][0], "Lamp");
    }

    #[test]
    fn test_partial_document_loads_with_defaults() {
        let state: BridgeState =
            serde_json::from_str(r#"{"callback": "192.168.1.20:39500"}"#).unwrap();
        assert_eq!(state.callback, "192.168.1.20:39500");
        assert_eq!(state.version, UNSAVED_VERSION);
        assert!(state.subscriptions.is_empty());
    }

    #[test]
    fn test_summary_reduces_maps_to_keys() {
        let mut state = BridgeState::new();
        state.install_table(lamp_table());
        state
            .publications
            .record(&Topic::from("/st/Lamp/switch"), "Lamp", "switch", "on");
        state.history.record("/st/Lamp/switch", "on");

        let summary = state.summary();
        assert_eq!(summary.history, state.history);
        assert_eq!(summary.subscribe, state.subscriptions);
        assert_eq!(summary.publications, vec![Topic::from("/st/Lamp/switch")]);
        assert!(summary.devices.is_empty());
    }
}
