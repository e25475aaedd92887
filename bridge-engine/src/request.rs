//! Hub request bodies handed to the engine.

use serde::{Deserialize, Serialize};
use topic_router::SubscriptionRequest;

/// A device attribute changed on the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Device name
    pub name: String,
    /// Attribute name
    #[serde(rename = "type")]
    pub attribute: String,
    pub value: String,
}

impl PushRequest {
    pub fn new(
        name: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// The hub's full set of device attributes it wants reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// attribute → device names
    pub devices: SubscriptionRequest,
    /// `host:port` the hub receives notifications on
    pub callback: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_body_uses_type_key() {
        let request: PushRequest =
            serde_json::from_str(r#"{"name": "Lamp", "type": "switch", "value": "on"}"#).unwrap();
        assert_eq!(request, PushRequest::new("Lamp", "switch", "on"));
    }

    #[test]
    fn test_subscribe_body() {
        let request: SubscribeRequest = serde_json::from_str(
            r#"{"devices": {"switch": ["Lamp", "Fan"]}, "callback": "192.168.1.20:39500"}"#,
        )
        .unwrap();
        assert_eq!(
            request.devices,
            SubscriptionRequest::new().with("switch", &["Lamp", "Fan"])
        );
        assert_eq!(request.callback, "192.168.1.20:39500");
    }
}
