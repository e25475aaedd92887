//! Seams between the engine and its I/O collaborators.
//!
//! The engine never talks to the network directly. Broker traffic goes
//! through a [`BrokerPort`], hub notifications through a [`HubClient`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use topic_router::Topic;

use crate::error::{BrokerError, NotifyError};

/// Outbound side of the broker connection.
///
/// Each call resolves once the broker acknowledged the operation, or once it
/// was handed to the connection for operations the broker never acknowledges.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Publish a payload to a concrete topic
    async fn publish(&self, topic: &Topic, payload: &str, retain: bool) -> Result<(), BrokerError>;

    /// Subscribe to a set of filters
    async fn subscribe(&self, topics: &[Topic]) -> Result<(), BrokerError>;

    /// Unsubscribe from a set of filters
    async fn unsubscribe(&self, topics: &[Topic]) -> Result<(), BrokerError>;
}

/// A device event forwarded to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubNotification {
    /// Device name
    pub name: String,
    /// Attribute name
    #[serde(rename = "type")]
    pub attribute: String,
    /// A string for most events, a number for inferred levels
    pub value: serde_json::Value,
    /// Whether the hub should treat the event as a command
    pub command: bool,
}

impl HubNotification {
    /// Notification carrying a string value
    pub fn new(
        name: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
        command: bool,
    ) -> Self {
        Self {
            name: name.into(),
            attribute: attribute.into(),
            value: serde_json::Value::String(value.into()),
            command,
        }
    }
}

/// Delivers notifications to the hub's callback address.
#[async_trait]
pub trait HubClient: Send + Sync {
    /// Send one notification, without retrying
    async fn notify(&self, callback: &str, notification: &HubNotification) -> Result<(), NotifyError>;
}
