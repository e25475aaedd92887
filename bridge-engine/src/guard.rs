//! Loop and duplicate guard.
//!
//! Outbound, a publish whose topic the bridge is itself subscribed to for
//! the same device is flagged as a possible loop but never blocked.
//! Inbound, each subscription match runs through a fixed sequence of checks
//! before anything is forwarded to the hub:
//!
//! 1. echo of a topic the bridge published for the same device attribute
//! 2. repeated value on the device's read-state topic
//! 3. `switch`/`level` inference for convention bindings

use bridge_state::{HistoryCache, PublicationRegistry};
use topic_router::{Direction, NamingConvention, SubscriptionEntry, SubscriptionTable, Topic};

use crate::ports::HubNotification;

const SWITCH: &str = "switch";
const LEVEL: &str = "level";
const SWITCH_ON: &str = "on";
const SWITCH_OFF: &str = "off";

/// A publish that may feed back into the bridge's own subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopWarning {
    /// The same device and attribute is subscribed to a matching topic
    Attribute { subscription: Topic },
    /// The same device is subscribed to a matching topic
    Device { subscription: Topic },
}

/// Check an outbound publish against the subscription table.
pub fn check_outbound(
    table: &SubscriptionTable,
    topic: &Topic,
    device: &str,
    attribute: &str,
) -> Option<LoopWarning> {
    let mut device_match = None;
    for subscription in table.resolve_incoming(topic.as_str()) {
        let entries = table.entries(subscription.as_str());
        if entries
            .iter()
            .any(|e| e.device == device && e.attribute == attribute)
        {
            return Some(LoopWarning::Attribute {
                subscription: subscription.clone(),
            });
        }
        if device_match.is_none() && entries.iter().any(|e| e.device == device) {
            device_match = Some(subscription.clone());
        }
    }
    device_match.map(|subscription| LoopWarning::Device { subscription })
}

/// Why an inbound match was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The bridge published this topic for the same device attribute
    Echo,
    /// Same value as last seen on the read-state topic
    Duplicate,
    /// Level change while the device's switch is off
    SwitchOff,
}

/// Outcome of the inbound checks for one subscription match.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Forward(HubNotification),
    Drop(DropReason),
}

/// Read-only view of the state the inbound checks consult.
#[derive(Debug, Clone, Copy)]
pub struct InboundGuard<'a> {
    pub convention: &'a NamingConvention,
    pub history: &'a HistoryCache,
    pub publications: &'a PublicationRegistry,
}

impl<'a> InboundGuard<'a> {
    pub fn new(
        convention: &'a NamingConvention,
        history: &'a HistoryCache,
        publications: &'a PublicationRegistry,
    ) -> Self {
        Self {
            convention,
            history,
            publications,
        }
    }

    /// Decide what happens to `payload` received on `incoming`, which matched
    /// the subscription `matched` bound to `entry`.
    pub fn evaluate(
        &self,
        matched: &Topic,
        entry: &SubscriptionEntry,
        incoming: &str,
        payload: &str,
    ) -> Verdict {
        let device = entry.device.as_str();
        let attribute = entry.attribute.as_str();

        if self.publications.contains(matched.as_str(), device, attribute)
            || self.publications.contains(incoming, device, attribute)
        {
            return Verdict::Drop(DropReason::Echo);
        }

        let read_state = self.convention.resolve(device, attribute, Direction::ReadState);
        if *matched == read_state && self.history.is_same(matched.as_str(), payload) {
            return Verdict::Drop(DropReason::Duplicate);
        }

        if entry.is_directory() {
            return Verdict::Forward(HubNotification::new(
                device,
                attribute,
                entry.translate(payload),
                entry.is_command(),
            ));
        }

        if attribute == LEVEL && self.switch_state(device) == Some(SWITCH_OFF) {
            return Verdict::Drop(DropReason::SwitchOff);
        }

        if attribute == SWITCH && payload == SWITCH_ON {
            if let Some(level) = self.last_level(device) {
                return Verdict::Forward(HubNotification {
                    name: device.to_string(),
                    attribute: LEVEL.to_string(),
                    value: level_value(level),
                    command: entry.is_command(),
                });
            }
        }

        Verdict::Forward(HubNotification::new(
            device,
            attribute,
            payload,
            entry.is_command(),
        ))
    }

    fn switch_state(&self, device: &str) -> Option<&str> {
        let topic = self.convention.resolve(device, SWITCH, Direction::ReadState);
        self.history.get(topic.as_str())
    }

    /// Last positive level sent as a command for the device
    fn last_level(&self, device: &str) -> Option<f64> {
        let topic = self.convention.resolve(device, LEVEL, Direction::Command);
        self.history
            .numeric(topic.as_str())
            .filter(|level| *level > 0.0)
    }
}

/// Whole levels serialize as integers.
fn level_value(level: f64) -> serde_json::Value {
    if level.fract() == 0.0 && level.abs() < i64::MAX as f64 {
        serde_json::Value::from(level as i64)
    } else {
        serde_json::Number::from_f64(level)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(level.to_string()))
    }
}
