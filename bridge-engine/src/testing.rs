//! In-memory fakes for the broker port and hub client.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use topic_router::Topic;

use crate::error::{BrokerError, NotifyError};
use crate::ports::{BrokerPort, HubClient, HubNotification};

/// One call observed by [`RecordingBroker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerCall {
    Publish {
        topic: Topic,
        payload: String,
        retain: bool,
    },
    Subscribe(Vec<Topic>),
    Unsubscribe(Vec<Topic>),
}

/// Broker port that records every call.
#[derive(Debug, Default)]
pub struct RecordingBroker {
    calls: Mutex<Vec<BrokerCall>>,
    fail_publish: AtomicBool,
    fail_subscribe: AtomicBool,
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail
    pub fn fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent subscribes fail
    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<BrokerCall> {
        self.calls.lock().clone()
    }

    /// `(topic, payload, retain)` of every publish, in order
    pub fn published(&self) -> Vec<(String, String, bool)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                BrokerCall::Publish {
                    topic,
                    payload,
                    retain,
                } => Some((topic.to_string(), payload.clone(), *retain)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl BrokerPort for RecordingBroker {
    async fn publish(&self, topic: &Topic, payload: &str, retain: bool) -> Result<(), BrokerError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(BrokerError::Publish {
                topic: topic.to_string(),
                reason: "publish rejected".to_string(),
            });
        }
        self.calls.lock().push(BrokerCall::Publish {
            topic: topic.clone(),
            payload: payload.to_string(),
            retain,
        });
        Ok(())
    }

    async fn subscribe(&self, topics: &[Topic]) -> Result<(), BrokerError> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(BrokerError::Subscribe("subscribe rejected".to_string()));
        }
        self.calls.lock().push(BrokerCall::Subscribe(topics.to_vec()));
        Ok(())
    }

    async fn unsubscribe(&self, topics: &[Topic]) -> Result<(), BrokerError> {
        self.calls.lock().push(BrokerCall::Unsubscribe(topics.to_vec()));
        Ok(())
    }
}

/// Hub client that records successful notifications.
///
/// The first `failures` attempts fail with a 503 status.
#[derive(Debug, Default)]
pub struct RecordingHubClient {
    received: Mutex<Vec<(String, HubNotification)>>,
    failures_remaining: AtomicU32,
    attempts: AtomicU32,
}

impl RecordingHubClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: u32) -> Self {
        Self {
            failures_remaining: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    /// `(callback, notification)` pairs delivered so far
    pub fn received(&self) -> Vec<(String, HubNotification)> {
        self.received.lock().clone()
    }

    /// Notifications delivered so far
    pub fn notifications(&self) -> Vec<HubNotification> {
        self.received.lock().iter().map(|(_, n)| n.clone()).collect()
    }

    /// Number of attempts, failed or not
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HubClient for RecordingHubClient {
    async fn notify(&self, callback: &str, notification: &HubNotification) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(NotifyError::Status {
                url: format!("http://{callback}"),
                status: 503,
            });
        }
        self.received
            .lock()
            .push((callback.to_string(), notification.clone()));
        Ok(())
    }
}
