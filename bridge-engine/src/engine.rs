//! The engine coordinator.
//!
//! [`BridgeEngine`] exclusively owns the [`BridgeState`] and runs every hub
//! request and broker message to completion against it. It is driven by a
//! single worker task (see [`crate::worker`]); nothing else mutates state.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

use bridge_state::{BridgeState, SnapshotStore};
use tokio::task::JoinHandle;
use topic_router::{
    DeviceDirectory, Direction, NamingConvention, SubscriptionDiff, SubscriptionTable, Topic,
};

use crate::error::Result;
use crate::guard::{check_outbound, DropReason, InboundGuard, LoopWarning, Verdict};
use crate::notifier::{DeliveryState, Notifier};
use crate::ports::{BrokerPort, HubNotification};
use crate::request::{PushRequest, SubscribeRequest};

const LOG_PAYLOAD_CHARS: usize = 25;

/// Static engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Topic naming convention
    pub convention: NamingConvention,
    /// Retain flag for publications without a per-device override
    pub retain: bool,
    /// Device directory file, read on every subscribe cycle
    pub directory_path: Option<PathBuf>,
}

/// A single outbound publish derived from a push request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub topic: Topic,
    pub payload: String,
    pub retain: bool,
}

/// What happened to one broker message.
#[derive(Debug, Default)]
pub struct InboundOutcome {
    /// One verdict per subscription binding the message matched
    pub verdicts: Vec<Verdict>,
    /// Delivery tasks spawned for forwarded notifications
    pub deliveries: Vec<JoinHandle<DeliveryState>>,
}

impl InboundOutcome {
    /// Notifications that passed the guard
    pub fn forwarded(&self) -> Vec<&HubNotification> {
        self.verdicts
            .iter()
            .filter_map(|v| match v {
                Verdict::Forward(n) => Some(n),
                Verdict::Drop(_) => None,
            })
            .collect()
    }

    /// Whether the topic matched no subscription
    pub fn is_unrouted(&self) -> bool {
        self.verdicts.is_empty()
    }
}

/// Owns the bridge state and applies hub requests and broker messages to it.
///
/// Topics in the table that the broker has not acknowledged yet are kept in
/// an unconfirmed list and re-issued by the next subscribe cycle or connect.
pub struct BridgeEngine {
    config: EngineConfig,
    state: BridgeState,
    store: SnapshotStore,
    broker: Arc<dyn BrokerPort>,
    notifier: Notifier,
    unconfirmed: Vec<Topic>,
}

impl BridgeEngine {
    /// Load the last snapshot and recover the subscription table from it.
    pub fn new(
        config: EngineConfig,
        store: SnapshotStore,
        broker: Arc<dyn BrokerPort>,
        notifier: Notifier,
    ) -> Self {
        let state = store.load_or_default();
        let mut engine = Self {
            config,
            state,
            store,
            broker,
            notifier,
            unconfirmed: Vec::new(),
        };
        engine.recover();
        engine
    }

    /// Static configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current state, as it would be persisted
    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    /// Notifier delivering broker messages to the hub
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Table topics whose broker subscription is not acknowledged
    pub fn unconfirmed(&self) -> &[Topic] {
        &self.unconfirmed
    }

    /// Rebuild the table by replaying the last hub subscribe request.
    ///
    /// The stored table is only kept when no request was ever persisted.
    pub fn recover(&mut self) {
        let directory = self.load_directory();

        if let Some(request) = self.state.last_hub_request.clone() {
            let table = SubscriptionTable::build(&request, &directory, &self.config.convention);
            let previous = self.state.install_table(table);
            if previous != self.state.subscriptions {
                tracing::info!(
                    stored = previous.len(),
                    rebuilt = self.state.subscriptions.len(),
                    "Device configuration changed since last run"
                );
            }
            tracing::info!(
                topics = self.state.subscriptions.len(),
                callback = %self.state.callback,
                "Restored subscriptions from last hub request"
            );
        }

        self.state.devices = directory;
    }

    /// Subscribe to the full topic list after the broker (re)connected.
    ///
    /// When the broker kept the session only unconfirmed topics are sent.
    pub async fn on_broker_connected(&mut self, session_present: bool) -> Result<()> {
        let topics = if session_present {
            self.unconfirmed.clone()
        } else {
            self.state.subscriptions.clone()
        };
        if topics.is_empty() {
            return Ok(());
        }
        tracing::info!(
            topics = topics.len(),
            session_present,
            "Subscribing to current topic list"
        );
        self.subscribe_confirmed(topics).await
    }

    /// Publish a hub attribute change to the broker.
    pub async fn handle_push(&mut self, request: PushRequest) -> Result<()> {
        tracing::info!(
            device = %request.name,
            attribute = %request.attribute,
            value = %preview(&request.value),
            "Incoming hub event"
        );

        for target in self.publish_targets(&request) {
            match check_outbound(
                &self.state.subscribe,
                &target.topic,
                &request.name,
                &request.attribute,
            ) {
                Some(LoopWarning::Attribute { subscription }) => tracing::warn!(
                    "POSSIBLE LOOP. Device[Attribute] {}[{}] is publishing to Topic {} while subscribed to Topic {}",
                    request.name, request.attribute, target.topic, subscription
                ),
                Some(LoopWarning::Device { subscription }) => tracing::warn!(
                    "POSSIBLE LOOP. Device {} is publishing to Topic {} while subscribed to Topic {}",
                    request.name, target.topic, subscription
                ),
                None => {}
            }

            self.broker
                .publish(&target.topic, &target.payload, target.retain)
                .await?;
            tracing::debug!(
                topic = %target.topic,
                payload = %preview(&target.payload),
                retain = target.retain,
                "Published"
            );

            self.state
                .history
                .record(target.topic.clone(), target.payload.clone());
            self.state.publications.record(
                &target.topic,
                &request.name,
                &request.attribute,
                &target.payload,
            );
        }

        Ok(())
    }

    /// Where a push request is published.
    ///
    /// Directory publish mappings fan out to every configured topic with the
    /// value translated; otherwise the convention read-state topic is used.
    pub fn publish_targets(&self, request: &PushRequest) -> Vec<PublishTarget> {
        let devices = &self.state.devices;
        match devices.publish_topics(&request.name, &request.attribute) {
            Some(topics) if !topics.is_empty() => {
                let retain = devices.retain(&request.name).unwrap_or(self.config.retain);
                topics
                    .iter()
                    .map(|(topic, binding)| PublishTarget {
                        topic: topic.clone(),
                        payload: binding.translate(&request.value).to_string(),
                        retain,
                    })
                    .collect()
            }
            _ => vec![PublishTarget {
                topic: self.config.convention.resolve(
                    &request.name,
                    &request.attribute,
                    Direction::ReadState,
                ),
                payload: request.value.clone(),
                retain: self.config.retain,
            }],
        }
    }

    /// Rebuild the subscription table and reconcile the broker with it.
    ///
    /// The snapshot is persisted before the broker is touched. Unsubscribe
    /// failures are logged only; the returned result follows the subscribe
    /// acknowledgement. Topics left unconfirmed by an earlier failure are
    /// subscribed again as part of `to_subscribe`.
    pub async fn handle_subscribe(&mut self, request: SubscribeRequest) -> Result<SubscriptionDiff> {
        let directory = self.load_directory();
        let table = SubscriptionTable::build(&request.devices, &directory, &self.config.convention);
        let previous = self.state.install_table(table);

        self.state.devices = directory;
        self.state.callback = request.callback;
        self.state.last_hub_request = Some(request.devices);

        if let Err(e) = self.persist() {
            tracing::error!(error = %e, "Failed to save state after subscribe");
        }

        let mut diff = SubscriptionDiff::between(&previous, &self.state.subscriptions);
        for topic in std::mem::take(&mut self.unconfirmed) {
            if self.state.subscribe.contains(topic.as_str()) && !diff.to_subscribe.contains(&topic)
            {
                diff.to_subscribe.push(topic);
            }
        }
        tracing::info!(
            callback = %self.state.callback,
            topics = self.state.subscriptions.len(),
            unsubscribe = diff.to_unsubscribe.len(),
            subscribe = diff.to_subscribe.len(),
            "Updated subscriptions"
        );

        if !diff.to_unsubscribe.is_empty() {
            tracing::info!(topics = ?diff.to_unsubscribe, "Unsubscribing");
            if let Err(e) = self.broker.unsubscribe(&diff.to_unsubscribe).await {
                tracing::warn!(error = %e, "Unsubscribe failed");
            }
        }

        if !diff.to_subscribe.is_empty() {
            tracing::info!(topics = ?diff.to_subscribe, "Subscribing");
            self.subscribe_confirmed(diff.to_subscribe.clone()).await?;
        }

        Ok(diff)
    }

    async fn subscribe_confirmed(&mut self, topics: Vec<Topic>) -> Result<()> {
        match self.broker.subscribe(&topics).await {
            Ok(()) => {
                self.unconfirmed.retain(|t| !topics.contains(t));
                Ok(())
            }
            Err(e) => {
                for topic in topics {
                    if !self.unconfirmed.contains(&topic) {
                        self.unconfirmed.push(topic);
                    }
                }
                tracing::warn!(
                    unconfirmed = self.unconfirmed.len(),
                    "Subscribe not acknowledged, topics will be re-issued"
                );
                Err(e.into())
            }
        }
    }

    /// Route one broker message to the hub.
    ///
    /// Every matching subscription is evaluated against the history as it
    /// was before this message; the history is updated once afterwards if
    /// anything was forwarded.
    pub fn handle_broker_message(&mut self, topic: &str, payload: &[u8]) -> InboundOutcome {
        let contents = String::from_utf8_lossy(payload);
        let mut outcome = InboundOutcome::default();

        let matched: Vec<Topic> = self
            .state
            .subscribe
            .resolve_incoming(topic)
            .into_iter()
            .cloned()
            .collect();

        if matched.is_empty() {
            tracing::warn!(topic = %topic, "Received message on a topic that is not subscribed");
            return outcome;
        }
        if matched.len() > 1 {
            tracing::info!(topic = %topic, subscriptions = ?matched, "Topic matches multiple subscriptions");
        }

        let guard = InboundGuard::new(
            &self.config.convention,
            &self.state.history,
            &self.state.publications,
        );

        for subscription in &matched {
            if subscription.as_str() != topic {
                tracing::info!(
                    topic = %topic,
                    subscription = %subscription,
                    "Wildcard match"
                );
            }

            for entry in self.state.subscribe.entries(subscription.as_str()) {
                let verdict = guard.evaluate(subscription, entry, topic, &contents);
                match &verdict {
                    Verdict::Forward(notification) => {
                        tracing::info!(
                            topic = %topic,
                            device = %notification.name,
                            attribute = %notification.attribute,
                            value = %preview(&notification.value.to_string()),
                            "Forwarding to hub"
                        );
                        if let Some(handle) = self
                            .notifier
                            .dispatch(&self.state.callback, notification.clone())
                        {
                            outcome.deliveries.push(handle);
                        }
                    }
                    Verdict::Drop(DropReason::Echo) => tracing::error!(
                        "POSSIBLE LOOP. Device[Attribute] {}[{}] received on Topic {} which it published itself, dropping",
                        entry.device, entry.attribute, subscription
                    ),
                    Verdict::Drop(DropReason::Duplicate) => tracing::info!(
                        topic = %topic,
                        payload = %preview(&contents),
                        "Skipping duplicate message"
                    ),
                    Verdict::Drop(DropReason::SwitchOff) => tracing::info!(
                        device = %entry.device,
                        "Skipping level change while device is off"
                    ),
                }
                outcome.verdicts.push(verdict);
            }
        }

        if !outcome.forwarded().is_empty() {
            self.state.history.record(topic, contents.into_owned());
        }

        outcome
    }

    /// Write the snapshot to disk.
    pub fn persist(&mut self) -> bridge_state::Result<()> {
        self.store.save(&mut self.state)
    }

    fn load_directory(&self) -> DeviceDirectory {
        match &self.config.directory_path {
            Some(path) => DeviceDirectory::load_or_empty(path),
            None => DeviceDirectory::new(),
        }
    }
}

/// Payload prefix for log lines.
fn preview(payload: &str) -> Cow<'_, str> {
    match payload.char_indices().nth(LOG_PAYLOAD_CHARS) {
        Some((end, _)) => Cow::Owned(format!("{}...", &payload[..end])),
        None => Cow::Borrowed(payload),
    }
}
