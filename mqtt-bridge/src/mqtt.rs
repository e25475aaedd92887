//! MQTT adapter: the broker port and the event loop feeding the worker.
//!
//! Publishes and unsubscribes resolve once the request is queued on the
//! connection. Subscribes resolve on the broker's SUBACK, matched in order
//! against outstanding subscribe requests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_engine::{BrokerError, BrokerPort, WorkerHandle};
use parking_lot::Mutex;
use rumqttc::{
    AsyncClient, ConnAck, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet,
    QoS, SubAck, SubscribeFilter, SubscribeReasonCode,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use topic_router::Topic;

use crate::config::{BrokerEndpoint, MqttSettings};

const EVENT_LOOP_CAPACITY: usize = 64;
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

type AckSender = oneshot::Sender<Result<(), BrokerError>>;
type PendingAcks = Arc<Mutex<VecDeque<AckSender>>>;

/// Broker port backed by a rumqttc client.
#[derive(Clone)]
pub struct MqttBroker {
    client: AsyncClient,
    pending_acks: PendingAcks,
    ack_timeout: Duration,
}

/// The connection's event loop, not yet running.
pub struct MqttEvents {
    event_loop: EventLoop,
    pending_acks: PendingAcks,
}

/// The running event loop task.
pub struct EventPump {
    task: JoinHandle<()>,
}

impl EventPump {
    /// Wait up to `grace` for the loop to end after a disconnect, then abort it.
    ///
    /// The DISCONNECT is only written on a live connection, so an unreachable
    /// broker would otherwise keep the loop retrying forever.
    pub async fn stop(mut self, grace: Duration) {
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "MQTT event loop ended abnormally"),
            Err(_) => {
                tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    "MQTT disconnect not completed in time, stopping event loop"
                );
                self.task.abort();
                let _ = self.task.await;
            }
        }
    }
}

impl MqttBroker {
    /// Create the client. Nothing touches the network until the event loop
    /// is spawned.
    pub fn new(settings: &MqttSettings, endpoint: &BrokerEndpoint) -> (Self, MqttEvents) {
        let client_id = settings.client_id();
        let mut options = MqttOptions::new(&client_id, &endpoint.host, endpoint.port);
        options.set_keep_alive(settings.keep_alive());
        options.set_clean_session(true);
        if let Some(username) = &settings.username {
            options.set_credentials(username, settings.password.clone().unwrap_or_default());
        }

        tracing::info!(
            host = %endpoint.host,
            port = endpoint.port,
            client_id = %client_id,
            "Connecting to MQTT broker"
        );

        let (client, event_loop) = AsyncClient::new(options, EVENT_LOOP_CAPACITY);
        let pending_acks = PendingAcks::default();
        (
            Self {
                client,
                pending_acks: pending_acks.clone(),
                ack_timeout: settings.ack_timeout(),
            },
            MqttEvents {
                event_loop,
                pending_acks,
            },
        )
    }

    /// Send a DISCONNECT; the event loop stops once it is written.
    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            tracing::warn!(error = %e, "Failed to queue MQTT disconnect");
        }
    }
}

#[async_trait]
impl BrokerPort for MqttBroker {
    async fn publish(&self, topic: &Topic, payload: &str, retain: bool) -> Result<(), BrokerError> {
        self.client
            .publish(topic.as_str(), QoS::AtMostOnce, retain, payload.as_bytes().to_vec())
            .await
            .map_err(|e| BrokerError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn subscribe(&self, topics: &[Topic]) -> Result<(), BrokerError> {
        if topics.is_empty() {
            return Ok(());
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        self.pending_acks.lock().push_back(ack_tx);

        let filters = topics
            .iter()
            .map(|topic| SubscribeFilter::new(topic.to_string(), QoS::AtMostOnce));
        if let Err(e) = self.client.subscribe_many(filters).await {
            self.pending_acks.lock().pop_back();
            return Err(BrokerError::Subscribe(e.to_string()));
        }

        match tokio::time::timeout(self.ack_timeout, ack_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BrokerError::Disconnected),
            Err(_) => Err(BrokerError::Subscribe(format!(
                "no SUBACK within {}s",
                self.ack_timeout.as_secs()
            ))),
        }
    }

    async fn unsubscribe(&self, topics: &[Topic]) -> Result<(), BrokerError> {
        for topic in topics {
            self.client
                .unsubscribe(topic.as_str())
                .await
                .map_err(|e| BrokerError::Unsubscribe(format!("{topic}: {e}")))?;
        }
        Ok(())
    }
}

impl MqttEvents {
    /// Poll the connection on its own task, feeding the worker.
    pub fn spawn(self, worker: WorkerHandle) -> EventPump {
        EventPump {
            task: tokio::spawn(self.run(worker)),
        }
    }

    async fn run(mut self, worker: WorkerHandle) {
        let mut error_count: u32 = 0;

        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ConnAck {
                    session_present,
                    code: ConnectReturnCode::Success,
                }))) => {
                    error_count = 0;
                    tracing::info!(session_present, "Connected to MQTT broker");
                    if worker.broker_connected(session_present).is_err() {
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(ConnAck { code, .. }))) => {
                    tracing::error!(code = ?code, "MQTT broker rejected the connection");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    tracing::debug!(
                        topic = %publish.topic,
                        payload_size = publish.payload.len(),
                        "Received MQTT message"
                    );
                    if worker.broker_message(publish.topic, publish.payload).is_err() {
                        tracing::debug!("Worker stopped, ending MQTT event loop");
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => self.resolve_ack(&ack),
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    tracing::info!("Broker closed the MQTT session");
                    self.fail_pending();
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    tracing::info!("Disconnected from MQTT broker");
                    break;
                }
                Ok(notification) => {
                    tracing::trace!(notification = ?notification, "MQTT event");
                }
                Err(e) => {
                    self.fail_pending();
                    error_count = error_count.saturating_add(1);
                    let delay = reconnect_delay(error_count);
                    tracing::warn!(
                        error = %e,
                        error_count,
                        retry_in_ms = delay.as_millis() as u64,
                        "MQTT connection error"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        self.fail_pending();
        tracing::info!("MQTT event loop terminated");
    }

    fn resolve_ack(&self, ack: &SubAck) {
        let result = suback_result(ack);
        if let Err(e) = &result {
            tracing::error!(pkid = ack.pkid, error = %e, "Broker refused subscription");
        }
        match self.pending_acks.lock().pop_front() {
            Some(waiter) => {
                let _ = waiter.send(result);
            }
            None => tracing::debug!(pkid = ack.pkid, "SUBACK without waiting subscriber"),
        }
    }

    fn fail_pending(&self) {
        for waiter in self.pending_acks.lock().drain(..) {
            let _ = waiter.send(Err(BrokerError::Disconnected));
        }
    }
}

fn suback_result(ack: &SubAck) -> Result<(), BrokerError> {
    let refused = ack
        .return_codes
        .iter()
        .filter(|code| matches!(code, SubscribeReasonCode::Failure))
        .count();
    if refused == 0 {
        Ok(())
    } else {
        Err(BrokerError::Subscribe(format!(
            "broker refused {refused} of {} filters",
            ack.return_codes.len()
        )))
    }
}

/// Backoff between reconnection attempts
fn reconnect_delay(error_count: u32) -> Duration {
    let exponent = error_count.saturating_sub(1).min(10);
    (INITIAL_RETRY_DELAY * 2u32.pow(exponent)).min(MAX_RETRY_DELAY)
}
