//! The single logical worker driving the engine.
//!
//! Hub requests and broker messages are queued on one channel and applied to
//! the [`BridgeEngine`] strictly in arrival order. A periodic timer in the
//! same loop flushes the snapshot, so flushing never races a handler.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use topic_router::SubscriptionDiff;

use crate::engine::BridgeEngine;
use crate::error::{EngineError, Result};
use crate::request::{PushRequest, SubscribeRequest};

/// Commands accepted by the worker
#[derive(Debug)]
pub enum Command {
    /// Hub push; replies once the broker accepted every publish
    Push {
        request: PushRequest,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Hub subscribe; replies once the broker acknowledged the subscribe
    Subscribe {
        request: SubscribeRequest,
        reply: oneshot::Sender<Result<SubscriptionDiff>>,
    },
    /// Message received from the broker
    BrokerMessage { topic: String, payload: Bytes },
    /// Broker connection (re)established
    BrokerConnected { session_present: bool },
    /// Write the snapshot now
    Flush,
    /// Flush and stop
    Shutdown,
}

/// Cloneable sender side of the worker queue.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl WorkerHandle {
    /// Publish a hub event and wait for the broker
    pub async fn push(&self, request: PushRequest) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Push { request, reply })?;
        response.await.map_err(|_| EngineError::WorkerStopped)?
    }

    /// Apply a hub subscribe request and wait for the broker acknowledgement
    pub async fn subscribe(&self, request: SubscribeRequest) -> Result<SubscriptionDiff> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Subscribe { request, reply })?;
        response.await.map_err(|_| EngineError::WorkerStopped)?
    }

    /// Queue a broker message
    pub fn broker_message(&self, topic: impl Into<String>, payload: impl Into<Bytes>) -> Result<()> {
        self.send(Command::BrokerMessage {
            topic: topic.into(),
            payload: payload.into(),
        })
    }

    /// Report a broker (re)connection
    pub fn broker_connected(&self, session_present: bool) -> Result<()> {
        self.send(Command::BrokerConnected { session_present })
    }

    /// Request an immediate snapshot flush
    pub fn flush(&self) -> Result<()> {
        self.send(Command::Flush)
    }

    /// Ask the worker to flush and stop
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| EngineError::WorkerStopped)
    }
}

/// Spawn the worker task.
///
/// The task hands the engine back when it stops, either on
/// [`Command::Shutdown`] or once every [`WorkerHandle`] is dropped.
pub fn spawn_worker(
    engine: BridgeEngine,
    flush_interval: Duration,
) -> (WorkerHandle, JoinHandle<BridgeEngine>) {
    let (commands, receiver) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_worker(engine, receiver, flush_interval));
    (WorkerHandle { commands }, task)
}

async fn run_worker(
    mut engine: BridgeEngine,
    mut commands: mpsc::UnboundedReceiver<Command>,
    flush_interval: Duration,
) -> BridgeEngine {
    let mut autosave = interval_at(Instant::now() + flush_interval, flush_interval);
    autosave.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        flush_interval_secs = flush_interval.as_secs(),
        "Engine worker started"
    );

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    tracing::debug!("All worker handles dropped");
                    break;
                };
                match command {
                    Command::Push { request, reply } => {
                        let result = engine.handle_push(request).await;
                        if let Err(e) = &result {
                            tracing::error!(error = %e, "Push failed");
                        }
                        let _ = reply.send(result);
                    }
                    Command::Subscribe { request, reply } => {
                        let result = engine.handle_subscribe(request).await;
                        if let Err(e) = &result {
                            tracing::error!(error = %e, "Subscribe failed");
                        }
                        let _ = reply.send(result);
                    }
                    Command::BrokerMessage { topic, payload } => {
                        engine.handle_broker_message(&topic, &payload);
                    }
                    Command::BrokerConnected { session_present } => {
                        if let Err(e) = engine.on_broker_connected(session_present).await {
                            tracing::error!(error = %e, "Resubscribe after connect failed");
                        }
                    }
                    Command::Flush => flush(&mut engine),
                    Command::Shutdown => {
                        tracing::info!("Worker received shutdown command");
                        break;
                    }
                }
            }
            _ = autosave.tick() => {
                tracing::debug!("Autosave");
                flush(&mut engine);
            }
        }
    }

    flush(&mut engine);
    let counts = engine.notifier().stats();
    tracing::info!(
        delivered = counts.delivered,
        dropped = counts.dropped,
        retries = counts.retries,
        "Engine worker shut down"
    );
    engine
}

fn flush(engine: &mut BridgeEngine) {
    if let Err(e) = engine.persist() {
        tracing::error!(error = %e, "Failed to save state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bridge_state::SnapshotStore;

    use crate::engine::EngineConfig;
    use crate::notifier::{Notifier, RetryPolicy};
    use crate::testing::{RecordingBroker, RecordingHubClient};

    #[test]
    fn test_command_debug() {
        let cmd = Command::BrokerConnected {
            session_present: false,
        };
        assert!(format!("{:?}", cmd).contains("BrokerConnected"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_flushes_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::in_dir(dir.path());
        let broker = Arc::new(RecordingBroker::new());
        let engine = BridgeEngine::new(
            EngineConfig::default(),
            store.clone(),
            broker.clone(),
            Notifier::new(Arc::new(RecordingHubClient::new()), RetryPolicy::default()),
        );
        let (handle, task) = spawn_worker(engine, Duration::from_secs(60));

        handle
            .push(PushRequest::new("Lamp", "switch", "on"))
            .await
            .unwrap();
        assert!(store.load().unwrap().is_none());

        tokio::time::sleep(Duration::from_secs(61)).await;

        let (topic, _, _) = broker.published()[0].clone();
        let saved = store.load().unwrap().expect("autosave wrote a snapshot");
        assert_eq!(saved.history.get(&topic), Some("on"));
        assert!(!task.is_finished());

        handle.shutdown().unwrap();
        task.await.unwrap();
    }
}
