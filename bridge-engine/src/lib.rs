//! Routing and state-reconciliation engine for the hub MQTT bridge.
//!
//! The engine translates hub pushes into broker publications, broker
//! messages into hub notifications, and hub subscribe requests into a
//! minimal set of broker subscribe/unsubscribe operations, while keeping
//! the two directions from feeding back into each other.
//!
//! # Architecture
//!
//! - [`BridgeEngine`] owns all mutable state and implements each operation.
//! - [`spawn_worker`] runs the engine on a single task; the HTTP layer and
//!   the broker adapter talk to it through a [`WorkerHandle`].
//! - [`BrokerPort`] and [`HubClient`] are the only ways out to the network.
//! - [`Notifier`] delivers hub notifications off the handling path with
//!   bounded retry.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use bridge_engine::{
//!     spawn_worker, BridgeEngine, BrokerPort, EngineConfig, HttpHubClient, Notifier, RetryPolicy,
//! };
//! use bridge_state::SnapshotStore;
//!
//! # async fn example(broker: Arc<dyn BrokerPort>) -> Result<(), Box<dyn std::error::Error>> {
//! let hub = Arc::new(HttpHubClient::new(Duration::from_secs(5))?);
//! let engine = BridgeEngine::new(
//!     EngineConfig::default(),
//!     SnapshotStore::in_dir("config/data"),
//!     broker,
//!     Notifier::new(hub, RetryPolicy::default()),
//! );
//!
//! let (handle, worker) = spawn_worker(engine, Duration::from_secs(900));
//! // hand `handle` to the HTTP server and the broker adapter
//! handle.shutdown()?;
//! worker.await?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod guard;
pub mod hub_client;
pub mod notifier;
pub mod ports;
pub mod request;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use engine::{BridgeEngine, EngineConfig, InboundOutcome, PublishTarget};
pub use error::{BrokerError, EngineError, NotifyError, Result};
pub use guard::{check_outbound, DropReason, InboundGuard, LoopWarning, Verdict};
pub use hub_client::HttpHubClient;
pub use notifier::{DeliveryCounts, DeliveryState, Notifier, NotifierStats, RetryPolicy};
pub use ports::{BrokerPort, HubClient, HubNotification};
pub use request::{PushRequest, SubscribeRequest};
pub use worker::{spawn_worker, Command, WorkerHandle};
