//! Integration tests for the HTTP API.
//!
//! These tests start a real server on an ephemeral port in front of an
//! engine wired to in-memory fakes, and send actual HTTP requests.

use std::sync::Arc;
use std::time::Duration;

use bridge_engine::testing::{BrokerCall, RecordingBroker, RecordingHubClient};
use bridge_engine::{spawn_worker, BridgeEngine, EngineConfig, Notifier, RetryPolicy};
use bridge_state::SnapshotStore;
use hub_server::HubServer;
use serde_json::{json, Value};
use topic_router::{NamingConvention, Topic};

struct TestBridge {
    _dir: tempfile::TempDir,
    broker: Arc<RecordingBroker>,
    server: HubServer,
    client: reqwest::Client,
}

impl TestBridge {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let broker = Arc::new(RecordingBroker::new());
        let engine = BridgeEngine::new(
            EngineConfig {
                convention: NamingConvention::default().with_suffixes("", "command", "set_state"),
                retain: false,
                directory_path: None,
            },
            SnapshotStore::in_dir(dir.path()),
            broker.clone(),
            Notifier::new(Arc::new(RecordingHubClient::new()), RetryPolicy::default()),
        );
        let (worker, _task) = spawn_worker(engine, Duration::from_secs(900));
        let server = HubServer::bind(([127, 0, 0, 1], 0).into(), worker).unwrap();

        Self {
            _dir: dir,
            broker,
            server,
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, path: &str, body: &Value) -> (u16, Value) {
        let response = self
            .client
            .post(format!("http://{}{}", self.server.local_addr(), path))
            .json(body)
            .send()
            .await
            .expect("Failed to send HTTP request");
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }
}

#[tokio::test]
async fn push_publishes_and_answers_ok() {
    let bridge = TestBridge::start().await;

    let (status, body) = bridge
        .post("/push", &json!({"name": "Lamp", "type": "switch", "value": "on"}))
        .await;

    assert_eq!(status, 200);
    assert_eq!(body, json!({"status": "OK"}));
    assert_eq!(
        bridge.broker.published(),
        vec![("/smartthings/Lamp/switch".to_string(), "on".to_string(), false)]
    );
}

#[tokio::test]
async fn subscribe_answers_after_broker_subscribe() {
    let bridge = TestBridge::start().await;

    let (status, body) = bridge
        .post(
            "/subscribe",
            &json!({"devices": {"switch": ["Lamp"]}, "callback": "192.168.1.20:39500"}),
        )
        .await;

    assert_eq!(status, 200);
    assert_eq!(body, json!({"status": "OK"}));
    assert_eq!(
        bridge.broker.calls(),
        vec![BrokerCall::Subscribe(vec![
            Topic::from("/smartthings/Lamp/switch/command"),
            Topic::from("/smartthings/Lamp/switch/set_state"),
        ])]
    );
}

#[tokio::test]
async fn malformed_bodies_are_rejected() {
    let bridge = TestBridge::start().await;

    let (status, body) = bridge
        .post("/push", &json!({"name": "Lamp", "type": "switch"}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["status"], "ERROR");

    let (status, _) = bridge
        .post("/subscribe", &json!({"devices": {"switch": ["Lamp"]}, "callback": ""}))
        .await;
    assert_eq!(status, 400);

    assert!(bridge.broker.calls().is_empty());
}

#[tokio::test]
async fn broker_failure_is_an_error_response() {
    let bridge = TestBridge::start().await;
    bridge.broker.fail_publish(true);

    let (status, body) = bridge
        .post("/push", &json!({"name": "Lamp", "type": "switch", "value": "on"}))
        .await;

    assert_eq!(status, 502);
    assert_eq!(body["status"], "ERROR");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let bridge = TestBridge::start().await;
    let (status, _) = bridge.post("/notify", &json!({})).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn shutdown_stops_serving() {
    let bridge = TestBridge::start().await;
    let addr = bridge.server.local_addr();

    bridge.server.shutdown().await.unwrap();

    let result = reqwest::Client::new()
        .post(format!("http://{addr}/push"))
        .json(&json!({"name": "Lamp", "type": "switch", "value": "on"}))
        .send()
        .await;
    assert!(result.is_err());
}
