use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bridge_engine::{spawn_worker, BridgeEngine, EngineConfig, HttpHubClient, Notifier};
use bridge_state::SnapshotStore;
use clap::Parser;
use hub_server::HubServer;

pub mod config;
pub mod logging;
pub mod mqtt;

use config::{BridgeConfig, ConfigPaths, ConfigSource};
use logging::LoggingMode;
use mqtt::MqttBroker;

const DISCONNECT_GRACE: Duration = Duration::from_secs(5);

/// Hub MQTT Bridge
///
/// Publishes hub device changes to an MQTT broker and reports broker
/// messages back to the hub.
#[derive(Parser, Debug)]
#[command(name = "hub-mqtt-bridge")]
#[command(version, about)]
pub struct Args {
    /// Directory holding config.toml, devices.toml and data/
    #[arg(short, long, env = "BRIDGE_CONFIG_DIR", default_value = "./config")]
    pub config_dir: PathBuf,

    /// Log output format
    #[arg(long, value_enum, env = "BRIDGE_LOG_MODE", default_value = "development")]
    pub log_mode: LoggingMode,

    /// HTTP port, overriding the config file
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let paths = ConfigPaths::new(&args.config_dir);

    let (config, source) =
        BridgeConfig::load(&paths.config_file()).context("Failed to load configuration")?;
    logging::init_logging(args.log_mode, config.loglevel.as_deref())
        .context("Failed to initialize logging")?;

    match source {
        ConfigSource::File => {
            tracing::info!(path = %paths.config_file().display(), "Loaded configuration")
        }
        ConfigSource::Defaults => tracing::warn!(
            path = %paths.config_file().display(),
            "No configuration file found, using defaults"
        ),
    }

    run(args, paths, config).await
}

async fn run(args: Args, paths: ConfigPaths, config: BridgeConfig) -> Result<()> {
    let endpoint = config
        .mqtt
        .endpoint()
        .context("Invalid [mqtt] host setting")?;
    let (broker, events) = MqttBroker::new(&config.mqtt, &endpoint);

    let hub = HttpHubClient::new(config.notifier.request_timeout())
        .context("Failed to create hub client")?;

    let engine = BridgeEngine::new(
        EngineConfig {
            convention: config.mqtt.convention.clone(),
            retain: config.mqtt.retain,
            directory_path: config.deviceconfig.then(|| paths.devices_file()),
        },
        SnapshotStore::in_dir(paths.data_dir()),
        Arc::new(broker.clone()),
        Notifier::new(Arc::new(hub), config.notifier.retry_policy()),
    );

    let (worker, worker_task) = spawn_worker(engine, config.flush_interval());
    let event_pump = events.spawn(worker.clone());

    let port = args.port.unwrap_or(config.port);
    let server = HubServer::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)), worker.clone())
        .context("Failed to start HTTP server")?;

    tracing::info!(
        port = server.local_addr().port(),
        preface = %config.mqtt.convention.preface,
        "Bridge running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down");

    server.shutdown().await.context("HTTP server failed")?;

    if worker.shutdown().is_ok() {
        worker_task.await.context("Engine worker panicked")?;
    }

    broker.disconnect().await;
    event_pump.stop(DISCONNECT_GRACE).await;

    tracing::info!("Bridge stopped");
    Ok(())
}
