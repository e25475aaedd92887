//! HTTP server lifecycle.

use std::net::SocketAddr;

use bridge_engine::WorkerHandle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{Result, ServerError};
use crate::routes::routes;

/// The running HTTP server receiving hub requests.
///
/// Requests are forwarded to the engine worker; the server holds no state
/// of its own.
///
/// # Example
///
/// ```no_run
/// # use bridge_engine::WorkerHandle;
/// # use hub_server::HubServer;
/// # async fn run(worker: WorkerHandle) -> Result<(), hub_server::ServerError> {
/// let server = HubServer::bind(([0, 0, 0, 0], 8080).into(), worker)?;
/// println!("Listening on {}", server.local_addr());
/// server.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct HubServer {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<JoinHandle<()>>,
}

impl HubServer {
    /// Bind `addr` and start serving.
    ///
    /// Port 0 binds an ephemeral port; see [`HubServer::local_addr`].
    pub fn bind(addr: SocketAddr, worker: WorkerHandle) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let (local_addr, server) = warp::serve(routes(worker))
            .try_bind_with_graceful_shutdown(addr, async move {
                let _ = shutdown_rx.await;
            })
            .map_err(|source| ServerError::Bind { addr, source })?;

        tracing::info!(addr = %local_addr, "Hub API listening");
        let server_handle = tokio::spawn(server);

        Ok(Self {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// The bound address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting requests and wait for in-flight ones to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            handle.await?;
        }
        tracing::info!("Hub API stopped");
        Ok(())
    }
}

impl Drop for HubServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
