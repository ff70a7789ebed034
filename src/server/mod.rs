//! LocalBridgeServer - ephemeral local endpoint serving the bridge page
//!
//! ```text
//! start(payload, network)
//!   ├── lock active slot
//!   ├── prior instance? signal + await it
//!   ├── bind host:port, spawn axum with graceful shutdown
//!   └── store Running, return http://addr/
//!
//! stop()  → take slot, signal + await; nothing running is a no-op
//! ```

pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::core::NetworkContext;
use crate::error::BridgeError;
use crate::tx::UnsignedTxPayload;

pub use routes::{create_router, render_page};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

struct Running {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl Running {
    fn url(&self) -> String { format!("http://{}/", self.addr) }

    async fn shut_down(self) {
        let _ = self.stop.send(());
        let mut task = self.task;
        match tokio::time::timeout(DRAIN_TIMEOUT, &mut task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(addr = %self.addr, error = %e, "bridge server exited with error"),
            Ok(Err(e)) => warn!(addr = %self.addr, error = %e, "bridge server task failed"),
            Err(_) => {
                warn!(addr = %self.addr, "bridge server did not drain in time, aborting");
                task.abort();
            }
        }
        info!(addr = %self.addr, "bridge server stopped");
    }
}

/// Clones share the same active slot.
#[derive(Clone)]
pub struct LocalBridgeServer {
    host: String,
    port: u16,
    active: Arc<Mutex<Option<Running>>>,
}

impl LocalBridgeServer {
    pub fn new(config: &BridgeConfig) -> Self {
        Self { host: config.host.clone(), port: config.port, active: Arc::new(Mutex::new(None)) }
    }

    /// Serve a fresh page for `payload`. Any previous instance is stopped first.
    pub async fn start(&self, payload: &UnsignedTxPayload, network: NetworkContext) -> Result<String, BridgeError> {
        let mut active = self.active.lock().await;
        if let Some(prior) = active.take() {
            info!(addr = %prior.addr, "replacing running bridge server");
            prior.shut_down().await;
        }

        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;
        let addr = listener.local_addr()?;
        let router = create_router(payload, network);
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stopped.await;
                })
                .await
        });

        let running = Running { addr, stop, task };
        let url = running.url();
        info!(url = %url, network = %network, tx_len = payload.as_bytes().len(), "bridge server started");
        *active = Some(running);
        Ok(url)
    }

    /// Idempotent.
    pub async fn stop(&self) {
        let running = self.active.lock().await.take();
        if let Some(running) = running {
            running.shut_down().await;
        }
    }

    pub async fn is_running(&self) -> bool { self.active.lock().await.is_some() }

    pub async fn url(&self) -> Option<String> { self.active.lock().await.as_ref().map(Running::url) }
}
