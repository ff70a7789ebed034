//! ConfirmationTracker - poll confirmation depth after submission
//!
//! ```text
//! start ─▶ tick (immediate) ─▶ tick +10s ─▶ tick +20s ─▶ ...   until stop / drop
//!             │                   │
//!             └─ spawn poll       └─ poll still in flight? skip, count it
//! ```
//!
//! At most one status request is outstanding per tracker. A failed request
//! keeps the last known depth. Stopping aborts the outstanding request, so no
//! depth is published after `stop` returns.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::core::paths::timing;
use crate::core::NetworkContext;
use crate::tx::TxId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("status request failed: {0}")]
    Request(String),

    #[error("status source answered {0}")]
    Status(u16),

    #[error("unreadable status response: {0}")]
    Decode(String),
}

/// External collaborator answering "how deep is this transaction".
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn status(&self, network: NetworkContext, tx_id: &TxId) -> Result<u64, StatusError>;
}

pub struct ConfirmationTracker;

impl ConfirmationTracker {
    pub fn start(
        source: Arc<dyn StatusSource>,
        network: NetworkContext,
        tx_id: TxId,
        interval: Duration,
    ) -> TrackerHandle {
        let (depth_tx, depth_rx) = watch::channel(0u64);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let depth_tx = Arc::new(depth_tx);
        let in_flight = Arc::new(AtomicBool::new(false));
        let skipped = Arc::new(AtomicU64::new(0));
        let requests = Arc::new(AtomicU64::new(0));
        let interval = interval.max(Duration::from_millis(timing::MIN_TICK_MS));

        info!(tx = %tx_id, network = %network, ?interval, "tracking confirmations");

        let task = {
            let skipped = skipped.clone();
            let requests = requests.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                let mut poll: Option<JoinHandle<()>> = None;
                loop {
                    tokio::select! {
                        biased;
                        // fires on stop() and when the handle is dropped
                        _ = &mut stop_rx => break,
                        _ = ticker.tick() => {}
                    }

                    if in_flight.swap(true, Ordering::SeqCst) {
                        let n = skipped.fetch_add(1, Ordering::Relaxed) + 1;
                        warn!(tx = %tx_id, skipped = n, "status poll still in flight, skipping tick");
                        continue;
                    }
                    requests.fetch_add(1, Ordering::Relaxed);

                    let source = source.clone();
                    let tx_id = tx_id.clone();
                    let depth_tx = depth_tx.clone();
                    let in_flight = in_flight.clone();
                    poll = Some(tokio::spawn(async move {
                        match source.status(network, &tx_id).await {
                            Ok(depth) => {
                                let previous = depth_tx.send_replace(depth);
                                if previous != depth {
                                    info!(tx = %tx_id, depth, "confirmation depth changed");
                                } else {
                                    debug!(tx = %tx_id, depth, "confirmation depth unchanged");
                                }
                            }
                            Err(e) => warn!(tx = %tx_id, error = %e, "status check failed, keeping last depth"),
                        }
                        in_flight.store(false, Ordering::SeqCst);
                    }));
                }
                if let Some(poll) = poll.take() {
                    poll.abort();
                    let _ = poll.await;
                }
                debug!(tx = %tx_id, "confirmation tracking stopped");
            })
        };

        TrackerHandle { depth: depth_rx, stop: Some(stop_tx), task: Some(task), skipped, requests }
    }
}

/// Owner of a running tracker. Dropping it stops polling.
pub struct TrackerHandle {
    depth: watch::Receiver<u64>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    skipped: Arc<AtomicU64>,
    requests: Arc<AtomicU64>,
}

impl TrackerHandle {
    /// Last known confirmation depth.
    pub fn confirmations(&self) -> u64 { *self.depth.borrow() }

    pub fn subscribe(&self) -> watch::Receiver<u64> { self.depth.clone() }

    /// Ticks dropped because a request was still outstanding.
    pub fn skipped_ticks(&self) -> u64 { self.skipped.load(Ordering::Relaxed) }

    /// Status requests issued so far.
    pub fn requests(&self) -> u64 { self.requests.load(Ordering::Relaxed) }

    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

#[cfg(feature = "native")]
pub use koios::KoiosStatusSource;

#[cfg(feature = "native")]
mod koios {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::core::paths::hosts;

    #[derive(Debug, Deserialize)]
    struct TxStatusRow {
        num_confirmations: Option<u64>,
    }

    /// Koios `tx_status` endpoint.
    #[derive(Clone)]
    pub struct KoiosStatusSource {
        client: reqwest::Client,
        base: Option<String>,
    }

    impl Default for KoiosStatusSource {
        fn default() -> Self { Self::new() }
    }

    impl KoiosStatusSource {
        pub fn new() -> Self { Self { client: reqwest::Client::new(), base: None } }

        /// Fixed base URL instead of the per-network public endpoint.
        pub fn with_base(mut self, base: impl Into<String>) -> Self {
            self.base = Some(base.into().trim_end_matches('/').to_string());
            self
        }

        fn url(&self, network: NetworkContext) -> String {
            let base = self.base.as_deref().unwrap_or_else(|| network.koios_base());
            format!("{base}{}", hosts::KOIOS_TX_STATUS)
        }
    }

    #[async_trait]
    impl StatusSource for KoiosStatusSource {
        async fn status(&self, network: NetworkContext, tx_id: &TxId) -> Result<u64, StatusError> {
            let response = self
                .client
                .post(self.url(network))
                .json(&json!({ "_tx_hashes": [tx_id.as_str()] }))
                .send()
                .await
                .map_err(|e| StatusError::Request(e.to_string()))?;
            if !response.status().is_success() {
                return Err(StatusError::Status(response.status().as_u16()));
            }
            let rows: Vec<TxStatusRow> = response.json().await.map_err(|e| StatusError::Decode(e.to_string()))?;
            Ok(rows.first().and_then(|row| row.num_confirmations).unwrap_or(0))
        }
    }

}
