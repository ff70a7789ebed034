//! SigningSession - one unsigned transaction in, one outcome out
//!
//! ```text
//! WaitingForProvider ─▶ Connected ─▶ Signing ─▶ Submitting ─▶ Submitted(TxId)
//!         │                 │           │            │
//!         └─────────────────┴───────────┴────────────┴──▶ Failed(message)
//! ```
//!
//! Stages are published on a watch channel for whoever renders progress.
//! Nothing is retried here; only the waiter's discovery poll repeats.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, ProviderError};
use crate::guard::NetworkGuard;
use crate::provider::{ProviderRegistry, ProviderWaiter};
use crate::runtime::Shutdown;
use crate::splice::WitnessSplicer;
use crate::tracker::{ConfirmationTracker, StatusSource, TrackerHandle};
use crate::tx::{TxId, UnsignedTxPayload, WitnessFragment};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", content = "detail", rename_all = "snake_case")]
pub enum SessionStage {
    WaitingForProvider,
    Connected,
    Signing,
    Submitting,
    Submitted(TxId),
    Failed(String),
}

impl SessionStage {
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionStage::Submitted(_) | SessionStage::Failed(_))
    }

    /// Text shown in the page's status line.
    pub fn status_text(&self) -> String {
        match self {
            SessionStage::WaitingForProvider => "Waiting for wallet...".into(),
            SessionStage::Connected => "Wallet connected successfully!".into(),
            SessionStage::Signing => "Waiting for the wallet to sign...".into(),
            SessionStage::Submitting => "Submitting transaction...".into(),
            SessionStage::Submitted(_) => {
                "Transaction successfully submitted! It will take a few moments to hit the chain.".into()
            }
            SessionStage::Failed(message) => format!("Error: {message}"),
        }
    }
}

pub struct SigningSession {
    registry: ProviderRegistry,
    selection: watch::Receiver<Option<String>>,
    config: BridgeConfig,
    shutdown: Shutdown,
    stage: watch::Sender<SessionStage>,
}

impl SigningSession {
    pub fn new(registry: ProviderRegistry, selection: watch::Receiver<Option<String>>, config: BridgeConfig) -> Self {
        let (stage, _) = watch::channel(SessionStage::WaitingForProvider);
        Self { registry, selection, config, shutdown: Shutdown::new(), stage }
    }

    /// Share a cancellation signal with the caller (page closed, process exiting).
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self { self.shutdown = shutdown; self }

    pub fn shutdown(&self) -> Shutdown { self.shutdown.clone() }

    pub fn subscribe(&self) -> watch::Receiver<SessionStage> { self.stage.subscribe() }

    pub fn stage(&self) -> SessionStage { self.stage.borrow().clone() }

    fn publish(&self, stage: SessionStage) {
        info!(stage = ?stage, "session stage");
        self.stage.send_replace(stage);
    }

    async fn ensure_live(&self) -> Result<(), BridgeError> {
        if self.shutdown.is_triggered().await {
            return Err(BridgeError::Cancelled);
        }
        Ok(())
    }

    /// Discover, authorize, check network, sign, splice, submit.
    pub async fn run(self, unsigned: &UnsignedTxPayload) -> Result<TxId, BridgeError> {
        let result = self.execute(unsigned).await;
        match &result {
            Ok(tx_id) => {
                info!(tx = %tx_id, url = %self.config.network.explorer_tx_url(tx_id.as_str()), "transaction submitted");
                self.publish(SessionStage::Submitted(tx_id.clone()));
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "signing session failed");
                self.publish(SessionStage::Failed(e.to_string()));
            }
        }
        result
    }

    /// `run`, then track confirmations of the submitted transaction.
    pub async fn run_tracked(
        self,
        unsigned: &UnsignedTxPayload,
        source: Arc<dyn StatusSource>,
    ) -> Result<(TxId, TrackerHandle), BridgeError> {
        let network = self.config.network;
        let interval = self.config.status_interval();
        let tx_id = self.run(unsigned).await?;
        let tracker = ConfirmationTracker::start(source, network, tx_id.clone(), interval);
        Ok((tx_id, tracker))
    }

    async fn execute(&self, unsigned: &UnsignedTxPayload) -> Result<TxId, BridgeError> {
        self.publish(SessionStage::WaitingForProvider);
        let mut waiter = ProviderWaiter::from_config(&self.config);
        let api = waiter.run(&self.registry, &self.selection, &self.shutdown).await?;

        NetworkGuard::check(api.as_ref(), self.config.network).await?;
        self.publish(SessionStage::Connected);

        self.ensure_live().await?;
        self.publish(SessionStage::Signing);
        let witness_hex = api
            .sign_tx(unsigned.as_hex(), self.config.partial_sign)
            .await
            .map_err(BridgeError::SigningRejected)?;
        let witness = WitnessFragment::from_hex(&witness_hex).map_err(BridgeError::InvalidWitness)?;
        let finalized = WitnessSplicer::splice(unsigned, &witness)?;

        self.ensure_live().await?;
        self.publish(SessionStage::Submitting);
        let raw = api.submit_tx(&finalized.to_hex()).await.map_err(BridgeError::SubmitRejected)?;
        TxId::parse(&raw).ok_or_else(|| {
            BridgeError::SubmitRejected(ProviderError::new(format!("wallet returned an unusable transaction id: {raw:?}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::{MemorySource, StaticProvider};

    const PLAIN_TX: &str = "84a200800200a0f5f6";

    fn session(provider: StaticProvider) -> SigningSession {
        let registry = ProviderRegistry::new(Arc::new(MemorySource::with(vec![Arc::new(provider)])));
        SigningSession::new(registry, ProviderWaiter::fixed_selection("nami"), BridgeConfig::new().with_max_attempts(5))
    }

    #[tokio::test(start_paused = true)]
    async fn happy_path_publishes_submitted() {
        let s = session(StaticProvider::new("nami"));
        let stages = s.subscribe();
        let tx = s.run(&UnsignedTxPayload::from_hex(PLAIN_TX).unwrap()).await.unwrap();
        assert_eq!(tx.as_str(), "ab".repeat(32));
        assert_eq!(*stages.borrow(), SessionStage::Submitted(tx));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_network_stops_before_signing() {
        let mut provider = StaticProvider::new("nami");
        provider.network = 1;
        let s = session(provider);
        let stages = s.subscribe();
        let err = s.run(&UnsignedTxPayload::from_hex(PLAIN_TX).unwrap()).await.unwrap_err();
        assert!(matches!(err, BridgeError::NetworkMismatch { reported: 1, .. }));
        assert!(matches!(&*stages.borrow(), SessionStage::Failed(m) if m.contains("pre-production")));
    }

    #[test]
    fn status_texts() {
        assert_eq!(SessionStage::Connected.status_text(), "Wallet connected successfully!");
        assert!(SessionStage::Failed("boom".into()).status_text().starts_with("Error: boom"));
        assert!(!SessionStage::Signing.is_finished());
    }
}
