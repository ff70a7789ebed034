//! Handoff - from the desktop wallet-logic service to the browser page
//!
//! The desktop side builds an unsigned transaction for an intent, then the
//! only channel to the browser is the served document. There is no
//! back-channel; completion is observed by re-querying wallet state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::core::NetworkContext;
use crate::server::LocalBridgeServer;
use crate::tx::UnsignedTxPayload;

/// What the user asked the wallet-logic service to do. Parameters are opaque here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", content = "params", rename_all = "snake_case")]
pub enum WalletIntent {
    CreateAddress(Value),
    SendValue(Value),
    Sweep(Value),
    Extract(Value),
}

impl WalletIntent {
    pub fn name(&self) -> &'static str {
        match self {
            WalletIntent::CreateAddress(_) => "create_address",
            WalletIntent::SendValue(_) => "send_value",
            WalletIntent::Sweep(_) => "sweep",
            WalletIntent::Extract(_) => "extract",
        }
    }
}

/// External transaction builder.
#[async_trait]
pub trait TxBuilder: Send + Sync {
    async fn build(&self, intent: &WalletIntent, network: NetworkContext) -> anyhow::Result<UnsignedTxPayload>;
}

pub struct Handoff {
    server: LocalBridgeServer,
    network: NetworkContext,
}

impl Handoff {
    pub fn new(server: LocalBridgeServer, network: NetworkContext) -> Self { Self { server, network } }

    /// Build the transaction and serve it. Returns the page URL to open.
    pub async fn open(&self, builder: &dyn TxBuilder, intent: &WalletIntent) -> anyhow::Result<String> {
        let payload = builder.build(intent, self.network).await?;
        info!(intent = intent.name(), network = %self.network, "unsigned transaction built");
        let url = self.server.start(&payload, self.network).await?;
        Ok(url)
    }

    pub async fn close(&self) { self.server.stop().await; }

    pub fn server(&self) -> &LocalBridgeServer { &self.server }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use serde_json::json;

    struct FixedBuilder(&'static str);

    #[async_trait]
    impl TxBuilder for FixedBuilder {
        async fn build(&self, intent: &WalletIntent, _: NetworkContext) -> anyhow::Result<UnsignedTxPayload> {
            if let WalletIntent::Extract(_) = intent {
                anyhow::bail!("nothing to extract");
            }
            Ok(UnsignedTxPayload::from_hex(self.0)?)
        }
    }

    #[test]
    fn intents_serialize_with_params() {
        let intent = WalletIntent::SendValue(json!({"lovelace": 2_000_000}));
        let value = serde_json::to_value(&intent).unwrap();
        assert_eq!(value, json!({"intent": "send_value", "params": {"lovelace": 2_000_000}}));
    }

    #[tokio::test]
    async fn open_serves_then_close_stops() {
        let server = LocalBridgeServer::new(&BridgeConfig::new().with_port(0));
        let handoff = Handoff::new(server, NetworkContext::Preprod);
        let url = handoff.open(&FixedBuilder("84a0a0f5f6"), &WalletIntent::Sweep(json!({}))).await.unwrap();
        assert!(url.starts_with("http://127.0.0.1:"));
        assert!(handoff.server().is_running().await);
        handoff.close().await;
        assert!(!handoff.server().is_running().await);
    }

    #[tokio::test]
    async fn builder_failure_starts_nothing() {
        let server = LocalBridgeServer::new(&BridgeConfig::new().with_port(0));
        let handoff = Handoff::new(server, NetworkContext::Mainnet);
        let err = handoff.open(&FixedBuilder("84a0a0f5f6"), &WalletIntent::Extract(json!({}))).await.unwrap_err();
        assert!(err.to_string().contains("nothing to extract"));
        assert!(!handoff.server().is_running().await);
    }
}
