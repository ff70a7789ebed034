//! NetworkContext - which Cardano network a session targets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::paths::hosts;

/// Network a bridge session is pinned to. Immutable for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkContext {
    Mainnet,
    #[default]
    Preprod,
}

impl NetworkContext {
    pub fn as_str(&self) -> &'static str {
        match self { NetworkContext::Mainnet => "mainnet", NetworkContext::Preprod => "preprod" }
    }

    /// CIP-30 `getNetworkId()` value: 1 for main network, 0 for test networks.
    pub fn network_id(&self) -> u8 {
        match self { NetworkContext::Mainnet => 1, NetworkContext::Preprod => 0 }
    }

    /// Human readable name used in mismatch messages.
    pub fn display_name(&self) -> &'static str {
        match self { NetworkContext::Mainnet => "mainnet", NetworkContext::Preprod => "pre-production" }
    }

    /// Subdomain prefix for explorer URLs, also injected into the bridge page.
    pub fn explorer_prefix(&self) -> &'static str {
        match self { NetworkContext::Mainnet => "", NetworkContext::Preprod => "preprod." }
    }

    pub fn explorer_tx_url(&self, tx_id: &str) -> String {
        format!("https://{}{}{}{}", self.explorer_prefix(), hosts::EXPLORER, hosts::EXPLORER_TX, tx_id)
    }

    pub fn koios_base(&self) -> &'static str {
        match self { NetworkContext::Mainnet => hosts::KOIOS_MAINNET, NetworkContext::Preprod => hosts::KOIOS_PREPROD }
    }

    /// Inverse of `explorer_prefix`, as read back from injected page data.
    pub fn from_prefix(prefix: &str) -> Self {
        if prefix == "preprod." { NetworkContext::Preprod } else { NetworkContext::Mainnet }
    }
}

impl fmt::Display for NetworkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for NetworkContext {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(NetworkContext::Mainnet),
            "preprod" | "pre-production" | "testnet" => Ok(NetworkContext::Preprod),
            other => Err(format!("unknown network: {other}")),
        }
    }
}
