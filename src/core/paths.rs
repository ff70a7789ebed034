//! Path and constant registry for the bridge
//!
//! Centralized registry for routes, injected element ids, hosts and timing.

/// Local HTTP endpoint
pub mod server {
    pub const HOST: &str = "127.0.0.1";
    pub const PORT: u16 = 44203;

    pub const INDEX: &str = "/";
    pub const HEALTH: &str = "/health";
    /// Page posts the wallet's witness set here and gets the finalized hex back
    pub const SPLICE: &str = "/splice";

    pub const SERVICE: &str = "signbridge";
}

/// Element ids and placeholders inside the served page
pub mod page {
    pub const INJECTED_DATA: &str = "injected-data";
    pub const INJECTED_NETWORK: &str = "injected-network-data";

    pub const DATA_PLACEHOLDER: &str = r#"{ "message": "__SIGNBRIDGE_TX__" }"#;
    pub const NETWORK_PLACEHOLDER: &str = r#"{ "network": "__SIGNBRIDGE_NETWORK__" }"#;
}

/// Explorer and status-source hosts
pub mod hosts {
    pub const EXPLORER: &str = "cardanoscan.io";
    pub const EXPLORER_TX: &str = "/transaction/";

    pub const KOIOS_MAINNET: &str = "https://api.koios.rest/api/v1";
    pub const KOIOS_PREPROD: &str = "https://preprod.koios.rest/api/v1";
    pub const KOIOS_TX_STATUS: &str = "/tx_status";
}

/// Polling cadence
pub mod timing {
    /// Provider discovery tick
    pub const DISCOVERY_INTERVAL_MS: u64 = 100;
    /// 3000 ticks at 100ms: five minutes for the user to install or unlock an extension
    pub const DISCOVERY_MAX_ATTEMPTS: u32 = 3000;
    /// Confirmation status tick
    pub const STATUS_INTERVAL_SECS: u64 = 10;
    /// Floor for any timer period; tokio rejects a zero interval
    pub const MIN_TICK_MS: u64 = 1;
}

/// Environment variables read by `BridgeConfig::from_env`
pub mod env {
    pub const NETWORK: &str = "SIGNBRIDGE_NETWORK";
    pub const HOST: &str = "SIGNBRIDGE_HOST";
    pub const PORT: &str = "SIGNBRIDGE_PORT";
    pub const POLL_MS: &str = "SIGNBRIDGE_POLL_MS";
    pub const MAX_ATTEMPTS: &str = "SIGNBRIDGE_MAX_ATTEMPTS";
    pub const STATUS_SECS: &str = "SIGNBRIDGE_STATUS_SECS";
    pub const KOIOS_URL: &str = "SIGNBRIDGE_KOIOS_URL";
    pub const LOG_JSON: &str = "SIGNBRIDGE_LOG_JSON";
}
