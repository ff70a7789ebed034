//! Signbridge: hand an unsigned Cardano transaction to a browser wallet,
//! get it signed and submitted, then watch it confirm.
//!
//! # Architecture
//!
//! ```text
//! TxBuilder (external wallet logic)
//!   │  UnsignedTxPayload
//!   ▼
//! Handoff ──▶ LocalBridgeServer (GET / with injected data)
//!                │
//!                ▼  page loaded in the browser
//! SigningSession
//!   ├── ProviderWaiter   discover + authorize (state machine)
//!   ├── NetworkGuard     wallet network == session network
//!   ├── signTx           → WitnessFragment
//!   ├── WitnessSplicer   structural CBOR splice → FinalizedTx
//!   └── submitTx         → TxId
//!                           │
//!                           ▼
//!                ConfirmationTracker (StatusSource, 10s ticks)
//! ```
//!
//! # Features
//!
//! - `native` (default) - HTTP server, Koios status client, log subscriber, CLI
//!
//! # Usage
//!
//! ```ignore
//! use signbridge::{BridgeConfig, ProviderRegistry, ProviderWaiter, SigningSession, UnsignedTxPayload};
//!
//! let config = BridgeConfig::from_env()?;
//! let session = SigningSession::new(registry, ProviderWaiter::fixed_selection("eternl"), config);
//! let tx_id = session.run(&UnsignedTxPayload::from_hex(&unsigned_hex)?).await?;
//! ```

// =============================================================================
// Shared modules (compile everywhere)
// =============================================================================
pub mod config;
pub mod core;
pub mod error;
pub mod guard;
pub mod provider;
pub mod runtime;
pub mod session;
pub mod splice;
pub mod tracker;
pub mod tx;

// =============================================================================
// Native-only modules (HTTP server, log subscriber)
// =============================================================================
#[cfg(feature = "native")]
pub mod handoff;
#[cfg(feature = "native")]
pub mod logging;
#[cfg(feature = "native")]
pub mod server;

// =============================================================================
// Re-exports: Shared
// =============================================================================
pub use config::{BridgeConfig, ConfigError};
pub use core::NetworkContext;
pub use error::{BridgeError, ProviderError};
pub use guard::NetworkGuard;
pub use provider::{
    ProviderHandle, ProviderRegistry, ProviderSource, ProviderWaiter, WaitFailure, WaiterAction, WaiterEvent,
    WaiterState, WalletApi, WalletProvider,
};
pub use runtime::{install_signal_handlers, Shutdown};
pub use session::{SessionStage, SigningSession};
pub use splice::{decode_layout, SpliceError, TxLayout, WitnessSplicer};
pub use tracker::{ConfirmationTracker, StatusError, StatusSource, TrackerHandle};
pub use tx::{FinalizedTx, TxId, UnsignedTxPayload, WitnessFragment};

// =============================================================================
// Re-exports: Native
// =============================================================================
#[cfg(feature = "native")]
pub use handoff::{Handoff, TxBuilder, WalletIntent};
#[cfg(feature = "native")]
pub use server::LocalBridgeServer;
#[cfg(feature = "native")]
pub use tracker::KoiosStatusSource;
