//! Wallet providers - the CIP-30 surface the bridge consumes
//!
//! Browser extensions inject themselves under `window.cardano[key]`. Here that
//! ambient global is an injected `ProviderSource`, so everything above it can
//! run against in-memory providers.
//!
//! ```text
//! ProviderSource (snapshot of injected providers)
//!     │
//!     ├── ProviderRegistry::list()  → sorted ProviderHandles for the picker
//!     │
//!     └── ProviderWaiter            → WalletProvider::enable() → WalletApi
//!                                                                 ├── get_network_id
//!                                                                 ├── sign_tx
//!                                                                 └── submit_tx
//! ```

pub mod waiter;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::error::ProviderError;

pub use waiter::{ProviderWaiter, WaitFailure, WaiterAction, WaiterEvent, WaiterState};

/// An injected, not yet authorized wallet extension.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Injection key, e.g. `eternl` for `window.cardano.eternl`.
    fn key(&self) -> &str;
    fn name(&self) -> Option<&str>;
    fn icon(&self) -> Option<&str>;
    fn api_version(&self) -> Option<&str>;

    async fn is_enabled(&self) -> Result<bool, ProviderError>;
    /// Authorization entrypoint. May prompt the user.
    async fn enable(&self) -> Result<Arc<dyn WalletApi>, ProviderError>;
}

/// Capability object returned by a successful `enable()`.
#[async_trait]
pub trait WalletApi: Send + Sync {
    /// 0 = test network, 1 = main network.
    async fn get_network_id(&self) -> Result<u8, ProviderError>;
    /// Returns a witness-set fragment, not a full transaction.
    async fn sign_tx(&self, tx_hex: &str, partial_sign: bool) -> Result<String, ProviderError>;
    async fn submit_tx(&self, tx_hex: &str) -> Result<String, ProviderError>;
}

/// Whatever providers the host environment currently exposes.
pub trait ProviderSource: Send + Sync {
    fn snapshot(&self) -> Vec<Arc<dyn WalletProvider>>;
}

/// Display record for one discovered provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderHandle {
    pub key: String,
    pub name: String,
    pub icon: String,
    pub api_version: String,
}

impl ProviderHandle {
    fn from_provider(provider: &dyn WalletProvider) -> Option<Self> {
        Some(Self {
            key: provider.key().to_string(),
            name: capitalize(provider.name()?),
            icon: provider.icon()?.to_string(),
            api_version: provider.api_version()?.to_string(),
        })
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Read-only view over a `ProviderSource`.
#[derive(Clone)]
pub struct ProviderRegistry {
    source: Arc<dyn ProviderSource>,
}

impl ProviderRegistry {
    pub fn new(source: Arc<dyn ProviderSource>) -> Self { Self { source } }

    /// Complete providers (name, icon and API version present), sorted by key.
    pub fn list(&self) -> Vec<ProviderHandle> {
        let mut handles: Vec<ProviderHandle> = self
            .source
            .snapshot()
            .iter()
            .filter_map(|p| ProviderHandle::from_provider(p.as_ref()))
            .collect();
        handles.sort_by(|a, b| a.key.cmp(&b.key));
        handles.dedup_by(|a, b| a.key == b.key);
        handles
    }

    pub fn find(&self, key: &str) -> Option<Arc<dyn WalletProvider>> {
        self.source.snapshot().into_iter().find(|p| p.key() == key)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory providers shared by unit tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::RwLock;

    pub struct StaticProvider {
        pub key: String,
        pub name: Option<String>,
        pub enabled: bool,
        pub enable_result: Result<(), ProviderError>,
        pub network: u8,
        pub enable_calls: AtomicUsize,
    }

    impl StaticProvider {
        pub fn new(key: &str) -> Self {
            Self {
                key: key.into(),
                name: Some(key.into()),
                enabled: false,
                enable_result: Ok(()),
                network: 0,
                enable_calls: AtomicUsize::new(0),
            }
        }
    }

    struct StaticApi { network: u8 }

    #[async_trait]
    impl WalletApi for StaticApi {
        async fn get_network_id(&self) -> Result<u8, ProviderError> { Ok(self.network) }
        async fn sign_tx(&self, _: &str, _: bool) -> Result<String, ProviderError> { Ok("a10080".into()) }
        async fn submit_tx(&self, _: &str) -> Result<String, ProviderError> { Ok("ab".repeat(32)) }
    }

    #[async_trait]
    impl WalletProvider for StaticProvider {
        fn key(&self) -> &str { &self.key }
        fn name(&self) -> Option<&str> { self.name.as_deref() }
        fn icon(&self) -> Option<&str> { Some("data:image/svg+xml,") }
        fn api_version(&self) -> Option<&str> { Some("0.1.0") }
        async fn is_enabled(&self) -> Result<bool, ProviderError> { Ok(self.enabled) }
        async fn enable(&self) -> Result<Arc<dyn WalletApi>, ProviderError> {
            self.enable_calls.fetch_add(1, Ordering::SeqCst);
            self.enable_result.clone().map(|_| Arc::new(StaticApi { network: self.network }) as Arc<dyn WalletApi>)
        }
    }

    #[derive(Default)]
    pub struct MemorySource {
        pub providers: RwLock<Vec<Arc<dyn WalletProvider>>>,
    }

    impl MemorySource {
        pub fn with(providers: Vec<Arc<dyn WalletProvider>>) -> Self {
            Self { providers: RwLock::new(providers) }
        }
    }

    impl ProviderSource for MemorySource {
        fn snapshot(&self) -> Vec<Arc<dyn WalletProvider>> {
            self.providers.read().map(|p| p.clone()).unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn list_is_sorted_and_complete_only() {
        let mut nameless = StaticProvider::new("aaa");
        nameless.name = None;
        let source = MemorySource::with(vec![
            Arc::new(StaticProvider::new("nami")),
            Arc::new(nameless),
            Arc::new(StaticProvider::new("eternl")),
            Arc::new(StaticProvider::new("lace")),
        ]);
        let registry = ProviderRegistry::new(Arc::new(source));
        let keys: Vec<String> = registry.list().into_iter().map(|h| h.key).collect();
        assert_eq!(keys, vec!["eternl", "lace", "nami"]);
    }

    #[test]
    fn names_are_capitalized() {
        let registry = ProviderRegistry::new(Arc::new(MemorySource::with(vec![Arc::new(StaticProvider::new("typhon"))])));
        assert_eq!(registry.list()[0].name, "Typhon");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn find_by_key() {
        let registry = ProviderRegistry::new(Arc::new(MemorySource::with(vec![Arc::new(StaticProvider::new("nami"))])));
        assert!(registry.find("nami").is_some());
        assert!(registry.find("flint").is_none());
    }
}
