//! NetworkGuard - refuse to sign on the wrong network
//!
//! | expected | reported | result |
//! |----------|----------|--------|
//! | mainnet  | 1        | ok |
//! | mainnet  | 0        | mismatch |
//! | preprod  | 0        | ok |
//! | preprod  | 1        | mismatch |
//!
//! Any other reported id is a mismatch for both networks.

use tracing::{info, warn};

use crate::core::NetworkContext;
use crate::error::BridgeError;
use crate::provider::WalletApi;

pub struct NetworkGuard;

impl NetworkGuard {
    pub fn compare(reported: u8, expected: NetworkContext) -> Result<(), BridgeError> {
        if reported == expected.network_id() {
            Ok(())
        } else {
            Err(BridgeError::NetworkMismatch { expected, reported })
        }
    }

    /// Ask the wallet which network it is on. A provider that cannot answer is
    /// treated as reporting an unknown id.
    pub async fn check(api: &dyn WalletApi, expected: NetworkContext) -> Result<(), BridgeError> {
        let reported = match api.get_network_id().await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "getNetworkId failed");
                u8::MAX
            }
        };
        let result = Self::compare(reported, expected);
        match &result {
            Ok(()) => info!(network = %expected, "wallet network confirmed"),
            Err(_) => warn!(network = %expected, reported, "wallet on wrong network"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pair() {
        assert!(NetworkGuard::compare(1, NetworkContext::Mainnet).is_ok());
        assert!(NetworkGuard::compare(0, NetworkContext::Preprod).is_ok());

        match NetworkGuard::compare(0, NetworkContext::Mainnet) {
            Err(BridgeError::NetworkMismatch { expected, reported }) => {
                assert_eq!(expected, NetworkContext::Mainnet);
                assert_eq!(reported, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
        let err = NetworkGuard::compare(1, NetworkContext::Preprod).unwrap_err();
        assert!(err.to_string().contains("pre-production"));
    }

    #[test]
    fn unknown_ids_never_match() {
        for id in [2, 42, u8::MAX] {
            assert!(NetworkGuard::compare(id, NetworkContext::Mainnet).is_err());
            assert!(NetworkGuard::compare(id, NetworkContext::Preprod).is_err());
        }
    }
}
