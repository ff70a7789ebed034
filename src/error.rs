//! Error taxonomy for a signing session

use serde_json::Value;
use thiserror::Error;

use crate::core::NetworkContext;
use crate::splice::SpliceError;

/// Anything a wallet extension threw, normalised to displayable text.
///
/// CIP-30 providers reject with `{code, info}` objects, but in practice
/// they throw strings, `Error` instances or arbitrary objects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{info}")]
pub struct ProviderError {
    pub code: Option<i64>,
    pub info: String,
}

impl ProviderError {
    pub fn new(info: impl Into<String>) -> Self {
        Self { code: None, info: info.into() }
    }

    pub fn with_code(code: i64, info: impl Into<String>) -> Self {
        Self { code: Some(code), info: info.into() }
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) => Self::new(s),
            Value::Object(ref map) => {
                let code = map.get("code").and_then(Value::as_i64);
                let text = ["info", "message"]
                    .iter()
                    .find_map(|k| map.get(*k).and_then(Value::as_str))
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string());
                Self { code, info: text }
            }
            Value::Null => Self::new("unknown provider error"),
            other => Self::new(other.to_string()),
        }
    }
}

impl From<Value> for ProviderError {
    fn from(value: Value) -> Self { Self::from_value(value) }
}

/// Terminal failure of a signing session. Every stage surfaces one of these.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Wallet '{provider}' not found after {attempts} attempts")]
    ProviderNotFound { provider: String, attempts: u32 },

    #[error("Please enable {provider} for this URL: {reason}")]
    ConsentDenied { provider: String, reason: ProviderError },

    #[error("Wallet is not using the {} network. Please switch to the {} network and try again.", .expected.display_name(), .expected.display_name())]
    NetworkMismatch { expected: NetworkContext, reported: u8 },

    #[error("Signing rejected: {0}")]
    SigningRejected(ProviderError),

    #[error("Unsigned transaction has an unexpected encoding: {0}")]
    MalformedUnsignedTx(SpliceError),

    #[error("Wallet returned an unusable witness: {0}")]
    InvalidWitness(SpliceError),

    #[error("Submission rejected: {0}")]
    SubmitRejected(ProviderError),

    #[error("Session cancelled")]
    Cancelled,

    #[error("Bridge server error: {0}")]
    Server(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether a fresh session (new provider choice or rebuilt tx) can succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, BridgeError::MalformedUnsignedTx(_) | BridgeError::NetworkMismatch { .. })
    }

    /// Builder defects are reported apart from everything the user can fix.
    pub fn is_builder_defect(&self) -> bool {
        matches!(self, BridgeError::MalformedUnsignedTx(_))
    }

    pub fn remedy(&self) -> &'static str {
        match self {
            BridgeError::ProviderNotFound { .. } | BridgeError::ConsentDenied { .. } => {
                "Refresh the page and try again, or select a different wallet."
            }
            BridgeError::NetworkMismatch { .. } => "Switch networks in the wallet extension and restart.",
            BridgeError::SigningRejected(_) | BridgeError::InvalidWitness(_) => "Refresh the page and sign again.",
            BridgeError::MalformedUnsignedTx(_) => "The transaction builder produced an unsupported encoding. Please report this.",
            BridgeError::SubmitRejected(_) => "Rebuild the transaction and try again.",
            BridgeError::Cancelled => "Start a new session.",
            BridgeError::Server(_) => "Close other bridge instances and retry.",
        }
    }

    /// Stable kind label for logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::ProviderNotFound { .. } => "provider_not_found",
            BridgeError::ConsentDenied { .. } => "consent_denied",
            BridgeError::NetworkMismatch { .. } => "network_mismatch",
            BridgeError::SigningRejected(_) => "signing_rejected",
            BridgeError::MalformedUnsignedTx(_) => "malformed_unsigned_tx",
            BridgeError::InvalidWitness(_) => "invalid_witness",
            BridgeError::SubmitRejected(_) => "submit_rejected",
            BridgeError::Cancelled => "cancelled",
            BridgeError::Server(_) => "server",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalises_thrown_values() {
        assert_eq!(ProviderError::from_value(json!("nope")).info, "nope");

        let cip30 = ProviderError::from_value(json!({"code": -3, "info": "user declined"}));
        assert_eq!(cip30.code, Some(-3));
        assert_eq!(cip30.to_string(), "user declined");

        let js_error = ProviderError::from_value(json!({"message": "boom"}));
        assert_eq!(js_error.info, "boom");
        assert_eq!(js_error.code, None);

        let odd = ProviderError::from_value(json!({"weird": [1, 2]}));
        assert_eq!(odd.info, r#"{"weird":[1,2]}"#);

        assert_eq!(ProviderError::from_value(json!(42)).info, "42");
        assert_eq!(ProviderError::from_value(Value::Null).info, "unknown provider error");
    }

    #[test]
    fn mismatch_names_required_network() {
        let err = BridgeError::NetworkMismatch { expected: NetworkContext::Mainnet, reported: 0 };
        assert!(err.to_string().contains("mainnet"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn builder_defect_is_distinct() {
        let err = BridgeError::MalformedUnsignedTx(SpliceError::Truncated { offset: 3 });
        assert!(err.is_builder_defect());
        assert!(!err.is_recoverable());

        let provider_side = BridgeError::InvalidWitness(SpliceError::Truncated { offset: 3 });
        assert!(!provider_side.is_builder_defect());
        assert!(provider_side.is_recoverable());
    }

    #[test]
    fn consent_denied_is_verbatim() {
        let err = BridgeError::ConsentDenied {
            provider: "eternl".into(),
            reason: ProviderError::new("User rejected"),
        };
        assert!(err.to_string().ends_with("User rejected"));
        assert_eq!(err.kind(), "consent_denied");
        assert!(err.remedy().contains("different wallet"));
    }
}
