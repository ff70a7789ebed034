//! Transaction byte strings as they move through a session
//!
//! ```text
//! UnsignedTxPayload ──signTx──▶ WitnessFragment
//!         │                          │
//!         └────────── splice ────────┘
//!                        │
//!                        ▼
//!                   FinalizedTx ──submitTx──▶ TxId
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::splice::SpliceError;

fn decode_hex(input: &str) -> Result<Vec<u8>, SpliceError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SpliceError::Empty);
    }
    hex::decode(trimmed).map_err(|e| SpliceError::InvalidHex(e.to_string()))
}

/// Unsigned transaction produced by the external wallet-logic service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTxPayload {
    hex: String,
    bytes: Vec<u8>,
}

impl UnsignedTxPayload {
    pub fn from_hex(input: &str) -> Result<Self, SpliceError> {
        let bytes = decode_hex(input)?;
        Ok(Self { hex: hex::encode(&bytes), bytes })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { hex: hex::encode(&bytes), bytes }
    }

    pub fn as_hex(&self) -> &str { &self.hex }
    pub fn as_bytes(&self) -> &[u8] { &self.bytes }
}

/// Partial witness set returned by a provider's `signTx`. Consumed by one splice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessFragment(Vec<u8>);

impl WitnessFragment {
    pub fn from_hex(input: &str) -> Result<Self, SpliceError> {
        decode_hex(input).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] { &self.0 }
    pub fn into_bytes(self) -> Vec<u8> { self.0 }
}

/// Spliced transaction ready for `submitTx`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedTx(Vec<u8>);

impl FinalizedTx {
    pub(crate) fn new(bytes: Vec<u8>) -> Self { Self(bytes) }
    pub fn as_bytes(&self) -> &[u8] { &self.0 }
    pub fn to_hex(&self) -> String { hex::encode(&self.0) }
}

/// Transaction hash reported by the provider after submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    /// Accepts the provider's answer if it is non-empty hex; normalised to lowercase.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_matches('"');
        if trimmed.is_empty() || trimmed.len() % 2 != 0 || !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_normalises_hex() {
        let p = UnsignedTxPayload::from_hex(" 84A0A0F5F6 ").unwrap();
        assert_eq!(p.as_hex(), "84a0a0f5f6");
        assert_eq!(p.as_bytes(), &[0x84, 0xa0, 0xa0, 0xf5, 0xf6]);
    }

    #[test]
    fn payload_rejects_garbage() {
        assert!(matches!(UnsignedTxPayload::from_hex(""), Err(SpliceError::Empty)));
        assert!(matches!(UnsignedTxPayload::from_hex("zz"), Err(SpliceError::InvalidHex(_))));
        assert!(matches!(WitnessFragment::from_hex("abc"), Err(SpliceError::InvalidHex(_))));
    }

    #[test]
    fn tx_id_parsing() {
        assert_eq!(TxId::parse(" \"ABcd\" ").unwrap().as_str(), "abcd");
        assert!(TxId::parse("").is_none());
        assert!(TxId::parse("xyz0").is_none());
        assert!(TxId::parse("abc").is_none());
    }
}
