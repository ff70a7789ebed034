//! WitnessSplicer - attach a provider witness to an unsigned transaction
//!
//! The unsigned transaction is a CBOR array
//!
//! ```text
//! [ body, witness_set, is_valid, auxiliary_data ]     (3-item form omits is_valid)
//!         ^^^^^^^^^^^
//!         empty map `a0` when no scripts are involved,
//!         `{5: redeemers, ...}` when script inputs are spent
//! ```
//!
//! A CIP-30 `signTx` returns only a witness-set map (usually `{0: [vkeywitness]}`),
//! never the whole transaction. Splicing is a structural pass:
//!
//! | Unsigned witness set | Result witness set |
//! |----------------------|--------------------|
//! | empty placeholder | the provider map, byte-for-byte |
//! | non-empty (redeemers) | one definite map: provider entries, then the original entries |
//!
//! Everything outside the witness set (body, `is_valid`, auxiliary data) is
//! copied verbatim. Decode failures on the transaction side are builder
//! defects (`MalformedUnsignedTx`); failures on the witness side are
//! provider-side (`InvalidWitness`).

mod cbor;

use std::ops::Range;
use thiserror::Error;

use crate::error::BridgeError;
use crate::tx::{FinalizedTx, UnsignedTxPayload, WitnessFragment};

/// Structural decode failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpliceError {
    #[error("empty input")]
    Empty,

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("truncated data item at byte {offset}")]
    Truncated { offset: usize },

    #[error("invalid CBOR at byte {offset}: {message}")]
    Invalid { offset: usize, message: String },

    #[error("expected a 3 or 4 item transaction array at byte {offset}")]
    NotATransaction { offset: usize },

    #[error("expected a map at byte {offset}")]
    NotAMap { offset: usize },

    #[error("{count} trailing bytes after the data item")]
    TrailingBytes { count: usize },

    #[error("witness key {key} is already present in the transaction")]
    DuplicateWitnessKey { key: String },
}

/// Byte ranges of the top-level transaction fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxLayout {
    /// Outer array header.
    pub header: Range<usize>,
    pub body: Range<usize>,
    pub witness_set: Range<usize>,
    /// `is_valid` and auxiliary data, whatever follows the witness set.
    pub trailer: Range<usize>,
    /// Number of entries declared by the witness-set map.
    pub witness_entries: usize,
}

/// Locate body, witness set and trailer of an encoded transaction.
pub fn decode_layout(bytes: &[u8]) -> Result<TxLayout, SpliceError> {
    scan_tx(bytes).map(|(layout, _)| layout)
}

fn scan_tx(bytes: &[u8]) -> Result<(TxLayout, Vec<cbor::MapEntry>), SpliceError> {
    if bytes.is_empty() {
        return Err(SpliceError::Empty);
    }
    let mut scan = cbor::Scanner::new(bytes);
    let items = match scan.definite_array()? {
        Some(n @ 3..=4) => n,
        _ => return Err(SpliceError::NotATransaction { offset: 0 }),
    };
    let header = 0..scan.position();
    let body = scan.skip_item()?;

    let witness_start = scan.position();
    let entries = scan.map_entries()?;
    let witness_end = scan.position();

    for _ in 2..items {
        scan.skip_item()?;
    }
    if scan.remaining() > 0 {
        return Err(SpliceError::TrailingBytes { count: scan.remaining() });
    }

    let layout = TxLayout {
        header,
        body,
        witness_set: witness_start..witness_end,
        trailer: witness_end..bytes.len(),
        witness_entries: entries.len(),
    };
    Ok((layout, entries))
}

/// Decode a provider witness: exactly one CBOR map and nothing after it.
fn witness_entries(bytes: &[u8]) -> Result<Vec<cbor::MapEntry>, SpliceError> {
    if bytes.is_empty() {
        return Err(SpliceError::Empty);
    }
    let mut scan = cbor::Scanner::new(bytes);
    let entries = scan.map_entries()?;
    if scan.remaining() > 0 {
        return Err(SpliceError::TrailingBytes { count: scan.remaining() });
    }
    Ok(entries)
}

/// Pure binary transform: unsigned transaction + witness fragment → finalized transaction.
pub struct WitnessSplicer;

impl WitnessSplicer {
    pub fn splice(unsigned: &UnsignedTxPayload, witness: &WitnessFragment) -> Result<FinalizedTx, BridgeError> {
        Self::splice_bytes(unsigned.as_bytes(), witness.as_bytes()).map(FinalizedTx::new)
    }

    /// Hex in, hex out. Invalid hex on either side is reported against that side.
    pub fn splice_hex(unsigned_hex: &str, witness_hex: &str) -> Result<String, BridgeError> {
        let unsigned = UnsignedTxPayload::from_hex(unsigned_hex).map_err(BridgeError::MalformedUnsignedTx)?;
        let witness = WitnessFragment::from_hex(witness_hex).map_err(BridgeError::InvalidWitness)?;
        Self::splice(&unsigned, &witness).map(|tx| tx.to_hex())
    }

    pub fn splice_bytes(tx: &[u8], witness: &[u8]) -> Result<Vec<u8>, BridgeError> {
        let (layout, existing) = scan_tx(tx).map_err(BridgeError::MalformedUnsignedTx)?;
        let provided = witness_entries(witness).map_err(BridgeError::InvalidWitness)?;

        let mut out = Vec::with_capacity(tx.len() + witness.len());
        out.extend_from_slice(&tx[..layout.witness_set.start]);

        if existing.is_empty() {
            // placeholder: the provider's map takes its place untouched
            out.extend_from_slice(witness);
        } else {
            for entry in &provided {
                let key = &witness[entry.key.clone()];
                let id = cbor::key_id(key);
                if existing.iter().any(|e| cbor::key_id(&tx[e.key.clone()]) == id) {
                    return Err(BridgeError::InvalidWitness(SpliceError::DuplicateWitnessKey { key: hex::encode(key) }));
                }
            }
            out.extend_from_slice(&cbor::map_header((provided.len() + existing.len()) as u64));
            for entry in &provided {
                out.extend_from_slice(&witness[entry.span()]);
            }
            // redeemers and any other script witnesses follow the provider's entries
            for entry in &existing {
                out.extend_from_slice(&tx[entry.span()]);
            }
        }

        out.extend_from_slice(&tx[layout.trailer]);
        tracing::debug!(
            unsigned_len = tx.len(),
            witness_len = witness.len(),
            finalized_len = out.len(),
            merged = !existing.is_empty(),
            "spliced witness"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // [ {0: [], 2: 0}, {}, true, null ]
    const PLAIN_TX: &str = "84a200800200a0f5f6";
    // [ {0: [], 2: 0}, {5: [[0, 0, 0, [1, 1]]]}, true, null ]
    const REDEEMER_TX: &str = "84a200800200a1058184000000820101f5f6";
    // {0: [[h'01', h'02']]}
    const WITNESS: &str = "a100818241014102";

    #[test]
    fn layout_of_plain_tx() {
        let bytes = hex::decode(PLAIN_TX).unwrap();
        let layout = decode_layout(&bytes).unwrap();
        assert_eq!(layout.header, 0..1);
        assert_eq!(layout.body, 1..6);
        assert_eq!(layout.witness_set, 6..7);
        assert_eq!(layout.trailer, 7..9);
        assert_eq!(layout.witness_entries, 0);
    }

    #[test]
    fn plain_splice_replaces_placeholder() {
        let out = WitnessSplicer::splice_hex(PLAIN_TX, WITNESS).unwrap();
        assert_eq!(out, format!("84a200800200{WITNESS}f5f6"));
    }

    #[test]
    fn redeemer_splice_merges_maps() {
        let out = WitnessSplicer::splice_hex(REDEEMER_TX, WITNESS).unwrap();
        assert_eq!(out, format!("84a200800200a2{}058184000000820101f5f6", &WITNESS[2..]));
    }

    #[test]
    fn three_item_transactions_are_supported() {
        // [ {}, {}, null ]
        let out = WitnessSplicer::splice_hex("83a0a0f6", "a10080").unwrap();
        assert_eq!(out, "83a0a10080f6");
    }

    #[test]
    fn tx_side_failures_are_malformed() {
        for bad in ["a0", "82a0a0", "84a0a0f5", "84a0a0f5f600", "84a080f5f6", "zz"] {
            let err = WitnessSplicer::splice_hex(bad, "a10080").unwrap_err();
            assert!(matches!(err, BridgeError::MalformedUnsignedTx(_)), "{bad}: {err}");
        }
    }

    #[test]
    fn witness_side_failures_are_invalid_witness() {
        for bad in ["", "80", "a100", "a10080ff"] {
            let err = WitnessSplicer::splice_hex(PLAIN_TX, bad).unwrap_err();
            assert!(matches!(err, BridgeError::InvalidWitness(_)), "{bad:?}: {err}");
        }
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        // tx already carries key 0
        let err = WitnessSplicer::splice_hex("84a0a10080f5f6", "a10080").unwrap_err();
        match err {
            BridgeError::InvalidWitness(SpliceError::DuplicateWitnessKey { key }) => assert_eq!(key, "00"),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn duplicate_keys_match_across_encodings() {
        // provider sends key 5 in the two-byte form
        let err = WitnessSplicer::splice_hex("84a0a10580f5f6", "a1180580").unwrap_err();
        match err {
            BridgeError::InvalidWitness(SpliceError::DuplicateWitnessKey { key }) => assert_eq!(key, "1805"),
            other => panic!("unexpected {other}"),
        }
        // and the other way round
        assert!(WitnessSplicer::splice_hex("84a0a119000580f5f6", "a10580").is_err());
    }
}
