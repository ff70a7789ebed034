//! Byte-range scan over `minicbor`
//!
//! The splice copies every item it keeps: the decoder only reports where an
//! item starts and ends. The merged witness-set header is the one thing
//! written fresh.
//!
//! Invariants:
//! - a scan never reads past the end of its slice; every shortfall is `Truncated`
//! - `skip_item` consumes exactly one complete data item, including tags and
//!   indefinite-length containers with their break byte

use std::ops::Range;

use pallas_codec::minicbor::data::Type;
use pallas_codec::minicbor::decode::Error as DecodeError;
use pallas_codec::minicbor::{Decoder, Encoder};

use super::SpliceError;

pub struct Scanner<'b> {
    decoder: Decoder<'b>,
}

impl<'b> Scanner<'b> {
    pub fn new(bytes: &'b [u8]) -> Self { Self { decoder: Decoder::new(bytes) } }

    pub fn position(&self) -> usize { self.decoder.position() }

    pub fn remaining(&self) -> usize { self.decoder.input().len().saturating_sub(self.position()) }

    fn fail(&self, e: DecodeError) -> SpliceError {
        let offset = self.position();
        if e.is_end_of_input() {
            SpliceError::Truncated { offset }
        } else {
            SpliceError::Invalid { offset, message: e.to_string() }
        }
    }

    pub fn datatype(&self) -> Result<Type, SpliceError> {
        self.decoder.datatype().map_err(|e| self.fail(e))
    }

    /// Declared length of a definite array. `None` for anything else.
    pub fn definite_array(&mut self) -> Result<Option<u64>, SpliceError> {
        match self.datatype()? {
            Type::Array => self.decoder.array().map_err(|e| self.fail(e)),
            _ => Ok(None),
        }
    }

    /// Skip one complete data item and return the range it occupied.
    pub fn skip_item(&mut self) -> Result<Range<usize>, SpliceError> {
        let start = self.position();
        self.decoder.skip().map_err(|e| self.fail(e))?;
        Ok(start..self.position())
    }

    /// Enumerate the entries of the map at the current position, definite or not.
    pub fn map_entries(&mut self) -> Result<Vec<MapEntry>, SpliceError> {
        let offset = self.position();
        let declared = match self.datatype()? {
            Type::Map | Type::MapIndef => self.decoder.map().map_err(|e| self.fail(e))?,
            _ => return Err(SpliceError::NotAMap { offset }),
        };

        let mut entries = Vec::new();
        match declared {
            Some(count) => {
                for _ in 0..count {
                    entries.push(self.entry()?);
                }
            }
            None => {
                while self.datatype()? != Type::Break {
                    entries.push(self.entry()?);
                }
                // step over the break
                let next = self.position() + 1;
                self.decoder.set_position(next);
            }
        }
        Ok(entries)
    }

    fn entry(&mut self) -> Result<MapEntry, SpliceError> {
        let key = self.skip_item()?;
        let value = self.skip_item()?;
        Ok(MapEntry { key, value })
    }
}

/// One key/value pair of a map, as byte ranges into the scanned slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub key: Range<usize>,
    pub value: Range<usize>,
}

impl MapEntry {
    /// Key and value are adjacent, so the whole entry is one contiguous range.
    pub fn span(&self) -> Range<usize> { self.key.start..self.value.end }
}

/// Identity of a map key. Unsigned integers compare by value whatever their
/// encoded width; any other key compares by its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyId<'b> {
    Uint(u64),
    Raw(&'b [u8]),
}

pub fn key_id(bytes: &[u8]) -> KeyId<'_> {
    let mut decoder = Decoder::new(bytes);
    match decoder.datatype() {
        Ok(Type::U8 | Type::U16 | Type::U32 | Type::U64) => match decoder.u64() {
            Ok(n) if decoder.position() == bytes.len() => KeyId::Uint(n),
            _ => KeyId::Raw(bytes),
        },
        _ => KeyId::Raw(bytes),
    }
}

/// Shortest-form definite map header for `count` entries.
pub fn map_header(count: u64) -> Vec<u8> {
    let mut encoder = Encoder::new(Vec::with_capacity(9));
    // a Vec sink is infallible
    let _ = encoder.map(count);
    encoder.into_writer()
}
