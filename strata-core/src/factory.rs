//! Decoder dispatch registry
//!
//! Maps (number kind, raw value) pairs to layer decoders. The registry is
//! constructed explicitly and passed by reference wherever decoding
//! happens, so tests can run against private registries and several
//! independent registries can coexist in one process. Once populated it is
//! only read, and concurrent lookup needs no synchronization.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::number::{NamedNumber, NumberKind};
use crate::packet::Packet;

/// A layer decoder: parses one layer out of a byte window and recurses
/// into its payload through the context
pub type DecodeFn = fn(&DecodeContext<'_>, &[u8]) -> Result<Packet>;

struct DispatchTable<K: NumberKind> {
    entries: HashMap<K::Raw, DecodeFn>,
}

/// Registry of layer decoders keyed by number kind and raw value
pub struct DecoderRegistry {
    tables: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl DecoderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        DecoderRegistry {
            tables: HashMap::new(),
        }
    }

    /// Bind an empty dispatch table for a number kind
    ///
    /// A bound kind with no matching entry degrades per packet to an
    /// unknown leaf; an unbound kind is a configuration error at decode
    /// time.
    pub fn bind_kind<K: NumberKind>(&mut self) {
        self.tables
            .entry(TypeId::of::<K>())
            .or_insert_with(|| {
                Box::new(DispatchTable::<K> {
                    entries: HashMap::new(),
                })
            });
    }

    /// Register a decoder for one raw value of a number kind
    pub fn register<K: NumberKind>(&mut self, value: K::Raw, decoder: DecodeFn) {
        let table = self
            .tables
            .entry(TypeId::of::<K>())
            .or_insert_with(|| {
                Box::new(DispatchTable::<K> {
                    entries: HashMap::new(),
                })
            });
        // The box under TypeId::of::<K>() only ever holds a DispatchTable<K>.
        if let Some(table) = table.downcast_mut::<DispatchTable<K>>() {
            table.entries.insert(value, decoder);
        }
    }

    fn table<K: NumberKind>(&self) -> Result<&DispatchTable<K>> {
        self.tables
            .get(&TypeId::of::<K>())
            .and_then(|table| table.downcast_ref::<DispatchTable<K>>())
            .ok_or(Error::Registry { kind: K::NAME })
    }

    /// Decode the `[offset, offset + length)` window of `raw` as the layer
    /// selected by the first candidate number with a registered decoder
    ///
    /// Candidates are tried in the order supplied, supporting layers whose
    /// meaning depends on more than one header field. A decoder failure is
    /// recovered locally into an illegal leaf over the same window; a
    /// window whose candidates all lack decoders becomes an unknown leaf.
    /// Only configuration and bounds problems surface as errors.
    pub fn decode<K: NumberKind>(
        &self,
        raw: &[u8],
        offset: usize,
        length: usize,
        candidates: &[NamedNumber<K::Raw, K>],
    ) -> Result<Packet> {
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= raw.len())
            .ok_or(Error::Bounds {
                offset,
                length,
                available: raw.len(),
            })?;
        let window = &raw[offset..end];
        let table = self.table::<K>()?;

        if window.is_empty() {
            return Ok(Packet::Illegal {
                raw: Vec::new(),
                reason: crate::error::DecodeError::EmptyWindow,
            });
        }

        let ctx = DecodeContext { registry: self };
        for candidate in candidates {
            if let Some(decode) = table.entries.get(&candidate.value()) {
                trace!(kind = K::NAME, number = %candidate, "dispatching decoder");
                return Ok(match decode(&ctx, window) {
                    Ok(packet) => packet,
                    Err(Error::Decode(reason)) => {
                        debug!(kind = K::NAME, number = %candidate, %reason, "decode failed, wrapping illegal leaf");
                        Packet::Illegal {
                            raw: window.to_vec(),
                            reason,
                        }
                    }
                    Err(err) => return Err(err),
                });
            }
        }

        trace!(kind = K::NAME, "no decoder for any candidate, wrapping unknown leaf");
        Ok(Packet::Unknown {
            raw: window.to_vec(),
        })
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoding context handed to layer decoders so they can recurse
pub struct DecodeContext<'a> {
    registry: &'a DecoderRegistry,
}

impl<'a> DecodeContext<'a> {
    /// The registry driving this decode
    pub fn registry(&self) -> &'a DecoderRegistry {
        self.registry
    }

    /// Decode a payload window advertised under the given candidate numbers
    pub fn decode_next<K: NumberKind>(
        &self,
        window: &[u8],
        candidates: &[NamedNumber<K::Raw, K>],
    ) -> Result<Packet> {
        self.registry.decode::<K>(window, 0, window.len(), candidates)
    }
}
