//! Header contract shared by all protocol layers
//!
//! A header is the decoded, immutable front portion of one layer. It
//! re-serializes deterministically from its own fields, never from the
//! bytes it was parsed out of, and it knows how to produce the mutable
//! builder that mirrors it.

use std::any::Any;
use std::fmt;

use bytes::BytesMut;

use crate::builder::LayerBuilder;

/// A structural property a layer may declare
///
/// Used by outer-layer traversal to find the nearest enclosing layer that
/// must participate when a payload edit forces corrections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The header carries a field declaring the length of what follows
    LengthField,
    /// The header carries a checksum field
    ChecksumField,
    /// The layer can lend fields for an enclosed pseudo-header checksum
    PseudoHeaderSource,
}

/// Fields borrowed from an enclosing layer for a pseudo-header checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PseudoHeader {
    /// Source address octets
    pub source: [u8; 4],
    /// Destination address octets
    pub destination: [u8; 4],
    /// Protocol number of the enclosed layer
    pub protocol: u8,
}

/// Immutable decoded header of one protocol layer
pub trait Header: fmt::Debug + Send + Sync + 'static {
    /// Short lowercase layer name used in diagnostics
    fn layer_name(&self) -> &'static str;

    /// Serialized length of this header in bytes
    fn header_len(&self) -> usize;

    /// Serialize the header from its fields
    fn write_header(&self, buf: &mut BytesMut);

    /// Whether the layer declares the given structural property
    fn has_capability(&self, capability: Capability) -> bool {
        let _ = capability;
        false
    }

    /// Produce the mutable builder mirroring this header
    ///
    /// Correction flags default to trusting the existing field values.
    fn to_builder(&self) -> Box<dyn LayerBuilder>;

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Field-by-field equality across `dyn Header` boundaries
    fn header_eq(&self, other: &dyn Header) -> bool;

    /// Serialize the header into a fresh byte vector
    fn header_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.header_len());
        self.write_header(&mut buf);
        buf.to_vec()
    }
}
