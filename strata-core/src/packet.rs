//! Immutable decoded packet tree
//!
//! A decoded frame is a singly linked chain of layers (Ethernet over IPv4
//! over UDP, say) bottoming out in an opaque leaf. Nodes are immutable
//! after construction; all editing goes through the builder chain obtained
//! from [`Packet::to_builder`].

use bytes::{BufMut, BytesMut};

use crate::builder::{LayerBuilder, RawBuilder};
use crate::error::DecodeError;
use crate::header::{Capability, Header};

/// One node of a decoded packet chain
#[derive(Debug)]
pub enum Packet {
    /// A parsed protocol layer
    Layer {
        /// Decoded header, exclusively owned by this node
        header: Box<dyn Header>,
        /// Nested payload, if the layer carries one
        payload: Option<Box<Packet>>,
        /// Bytes inside this layer's window beyond what its payload
        /// consumed (link padding), preserved byte-exactly
        trailer: Vec<u8>,
    },
    /// Well-formed bytes under a protocol number with no registered decoder
    Unknown {
        /// The undecoded byte window
        raw: Vec<u8>,
    },
    /// Bytes that failed to parse under their expected protocol
    Illegal {
        /// The byte window that failed to parse
        raw: Vec<u8>,
        /// Why parsing failed
        reason: DecodeError,
    },
}

impl Packet {
    /// This node's header, if it is a parsed layer
    pub fn header(&self) -> Option<&dyn Header> {
        match self {
            Packet::Layer { header, .. } => Some(header.as_ref()),
            _ => None,
        }
    }

    /// This node's payload subtree
    pub fn payload(&self) -> Option<&Packet> {
        match self {
            Packet::Layer { payload, .. } => payload.as_deref(),
            _ => None,
        }
    }

    /// Trailer bytes owned by this node
    pub fn trailer(&self) -> &[u8] {
        match self {
            Packet::Layer { trailer, .. } => trailer,
            _ => &[],
        }
    }

    /// Raw bytes of a terminal leaf
    pub fn raw(&self) -> Option<&[u8]> {
        match self {
            Packet::Unknown { raw } | Packet::Illegal { raw, .. } => Some(raw),
            Packet::Layer { .. } => None,
        }
    }

    /// Decode failure reason, if this is an illegal leaf
    pub fn reason(&self) -> Option<&DecodeError> {
        match self {
            Packet::Illegal { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Whether this node is an unknown-protocol leaf
    pub fn is_unknown(&self) -> bool {
        matches!(self, Packet::Unknown { .. })
    }

    /// Whether this node is a failed-decode leaf
    pub fn is_illegal(&self) -> bool {
        matches!(self, Packet::Illegal { .. })
    }

    /// Total serialized length of this subtree in bytes
    pub fn total_len(&self) -> usize {
        match self {
            Packet::Layer {
                header,
                payload,
                trailer,
            } => {
                header.header_len()
                    + payload.as_ref().map_or(0, |p| p.total_len())
                    + trailer.len()
            }
            Packet::Unknown { raw } | Packet::Illegal { raw, .. } => raw.len(),
        }
    }

    /// Serialize the whole subtree into `buf`
    pub fn write_bytes(&self, buf: &mut BytesMut) {
        match self {
            Packet::Layer {
                header,
                payload,
                trailer,
            } => {
                header.write_header(buf);
                if let Some(payload) = payload {
                    payload.write_bytes(buf);
                }
                buf.put_slice(trailer);
            }
            Packet::Unknown { raw } | Packet::Illegal { raw, .. } => buf.put_slice(raw),
        }
    }

    /// Serialize the whole subtree to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.total_len());
        self.write_bytes(&mut buf);
        buf.to_vec()
    }

    /// Iterate the chain from this node toward the terminal leaf
    pub fn layers(&self) -> Layers<'_> {
        Layers { next: Some(self) }
    }

    /// The terminal node of the chain
    pub fn innermost(&self) -> &Packet {
        self.layers().last().unwrap_or(self)
    }

    /// The innermost enclosing header with `capability`
    ///
    /// Walking from this node toward the leaf, the last layer declaring the
    /// capability is the nearest one enclosing the terminal payload. This is
    /// how an edit deep in the chain finds the layers whose length or
    /// checksum fields it invalidated.
    pub fn outer_of(&self, capability: Capability) -> Option<&dyn Header> {
        let mut found = None;
        for node in self.layers() {
            if let Some(header) = node.header() {
                if header.has_capability(capability) {
                    found = Some(header);
                }
            }
        }
        found
    }

    /// Downcast this node's header to a concrete layer type
    pub fn as_layer<T: Header>(&self) -> Option<&T> {
        self.header()?.as_any().downcast_ref::<T>()
    }

    /// Reproduce the mutable builder chain mirroring this subtree
    ///
    /// Terminal leaves become raw builders; correction flags default to
    /// trusting the existing field values, so an unedited chain rebuilds
    /// byte-for-byte.
    pub fn to_builder(&self) -> Box<dyn LayerBuilder> {
        match self {
            Packet::Layer {
                header,
                payload,
                trailer,
            } => {
                let mut builder = header.to_builder();
                if let Some(payload) = payload {
                    builder.set_payload_builder(Some(payload.to_builder()));
                }
                builder.set_trailer(trailer.clone());
                builder
            }
            Packet::Unknown { raw } | Packet::Illegal { raw, .. } => {
                Box::new(RawBuilder::new(raw.clone()))
            }
        }
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Packet::Layer {
                    header: a,
                    payload: pa,
                    trailer: ta,
                },
                Packet::Layer {
                    header: b,
                    payload: pb,
                    trailer: tb,
                },
            ) => a.header_eq(b.as_ref()) && pa == pb && ta == tb,
            (Packet::Unknown { raw: a }, Packet::Unknown { raw: b }) => a == b,
            (
                Packet::Illegal { raw: a, reason: ra },
                Packet::Illegal { raw: b, reason: rb },
            ) => a == b && ra == rb,
            _ => false,
        }
    }
}

impl Eq for Packet {}

/// Iterator over the nodes of a packet chain, outermost first
pub struct Layers<'a> {
    next: Option<&'a Packet>,
}

impl<'a> Iterator for Layers<'a> {
    type Item = &'a Packet;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.payload();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct StubHeader {
        tag: u8,
        length_field: bool,
    }

    impl Header for StubHeader {
        fn layer_name(&self) -> &'static str {
            "stub"
        }

        fn header_len(&self) -> usize {
            2
        }

        fn write_header(&self, buf: &mut BytesMut) {
            buf.put_u8(0xAB);
            buf.put_u8(self.tag);
        }

        fn has_capability(&self, capability: Capability) -> bool {
            capability == Capability::LengthField && self.length_field
        }

        fn to_builder(&self) -> Box<dyn LayerBuilder> {
            Box::new(RawBuilder::new(self.header_bytes()))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn header_eq(&self, other: &dyn Header) -> bool {
            other.as_any().downcast_ref::<Self>() == Some(self)
        }
    }

    fn chain() -> Packet {
        Packet::Layer {
            header: Box::new(StubHeader {
                tag: 1,
                length_field: false,
            }),
            payload: Some(Box::new(Packet::Layer {
                header: Box::new(StubHeader {
                    tag: 2,
                    length_field: true,
                }),
                payload: Some(Box::new(Packet::Unknown {
                    raw: vec![0xDE, 0xAD],
                })),
                trailer: vec![],
            })),
            trailer: vec![0x00, 0x00],
        }
    }

    #[test]
    fn test_to_bytes_concatenates_layers() {
        let packet = chain();
        assert_eq!(
            packet.to_bytes(),
            vec![0xAB, 0x01, 0xAB, 0x02, 0xDE, 0xAD, 0x00, 0x00]
        );
    }

    #[test]
    fn test_total_len_matches_serialized_len() {
        let packet = chain();
        assert_eq!(packet.total_len(), packet.to_bytes().len());
    }

    #[test]
    fn test_layers_iterates_outermost_first() {
        let packet = chain();
        let tags: Vec<Option<u8>> = packet
            .layers()
            .map(|node| node.as_layer::<StubHeader>().map(|h| h.tag))
            .collect();
        assert_eq!(tags, vec![Some(1), Some(2), None]);
    }

    #[test]
    fn test_innermost_is_terminal_leaf() {
        let packet = chain();
        assert!(packet.innermost().is_unknown());
        assert_eq!(packet.innermost().raw(), Some(&[0xDE, 0xAD][..]));
    }

    #[test]
    fn test_outer_of_finds_innermost_enclosing() {
        let packet = chain();
        let header = packet.outer_of(Capability::LengthField).unwrap();
        let stub = header.as_any().downcast_ref::<StubHeader>().unwrap();
        assert_eq!(stub.tag, 2);

        assert!(packet.outer_of(Capability::ChecksumField).is_none());
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(chain(), chain());

        let other = Packet::Unknown { raw: vec![0xAB] };
        assert_ne!(chain(), other);
    }

    #[test]
    fn test_illegal_equality_includes_reason() {
        let a = Packet::Illegal {
            raw: vec![1, 2],
            reason: DecodeError::EmptyWindow,
        };
        let b = Packet::Illegal {
            raw: vec![1, 2],
            reason: DecodeError::Truncated {
                needed: 4,
                available: 2,
            },
        };
        assert_ne!(a, b);
    }

    #[test]
    fn test_packet_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Packet>();
    }
}
