//! UDP layer
//!
//! Declares a length field covering header plus payload and a
//! pseudo-header checksum that borrows the enclosing addresses and
//! protocol number. A computed checksum of zero transmits as 0xFFFF, since
//! zero on the wire means "no checksum".

use std::any::Any;

use bytes::{BufMut, BytesMut};
use strata_core::{
    BuildError, Capability, DecodeContext, DecodeError, Header, LayerBuilder, OuterStack, Packet,
    Port, PortKind, Result,
};

use crate::checksum::pseudo_header_checksum;
use crate::length::LengthSemantics;

/// Decoded UDP header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpHeader {
    /// Source port
    pub source_port: Port,
    /// Destination port
    pub destination_port: Port,
    /// Length of header plus payload in bytes
    pub length: u16,
    /// Pseudo-header checksum, 0 when unused
    pub checksum: u16,
}

impl UdpHeader {
    /// Header size
    pub const LEN: usize = 8;

    /// Parse a UDP header from the front of a byte window
    pub fn parse(window: &[u8]) -> Result<Self, DecodeError> {
        if window.len() < Self::LEN {
            return Err(DecodeError::Truncated {
                needed: Self::LEN,
                available: window.len(),
            });
        }

        let length = u16::from_be_bytes([window[4], window[5]]);
        if (length as usize) < Self::LEN {
            return Err(DecodeError::Malformed {
                layer: "udp",
                reason: format!("length {length} smaller than {}-byte header", Self::LEN),
            });
        }
        if length as usize > window.len() {
            return Err(DecodeError::LengthMismatch {
                declared: length as usize,
                available: window.len(),
            });
        }

        Ok(UdpHeader {
            source_port: Port::lookup(u16::from_be_bytes([window[0], window[1]])),
            destination_port: Port::lookup(u16::from_be_bytes([window[2], window[3]])),
            length,
            checksum: u16::from_be_bytes([window[6], window[7]]),
        })
    }
}

impl Header for UdpHeader {
    fn layer_name(&self) -> &'static str {
        "udp"
    }

    fn header_len(&self) -> usize {
        Self::LEN
    }

    fn write_header(&self, buf: &mut BytesMut) {
        buf.put_u16(self.source_port.value());
        buf.put_u16(self.destination_port.value());
        buf.put_u16(self.length);
        buf.put_u16(self.checksum);
    }

    fn has_capability(&self, capability: Capability) -> bool {
        matches!(
            capability,
            Capability::LengthField | Capability::ChecksumField
        )
    }

    fn to_builder(&self) -> Box<dyn LayerBuilder> {
        Box::new(UdpBuilder::from_header(self))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn header_eq(&self, other: &dyn Header) -> bool {
        other.as_any().downcast_ref::<Self>() == Some(self)
    }
}

/// Decode a UDP datagram and recurse into its payload
///
/// The destination port is tried before the source port when picking an
/// application decoder, so a reply and a request to a well-known service
/// both dispatch on the service port.
pub fn decode_udp(ctx: &DecodeContext<'_>, window: &[u8]) -> Result<Packet> {
    let header = UdpHeader::parse(window)?;
    let span = &window[UdpHeader::LEN..header.length as usize];

    let payload = if span.is_empty() {
        None
    } else {
        let candidates = [
            header.destination_port.clone(),
            header.source_port.clone(),
        ];
        Some(ctx.decode_next::<PortKind>(span, &candidates)?)
    };

    Ok(Packet::Layer {
        header: Box::new(header),
        payload: payload.map(Box::new),
        trailer: Vec::new(),
    })
}

/// Mutable builder for a UDP layer
#[derive(Debug)]
pub struct UdpBuilder {
    source_port: Port,
    destination_port: Port,
    length: u16,
    checksum: u16,
    correct_length: bool,
    correct_checksum: bool,
    payload: Option<Box<dyn LayerBuilder>>,
    trailer: Vec<u8>,
}

impl UdpBuilder {
    /// Create a builder with the ports set
    pub fn new(source_port: Port, destination_port: Port) -> Self {
        UdpBuilder {
            source_port,
            destination_port,
            length: 0,
            checksum: 0,
            correct_length: false,
            correct_checksum: false,
            payload: None,
            trailer: Vec::new(),
        }
    }

    fn from_header(header: &UdpHeader) -> Self {
        UdpBuilder {
            source_port: header.source_port.clone(),
            destination_port: header.destination_port.clone(),
            length: header.length,
            checksum: header.checksum,
            correct_length: false,
            correct_checksum: false,
            payload: None,
            trailer: Vec::new(),
        }
    }
}

impl LayerBuilder for UdpBuilder {
    fn layer_name(&self) -> &'static str {
        "udp"
    }

    fn payload_builder(&self) -> Option<&dyn LayerBuilder> {
        self.payload.as_deref()
    }

    fn payload_builder_mut(&mut self) -> Option<&mut dyn LayerBuilder> {
        self.payload.as_deref_mut()
    }

    fn set_payload_builder(&mut self, payload: Option<Box<dyn LayerBuilder>>) {
        self.payload = payload;
    }

    fn set_trailer(&mut self, trailer: Vec<u8>) {
        self.trailer = trailer;
    }

    fn set_correct_length(&mut self, enabled: bool) {
        self.correct_length = enabled;
    }

    fn set_correct_checksum(&mut self, enabled: bool) {
        self.correct_checksum = enabled;
    }

    fn has_capability(&self, capability: Capability) -> bool {
        matches!(
            capability,
            Capability::LengthField | Capability::ChecksumField
        )
    }

    fn build_with_outers(&self, outers: &OuterStack<'_>) -> Result<Packet, BuildError> {
        let payload = match &self.payload {
            Some(builder) => Some(builder.build_with_outers(&outers.with(self))?),
            None => None,
        };
        let payload_bytes = payload.as_ref().map(Packet::to_bytes).unwrap_or_default();
        let span_len = payload_bytes.len() + self.trailer.len();

        let mut header = UdpHeader {
            source_port: self.source_port.clone(),
            destination_port: self.destination_port.clone(),
            length: self.length,
            checksum: self.checksum,
        };

        if self.correct_length {
            let value = LengthSemantics::HeaderAndPayload.field_value(UdpHeader::LEN, span_len);
            if value > u16::MAX as usize {
                return Err(BuildError::OversizedPayload {
                    layer: "udp",
                    len: span_len,
                    max: u16::MAX as usize - UdpHeader::LEN,
                });
            }
            header.length = value as u16;
        }

        if self.correct_checksum {
            let pseudo = outers
                .find(Capability::PseudoHeaderSource)
                .and_then(|outer| outer.pseudo_header())
                .ok_or(BuildError::MissingOuter {
                    layer: "udp",
                    needs: "pseudo-header fields",
                })?;

            header.checksum = 0;
            let mut data = header.header_bytes();
            data.extend_from_slice(&payload_bytes);
            data.extend_from_slice(&self.trailer);
            let value = pseudo_header_checksum(
                &pseudo.source,
                &pseudo.destination,
                pseudo.protocol,
                &data,
            );
            // Zero on the wire means "no checksum"
            header.checksum = if value == 0 { 0xFFFF } else { value };
        }

        Ok(Packet::Layer {
            header: Box::new(header),
            payload: payload.map(Box::new),
            trailer: self.trailer.clone(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipv4::Ipv4Builder;
    use std::net::Ipv4Addr;
    use strata_core::{IpNumber, RawBuilder};

    #[test]
    fn test_parse_header() {
        let data = [
            0x30, 0x39, 0x00, 0x35, // ports 12345 -> 53
            0x00, 0x0C, 0xBE, 0xEF, // length 12, checksum
            0x01, 0x02, 0x03, 0x04, // payload
        ];
        let header = UdpHeader::parse(&data).unwrap();
        assert_eq!(header.source_port.value(), 12345);
        assert_eq!(header.destination_port, Port::DNS);
        assert_eq!(header.length, 12);
        assert_eq!(header.checksum, 0xBEEF);
    }

    #[test]
    fn test_parse_rejects_declared_length_past_window() {
        let data = [0x30, 0x39, 0x00, 0x35, 0x00, 0x20, 0x00, 0x00];
        let err = UdpHeader::parse(&data).unwrap_err();
        assert_eq!(
            err,
            DecodeError::LengthMismatch {
                declared: 32,
                available: 8
            }
        );
    }

    #[test]
    fn test_parse_rejects_length_below_header() {
        let data = [0x30, 0x39, 0x00, 0x35, 0x00, 0x04, 0x00, 0x00];
        let err = UdpHeader::parse(&data).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { layer: "udp", .. }));
    }

    #[test]
    fn test_builder_corrects_length() {
        let mut builder = UdpBuilder::new(Port::unknown(12345), Port::DNS);
        builder.set_payload_builder(Some(Box::new(RawBuilder::new(vec![0; 16]))));
        builder.set_correct_length(true);

        let packet = builder.build().unwrap();
        let header = packet.as_layer::<UdpHeader>().unwrap();
        assert_eq!(header.length, 24);
    }

    #[test]
    fn test_checksum_needs_outer_pseudo_header_source() {
        let mut builder = UdpBuilder::new(Port::unknown(12345), Port::DNS);
        builder.set_correct_checksum(true);

        let err = builder.build().unwrap_err();
        assert_eq!(
            err,
            BuildError::MissingOuter {
                layer: "udp",
                needs: "pseudo-header fields"
            }
        );
    }

    #[test]
    fn test_checksum_borrows_outer_fields() {
        let ipv4 = Ipv4Builder::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2))
            .with_protocol(IpNumber::UDP);

        let mut builder = UdpBuilder::new(Port::unknown(12345), Port::DNS);
        builder.set_payload_builder(Some(Box::new(RawBuilder::new(vec![0xAA, 0xBB]))));
        builder.set_correct_length(true);
        builder.set_correct_checksum(true);

        let outers = OuterStack::empty().with(&ipv4);
        let packet = builder.build_with_outers(&outers).unwrap();
        let header = packet.as_layer::<UdpHeader>().unwrap();

        // Validate against the pseudo-header sum of the built bytes.
        let mut data = header.header_bytes();
        data[6] = 0;
        data[7] = 0;
        data.extend_from_slice(&[0xAA, 0xBB]);
        let expected =
            pseudo_header_checksum(&[10, 0, 0, 1], &[10, 0, 0, 2], 17, &data);
        assert_eq!(header.checksum, expected);
        assert_ne!(header.checksum, 0);
    }
}
