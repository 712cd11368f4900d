//! IPv4 layer
//!
//! Carries the full header including options. IPv4 declares a total-length
//! field (header plus payload), a header-only checksum, and lends its
//! addresses and protocol number to enclosed transport layers for their
//! pseudo-header checksums.

use std::any::Any;
use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};
use strata_core::{
    BuildError, Capability, DecodeContext, DecodeError, Header, IpNumber, IpNumberKind,
    LayerBuilder, OuterStack, Packet, PseudoHeader, Result,
};

use crate::checksum::internet_checksum;
use crate::length::LengthSemantics;

/// IP header flags (3 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IpFlags {
    /// Reserved bit (must be 0)
    pub reserved: bool,
    /// Don't Fragment flag
    pub dont_fragment: bool,
    /// More Fragments flag
    pub more_fragments: bool,
}

impl IpFlags {
    /// No flags set
    pub const NONE: IpFlags = IpFlags {
        reserved: false,
        dont_fragment: false,
        more_fragments: false,
    };

    /// Don't Fragment set
    pub const DONT_FRAGMENT: IpFlags = IpFlags {
        reserved: false,
        dont_fragment: true,
        more_fragments: false,
    };

    /// Convert to the 3-bit wire value
    pub fn to_u8(self) -> u8 {
        let mut flags = 0u8;
        if self.reserved {
            flags |= 0b100;
        }
        if self.dont_fragment {
            flags |= 0b010;
        }
        if self.more_fragments {
            flags |= 0b001;
        }
        flags
    }

    /// Parse from the 3-bit wire value
    pub fn from_u8(value: u8) -> Self {
        IpFlags {
            reserved: (value & 0b100) != 0,
            dont_fragment: (value & 0b010) != 0,
            more_fragments: (value & 0b001) != 0,
        }
    }
}

/// Decoded IPv4 header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Type of Service / DSCP byte
    pub tos: u8,
    /// Total length (header + payload) in bytes
    pub total_length: u16,
    /// Identification
    pub identification: u16,
    /// Flags
    pub flags: IpFlags,
    /// Fragment offset in 8-byte blocks
    pub fragment_offset: u16,
    /// Time to Live
    pub ttl: u8,
    /// Payload protocol number
    pub protocol: IpNumber,
    /// Header checksum
    pub checksum: u16,
    /// Source address
    pub source: Ipv4Addr,
    /// Destination address
    pub destination: Ipv4Addr,
    /// Options, padded to a 4-byte boundary
    pub options: Vec<u8>,
}

impl Ipv4Header {
    /// Minimum header size (without options)
    pub const MIN_LEN: usize = 20;

    /// Maximum total packet size
    pub const MAX_PACKET_SIZE: usize = 65535;

    /// Parse an IPv4 header from the front of a byte window
    ///
    /// A declared total length exceeding the window is a structural
    /// failure for the whole window; truncation is reported, never masked
    /// by reinterpreting the bytes under another protocol.
    pub fn parse(window: &[u8]) -> Result<Self, DecodeError> {
        if window.len() < Self::MIN_LEN {
            return Err(DecodeError::Truncated {
                needed: Self::MIN_LEN,
                available: window.len(),
            });
        }

        let version = window[0] >> 4;
        if version != 4 {
            return Err(DecodeError::Malformed {
                layer: "ipv4",
                reason: format!("version {version}, expected 4"),
            });
        }

        let ihl = window[0] & 0x0F;
        if ihl < 5 {
            return Err(DecodeError::Malformed {
                layer: "ipv4",
                reason: format!("header length {ihl} words, minimum is 5"),
            });
        }
        let header_len = (ihl as usize) * 4;
        if window.len() < header_len {
            return Err(DecodeError::Truncated {
                needed: header_len,
                available: window.len(),
            });
        }

        let total_length = u16::from_be_bytes([window[2], window[3]]);
        if (total_length as usize) < header_len {
            return Err(DecodeError::Malformed {
                layer: "ipv4",
                reason: format!(
                    "total length {total_length} smaller than {header_len}-byte header"
                ),
            });
        }
        if total_length as usize > window.len() {
            return Err(DecodeError::LengthMismatch {
                declared: total_length as usize,
                available: window.len(),
            });
        }

        let flags_and_offset = u16::from_be_bytes([window[6], window[7]]);

        Ok(Ipv4Header {
            tos: window[1],
            total_length,
            identification: u16::from_be_bytes([window[4], window[5]]),
            flags: IpFlags::from_u8((flags_and_offset >> 13) as u8),
            fragment_offset: flags_and_offset & 0x1FFF,
            ttl: window[8],
            protocol: IpNumber::lookup(window[9]),
            checksum: u16::from_be_bytes([window[10], window[11]]),
            source: Ipv4Addr::new(window[12], window[13], window[14], window[15]),
            destination: Ipv4Addr::new(window[16], window[17], window[18], window[19]),
            options: window[Self::MIN_LEN..header_len].to_vec(),
        })
    }
}

impl Header for Ipv4Header {
    fn layer_name(&self) -> &'static str {
        "ipv4"
    }

    fn header_len(&self) -> usize {
        Self::MIN_LEN + self.options.len()
    }

    fn write_header(&self, buf: &mut BytesMut) {
        let ihl = (self.header_len() / 4) as u8;
        buf.put_u8((4 << 4) | (ihl & 0x0F));
        buf.put_u8(self.tos);
        buf.put_u16(self.total_length);
        buf.put_u16(self.identification);
        buf.put_u16(((self.flags.to_u8() as u16) << 13) | (self.fragment_offset & 0x1FFF));
        buf.put_u8(self.ttl);
        buf.put_u8(self.protocol.value());
        buf.put_u16(self.checksum);
        buf.put_slice(&self.source.octets());
        buf.put_slice(&self.destination.octets());
        buf.put_slice(&self.options);
    }

    fn has_capability(&self, capability: Capability) -> bool {
        matches!(
            capability,
            Capability::LengthField | Capability::ChecksumField | Capability::PseudoHeaderSource
        )
    }

    fn to_builder(&self) -> Box<dyn LayerBuilder> {
        Box::new(Ipv4Builder::from_header(self))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn header_eq(&self, other: &dyn Header) -> bool {
        other.as_any().downcast_ref::<Self>() == Some(self)
    }
}

/// Decode an IPv4 packet and recurse into its payload
///
/// Consumes exactly the declared total length; anything beyond it in the
/// window is left for the enclosing layer to claim as padding. Surplus
/// inside the declared span after the payload's own consumption becomes
/// this layer's trailer.
pub fn decode_ipv4(ctx: &DecodeContext<'_>, window: &[u8]) -> Result<Packet> {
    let header = Ipv4Header::parse(window)?;
    let header_len = header.header_len();
    let span = &window[header_len..header.total_length as usize];

    let (payload, trailer) = if span.is_empty() {
        (None, Vec::new())
    } else {
        let packet = ctx.decode_next::<IpNumberKind>(span, &[header.protocol.clone()])?;
        let consumed = packet.total_len();
        (Some(packet), span[consumed..].to_vec())
    };

    Ok(Packet::Layer {
        header: Box::new(header),
        payload: payload.map(Box::new),
        trailer,
    })
}

/// Mutable builder for an IPv4 layer
#[derive(Debug)]
pub struct Ipv4Builder {
    source: Option<Ipv4Addr>,
    destination: Option<Ipv4Addr>,
    protocol: Option<IpNumber>,
    tos: u8,
    total_length: u16,
    identification: u16,
    flags: IpFlags,
    fragment_offset: u16,
    ttl: u8,
    checksum: u16,
    options: Vec<u8>,
    correct_length: bool,
    correct_checksum: bool,
    payload: Option<Box<dyn LayerBuilder>>,
    trailer: Vec<u8>,
}

impl Default for Ipv4Builder {
    fn default() -> Self {
        Ipv4Builder {
            source: None,
            destination: None,
            protocol: None,
            tos: 0,
            total_length: 0,
            identification: 0,
            flags: IpFlags::DONT_FRAGMENT,
            fragment_offset: 0,
            ttl: 64,
            checksum: 0,
            options: Vec::new(),
            correct_length: false,
            correct_checksum: false,
            payload: None,
            trailer: Vec::new(),
        }
    }
}

impl Ipv4Builder {
    /// Create a builder with the addresses set
    pub fn new(source: Ipv4Addr, destination: Ipv4Addr) -> Self {
        Ipv4Builder {
            source: Some(source),
            destination: Some(destination),
            ..Default::default()
        }
    }

    fn from_header(header: &Ipv4Header) -> Self {
        Ipv4Builder {
            source: Some(header.source),
            destination: Some(header.destination),
            protocol: Some(header.protocol.clone()),
            tos: header.tos,
            total_length: header.total_length,
            identification: header.identification,
            flags: header.flags,
            fragment_offset: header.fragment_offset,
            ttl: header.ttl,
            checksum: header.checksum,
            options: header.options.clone(),
            ..Default::default()
        }
    }

    /// Set the payload protocol number
    pub fn with_protocol(mut self, protocol: IpNumber) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// Set the Time to Live
    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the identification field
    pub fn with_identification(mut self, identification: u16) -> Self {
        self.identification = identification;
        self
    }

    /// Set the flags
    pub fn with_flags(mut self, flags: IpFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set options, padded to a 4-byte boundary
    pub fn with_options(mut self, options: Vec<u8>) -> Self {
        let padded_len = (options.len() + 3) & !3;
        let mut options = options;
        options.resize(padded_len, 0);
        self.options = options;
        self
    }

    /// The currently configured payload protocol
    pub fn protocol(&self) -> Option<&IpNumber> {
        self.protocol.as_ref()
    }

    /// Set the payload protocol number in place
    pub fn set_protocol(&mut self, protocol: IpNumber) {
        self.protocol = Some(protocol);
    }
}

impl LayerBuilder for Ipv4Builder {
    fn layer_name(&self) -> &'static str {
        "ipv4"
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
            Capability::LengthField | Capability::ChecksumField | Capability::PseudoHeaderSource
        )
    }

    fn pseudo_header(&self) -> Option<PseudoHeader> {
        Some(PseudoHeader {
            source: self.source?.octets(),
            destination: self.destination?.octets(),
            protocol: self.protocol.as_ref()?.value(),
        })
    }

    fn build_with_outers(&self, outers: &OuterStack<'_>) -> Result<Packet, BuildError> {
        let source = self.source.ok_or(BuildError::MissingField {
            layer: "ipv4",
            field: "source",
        })?;
        let destination = self.destination.ok_or(BuildError::MissingField {
            layer: "ipv4",
            field: "destination",
        })?;
        let protocol = self.protocol.clone().ok_or(BuildError::MissingField {
            layer: "ipv4",
            field: "protocol",
        })?;

        let payload = match &self.payload {
            Some(builder) => Some(builder.build_with_outers(&outers.with(self))?),
            None => None,
        };
        let payload_len = payload.as_ref().map_or(0, Packet::total_len) + self.trailer.len();

        let mut header = Ipv4Header {
            tos: self.tos,
            total_length: self.total_length,
            identification: self.identification,
            flags: self.flags,
            fragment_offset: self.fragment_offset,
            ttl: self.ttl,
            protocol,
            checksum: self.checksum,
            source,
            destination,
            options: self.options.clone(),
        };

        if self.correct_length {
            let value =
                LengthSemantics::HeaderAndPayload.field_value(header.header_len(), payload_len);
            if value > Ipv4Header::MAX_PACKET_SIZE {
                return Err(BuildError::OversizedPayload {
                    layer: "ipv4",
                    len: payload_len,
                    max: Ipv4Header::MAX_PACKET_SIZE - header.header_len(),
                });
            }
            header.total_length = value as u16;
        }

        if self.correct_checksum {
            header.checksum = 0;
            header.checksum = internet_checksum(&header.header_bytes());
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
    use crate::checksum::validate_checksum;
    use strata_core::RawBuilder;

    fn header_bytes(total_length: u16, protocol: u8) -> Vec<u8> {
        let mut data = vec![
            0x45, 0x00, 0x00, 0x00, // version/ihl, tos, total length
            0x12, 0x34, 0x40, 0x00, // identification, flags/offset (DF)
            0x40, 0x00, 0x00, 0x00, // ttl, protocol, checksum
            192, 168, 1, 1, // source
            192, 168, 1, 2, // destination
        ];
        data[2..4].copy_from_slice(&total_length.to_be_bytes());
        data[9] = protocol;
        data
    }

    #[test]
    fn test_parse_header() {
        let data = header_bytes(20, 17);
        let header = Ipv4Header::parse(&data).unwrap();
        assert_eq!(header.total_length, 20);
        assert_eq!(header.identification, 0x1234);
        assert!(header.flags.dont_fragment);
        assert_eq!(header.ttl, 64);
        assert_eq!(header.protocol, IpNumber::UDP);
        assert_eq!(header.source, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(header.destination, Ipv4Addr::new(192, 168, 1, 2));
        assert!(header.options.is_empty());
    }

    #[test]
    fn test_parse_rejects_wrong_version() {
        let mut data = header_bytes(20, 17);
        data[0] = 0x65;
        let err = Ipv4Header::parse(&data).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { layer: "ipv4", .. }));
    }

    #[test]
    fn test_parse_rejects_declared_length_past_window() {
        let data = header_bytes(64, 17);
        let err = Ipv4Header::parse(&data).unwrap_err();
        assert_eq!(
            err,
            DecodeError::LengthMismatch {
                declared: 64,
                available: 20
            }
        );
    }

    #[test]
    fn test_parse_rejects_total_length_below_header() {
        let data = header_bytes(12, 17);
        let err = Ipv4Header::parse(&data).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { layer: "ipv4", .. }));
    }

    #[test]
    fn test_write_header_roundtrip() {
        let data = header_bytes(20, 6);
        let header = Ipv4Header::parse(&data).unwrap();
        assert_eq!(header.header_bytes(), data);
    }

    #[test]
    fn test_builder_corrects_length_and_checksum() {
        let mut builder =
            Ipv4Builder::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2))
                .with_protocol(IpNumber::UDP);
        builder.set_payload_builder(Some(Box::new(RawBuilder::new(vec![0xAB; 12]))));
        builder.set_correct_length(true);
        builder.set_correct_checksum(true);

        let packet = builder.build().unwrap();
        let header = packet.as_layer::<Ipv4Header>().unwrap();
        assert_eq!(header.total_length, 32);
        assert_ne!(header.checksum, 0);
        assert!(validate_checksum(&header.header_bytes()));
    }

    #[test]
    fn test_builder_trusts_stored_fields_by_default() {
        let mut builder =
            Ipv4Builder::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2))
                .with_protocol(IpNumber::UDP);
        builder.set_payload_builder(Some(Box::new(RawBuilder::new(vec![0xAB; 12]))));

        let packet = builder.build().unwrap();
        let header = packet.as_layer::<Ipv4Header>().unwrap();
        // Stale values are kept when correction is not requested.
        assert_eq!(header.total_length, 0);
        assert_eq!(header.checksum, 0);
    }

    #[test]
    fn test_builder_missing_address() {
        let builder = Ipv4Builder::default().with_protocol(IpNumber::UDP);
        let err = builder.build().unwrap_err();
        assert_eq!(
            err,
            BuildError::MissingField {
                layer: "ipv4",
                field: "source"
            }
        );
    }

    #[test]
    fn test_options_padded_to_word_boundary() {
        let builder =
            Ipv4Builder::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2))
                .with_protocol(IpNumber::TCP)
                .with_options(vec![0x94, 0x04, 0x00]);
        let packet = builder.build().unwrap();
        let header = packet.as_layer::<Ipv4Header>().unwrap();
        assert_eq!(header.options.len(), 4);
        assert_eq!(header.header_len(), 24);
    }
}
