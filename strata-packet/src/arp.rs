//! ARP layer
//!
//! Fixed 28-byte layout for Ethernet hardware and IPv4 protocol
//! addresses. ARP is terminal: it advertises no payload protocol, and any
//! bytes beyond its fixed size are left for the enclosing layer to claim
//! as padding.

use std::any::Any;
use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};
use strata_core::{
    BuildError, Capability, DecodeContext, DecodeError, EtherType, Header, LayerBuilder,
    OuterStack, Packet, Result,
};

use crate::ethernet::MacAddress;

/// Decoded ARP header (Ethernet/IPv4 flavor)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpHeader {
    /// Hardware type (1 for Ethernet)
    pub hardware_type: u16,
    /// Protocol type being resolved
    pub protocol_type: EtherType,
    /// Operation code
    pub operation: u16,
    /// Sender hardware address
    pub sender_hardware: MacAddress,
    /// Sender protocol address
    pub sender_protocol: Ipv4Addr,
    /// Target hardware address
    pub target_hardware: MacAddress,
    /// Target protocol address
    pub target_protocol: Ipv4Addr,
}

impl ArpHeader {
    /// Fixed size for 6-byte hardware and 4-byte protocol addresses
    pub const LEN: usize = 28;

    /// Request operation (1)
    pub const OP_REQUEST: u16 = 1;

    /// Reply operation (2)
    pub const OP_REPLY: u16 = 2;

    /// Parse an ARP header from the front of a byte window
    pub fn parse(window: &[u8]) -> Result<Self, DecodeError> {
        if window.len() < Self::LEN {
            return Err(DecodeError::Truncated {
                needed: Self::LEN,
                available: window.len(),
            });
        }

        let hardware_len = window[4];
        let protocol_len = window[5];
        if hardware_len != 6 || protocol_len != 4 {
            return Err(DecodeError::Malformed {
                layer: "arp",
                reason: format!(
                    "address lengths {hardware_len}/{protocol_len}, expected 6/4"
                ),
            });
        }

        Ok(ArpHeader {
            hardware_type: u16::from_be_bytes([window[0], window[1]]),
            protocol_type: EtherType::lookup(u16::from_be_bytes([window[2], window[3]])),
            operation: u16::from_be_bytes([window[6], window[7]]),
            sender_hardware: MacAddress::from_slice(&window[8..14])
                .unwrap_or(MacAddress::ZERO),
            sender_protocol: Ipv4Addr::new(window[14], window[15], window[16], window[17]),
            target_hardware: MacAddress::from_slice(&window[18..24])
                .unwrap_or(MacAddress::ZERO),
            target_protocol: Ipv4Addr::new(window[24], window[25], window[26], window[27]),
        })
    }
}

impl Header for ArpHeader {
    fn layer_name(&self) -> &'static str {
        "arp"
    }

    fn header_len(&self) -> usize {
        Self::LEN
    }

    fn write_header(&self, buf: &mut BytesMut) {
        buf.put_u16(self.hardware_type);
        buf.put_u16(self.protocol_type.value());
        buf.put_u8(6);
        buf.put_u8(4);
        buf.put_u16(self.operation);
        buf.put_slice(self.sender_hardware.as_bytes());
        buf.put_slice(&self.sender_protocol.octets());
        buf.put_slice(self.target_hardware.as_bytes());
        buf.put_slice(&self.target_protocol.octets());
    }

    fn to_builder(&self) -> Box<dyn LayerBuilder> {
        Box::new(ArpBuilder::from_header(self))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn header_eq(&self, other: &dyn Header) -> bool {
        other.as_any().downcast_ref::<Self>() == Some(self)
    }
}

/// Decode an ARP packet
pub fn decode_arp(_ctx: &DecodeContext<'_>, window: &[u8]) -> Result<Packet> {
    let header = ArpHeader::parse(window)?;
    Ok(Packet::Layer {
        header: Box::new(header),
        payload: None,
        trailer: Vec::new(),
    })
}

/// Mutable builder for an ARP layer
#[derive(Debug)]
pub struct ArpBuilder {
    hardware_type: u16,
    protocol_type: EtherType,
    operation: u16,
    sender_hardware: MacAddress,
    sender_protocol: Ipv4Addr,
    target_hardware: MacAddress,
    target_protocol: Ipv4Addr,
    trailer: Vec<u8>,
}

impl ArpBuilder {
    /// Create a builder for the given operation and addresses
    pub fn new(
        operation: u16,
        sender_hardware: MacAddress,
        sender_protocol: Ipv4Addr,
        target_hardware: MacAddress,
        target_protocol: Ipv4Addr,
    ) -> Self {
        ArpBuilder {
            hardware_type: 1,
            protocol_type: EtherType::IPV4,
            operation,
            sender_hardware,
            sender_protocol,
            target_hardware,
            target_protocol,
            trailer: Vec::new(),
        }
    }

    fn from_header(header: &ArpHeader) -> Self {
        ArpBuilder {
            hardware_type: header.hardware_type,
            protocol_type: header.protocol_type.clone(),
            operation: header.operation,
            sender_hardware: header.sender_hardware,
            sender_protocol: header.sender_protocol,
            target_hardware: header.target_hardware,
            target_protocol: header.target_protocol,
            trailer: Vec::new(),
        }
    }
}

impl LayerBuilder for ArpBuilder {
    fn layer_name(&self) -> &'static str {
        "arp"
    }

    fn payload_builder(&self) -> Option<&dyn LayerBuilder> {
        None
    }

    fn payload_builder_mut(&mut self) -> Option<&mut dyn LayerBuilder> {
        None
    }

    // ARP carries no payload.
    fn set_payload_builder(&mut self, _payload: Option<Box<dyn LayerBuilder>>) {}

    fn set_trailer(&mut self, trailer: Vec<u8>) {
        self.trailer = trailer;
    }

    fn set_correct_length(&mut self, _enabled: bool) {}

    fn set_correct_checksum(&mut self, _enabled: bool) {}

    fn has_capability(&self, _capability: Capability) -> bool {
        false
    }

    fn build_with_outers(&self, _outers: &OuterStack<'_>) -> Result<Packet, BuildError> {
        let header = ArpHeader {
            hardware_type: self.hardware_type,
            protocol_type: self.protocol_type.clone(),
            operation: self.operation,
            sender_hardware: self.sender_hardware,
            sender_protocol: self.sender_protocol,
            target_hardware: self.target_hardware,
            target_protocol: self.target_protocol,
        };
        Ok(Packet::Layer {
            header: Box::new(header),
            payload: None,
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

    fn request_bytes() -> Vec<u8> {
        vec![
            0x00, 0x01, 0x08, 0x00, // ethernet, IPv4
            0x06, 0x04, 0x00, 0x01, // lens, request
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // sender mac
            192, 168, 1, 1, // sender ip
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // target mac
            192, 168, 1, 2, // target ip
        ]
    }

    #[test]
    fn test_parse_request() {
        let header = ArpHeader::parse(&request_bytes()).unwrap();
        assert_eq!(header.hardware_type, 1);
        assert_eq!(header.protocol_type, EtherType::IPV4);
        assert_eq!(header.operation, ArpHeader::OP_REQUEST);
        assert_eq!(header.sender_protocol, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(header.target_protocol, Ipv4Addr::new(192, 168, 1, 2));
    }

    #[test]
    fn test_parse_rejects_odd_address_lengths() {
        let mut data = request_bytes();
        data[4] = 8;
        let err = ArpHeader::parse(&data).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { layer: "arp", .. }));
    }

    #[test]
    fn test_parse_truncated() {
        let err = ArpHeader::parse(&request_bytes()[..20]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                needed: 28,
                available: 20
            }
        );
    }

    #[test]
    fn test_write_header_roundtrip() {
        let header = ArpHeader::parse(&request_bytes()).unwrap();
        assert_eq!(header.header_bytes(), request_bytes());
    }

    #[test]
    fn test_builder_roundtrip() {
        let builder = ArpBuilder::new(
            ArpHeader::OP_REPLY,
            MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            Ipv4Addr::new(192, 168, 1, 1),
            MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
            Ipv4Addr::new(192, 168, 1, 2),
        );
        let packet = builder.build().unwrap();
        let header = packet.as_layer::<ArpHeader>().unwrap();
        assert_eq!(header.operation, ArpHeader::OP_REPLY);
        assert_eq!(packet.total_len(), ArpHeader::LEN);

        let reparsed = ArpHeader::parse(&packet.to_bytes()).unwrap();
        assert_eq!(&reparsed, header);
    }
}
