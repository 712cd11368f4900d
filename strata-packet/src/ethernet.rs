//! Ethernet II layer
//!
//! Entry layer for `LinkType::EN10MB` captures. The EtherType field
//! advertises the payload protocol; frames shorter than the 60-byte
//! minimum grow a zero trailer when `pad_at_build` is requested.

use std::any::Any;
use std::fmt;

use bytes::{BufMut, BytesMut};
use strata_core::{
    BuildError, Capability, DecodeContext, DecodeError, EtherType, EtherTypeKind, Header,
    LayerBuilder, OuterStack, Packet, Result,
};

/// MAC address (6 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Broadcast address (FF:FF:FF:FF:FF:FF)
    pub const BROADCAST: MacAddress = MacAddress([0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);

    /// Zero address (00:00:00:00:00:00)
    pub const ZERO: MacAddress = MacAddress([0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

    /// Create a MAC address from a byte array
    pub fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    /// Create a MAC address from a slice of exactly 6 bytes
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() == 6 {
            let mut bytes = [0u8; 6];
            bytes.copy_from_slice(slice);
            Some(MacAddress(bytes))
        } else {
            None
        }
    }

    /// Get the address as a byte array
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Check if this is the broadcast address
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xFF; 6]
    }

    /// Check if this is a multicast address (bit 0 of first octet is 1)
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    /// Check if this is a unicast address
    pub fn is_unicast(&self) -> bool {
        !self.is_multicast() && !self.is_broadcast()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }
}

impl From<MacAddress> for [u8; 6] {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

/// Decoded Ethernet II header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetHeader {
    /// Destination MAC address
    pub destination: MacAddress,
    /// Source MAC address
    pub source: MacAddress,
    /// EtherType advertising the payload protocol
    pub ethertype: EtherType,
}

impl EthernetHeader {
    /// Header size (dst + src + type)
    pub const LEN: usize = 14;

    /// Minimum frame size without FCS
    pub const MIN_FRAME_SIZE: usize = 60;

    /// Parse an Ethernet header from the front of a byte window
    pub fn parse(window: &[u8]) -> Result<Self, DecodeError> {
        if window.len() < Self::LEN {
            return Err(DecodeError::Truncated {
                needed: Self::LEN,
                available: window.len(),
            });
        }

        // from_slice cannot fail on the checked 6-byte ranges
        let destination = MacAddress::from_slice(&window[0..6]).unwrap_or(MacAddress::ZERO);
        let source = MacAddress::from_slice(&window[6..12]).unwrap_or(MacAddress::ZERO);
        let ethertype = EtherType::lookup(u16::from_be_bytes([window[12], window[13]]));

        Ok(EthernetHeader {
            destination,
            source,
            ethertype,
        })
    }
}

impl Header for EthernetHeader {
    fn layer_name(&self) -> &'static str {
        "ethernet"
    }

    fn header_len(&self) -> usize {
        Self::LEN
    }

    fn write_header(&self, buf: &mut BytesMut) {
        buf.put_slice(self.destination.as_bytes());
        buf.put_slice(self.source.as_bytes());
        buf.put_u16(self.ethertype.value());
    }

    fn to_builder(&self) -> Box<dyn LayerBuilder> {
        Box::new(EthernetBuilder::from_header(self))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn header_eq(&self, other: &dyn Header) -> bool {
        other.as_any().downcast_ref::<Self>() == Some(self)
    }
}

/// Decode an Ethernet II frame and recurse into its payload
///
/// Bytes left over after the payload's own declared length (link padding)
/// become this layer's trailer.
pub fn decode_ethernet(ctx: &DecodeContext<'_>, window: &[u8]) -> Result<Packet> {
    let header = EthernetHeader::parse(window)?;
    let span = &window[EthernetHeader::LEN..];

    let (payload, trailer) = if span.is_empty() {
        (None, Vec::new())
    } else {
        let packet = ctx.decode_next::<EtherTypeKind>(span, &[header.ethertype.clone()])?;
        let consumed = packet.total_len();
        (Some(packet), span[consumed..].to_vec())
    };

    Ok(Packet::Layer {
        header: Box::new(header),
        payload: payload.map(Box::new),
        trailer,
    })
}

/// Mutable builder for an Ethernet II layer
#[derive(Debug, Default)]
pub struct EthernetBuilder {
    destination: Option<MacAddress>,
    source: Option<MacAddress>,
    ethertype: Option<EtherType>,
    pad_at_build: bool,
    payload: Option<Box<dyn LayerBuilder>>,
    trailer: Vec<u8>,
}

impl EthernetBuilder {
    /// Create a builder with addresses set
    pub fn new(destination: MacAddress, source: MacAddress) -> Self {
        EthernetBuilder {
            destination: Some(destination),
            source: Some(source),
            ..Default::default()
        }
    }

    fn from_header(header: &EthernetHeader) -> Self {
        EthernetBuilder {
            destination: Some(header.destination),
            source: Some(header.source),
            ethertype: Some(header.ethertype.clone()),
            ..Default::default()
        }
    }

    /// Set the EtherType
    pub fn with_ethertype(mut self, ethertype: EtherType) -> Self {
        self.ethertype = Some(ethertype);
        self
    }

    /// Pad built frames with a zero trailer up to the 60-byte minimum
    pub fn with_pad(mut self, enabled: bool) -> Self {
        self.pad_at_build = enabled;
        self
    }

    /// The currently configured EtherType
    pub fn ethertype(&self) -> Option<&EtherType> {
        self.ethertype.as_ref()
    }

    /// Set the EtherType in place
    pub fn set_ethertype(&mut self, ethertype: EtherType) {
        self.ethertype = Some(ethertype);
    }
}

impl LayerBuilder for EthernetBuilder {
    fn layer_name(&self) -> &'static str {
        "ethernet"
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

    // Ethernet declares neither a length nor a checksum field.
    fn set_correct_length(&mut self, _enabled: bool) {}

    fn set_correct_checksum(&mut self, _enabled: bool) {}

    fn has_capability(&self, _capability: Capability) -> bool {
        false
    }

    fn build_with_outers(&self, outers: &OuterStack<'_>) -> Result<Packet, BuildError> {
        let destination = self.destination.ok_or(BuildError::MissingField {
            layer: "ethernet",
            field: "destination",
        })?;
        let source = self.source.ok_or(BuildError::MissingField {
            layer: "ethernet",
            field: "source",
        })?;
        let ethertype = self.ethertype.clone().ok_or(BuildError::MissingField {
            layer: "ethernet",
            field: "ethertype",
        })?;

        let payload = match &self.payload {
            Some(builder) => Some(builder.build_with_outers(&outers.with(self))?),
            None => None,
        };
        let payload_len = payload.as_ref().map_or(0, Packet::total_len);

        let mut trailer = self.trailer.clone();
        if self.pad_at_build {
            let frame_len = EthernetHeader::LEN + payload_len + trailer.len();
            if frame_len < EthernetHeader::MIN_FRAME_SIZE {
                let new_len = trailer.len() + (EthernetHeader::MIN_FRAME_SIZE - frame_len);
                trailer.resize(new_len, 0);
            }
        }

        let header = EthernetHeader {
            destination,
            source,
            ethertype,
        };
        Ok(Packet::Layer {
            header: Box::new(header),
            payload: payload.map(Box::new),
            trailer,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
