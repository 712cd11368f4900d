//! TCP layer
//!
//! The data offset field declares the header length in 32-bit words; the
//! checksum is the pseudo-header variant borrowing the enclosing
//! addresses. Options are carried as raw bytes. TCP has no field counting
//! its payload, so the segment consumes its whole byte window.

use std::any::Any;

use bytes::{BufMut, BytesMut};
use strata_core::{
    BuildError, Capability, DecodeContext, DecodeError, Header, LayerBuilder, OuterStack, Packet,
    Port, PortKind, Result,
};

use crate::checksum::pseudo_header_checksum;
use crate::length::LengthSemantics;

/// TCP flags byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags {
    /// Congestion Window Reduced
    pub cwr: bool,
    /// ECN Echo
    pub ece: bool,
    /// Urgent pointer significant
    pub urg: bool,
    /// Acknowledgment significant
    pub ack: bool,
    /// Push function
    pub psh: bool,
    /// Reset the connection
    pub rst: bool,
    /// Synchronize sequence numbers
    pub syn: bool,
    /// No more data from sender
    pub fin: bool,
}

impl TcpFlags {
    /// SYN only
    pub const SYN: TcpFlags = TcpFlags {
        cwr: false,
        ece: false,
        urg: false,
        ack: false,
        psh: false,
        rst: false,
        syn: true,
        fin: false,
    };

    /// SYN + ACK
    pub const SYN_ACK: TcpFlags = TcpFlags {
        ack: true,
        ..TcpFlags::SYN
    };

    /// ACK only
    pub const ACK: TcpFlags = TcpFlags {
        cwr: false,
        ece: false,
        urg: false,
        ack: true,
        psh: false,
        rst: false,
        syn: false,
        fin: false,
    };

    /// Convert to the wire byte
    pub fn to_u8(self) -> u8 {
        let mut flags = 0u8;
        if self.cwr {
            flags |= 0x80;
        }
        if self.ece {
            flags |= 0x40;
        }
        if self.urg {
            flags |= 0x20;
        }
        if self.ack {
            flags |= 0x10;
        }
        if self.psh {
            flags |= 0x08;
        }
        if self.rst {
            flags |= 0x04;
        }
        if self.syn {
            flags |= 0x02;
        }
        if self.fin {
            flags |= 0x01;
        }
        flags
    }

    /// Parse from the wire byte
    pub fn from_u8(value: u8) -> Self {
        TcpFlags {
            cwr: value & 0x80 != 0,
            ece: value & 0x40 != 0,
            urg: value & 0x20 != 0,
            ack: value & 0x10 != 0,
            psh: value & 0x08 != 0,
            rst: value & 0x04 != 0,
            syn: value & 0x02 != 0,
            fin: value & 0x01 != 0,
        }
    }
}

/// Decoded TCP header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpHeader {
    /// Source port
    pub source_port: Port,
    /// Destination port
    pub destination_port: Port,
    /// Sequence number
    pub sequence: u32,
    /// Acknowledgment number
    pub acknowledgment: u32,
    /// Reserved nibble next to the data offset, normally zero
    pub reserved: u8,
    /// Flags
    pub flags: TcpFlags,
    /// Receive window
    pub window: u16,
    /// Pseudo-header checksum
    pub checksum: u16,
    /// Urgent pointer
    pub urgent_pointer: u16,
    /// Options, padded to a 4-byte boundary
    pub options: Vec<u8>,
}

impl TcpHeader {
    /// Minimum header size (without options)
    pub const MIN_LEN: usize = 20;

    /// Parse a TCP header from the front of a byte window
    pub fn parse(window: &[u8]) -> Result<Self, DecodeError> {
        if window.len() < Self::MIN_LEN {
            return Err(DecodeError::Truncated {
                needed: Self::MIN_LEN,
                available: window.len(),
            });
        }

        let data_offset = window[12] >> 4;
        if data_offset < 5 {
            return Err(DecodeError::Malformed {
                layer: "tcp",
                reason: format!("data offset {data_offset} words, minimum is 5"),
            });
        }
        let header_len = (data_offset as usize) * 4;
        if window.len() < header_len {
            return Err(DecodeError::Truncated {
                needed: header_len,
                available: window.len(),
            });
        }

        Ok(TcpHeader {
            source_port: Port::lookup(u16::from_be_bytes([window[0], window[1]])),
            destination_port: Port::lookup(u16::from_be_bytes([window[2], window[3]])),
            sequence: u32::from_be_bytes([window[4], window[5], window[6], window[7]]),
            acknowledgment: u32::from_be_bytes([window[8], window[9], window[10], window[11]]),
            reserved: window[12] & 0x0F,
            flags: TcpFlags::from_u8(window[13]),
            window: u16::from_be_bytes([window[14], window[15]]),
            checksum: u16::from_be_bytes([window[16], window[17]]),
            urgent_pointer: u16::from_be_bytes([window[18], window[19]]),
            options: window[Self::MIN_LEN..header_len].to_vec(),
        })
    }
}

impl Header for TcpHeader {
    fn layer_name(&self) -> &'static str {
        "tcp"
    }

    fn header_len(&self) -> usize {
        Self::MIN_LEN + self.options.len()
    }

    fn write_header(&self, buf: &mut BytesMut) {
        let data_offset = (self.header_len() / 4) as u8;
        buf.put_u16(self.source_port.value());
        buf.put_u16(self.destination_port.value());
        buf.put_u32(self.sequence);
        buf.put_u32(self.acknowledgment);
        buf.put_u8((data_offset << 4) | (self.reserved & 0x0F));
        buf.put_u8(self.flags.to_u8());
        buf.put_u16(self.window);
        buf.put_u16(self.checksum);
        buf.put_u16(self.urgent_pointer);
        buf.put_slice(&self.options);
    }

    fn has_capability(&self, capability: Capability) -> bool {
        matches!(
            capability,
            Capability::LengthField | Capability::ChecksumField
        )
    }

    fn to_builder(&self) -> Box<dyn LayerBuilder> {
        Box::new(TcpBuilder::from_header(self))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn header_eq(&self, other: &dyn Header) -> bool {
        other.as_any().downcast_ref::<Self>() == Some(self)
    }
}

/// Decode a TCP segment and recurse into its payload
pub fn decode_tcp(ctx: &DecodeContext<'_>, window: &[u8]) -> Result<Packet> {
    let header = TcpHeader::parse(window)?;
    let span = &window[header.header_len()..];

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

/// Mutable builder for a TCP layer
#[derive(Debug)]
pub struct TcpBuilder {
    source_port: Port,
    destination_port: Port,
    sequence: u32,
    acknowledgment: u32,
    reserved: u8,
    flags: TcpFlags,
    window: u16,
    checksum: u16,
    urgent_pointer: u16,
    options: Vec<u8>,
    correct_length: bool,
    correct_checksum: bool,
    payload: Option<Box<dyn LayerBuilder>>,
    trailer: Vec<u8>,
}

impl TcpBuilder {
    /// Create a builder with the ports set
    pub fn new(source_port: Port, destination_port: Port) -> Self {
        TcpBuilder {
            source_port,
            destination_port,
            sequence: 0,
            acknowledgment: 0,
            reserved: 0,
            flags: TcpFlags::default(),
            window: 65535,
            checksum: 0,
            urgent_pointer: 0,
            options: Vec::new(),
            correct_length: false,
            correct_checksum: false,
            payload: None,
            trailer: Vec::new(),
        }
    }

    fn from_header(header: &TcpHeader) -> Self {
        TcpBuilder {
            source_port: header.source_port.clone(),
            destination_port: header.destination_port.clone(),
            sequence: header.sequence,
            acknowledgment: header.acknowledgment,
            reserved: header.reserved,
            flags: header.flags,
            window: header.window,
            checksum: header.checksum,
            urgent_pointer: header.urgent_pointer,
            options: header.options.clone(),
            correct_length: false,
            correct_checksum: false,
            payload: None,
            trailer: Vec::new(),
        }
    }

    /// Set the sequence number
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Set the acknowledgment number
    pub fn with_acknowledgment(mut self, acknowledgment: u32) -> Self {
        self.acknowledgment = acknowledgment;
        self
    }

    /// Set the flags
    pub fn with_flags(mut self, flags: TcpFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the receive window
    pub fn with_window(mut self, window: u16) -> Self {
        self.window = window;
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
}

impl LayerBuilder for TcpBuilder {
    fn layer_name(&self) -> &'static str {
        "tcp"
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

        let mut header = TcpHeader {
            source_port: self.source_port.clone(),
            destination_port: self.destination_port.clone(),
            sequence: self.sequence,
            acknowledgment: self.acknowledgment,
            reserved: self.reserved,
            flags: self.flags,
            window: self.window,
            checksum: self.checksum,
            urgent_pointer: self.urgent_pointer,
            options: self.options.clone(),
        };

        // The data offset counts header words only; serialization derives
        // it from the options length, so length correction has nothing
        // extra to patch beyond validating the conversion.
        if self.correct_length {
            let header_bytes = LengthSemantics::HeaderOnly
                .field_value(TcpHeader::MIN_LEN + self.options.len(), payload_bytes.len());
            if header_bytes / 4 > 15 {
                return Err(BuildError::OversizedPayload {
                    layer: "tcp",
                    len: self.options.len(),
                    max: 40,
                });
            }
        }

        if self.correct_checksum {
            let pseudo = outers
                .find(Capability::PseudoHeaderSource)
                .and_then(|outer| outer.pseudo_header())
                .ok_or(BuildError::MissingOuter {
                    layer: "tcp",
                    needs: "pseudo-header fields",
                })?;

            header.checksum = 0;
            let mut data = header.header_bytes();
            data.extend_from_slice(&payload_bytes);
            data.extend_from_slice(&self.trailer);
            header.checksum = pseudo_header_checksum(
                &pseudo.source,
                &pseudo.destination,
                pseudo.protocol,
                &data,
            );
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
