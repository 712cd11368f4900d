//! Capture transport boundary
//!
//! The core never touches capture devices. The transport collaborator
//! hands in raw frames tagged with a link type and a timestamp, and takes
//! built bytes back for transmission; these types are the whole contract.

use tracing::debug;

use crate::error::Result;
use crate::factory::DecoderRegistry;
use crate::number::{LinkType, LinkTypeKind};
use crate::packet::Packet;

/// Capture timestamp, seconds and microseconds since the epoch
///
/// Carried alongside each frame as a value, never as ambient per-thread
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// Whole seconds
    pub secs: u64,
    /// Microseconds within the second
    pub micros: u32,
}

impl Timestamp {
    /// Create a timestamp
    pub fn new(secs: u64, micros: u32) -> Self {
        Timestamp { secs, micros }
    }
}

/// A raw frame as delivered by the capture transport
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Frame bytes, possibly truncated by the capture
    pub data: Vec<u8>,
    /// Link-layer type of the capture
    pub link_type: LinkType,
    /// When the frame was captured
    pub timestamp: Timestamp,
}

impl RawFrame {
    /// Create a raw frame
    pub fn new(data: Vec<u8>, link_type: LinkType, timestamp: Timestamp) -> Self {
        RawFrame {
            data,
            link_type,
            timestamp,
        }
    }
}

/// Source of captured frames
pub trait FrameSource {
    /// The next captured frame, or `None` when the source is drained
    fn next_frame(&mut self) -> Result<Option<RawFrame>>;
}

/// Sink accepting built frame bytes for transmission
pub trait FrameSink {
    /// Hand bytes to the transport
    fn transmit(&mut self, frame: &[u8]) -> Result<()>;
}

/// A decoded frame with its capture metadata
#[derive(Debug)]
pub struct DecodedFrame {
    /// The decoded packet chain
    pub packet: Packet,
    /// Link-layer type the frame arrived under
    pub link_type: LinkType,
    /// When the frame was captured
    pub timestamp: Timestamp,
}

/// Decode one captured frame through the registry
///
/// Tolerates frames shorter than any layer claims: corruption lands as an
/// illegal leaf at the point it was detected, with every outer layer
/// intact. The only error outcomes are configuration problems in the
/// registry itself.
pub fn decode_frame(registry: &DecoderRegistry, frame: &RawFrame) -> Result<DecodedFrame> {
    debug!(len = frame.data.len(), link_type = %frame.link_type, "decoding frame");
    let packet = registry.decode::<LinkTypeKind>(
        &frame.data,
        0,
        frame.data.len(),
        &[frame.link_type.clone()],
    )?;
    Ok(DecodedFrame {
        packet,
        link_type: frame.link_type.clone(),
        timestamp: frame.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::DecodeContext;

    fn leaf(_ctx: &DecodeContext<'_>, window: &[u8]) -> Result<Packet> {
        Ok(Packet::Unknown {
            raw: window.to_vec(),
        })
    }

    fn registry() -> DecoderRegistry {
        let mut registry = DecoderRegistry::new();
        registry.register::<LinkTypeKind>(LinkType::EN10MB.value(), leaf);
        registry
    }

    #[test]
    fn test_decode_frame_passes_metadata_through() {
        let frame = RawFrame::new(
            vec![1, 2, 3],
            LinkType::EN10MB,
            Timestamp::new(1_700_000_000, 42),
        );
        let decoded = decode_frame(&registry(), &frame).unwrap();

        assert_eq!(decoded.link_type, LinkType::EN10MB);
        assert_eq!(decoded.timestamp, Timestamp::new(1_700_000_000, 42));
        assert_eq!(decoded.packet.raw(), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn test_unregistered_link_type_degrades_to_unknown() {
        let frame = RawFrame::new(vec![9, 9], LinkType::RAW, Timestamp::new(0, 0));
        let decoded = decode_frame(&registry(), &frame).unwrap();
        assert!(decoded.packet.is_unknown());
    }

    #[test]
    fn test_vec_backed_sink() {
        struct VecSink(Vec<Vec<u8>>);

        impl FrameSink for VecSink {
            fn transmit(&mut self, frame: &[u8]) -> Result<()> {
                self.0.push(frame.to_vec());
                Ok(())
            }
        }

        let mut sink = VecSink(Vec::new());
        sink.transmit(&[0xAA, 0xBB]).unwrap();
        assert_eq!(sink.0, vec![vec![0xAA, 0xBB]]);
    }
}
