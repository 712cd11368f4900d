//! Strata Core Library
//!
//! Protocol-agnostic machinery for dissecting raw network frames into a
//! typed, nested packet tree and rebuilding edited trees back into exact
//! byte sequences. The stack composition is discovered while decoding:
//! each layer's header advertises the protocol number(s) of its payload,
//! and a [`DecoderRegistry`] dispatches on them to pick the next decoder.
//!
//! Decode descends layer by layer and bottoms out in an opaque leaf:
//! [`Packet::Unknown`] for a well-formed number nobody decodes,
//! [`Packet::Illegal`] for bytes that failed to parse. A single corrupt
//! layer never aborts decoding of the layers above it. Encode ascends:
//! builders materialize payload-first, then each header patches its own
//! length and checksum fields from the bytes below it when the correction
//! flags ask for it.
//!
//! Concrete protocol layers live in `strata-packet`; this crate carries
//! the contracts they implement.

pub mod builder;
pub mod error;
pub mod factory;
pub mod frame;
pub mod header;
pub mod number;
pub mod packet;

// Re-export commonly used types
pub use builder::{outer_of, LayerBuilder, OuterStack, RawBuilder};
pub use error::{BuildError, DecodeError, Error, Result};
pub use factory::{DecodeContext, DecodeFn, DecoderRegistry};
pub use frame::{decode_frame, DecodedFrame, FrameSink, FrameSource, RawFrame, Timestamp};
pub use header::{Capability, Header, PseudoHeader};
pub use number::{
    EtherType, EtherTypeKind, IpNumber, IpNumberKind, LinkType, LinkTypeKind, NamedNumber,
    NumberKind, NumberRegistry, Port, PortKind,
};
pub use packet::Packet;
