//! Error types for strata

use thiserror::Error;

/// Result type alias for strata operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type
///
/// Configuration and bounds problems are caller errors and surface here.
/// Per-packet decode failures do not: they are recovered locally into
/// [`crate::Packet::Illegal`] leaves and travel as data.
#[derive(Error, Debug)]
pub enum Error {
    /// Requested window lies outside the supplied buffer
    #[error("window [{offset}..{offset}+{length}) out of range for {available}-byte buffer")]
    Bounds {
        offset: usize,
        length: usize,
        available: usize,
    },

    /// No dispatch table bound for a number kind
    #[error("no decoder table bound for {kind} numbers")]
    Registry { kind: &'static str },

    /// A decoder signalled malformed input
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Packet construction failed
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Reason a byte window failed to parse under its expected protocol
///
/// Stored inside [`crate::Packet::Illegal`] leaves, so it is cheap to clone
/// and comparable for structural packet equality.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes than the fixed part of the header requires
    #[error("need {needed} bytes, only {available} available")]
    Truncated { needed: usize, available: usize },

    /// A declared length field exceeds the bytes actually present
    #[error("declared length {declared} exceeds {available} available bytes")]
    LengthMismatch { declared: usize, available: usize },

    /// A field holds a value the protocol does not allow
    #[error("malformed {layer} header: {reason}")]
    Malformed {
        layer: &'static str,
        reason: String,
    },

    /// Dispatch reached a zero-length byte window
    #[error("empty byte window")]
    EmptyWindow,
}

/// Reason a builder chain refused to produce bytes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A mandatory field was never set
    #[error("{layer}: missing required field '{field}'")]
    MissingField {
        layer: &'static str,
        field: &'static str,
    },

    /// A checksum needed fields from an enclosing layer that is absent
    #[error("{layer}: no enclosing layer provides {needs}")]
    MissingOuter {
        layer: &'static str,
        needs: &'static str,
    },

    /// A layer was stacked without the layer it must sit on
    #[error("{inner} layer requires an enclosing {outer} layer")]
    MissingLayer {
        inner: &'static str,
        outer: &'static str,
    },

    /// The payload no longer fits the layer's length field
    #[error("{layer}: payload of {len} bytes exceeds {max}-byte maximum")]
    OversizedPayload {
        layer: &'static str,
        len: usize,
        max: usize,
    },
}
