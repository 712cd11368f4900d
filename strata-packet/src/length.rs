//! Length-field semantics
//!
//! Declared-length fields do not all count the same bytes: IPv4's total
//! length covers header and payload, TCP's data offset covers the header
//! alone, and some protocols count only what follows. Each layer names its
//! semantics here, and builders patch length fields through this single
//! table when length correction is requested.

/// What a layer's declared-length field counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthSemantics {
    /// The field counts the header plus everything after it
    /// (IPv4 total length, UDP length)
    HeaderAndPayload,
    /// The field counts the header only (TCP data offset, before its
    /// conversion to 32-bit words)
    HeaderOnly,
    /// The field counts only the bytes following the header
    PayloadOnly,
}

impl LengthSemantics {
    /// The value a declared-length field must hold for the given header
    /// and payload sizes, in bytes
    ///
    /// Fields expressed in other units (TCP's 32-bit words) convert at the
    /// call site.
    pub fn field_value(self, header_len: usize, payload_len: usize) -> usize {
        match self {
            LengthSemantics::HeaderAndPayload => header_len + payload_len,
            LengthSemantics::HeaderOnly => header_len,
            LengthSemantics::PayloadOnly => payload_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_payload() {
        assert_eq!(
            LengthSemantics::HeaderAndPayload.field_value(20, 100),
            120
        );
    }

    #[test]
    fn test_header_only_ignores_payload() {
        assert_eq!(LengthSemantics::HeaderOnly.field_value(32, 100), 32);
    }

    #[test]
    fn test_payload_only_ignores_header() {
        assert_eq!(LengthSemantics::PayloadOnly.field_value(8, 6), 6);
    }
}
