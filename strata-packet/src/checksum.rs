//! Checksum engine
//!
//! Pure, stateless functions implementing the Internet Checksum (RFC 1071)
//! and its pseudo-header variant used by the transport layers. Callers hand
//! in header bytes with the checksum field zeroed plus the payload; the
//! functions never reach into packet structures.

/// Calculates the Internet Checksum as defined in RFC 1071.
///
/// The data is treated as a sequence of big-endian 16-bit words summed in
/// one's-complement arithmetic with the carry wrapped back in, and the
/// final sum is complemented. An odd trailing byte is zero-padded for the
/// purpose of the sum only.
pub fn internet_checksum(data: &[u8]) -> u16 {
    !fold_sum(data)
}

/// Calculates the checksum for a transport layer including the IPv4
/// pseudo-header.
///
/// The pseudo-header borrows the enclosing source and destination
/// addresses and the protocol number, plus the transport length, to guard
/// against misdelivered segments. The length field is 16 bits wide;
/// longer inputs saturate it at 65535 (such segments cannot be declared
/// by any enclosing IPv4 length field anyway).
///
/// # Arguments
///
/// * `src_ip` - Source address octets borrowed from the enclosing layer
/// * `dst_ip` - Destination address octets borrowed from the enclosing layer
/// * `protocol` - IP protocol number (6 for TCP, 17 for UDP)
/// * `data` - Transport header (checksum field zeroed) and payload
pub fn pseudo_header_checksum(
    src_ip: &[u8; 4],
    dst_ip: &[u8; 4],
    protocol: u8,
    data: &[u8],
) -> u16 {
    let mut pseudo = Vec::with_capacity(12 + data.len());

    pseudo.extend_from_slice(src_ip);
    pseudo.extend_from_slice(dst_ip);
    pseudo.push(0);
    pseudo.push(protocol);
    let length = u16::try_from(data.len()).unwrap_or(u16::MAX);
    pseudo.extend_from_slice(&length.to_be_bytes());
    pseudo.extend_from_slice(data);

    internet_checksum(&pseudo)
}

/// Validates an Internet checksum.
///
/// Summing a buffer that already contains its checksum field yields 0 (or
/// the equivalent 0xFFFF in one's complement) when the checksum is
/// consistent.
pub fn validate_checksum(data: &[u8]) -> bool {
    let result = internet_checksum(data);
    result == 0 || result == 0xFFFF
}

fn fold_sum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }

    if let Some(&byte) = chunks.remainder().first() {
        sum += (byte as u32) << 8;
    }

    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    sum as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internet_checksum_empty() {
        assert_eq!(internet_checksum(&[]), 0xFFFF);
    }

    #[test]
    fn test_internet_checksum_rfc1071_example() {
        // Worked example from RFC 1071 section 3: the folded sum of these
        // words is 0xDDF2, so the checksum is its complement.
        let data = [0x00, 0x01, 0xF2, 0x03, 0xF4, 0xF5, 0xF6, 0xF7];
        assert_eq!(internet_checksum(&data), 0x220D);
    }

    #[test]
    fn test_odd_length_pads_for_sum_only() {
        // 0x0001 + 0x0200 (the 0x02 padded with a zero byte)
        let data = [0x00, 0x01, 0x02];
        assert_eq!(internet_checksum(&data), !0x0201u16);
    }

    #[test]
    fn test_carry_is_wrapped() {
        // 0xFFFF + 0x0001 wraps to 0x0001
        let data = [0xFF, 0xFF, 0x00, 0x01];
        assert_eq!(internet_checksum(&data), !0x0001u16);
    }

    #[test]
    fn test_validate_roundtrip() {
        let data = [0x45, 0x00, 0x00, 0x3C, 0x1C, 0x46];
        let checksum = internet_checksum(&data);

        let mut with_checksum = data.to_vec();
        with_checksum.extend_from_slice(&checksum.to_be_bytes());
        assert!(validate_checksum(&with_checksum));
    }

    #[test]
    fn test_corruption_fails_validation() {
        let data = [0x45, 0x00, 0x00, 0x3C];
        let checksum = internet_checksum(&data);

        let mut with_checksum = data.to_vec();
        with_checksum.extend_from_slice(&checksum.to_be_bytes());
        with_checksum[1] ^= 0x40;
        assert!(!validate_checksum(&with_checksum));
    }

    #[test]
    fn test_pseudo_header_differs_by_address() {
        let data = [0x00, 0x35, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00];
        let a = pseudo_header_checksum(&[192, 168, 1, 1], &[192, 168, 1, 2], 17, &data);
        let b = pseudo_header_checksum(&[192, 168, 1, 1], &[192, 168, 1, 3], 17, &data);
        assert_ne!(a, b);
    }

    #[test]
    fn test_pseudo_header_length_saturates() {
        let data = vec![0u8; 70_000];
        let value = pseudo_header_checksum(&[10, 0, 0, 1], &[10, 0, 0, 2], 17, &data);

        let mut pseudo = Vec::new();
        pseudo.extend_from_slice(&[10, 0, 0, 1]);
        pseudo.extend_from_slice(&[10, 0, 0, 2]);
        pseudo.push(0);
        pseudo.push(17);
        pseudo.extend_from_slice(&u16::MAX.to_be_bytes());
        pseudo.extend_from_slice(&data);
        assert_eq!(value, internet_checksum(&pseudo));
    }

    #[test]
    fn test_pseudo_header_differs_by_protocol() {
        let data = [0x00, 0x35, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00];
        let udp = pseudo_header_checksum(&[10, 0, 0, 1], &[10, 0, 0, 2], 17, &data);
        let tcp = pseudo_header_checksum(&[10, 0, 0, 1], &[10, 0, 0, 2], 6, &data);
        assert_ne!(udp, tcp);
    }
}
