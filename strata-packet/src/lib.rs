//! Strata Packet Library
//!
//! Concrete protocol layers on top of the `strata-core` machinery:
//! Ethernet II, ARP, IPv4, UDP, and TCP, plus the checksum and length
//! arithmetic they share. [`default_registry`] wires every decoder in
//! this crate into a ready-to-use [`DecoderRegistry`](strata_core::DecoderRegistry),
//! and [`StackBuilder`] assembles outgoing frames layer by layer.
//!
//! ```
//! use strata_core::{LinkType, LinkTypeKind};
//! use strata_packet::{default_registry, EthernetHeader};
//!
//! // A minimal ARP request inside an Ethernet frame.
//! let frame: Vec<u8> = vec![
//!     0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x08, 0x06,
//!     0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01,
//!     0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 10, 0, 0, 1,
//!     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 10, 0, 0, 2,
//! ];
//!
//! let registry = default_registry();
//! let packet = registry
//!     .decode::<LinkTypeKind>(&frame, 0, frame.len(), &[LinkType::EN10MB])
//!     .unwrap();
//!
//! let ethernet = packet.as_layer::<EthernetHeader>().unwrap();
//! assert!(ethernet.destination.is_broadcast());
//! assert_eq!(packet.to_bytes(), frame);
//! ```

pub mod arp;
pub mod builder;
pub mod checksum;
pub mod ethernet;
pub mod ipv4;
pub mod length;
pub mod registry;
pub mod tcp;
pub mod udp;

// Re-export commonly used types
pub use arp::{decode_arp, ArpBuilder, ArpHeader};
pub use builder::StackBuilder;
pub use checksum::{internet_checksum, pseudo_header_checksum, validate_checksum};
pub use ethernet::{decode_ethernet, EthernetBuilder, EthernetHeader, MacAddress};
pub use ipv4::{decode_ipv4, IpFlags, Ipv4Builder, Ipv4Header};
pub use length::LengthSemantics;
pub use registry::default_registry;
pub use tcp::{decode_tcp, TcpBuilder, TcpFlags, TcpHeader};
pub use udp::{decode_udp, UdpBuilder, UdpHeader};
