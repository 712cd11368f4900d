//! Default decoder wiring
//!
//! Connects the concrete layers of this crate to the dispatch numbers
//! they are advertised under. Applications that want different wiring
//! build their own [`DecoderRegistry`] instead.

use strata_core::{
    DecoderRegistry, EtherType, EtherTypeKind, IpNumber, IpNumberKind, LinkType, LinkTypeKind,
    PortKind,
};

use crate::arp::decode_arp;
use crate::ethernet::decode_ethernet;
use crate::ipv4::decode_ipv4;
use crate::tcp::decode_tcp;
use crate::udp::decode_udp;

/// Build a registry wired with every decoder in this crate
///
/// The port kind is bound but left empty, so transport payloads degrade
/// to unknown leaves instead of tripping a configuration error.
pub fn default_registry() -> DecoderRegistry {
    let mut registry = DecoderRegistry::new();

    registry.register::<LinkTypeKind>(LinkType::EN10MB.value(), decode_ethernet);

    registry.register::<EtherTypeKind>(EtherType::IPV4.value(), decode_ipv4);
    registry.register::<EtherTypeKind>(EtherType::ARP.value(), decode_arp);

    registry.register::<IpNumberKind>(IpNumber::UDP.value(), decode_udp);
    registry.register::<IpNumberKind>(IpNumber::TCP.value(), decode_tcp);

    registry.bind_kind::<PortKind>();

    registry
}
