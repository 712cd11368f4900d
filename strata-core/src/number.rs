//! Typed protocol number identifiers
//!
//! Every number read out of a frame (link type, EtherType, IP protocol
//! number, transport port) is carried as a [`NamedNumber`]: a raw value
//! paired with a display name and tagged with a zero-sized kind marker so
//! an EtherType can never be confused with a port. Equality, ordering and
//! hashing are defined on the raw value alone; two independently obtained
//! numbers for the same value always compare equal.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::OnceLock;

/// Ties a number kind marker to its raw wire representation.
pub trait NumberKind: 'static {
    /// Raw numeric type carried on the wire for this kind
    type Raw: Copy + Ord + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static;

    /// Kind name used in diagnostics
    const NAME: &'static str;
}

/// A raw protocol number paired with a human-readable name
pub struct NamedNumber<V, K> {
    value: V,
    name: Cow<'static, str>,
    _kind: PhantomData<fn() -> K>,
}

impl<V, K> NamedNumber<V, K> {
    /// Create a number with a static name, usable in `const` contexts
    pub const fn with_static(value: V, name: &'static str) -> Self {
        NamedNumber {
            value,
            name: Cow::Borrowed(name),
            _kind: PhantomData,
        }
    }

    /// Get the display name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<V: Copy, K> NamedNumber<V, K> {
    /// Get the raw numeric value
    pub fn value(&self) -> V {
        self.value
    }
}

impl<V: fmt::Display, K> NamedNumber<V, K> {
    /// Synthesize an instance for a value outside any known constant
    pub fn unknown(value: V) -> Self {
        let name = format!("unknown ({value})");
        NamedNumber {
            value,
            name: Cow::Owned(name),
            _kind: PhantomData,
        }
    }
}

impl<V: Clone, K> Clone for NamedNumber<V, K> {
    fn clone(&self) -> Self {
        NamedNumber {
            value: self.value.clone(),
            name: self.name.clone(),
            _kind: PhantomData,
        }
    }
}

impl<V: PartialEq, K> PartialEq for NamedNumber<V, K> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<V: Eq, K> Eq for NamedNumber<V, K> {}

impl<V: Ord, K> PartialOrd for NamedNumber<V, K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<V: Ord, K> Ord for NamedNumber<V, K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<V: Hash, K> Hash for NamedNumber<V, K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<V: fmt::Debug, K> fmt::Debug for NamedNumber<V, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedNumber")
            .field("value", &self.value)
            .field("name", &self.name)
            .finish()
    }
}

impl<V: fmt::Display, K> fmt::Display for NamedNumber<V, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.value)
    }
}

/// Lookup table from raw values to registered [`NamedNumber`] constants
///
/// Populated once during setup; `lookup` never fails, falling back to a
/// synthesized unknown instance for unregistered values.
pub struct NumberRegistry<V, K> {
    entries: BTreeMap<V, NamedNumber<V, K>>,
}

impl<V: Copy + Ord + fmt::Display, K> NumberRegistry<V, K> {
    /// Create an empty registry
    pub fn new() -> Self {
        NumberRegistry {
            entries: BTreeMap::new(),
        }
    }

    /// Register a constant and return it
    pub fn register(&mut self, value: V, name: &'static str) -> NamedNumber<V, K> {
        let number = NamedNumber::with_static(value, name);
        self.entries.insert(value, number.clone());
        number
    }

    /// Insert an already-constructed constant
    pub fn insert(&mut self, number: NamedNumber<V, K>) {
        self.entries.insert(number.value, number);
    }

    /// Look up a value, synthesizing an unknown instance if unregistered
    pub fn lookup(&self, value: V) -> NamedNumber<V, K> {
        self.entries
            .get(&value)
            .cloned()
            .unwrap_or_else(|| NamedNumber::unknown(value))
    }

    /// Number of registered constants
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry has no constants
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Copy + Ord + fmt::Display, K> Default for NumberRegistry<V, K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Kind marker for capture link-layer types
pub enum LinkTypeKind {}

impl NumberKind for LinkTypeKind {
    type Raw = u16;
    const NAME: &'static str = "link type";
}

/// Capture link-layer type (pcap DLT values)
pub type LinkType = NamedNumber<u16, LinkTypeKind>;

impl LinkType {
    /// BSD loopback (0)
    pub const NULL: LinkType = LinkType::with_static(0, "NULL");
    /// Ethernet (1)
    pub const EN10MB: LinkType = LinkType::with_static(1, "EN10MB");
    /// IEEE 802.5 Token Ring (6)
    pub const IEEE802: LinkType = LinkType::with_static(6, "IEEE802");
    /// PPP (9)
    pub const PPP: LinkType = LinkType::with_static(9, "PPP");
    /// Raw IP (101)
    pub const RAW: LinkType = LinkType::with_static(101, "RAW");
    /// Linux cooked capture (113)
    pub const LINUX_SLL: LinkType = LinkType::with_static(113, "LINUX_SLL");

    /// Look up a link type by its raw value
    pub fn lookup(value: u16) -> LinkType {
        link_type_registry().lookup(value)
    }
}

fn link_type_registry() -> &'static NumberRegistry<u16, LinkTypeKind> {
    static REGISTRY: OnceLock<NumberRegistry<u16, LinkTypeKind>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = NumberRegistry::new();
        for number in [
            LinkType::NULL,
            LinkType::EN10MB,
            LinkType::IEEE802,
            LinkType::PPP,
            LinkType::RAW,
            LinkType::LINUX_SLL,
        ] {
            registry.insert(number);
        }
        registry
    })
}

/// Kind marker for Ethernet type field values
pub enum EtherTypeKind {}

impl NumberKind for EtherTypeKind {
    type Raw = u16;
    const NAME: &'static str = "ether type";
}

/// Ethernet type field value
pub type EtherType = NamedNumber<u16, EtherTypeKind>;

impl EtherType {
    /// IPv4 (0x0800)
    pub const IPV4: EtherType = EtherType::with_static(0x0800, "IPv4");
    /// ARP (0x0806)
    pub const ARP: EtherType = EtherType::with_static(0x0806, "ARP");
    /// 802.1Q VLAN tag (0x8100)
    pub const VLAN: EtherType = EtherType::with_static(0x8100, "VLAN");
    /// IPv6 (0x86DD)
    pub const IPV6: EtherType = EtherType::with_static(0x86DD, "IPv6");
    /// LLDP (0x88CC)
    pub const LLDP: EtherType = EtherType::with_static(0x88CC, "LLDP");

    /// Look up an EtherType by its raw value
    pub fn lookup(value: u16) -> EtherType {
        ether_type_registry().lookup(value)
    }
}

fn ether_type_registry() -> &'static NumberRegistry<u16, EtherTypeKind> {
    static REGISTRY: OnceLock<NumberRegistry<u16, EtherTypeKind>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = NumberRegistry::new();
        for number in [
            EtherType::IPV4,
            EtherType::ARP,
            EtherType::VLAN,
            EtherType::IPV6,
            EtherType::LLDP,
        ] {
            registry.insert(number);
        }
        registry
    })
}

/// Kind marker for IP protocol numbers
pub enum IpNumberKind {}

impl NumberKind for IpNumberKind {
    type Raw = u8;
    const NAME: &'static str = "ip number";
}

/// IP protocol number
pub type IpNumber = NamedNumber<u8, IpNumberKind>;

impl IpNumber {
    /// ICMP (1)
    pub const ICMP: IpNumber = IpNumber::with_static(1, "ICMP");
    /// IGMP (2)
    pub const IGMP: IpNumber = IpNumber::with_static(2, "IGMP");
    /// TCP (6)
    pub const TCP: IpNumber = IpNumber::with_static(6, "TCP");
    /// UDP (17)
    pub const UDP: IpNumber = IpNumber::with_static(17, "UDP");
    /// GRE (47)
    pub const GRE: IpNumber = IpNumber::with_static(47, "GRE");
    /// OSPF (89)
    pub const OSPF: IpNumber = IpNumber::with_static(89, "OSPF");

    /// Look up an IP protocol number by its raw value
    pub fn lookup(value: u8) -> IpNumber {
        ip_number_registry().lookup(value)
    }
}

fn ip_number_registry() -> &'static NumberRegistry<u8, IpNumberKind> {
    static REGISTRY: OnceLock<NumberRegistry<u8, IpNumberKind>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = NumberRegistry::new();
        for number in [
            IpNumber::ICMP,
            IpNumber::IGMP,
            IpNumber::TCP,
            IpNumber::UDP,
            IpNumber::GRE,
            IpNumber::OSPF,
        ] {
            registry.insert(number);
        }
        registry
    })
}

/// Kind marker for transport port numbers
pub enum PortKind {}

impl NumberKind for PortKind {
    type Raw = u16;
    const NAME: &'static str = "port";
}

/// Transport port number
pub type Port = NamedNumber<u16, PortKind>;

impl Port {
    /// DNS (53)
    pub const DNS: Port = Port::with_static(53, "DNS");
    /// DHCP server (67)
    pub const DHCP_SERVER: Port = Port::with_static(67, "DHCP server");
    /// DHCP client (68)
    pub const DHCP_CLIENT: Port = Port::with_static(68, "DHCP client");
    /// HTTP (80)
    pub const HTTP: Port = Port::with_static(80, "HTTP");
    /// NTP (123)
    pub const NTP: Port = Port::with_static(123, "NTP");
    /// SNMP (161)
    pub const SNMP: Port = Port::with_static(161, "SNMP");
    /// HTTPS (443)
    pub const HTTPS: Port = Port::with_static(443, "HTTPS");
    /// Syslog (514)
    pub const SYSLOG: Port = Port::with_static(514, "Syslog");

    /// Look up a port by its raw value
    pub fn lookup(value: u16) -> Port {
        port_registry().lookup(value)
    }
}

fn port_registry() -> &'static NumberRegistry<u16, PortKind> {
    static REGISTRY: OnceLock<NumberRegistry<u16, PortKind>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = NumberRegistry::new();
        for number in [
            Port::DNS,
            Port::DHCP_SERVER,
            Port::DHCP_CLIENT,
            Port::HTTP,
            Port::NTP,
            Port::SNMP,
            Port::HTTPS,
            Port::SYSLOG,
        ] {
            registry.insert(number);
        }
        registry
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_on_value_only() {
        let a = EtherType::IPV4;
        let b = EtherType::unknown(0x0800);
        assert_eq!(a, b);
        assert_ne!(a.name(), b.name());
    }

    #[test]
    fn test_ordering_on_value() {
        assert!(IpNumber::ICMP < IpNumber::TCP);
        assert!(IpNumber::TCP < IpNumber::UDP);
    }

    #[test]
    fn test_unknown_name() {
        let number = IpNumber::unknown(254);
        assert_eq!(number.value(), 254);
        assert_eq!(number.name(), "unknown (254)");
    }

    #[test]
    fn test_lookup_known() {
        let number = EtherType::lookup(0x0806);
        assert_eq!(number, EtherType::ARP);
        assert_eq!(number.name(), "ARP");
    }

    #[test]
    fn test_lookup_unknown_never_fails() {
        let number = EtherType::lookup(0x1234);
        assert_eq!(number.value(), 0x1234);
        assert_eq!(number.name(), "unknown (4660)");
    }

    #[test]
    fn test_custom_registry() {
        let mut registry: NumberRegistry<u16, PortKind> = NumberRegistry::new();
        assert!(registry.is_empty());

        let registered = registry.register(9999, "my service");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(9999), registered);
        assert_eq!(registry.lookup(9999).name(), "my service");
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", IpNumber::UDP), "UDP (17)");
    }

    #[test]
    fn test_hash_matches_equality() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(Port::DNS);
        assert!(set.contains(&Port::unknown(53)));
    }
}
