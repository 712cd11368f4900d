//! Fluent packet stack assembly
//!
//! [`StackBuilder`] strings the per-layer builders of this crate together
//! top to bottom, filling in the glue a hand-built chain needs: payload
//! protocol numbers on the enclosing layers, length and checksum
//! correction, and Ethernet minimum-size padding. Layers whose glue
//! cannot be inferred stay exactly as configured.

use strata_core::{BuildError, Capability, EtherType, IpNumber, LayerBuilder, Packet, Port};

use crate::arp::ArpBuilder;
use crate::ethernet::{EthernetBuilder, MacAddress};
use crate::ipv4::Ipv4Builder;
use crate::tcp::TcpBuilder;
use crate::udp::UdpBuilder;
use std::net::Ipv4Addr;
use strata_core::RawBuilder;

/// Assembles a layer-builder chain from outermost to innermost
///
/// ```
/// use std::net::Ipv4Addr;
/// use strata_core::Port;
/// use strata_packet::{MacAddress, StackBuilder};
///
/// let frame = StackBuilder::new()
///     .ethernet(MacAddress::BROADCAST, MacAddress([0, 0x11, 0x22, 0x33, 0x44, 0x55]))
///     .ipv4(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2))
///     .udp(Port::unknown(49152), Port::DNS)
///     .payload(vec![0xDE, 0xAD, 0xBE, 0xEF])
///     .to_bytes()
///     .unwrap();
///
/// assert_eq!(frame.len(), 60); // padded to the Ethernet minimum
/// ```
#[derive(Debug)]
pub struct StackBuilder {
    layers: Vec<Box<dyn LayerBuilder>>,
    corrections: bool,
}

impl StackBuilder {
    /// Start an empty stack with corrections enabled
    pub fn new() -> Self {
        StackBuilder {
            layers: Vec::new(),
            corrections: true,
        }
    }

    /// Keep stored length and checksum fields instead of recomputing them
    pub fn without_corrections(mut self) -> Self {
        self.corrections = false;
        self
    }

    /// Append an Ethernet layer, padded to the 60-byte minimum at build
    pub fn ethernet(mut self, destination: MacAddress, source: MacAddress) -> Self {
        self.layers
            .push(Box::new(EthernetBuilder::new(destination, source).with_pad(true)));
        self
    }

    /// Append an ARP layer
    pub fn arp(
        mut self,
        operation: u16,
        sender_hardware: MacAddress,
        sender_protocol: Ipv4Addr,
        target_hardware: MacAddress,
        target_protocol: Ipv4Addr,
    ) -> Self {
        self.layers.push(Box::new(ArpBuilder::new(
            operation,
            sender_hardware,
            sender_protocol,
            target_hardware,
            target_protocol,
        )));
        self
    }

    /// Append an IPv4 layer
    pub fn ipv4(mut self, source: Ipv4Addr, destination: Ipv4Addr) -> Self {
        self.layers.push(Box::new(Ipv4Builder::new(source, destination)));
        self
    }

    /// Append an IPv4 layer configured beyond its addresses
    pub fn ipv4_with(mut self, builder: Ipv4Builder) -> Self {
        self.layers.push(Box::new(builder));
        self
    }

    /// Append a UDP layer
    pub fn udp(mut self, source_port: Port, destination_port: Port) -> Self {
        self.layers
            .push(Box::new(UdpBuilder::new(source_port, destination_port)));
        self
    }

    /// Append a TCP layer
    pub fn tcp(mut self, source_port: Port, destination_port: Port) -> Self {
        self.layers
            .push(Box::new(TcpBuilder::new(source_port, destination_port)));
        self
    }

    /// Append a TCP layer configured beyond its ports
    pub fn tcp_with(mut self, builder: TcpBuilder) -> Self {
        self.layers.push(Box::new(builder));
        self
    }

    /// Append an opaque payload leaf
    pub fn payload(mut self, data: Vec<u8>) -> Self {
        self.layers.push(Box::new(RawBuilder::new(data)));
        self
    }

    /// Append an already configured layer builder
    pub fn layer(mut self, builder: Box<dyn LayerBuilder>) -> Self {
        self.layers.push(builder);
        self
    }

    /// Wire the collected layers into a single builder chain
    ///
    /// Unset payload protocol numbers are inferred from the next layer
    /// down; explicitly set ones are left alone. With corrections enabled
    /// every layer recomputes its length and checksum fields at build.
    pub fn into_builder(mut self) -> Result<Box<dyn LayerBuilder>, BuildError> {
        self.check_prerequisites()?;
        self.infer_payload_numbers();

        if self.corrections {
            for layer in &mut self.layers {
                layer.set_correct_length(true);
                layer.set_correct_checksum(true);
            }
        }

        let mut chain: Option<Box<dyn LayerBuilder>> = None;
        for mut layer in self.layers.into_iter().rev() {
            if let Some(inner) = chain.take() {
                layer.set_payload_builder(Some(inner));
            }
            chain = Some(layer);
        }
        chain.ok_or(BuildError::MissingLayer {
            inner: "payload",
            outer: "link",
        })
    }

    /// Build the packet tree
    pub fn build(self) -> Result<Packet, BuildError> {
        self.into_builder()?.build()
    }

    /// Build the packet tree and serialize it
    pub fn to_bytes(self) -> Result<Vec<u8>, BuildError> {
        Ok(self.build()?.to_bytes())
    }

    fn check_prerequisites(&self) -> Result<(), BuildError> {
        if !self.corrections {
            return Ok(());
        }
        // Pseudo-header checksums need an enclosing address source.
        for (index, layer) in self.layers.iter().enumerate() {
            let name = layer.layer_name();
            if name == "udp" || name == "tcp" {
                let has_source = self.layers[..index]
                    .iter()
                    .any(|outer| outer.has_capability(Capability::PseudoHeaderSource));
                if !has_source {
                    return Err(BuildError::MissingLayer {
                        inner: name,
                        outer: "ipv4",
                    });
                }
            }
        }
        Ok(())
    }

    fn infer_payload_numbers(&mut self) {
        for index in 0..self.layers.len().saturating_sub(1) {
            let next_name = self.layers[index + 1].layer_name();
            let layer = self.layers[index].as_any_mut();

            if let Some(ethernet) = layer.downcast_mut::<EthernetBuilder>() {
                if ethernet.ethertype().is_none() {
                    match next_name {
                        "ipv4" => ethernet.set_ethertype(EtherType::IPV4),
                        "arp" => ethernet.set_ethertype(EtherType::ARP),
                        _ => {}
                    }
                }
            } else if let Some(ipv4) = layer.downcast_mut::<Ipv4Builder>() {
                if ipv4.protocol().is_none() {
                    match next_name {
                        "udp" => ipv4.set_protocol(IpNumber::UDP),
                        "tcp" => ipv4.set_protocol(IpNumber::TCP),
                        _ => {}
                    }
                }
            }
        }
    }
}

impl Default for StackBuilder {
    fn default() -> Self {
        Self::new()
    }
}
