//! Mutable construction mirror of the packet tree
//!
//! A builder chain has the same shape as the packet chain it produces.
//! `build()` walks post-order: the payload materializes first, then each
//! header patches its own length and checksum fields from the payload bytes
//! when the corresponding correction flag is set. Builders are single-owner
//! mutable objects and are not consumed by `build()`.

use std::any::Any;
use std::fmt;

use crate::error::BuildError;
use crate::header::{Capability, PseudoHeader};
use crate::packet::Packet;

/// Mutable mirror of one packet layer
pub trait LayerBuilder: fmt::Debug + 'static {
    /// Short lowercase layer name used in build diagnostics
    fn layer_name(&self) -> &'static str;

    /// The enclosed payload builder, if any
    fn payload_builder(&self) -> Option<&dyn LayerBuilder>;

    /// Mutable access to the enclosed payload builder
    fn payload_builder_mut(&mut self) -> Option<&mut dyn LayerBuilder>;

    /// Replace the enclosed payload builder
    fn set_payload_builder(&mut self, payload: Option<Box<dyn LayerBuilder>>);

    /// Set the trailer bytes written after the payload
    fn set_trailer(&mut self, trailer: Vec<u8>);

    /// Overwrite declared-length fields from the materialized payload at
    /// build time instead of trusting the stored value
    fn set_correct_length(&mut self, enabled: bool);

    /// Recompute the checksum field from the materialized bytes at build
    /// time instead of trusting the stored value
    fn set_correct_checksum(&mut self, enabled: bool);

    /// Whether the layer declares the given structural property
    fn has_capability(&self, capability: Capability) -> bool;

    /// Fields lent to enclosed layers for pseudo-header checksums
    fn pseudo_header(&self) -> Option<PseudoHeader> {
        None
    }

    /// Build with a view of the enclosing builders threaded down the chain
    fn build_with_outers(&self, outers: &OuterStack<'_>) -> Result<Packet, BuildError>;

    /// Build a new immutable packet chain from this builder chain
    ///
    /// Does not consume or invalidate the builder; it can be edited and
    /// rebuilt.
    fn build(&self) -> Result<Packet, BuildError> {
        self.build_with_outers(&OuterStack::empty())
    }

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Borrowed view of the builders enclosing the one currently building
///
/// Threaded through the post-order build so inner layers can borrow fields
/// (addresses, protocol numbers) from the nearest enclosing layer that
/// supplies them.
#[derive(Debug, Default)]
pub struct OuterStack<'a> {
    layers: Vec<&'a dyn LayerBuilder>,
}

impl<'a> OuterStack<'a> {
    /// View with no enclosing layers (the chain root)
    pub fn empty() -> Self {
        OuterStack { layers: Vec::new() }
    }

    /// Extend the view with one more enclosing layer
    pub fn with(&self, layer: &'a dyn LayerBuilder) -> OuterStack<'a> {
        let mut layers = self.layers.clone();
        layers.push(layer);
        OuterStack { layers }
    }

    /// The nearest enclosing builder with `capability`, innermost first
    pub fn find(&self, capability: Capability) -> Option<&'a dyn LayerBuilder> {
        self.layers
            .iter()
            .rev()
            .copied()
            .find(|builder| builder.has_capability(capability))
    }

    /// Number of enclosing layers in view
    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

/// The innermost builder in a chain that has `capability`
///
/// Counterpart of [`Packet::outer_of`] for builder chains: walking from
/// `root` toward the terminal payload, the last builder declaring the
/// capability is the nearest one enclosing the leaf.
pub fn outer_of(root: &dyn LayerBuilder, capability: Capability) -> Option<&dyn LayerBuilder> {
    let mut found = None;
    let mut current = Some(root);
    while let Some(builder) = current {
        if builder.has_capability(capability) {
            found = Some(builder);
        }
        current = builder.payload_builder();
    }
    found
}

/// Terminal builder producing an opaque leaf from raw bytes
#[derive(Debug, Clone, Default)]
pub struct RawBuilder {
    data: Vec<u8>,
}

impl RawBuilder {
    /// Create a raw builder over the given bytes
    pub fn new(data: Vec<u8>) -> Self {
        RawBuilder { data }
    }

    /// The bytes this builder will emit
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the bytes this builder will emit
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }
}

impl LayerBuilder for RawBuilder {
    fn layer_name(&self) -> &'static str {
        "raw"
    }

    fn payload_builder(&self) -> Option<&dyn LayerBuilder> {
        None
    }

    fn payload_builder_mut(&mut self) -> Option<&mut dyn LayerBuilder> {
        None
    }

    // A raw leaf has no structure to hang a payload or trailer on.
    fn set_payload_builder(&mut self, _payload: Option<Box<dyn LayerBuilder>>) {}

    fn set_trailer(&mut self, _trailer: Vec<u8>) {}

    fn set_correct_length(&mut self, _enabled: bool) {}

    fn set_correct_checksum(&mut self, _enabled: bool) {}

    fn has_capability(&self, _capability: Capability) -> bool {
        false
    }

    fn build_with_outers(&self, _outers: &OuterStack<'_>) -> Result<Packet, BuildError> {
        Ok(Packet::Unknown {
            raw: self.data.clone(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct StubBuilder {
        name: &'static str,
        capability: Option<Capability>,
        payload: Option<Box<dyn LayerBuilder>>,
    }

    impl StubBuilder {
        fn new(name: &'static str, capability: Option<Capability>) -> Self {
            StubBuilder {
                name,
                capability,
                payload: None,
            }
        }
    }

    impl LayerBuilder for StubBuilder {
        fn layer_name(&self) -> &'static str {
            self.name
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

        fn set_trailer(&mut self, _trailer: Vec<u8>) {}

        fn set_correct_length(&mut self, _enabled: bool) {}

        fn set_correct_checksum(&mut self, _enabled: bool) {}

        fn has_capability(&self, capability: Capability) -> bool {
            self.capability == Some(capability)
        }

        fn build_with_outers(&self, outers: &OuterStack<'_>) -> Result<Packet, BuildError> {
            let payload = match &self.payload {
                Some(builder) => Some(Box::new(builder.build_with_outers(&outers.with(self))?)),
                None => None,
            };
            match payload {
                Some(payload) => Ok(*payload),
                None => Ok(Packet::Unknown { raw: vec![] }),
            }
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_raw_builder_builds_opaque_leaf() {
        let builder = RawBuilder::new(vec![1, 2, 3]);
        let packet = builder.build().unwrap();
        assert_eq!(packet, Packet::Unknown { raw: vec![1, 2, 3] });

        // Builders are reusable.
        let again = builder.build().unwrap();
        assert_eq!(packet, again);
    }

    #[test]
    fn test_outer_stack_find_prefers_innermost() {
        let outer = StubBuilder::new("outer", Some(Capability::PseudoHeaderSource));
        let middle = StubBuilder::new("middle", Some(Capability::PseudoHeaderSource));

        let stack = OuterStack::empty().with(&outer).with(&middle);
        assert_eq!(stack.depth(), 2);

        let found = stack.find(Capability::PseudoHeaderSource).unwrap();
        assert_eq!(found.layer_name(), "middle");
        assert!(stack.find(Capability::ChecksumField).is_none());
    }

    #[test]
    fn test_outer_of_walks_whole_chain() {
        let mut root = StubBuilder::new("root", Some(Capability::LengthField));
        let mut middle = StubBuilder::new("middle", Some(Capability::LengthField));
        middle.set_payload_builder(Some(Box::new(StubBuilder::new("leaf", None))));
        root.set_payload_builder(Some(Box::new(middle)));

        let found = outer_of(&root, Capability::LengthField).unwrap();
        assert_eq!(found.layer_name(), "middle");
        assert!(outer_of(&root, Capability::ChecksumField).is_none());
    }
}
