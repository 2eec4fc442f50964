//! Block types: the immutable, construction-time [`BlockDescriptor`] registry entries and the
//! per-cell [`BlockData`] stored inside every [`crate::voxel::chunk::Chunk`].

use std::any::Any;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::light::LightProperties;
use crate::registry::{RegistryId, RegistryName, RegistryNameRef, RegistryObject};

/// Open-ended per-block side data, stored only on the (rare) blocks that need it, e.g. a chest's
/// inventory or a sign's text. Modeled as a small trait object rather than a fixed struct (per
/// the original engine's `shared_ptr<void> extraData`) so individual block kinds can attach
/// arbitrary data without the core knowing about it.
pub trait BlockExtraData: Debug + Send + Sync {
    /// Downcasting escape hatch for block-kind-specific code that knows the concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a block's extra data. Cheap to clone (reference counted); cloning a
/// [`BlockData`] never deep-copies the extra payload.
pub type BlockExtra = Arc<dyn BlockExtraData>;

/// An immutable, registry-owned description of one kind of block: its name and its lighting
/// interaction. Additional per-kind behavior (collision shape, render mesh, drop tables, ...) is
/// an extension point left to content outside the core.
#[derive(Debug)]
pub struct BlockDescriptor {
    /// The unique namespaced name this block is registered under, e.g. `"core:stone"`.
    pub name: RegistryName,
    /// How this block interacts with the lighting propagation rule (§4.3).
    pub light_properties: LightProperties,
    /// Whether this block type has a collidable solid body for physics/collision purposes.
    pub solid: bool,
}

impl RegistryObject for BlockDescriptor {
    fn registry_name(&self) -> RegistryNameRef {
        self.name.as_ref()
    }
}

impl BlockDescriptor {
    /// Constructs a new block descriptor.
    pub fn new(name: impl Into<RegistryName>, light_properties: LightProperties, solid: bool) -> Self {
        Self {
            name: name.into(),
            light_properties,
            solid,
        }
    }
}

/// One cell of the voxel grid: a reference to its kind (by [`RegistryId`] into the process-wide
/// block registry), an opaque per-kind integer payload, its current lighting, and optional
/// heap-allocated extra data. Stored by value inside chunks; `descriptor` is the only
/// shared/reference-counted part, and its lifetime is the registry's (which outlives every
/// `World` built from it).
#[derive(Clone, Default)]
pub struct BlockData {
    /// The block's kind, or `None` for a not-yet-initialized / synthetic cell (out-of-range
    /// reads from the block iterator return a synthesized value that is always `good()`).
    pub descriptor: Option<RegistryId>,
    /// Kind-specific payload (e.g. rotation, growth stage, fluid level).
    pub idata: i32,
    /// Current lighting of this cell.
    pub light: crate::light::Lighting,
    /// Optional heap-allocated per-cell extra data.
    pub extra: Option<BlockExtra>,
}

impl BlockData {
    /// Constructs a new block with no `idata`, default lighting and no extra data.
    pub fn new(descriptor: RegistryId) -> Self {
        Self {
            descriptor: Some(descriptor),
            idata: 0,
            light: crate::light::Lighting::default(),
            extra: None,
        }
    }

    /// Whether this cell refers to a real descriptor. Per spec §3, "good() iff descriptor is
    /// set".
    pub fn good(&self) -> bool {
        self.descriptor.is_some()
    }
}

impl PartialEq for BlockData {
    /// Extra data is excluded from equality (and from [`Hash`]): it is side information attached
    /// to a cell, not part of its identity for storage deduplication purposes (palette/array
    /// storage backends rely on this to collapse identical cells regardless of unrelated heap
    /// payloads).
    fn eq(&self, other: &Self) -> bool {
        self.descriptor == other.descriptor && self.idata == other.idata && self.light == other.light
    }
}

impl Hash for BlockData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.descriptor.hash(state);
        self.idata.hash(state);
        self.light.hash(state);
    }
}

impl Debug for BlockData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockData")
            .field("descriptor", &self.descriptor)
            .field("idata", &self.idata)
            .field("light", &self.light)
            .field("has_extra", &self.extra.is_some())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::num::NonZeroU32;

    use super::*;

    #[test]
    fn default_block_is_not_good() {
        assert!(!BlockData::default().good());
    }

    #[test]
    fn constructed_block_is_good() {
        let id = RegistryId::new(NonZeroU32::new(1).unwrap());
        assert!(BlockData::new(id).good());
    }

    #[test]
    fn equality_ignores_extra_data() {
        #[derive(Debug)]
        struct Marker;
        impl BlockExtraData for Marker {
            fn as_any(&self) -> &dyn Any {
                self
            }
        }
        let id = RegistryId::new(NonZeroU32::new(1).unwrap());
        let mut a = BlockData::new(id);
        let b = a.clone();
        a.extra = Some(Arc::new(Marker));
        assert_eq!(a, b);
    }
}
