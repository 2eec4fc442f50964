//! Entity types: the immutable, construction-time [`EntityDescriptor`] registry entries and the
//! per-instance [`EntityData`] held in a `World`'s entity index.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use glam::DVec3;

use crate::coordinates::PositionF;
use crate::physics::{PhysicsObject, Properties};
use crate::registry::{RegistryId, RegistryName, RegistryNameRef, RegistryObject};

/// Open-ended per-entity side data (inventory, AI state, owner UUID, ...), analogous to
/// [`crate::voxel::block::BlockExtra`].
pub trait EntityExtraData: Debug + Send + Sync {
    /// Downcasting escape hatch for entity-kind-specific code that knows the concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to an entity's extra data.
pub type EntityExtra = Arc<dyn EntityExtraData>;

/// An immutable, registry-owned description of one kind of entity: its name and its default
/// physical shape. The embedded expression-language part transforms referenced by the original
/// engine are out of this core's scope (§1); a concrete implementation plugs in per-kind
/// behavior (movement AI, animation) through its own extension mechanism built on top of this
/// descriptor.
#[derive(Debug)]
pub struct EntityDescriptor {
    /// The unique namespaced name this entity kind is registered under, e.g. `"core:player"`.
    pub name: RegistryName,
    /// Half-extents of the default AABB collider for this entity kind.
    pub half_extents: DVec3,
    /// Default physical properties (mass, friction, bounciness, contact masks) for new instances.
    pub default_properties: Properties,
}

impl RegistryObject for EntityDescriptor {
    fn registry_name(&self) -> RegistryNameRef {
        self.name.as_ref()
    }
}

impl EntityDescriptor {
    /// Constructs a new entity descriptor.
    pub fn new(name: impl Into<RegistryName>, half_extents: DVec3, default_properties: Properties) -> Self {
        Self {
            name: name.into(),
            half_extents,
            default_properties,
        }
    }

    /// Spawns a fresh, at-rest physics object matching this descriptor's default shape at `position`.
    pub fn spawn_physics(&self, position: PositionF) -> PhysicsObject {
        PhysicsObject::new_aabox(position, self.half_extents, self.default_properties)
    }
}

/// A lightweight, serializable snapshot of an entity's render-relevant state: what actually gets
/// sent to clients and mirrored into their `RenderObjectWorld` (§3). Lazily (re)built from
/// `EntityData` whenever the entity moves enough to need a fresh snapshot, and cached until then
/// (see `gs_common::network`'s per-tick update collection).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderObjectEntity {
    /// The entity kind, by registry ID, so clients can resolve the appropriate mesh.
    pub descriptor: RegistryId,
    /// Current position.
    pub position: PositionF,
    /// Current velocity, used by clients for short-term interpolation between snapshots.
    pub velocity: DVec3,
    /// View yaw (phi) / pitch (theta), for player-controlled entities; `0` for others.
    pub phi: f32,
    /// See [`RenderObjectEntity::phi`].
    pub theta: f32,
}

/// One live entity instance: its kind, its authoritative physics state, its lazily constructed
/// render mirror and any kind-specific extra data.
#[derive(Clone)]
pub struct EntityData {
    /// The entity's kind, or `None` if this slot is a placeholder (never sent, never simulated).
    pub descriptor: Option<RegistryId>,
    /// Authoritative position/velocity/collider, simulated by the physics stepper (§4.5).
    pub physics: PhysicsObject,
    /// Cached render-relevant snapshot, rebuilt on demand.
    pub render: Option<RenderObjectEntity>,
    /// Optional heap-allocated per-instance extra data.
    pub extra: Option<EntityExtra>,
    /// Whether this entity instance is still alive. Once cleared, the entity is destroyed: its
    /// last [`RenderObjectEntity`] snapshot is queued for delivery so every client observes the
    /// destruction exactly once (§3 Lifecycles), and the slot is removed from the world's entity
    /// index on the next tick.
    alive: bool,
}

impl EntityData {
    /// Constructs a new, live entity.
    pub fn new(descriptor: RegistryId, physics: PhysicsObject) -> Self {
        Self {
            descriptor: Some(descriptor),
            physics,
            render: None,
            extra: None,
            alive: true,
        }
    }

    /// Whether this entity instance refers to a real descriptor and has not been destroyed.
    pub fn good(&self) -> bool {
        self.descriptor.is_some() && self.alive
    }

    /// Marks this entity as destroyed. `good()` becomes `false` from this point on.
    pub fn destroy(&mut self) {
        self.alive = false;
    }

    /// The entity's current authoritative position, if it has a physical presence.
    pub fn position(&self) -> Option<PositionF> {
        self.physics.position()
    }

    /// The entity's current authoritative velocity.
    pub fn velocity(&self) -> DVec3 {
        self.physics.velocity()
    }

    /// Rebuilds [`EntityData::render`] from the current physics state, returning the fresh
    /// snapshot. Called by the server tick whenever an entity needs a new update queued (§4.6).
    pub fn refresh_render(&mut self, phi: f32, theta: f32) -> Option<RenderObjectEntity> {
        let descriptor = self.descriptor?;
        let position = self.physics.position()?;
        let snapshot = RenderObjectEntity {
            descriptor,
            position,
            velocity: self.physics.velocity(),
            phi,
            theta,
        };
        self.render = Some(snapshot);
        Some(snapshot)
    }
}

#[cfg(test)]
mod test {
    use std::num::NonZeroU32;

    use super::*;
    use crate::coordinates::Dimension;

    #[test]
    fn new_entity_is_good_until_destroyed() {
        let id = RegistryId::new(NonZeroU32::new(1).unwrap());
        let physics = PhysicsObject::new_aabox(
            PositionF::new(Dimension::OVERWORLD, DVec3::ZERO),
            DVec3::splat(0.5),
            Properties::new(1.0, 0.5, 0.0),
        );
        let mut entity = EntityData::new(id, physics);
        assert!(entity.good());
        entity.destroy();
        assert!(!entity.good());
    }

    #[test]
    fn refresh_render_snapshots_current_physics_state() {
        let id = RegistryId::new(NonZeroU32::new(1).unwrap());
        let physics = PhysicsObject::new_aabox(
            PositionF::new(Dimension::OVERWORLD, DVec3::new(1.0, 2.0, 3.0)),
            DVec3::splat(0.5),
            Properties::new(1.0, 0.5, 0.0),
        );
        let mut entity = EntityData::new(id, physics);
        let snap = entity.refresh_render(0.1, 0.2).unwrap();
        assert_eq!(snap.position.pos, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(entity.render, Some(snap));
    }
}
