//! Continuous-time AABB physics: gravity, collision against world blocks and other entities,
//! friction and bounciness. Ported from the intent described by the original engine's
//! `new_physics.h`/`new_physics.cpp` (the unified model superseding the in-progress migration from
//! `physics.h` noted in that codebase).

use bitflags::bitflags;
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::codec::{ByteStreamReader, ByteStreamWriter, CodecResult};
use crate::coordinates::{Dimension, PositionF};

bitflags! {
    /// Named bits for the contact masks in [`Properties::contact_mask1`]/[`Properties::contact_mask2`]
    /// (spec §4.5). Two objects collide iff `(a.mask1 & b.mask2) != 0`; the raw `u32` is kept on the
    /// wire and in [`Properties`] itself so an unrecognized bit set by a future content mod still
    /// round-trips, with these flags as a named, checked view over it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ContactMask: u32 {
        /// The mask every object collides under unless given a more specific one.
        const DEFAULT = 0x1;
        /// World terrain (blocks).
        const TERRAIN = 0x2;
        /// Living entities (players, mobs).
        const ENTITY = 0x4;
        /// Projectiles, which typically ignore other projectiles.
        const PROJECTILE = 0x8;
    }
}

/// Smallest distance at which two surfaces are considered "touching" rather than overlapping or
/// separate. Collisions are resolved to land objects at this separation.
pub const CONTACT_EPSILON: f64 = 1e-3;
/// Smallest time-of-impact or distance considered numerically significant; used to reject
/// parallel-plane grazes and to bound the iteration loop below.
pub const GEOMETRIC_EPSILON: f64 = 1e-4;
/// Maximum number of sub-step collisions resolved within a single [`step`] call, bounding the
/// worst case of a resting stack of objects. Reaching the cap never fails silently: remaining
/// motion for the step is simply dropped for that tick.
pub const MAX_ITERATIONS_PER_STEP: u32 = 64;

/// Per-object physical properties: mass, surface friction/bounciness and the contact masks that
/// gate which pairs of objects are even allowed to collide.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    /// Mass in arbitrary game units. Must be `>= EPSILON_MASS` or exactly [`Properties::INFINITE_MASS`].
    pub mass: f32,
    /// Surface friction coefficient, `0..=1`.
    pub friction: f32,
    /// Restitution coefficient, `0..=1`. `0` is fully inelastic, `1` is a perfect bounce.
    pub bounciness: f32,
    /// First contact mask: this object collides with another iff `(self.mask1 & other.mask2) != 0`.
    pub contact_mask1: u32,
    /// Second contact mask, see [`Properties::contact_mask1`].
    pub contact_mask2: u32,
}

impl Properties {
    /// Marker mass value for immovable objects (terrain, kinematic platforms): such an object's
    /// own velocity/position is never changed by a collision response, only the partner's.
    pub const INFINITE_MASS: f32 = 1e20;
    /// Smallest legal finite mass.
    pub const EPSILON_MASS: f32 = 1e-6;

    /// The default contact mask: collides with everything using the default mask.
    pub const DEFAULT_MASK: u32 = ContactMask::DEFAULT.bits();

    /// Constructs properties with the default contact masks.
    pub const fn new(mass: f32, friction: f32, bounciness: f32) -> Self {
        Self {
            mass,
            friction,
            bounciness,
            contact_mask1: Self::DEFAULT_MASK,
            contact_mask2: Self::DEFAULT_MASK,
        }
    }

    /// Whether this object's mass is [`Properties::INFINITE_MASS`] (immovable).
    pub fn is_immovable(&self) -> bool {
        self.mass >= Self::INFINITE_MASS
    }

    /// Whether `self` and `other` are allowed to collide, per their contact masks.
    pub fn collides_with(&self, other: &Properties) -> bool {
        (self.contact_mask1 & other.contact_mask2) != 0
    }

    /// [`Self::contact_mask1`] as a named [`ContactMask`]. Bits with no assigned name still round
    /// through [`Self::collides_with`]'s raw `u32` comparison; this view is for readable construction
    /// and logging.
    pub fn mask1(&self) -> ContactMask {
        ContactMask::from_bits_retain(self.contact_mask1)
    }

    /// [`Self::contact_mask2`] as a named [`ContactMask`]. See [`Self::mask1`].
    pub fn mask2(&self) -> ContactMask {
        ContactMask::from_bits_retain(self.contact_mask2)
    }

    /// Reads properties from a byte stream.
    pub fn read(r: &mut impl ByteStreamReader) -> CodecResult<Self> {
        let mass = r.read_finite_f32()?;
        let friction = r.read_finite_f32()?;
        let bounciness = r.read_finite_f32()?;
        let contact_mask1 = r.read_u32()?;
        let contact_mask2 = r.read_u32()?;
        Ok(Self {
            mass,
            friction,
            bounciness,
            contact_mask1,
            contact_mask2,
        })
    }

    /// Writes properties to a byte stream.
    pub fn write(&self, w: &mut impl ByteStreamWriter) -> CodecResult<()> {
        w.write_f32(self.mass)?;
        w.write_f32(self.friction)?;
        w.write_f32(self.bounciness)?;
        w.write_u32(self.contact_mask1)?;
        w.write_u32(self.contact_mask2)
    }
}

/// One of the physical shapes a [`PhysicsObject`] can take.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PhysicsObject {
    /// No collider, no forces: used for entities that are purely decorative or server-controlled
    /// in some other way.
    Empty,
    /// An axis-aligned box with linear, quadratic and cubic motion terms.
    AABox {
        /// Center position of the box.
        position: PositionF,
        /// Half the box's width/height/depth along each axis.
        half_extents: DVec3,
        /// Current linear velocity.
        velocity: DVec3,
        /// Current acceleration (gravity plus any other continuous force).
        acceleration: DVec3,
        /// Rate of change of acceleration, for smoothly varying forces. Usually zero.
        delta_acceleration: DVec3,
        /// Material properties gating collision response.
        properties: Properties,
        /// Whether gravity is disabled and there is no air friction for this object (the
        /// `flying` movement mode): per spec §9, "gravity disabled for this entity" with ordinary
        /// collision otherwise.
        flying: bool,
        /// Whether this object is currently resting on a collider with an upward-facing contact
        /// normal and near-zero approach velocity. While supported, gravity does not pull the
        /// object down and its y-velocity is clamped to `>= 0`.
        supported: bool,
    },
}

impl PhysicsObject {
    /// Constructs a new resting (zero velocity/acceleration) AABox.
    pub fn new_aabox(position: PositionF, half_extents: DVec3, properties: Properties) -> Self {
        Self::AABox {
            position,
            half_extents,
            velocity: DVec3::ZERO,
            acceleration: DVec3::ZERO,
            delta_acceleration: DVec3::ZERO,
            properties,
            flying: false,
            supported: false,
        }
    }

    /// The object's current position, if it has one.
    pub fn position(&self) -> Option<PositionF> {
        match self {
            PhysicsObject::Empty => None,
            PhysicsObject::AABox { position, .. } => Some(*position),
        }
    }

    /// The object's current velocity, if it has one.
    pub fn velocity(&self) -> DVec3 {
        match self {
            PhysicsObject::Empty => DVec3::ZERO,
            PhysicsObject::AABox { velocity, .. } => *velocity,
        }
    }

    /// The world-space axis-aligned bounds `(min, max)`, if this object has a collider.
    pub fn aabb(&self) -> Option<(DVec3, DVec3)> {
        match self {
            PhysicsObject::Empty => None,
            PhysicsObject::AABox {
                position, half_extents, ..
            } => Some((position.pos - *half_extents, position.pos + *half_extents)),
        }
    }

    /// The object's material properties (mass, friction, bounciness, contact masks).
    pub fn properties(&self) -> Properties {
        match self {
            PhysicsObject::Empty => Properties::new(0.0, 0.0, 0.0),
            PhysicsObject::AABox { properties, .. } => *properties,
        }
    }

    /// Integrates position and velocity forward by `dt` using the cubic/quadratic motion
    /// polynomial: `x += v*dt + 1/2*a*dt^2 + 1/6*da*dt^3`, `v += a*dt + 1/2*da*dt^2`. Gravity's
    /// contribution to `acceleration` is expected to already be folded in by the caller unless
    /// `flying`/`supported` is set, in which case vertical acceleration is not applied.
    pub fn integrate(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        if let PhysicsObject::AABox {
            position,
            velocity,
            acceleration,
            delta_acceleration,
            flying,
            supported,
            ..
        } = self
        {
            let mut accel = *acceleration;
            if *flying || *supported {
                accel.y = 0.0;
            }
            let dt2 = dt * dt;
            let dt3 = dt2 * dt;
            position.pos += *velocity * dt + 0.5 * accel * dt2 + (1.0 / 6.0) * *delta_acceleration * dt3;
            *velocity += accel * dt + 0.5 * *delta_acceleration * dt2;
            if *supported && velocity.y < 0.0 {
                velocity.y = 0.0;
            }
        }
    }
}

/// A single point of contact between an object and something else (a block face or another
/// object), together with the outward-facing surface normal of the *other* side.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// World position of the contact point.
    pub position: PositionF,
    /// Outward normal of the surface this object is touching.
    pub other_normal: DVec3,
}

impl Contact {
    /// A contact is "valid" (actually touching something) iff its normal is nonzero.
    pub fn valid(&self) -> bool {
        self.other_normal != DVec3::ZERO
    }
}

/// A predicted future collision: the contact geometry plus the relative velocity and the time (in
/// seconds from the start of the current [`step`] call) at which it occurs.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collision {
    /// Contact geometry at the moment of impact.
    pub contact: Contact,
    /// Relative velocity between the two objects at the moment of impact.
    pub relative_velocity: DVec3,
    /// Time of impact, `0 < time <= dt`.
    pub time: f64,
}

/// The axis a collision normal points along, used to pick the axis of least surface displacement.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn as_vec(self, sign: f64) -> DVec3 {
        match self {
            Axis::X => DVec3::new(sign, 0.0, 0.0),
            Axis::Y => DVec3::new(0.0, sign, 0.0),
            Axis::Z => DVec3::new(0.0, 0.0, sign),
        }
    }
}

fn axis_component(v: DVec3, axis: Axis) -> f64 {
    match axis {
        Axis::X => v.x,
        Axis::Y => v.y,
        Axis::Z => v.z,
    }
}

/// Computes the smallest `t_hit` in `(GEOMETRIC_EPSILON, dt]` at which two moving AABBs (given as
/// `min`/`max` at the start of the interval, plus constant relative velocities over `dt`) first
/// touch along any axis, and the axis/sign of the contact normal (pointing away from `b`, into
/// `a`). Returns `None` if the boxes never touch within `dt`, or only graze at a parallel-plane
/// edge (rejected by requiring actual overlap on the other two axes at `t_hit`).
///
/// Velocities are treated as constant across the (typically short) sub-step; acceleration is
/// re-evaluated and a fresh collision search performed once this sub-step's motion is applied, so
/// curvature within a single sub-step is only ever a second-order error bounded by
/// [`MAX_ITERATIONS_PER_STEP`].
fn sweep_aabb(
    a_min: DVec3,
    a_max: DVec3,
    a_vel: DVec3,
    b_min: DVec3,
    b_max: DVec3,
    b_vel: DVec3,
    dt: f64,
) -> Option<(f64, Axis, f64)> {
    let rel_vel = a_vel - b_vel;

    // Per-axis time interval during which the two intervals overlap.
    let mut entry = [f64::NEG_INFINITY; 3];
    let mut exit = [f64::INFINITY; 3];
    let amin = [a_min.x, a_min.y, a_min.z];
    let amax = [a_max.x, a_max.y, a_max.z];
    let bmin = [b_min.x, b_min.y, b_min.z];
    let bmax = [b_max.x, b_max.y, b_max.z];
    let rv = [rel_vel.x, rel_vel.y, rel_vel.z];

    for axis in 0..3 {
        let already_overlap = amin[axis] < bmax[axis] && amax[axis] > bmin[axis];
        if rv[axis].abs() < f64::EPSILON {
            if already_overlap {
                entry[axis] = f64::NEG_INFINITY;
                exit[axis] = f64::INFINITY;
            } else {
                // Never overlaps on this axis: no collision possible at all.
                return None;
            }
        } else {
            // Time at which `a`'s min/max cross `b`'s max/min (a moving toward b) or vice versa.
            let t_enter_pos = (bmin[axis] - amax[axis]) / rv[axis];
            let t_exit_pos = (bmax[axis] - amin[axis]) / rv[axis];
            let (t0, t1) = if t_enter_pos < t_exit_pos {
                (t_enter_pos, t_exit_pos)
            } else {
                (t_exit_pos, t_enter_pos)
            };
            entry[axis] = t0;
            exit[axis] = t1;
        }
    }

    let t_enter = entry.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let t_exit = exit.iter().cloned().fold(f64::INFINITY, f64::min);

    if t_enter > t_exit || t_enter > dt || t_exit < 0.0 {
        return None;
    }
    if t_enter < GEOMETRIC_EPSILON {
        // Already touching/overlapping at the start of the sub-step: not a new collision here.
        return None;
    }

    // The axis of least surface displacement is the one whose entry time is latest (the last
    // axis to start overlapping is the one that "causes" the collision).
    let (axis_idx, &t_hit) = entry
        .iter()
        .enumerate()
        .max_by(|(_, x), (_, y)| x.partial_cmp(y).unwrap())
        .unwrap();
    let axis = match axis_idx {
        0 => Axis::X,
        1 => Axis::Y,
        _ => Axis::Z,
    };
    let sign = if rv[axis_idx] > 0.0 { -1.0 } else { 1.0 };
    Some((t_hit, axis, sign))
}

/// Resolves the velocity change for a single collision between `a` (the moving object being
/// stepped) and `b`, per spec §4.5: the relative velocity is decomposed into normal/tangential
/// parts, the normal part reflects by `bounciness_a * bounciness_b`, the tangential part blends
/// toward the joint velocity by `friction_a * friction_b`. An infinite-mass partner never changes
/// its own state; the finite partner absorbs the whole impulse.
fn resolve(a_vel: DVec3, a_props: Properties, b_vel: DVec3, b_props: Properties, normal: DVec3) -> DVec3 {
    let relative = a_vel - b_vel;
    let normal_speed = relative.dot(normal);
    let normal_component = normal * normal_speed;
    let tangential_component = relative - normal_component;

    let restitution = (a_props.bounciness * b_props.bounciness) as f64;
    let friction = (a_props.friction * b_props.friction) as f64;

    let reflected_normal = if normal_speed < 0.0 {
        -normal_component * restitution
    } else {
        normal_component
    };
    let damped_tangential = tangential_component * (1.0 - friction);

    let new_relative = reflected_normal + damped_tangential;

    if a_props.is_immovable() {
        a_vel
    } else if b_props.is_immovable() {
        b_vel + new_relative
    } else {
        // Both finite: split the impulse by inverse mass (heavier object moves less).
        let total_inv_mass = 1.0 / a_props.mass as f64 + 1.0 / b_props.mass as f64;
        let a_share = (1.0 / a_props.mass as f64) / total_inv_mass;
        let b_velocity_target = b_vel + new_relative;
        a_vel.lerp(b_velocity_target, a_share)
    }
}

/// Context a [`step`] call needs to find broad-phase collision candidates: world blocks and other
/// physics objects in the active region. Implemented by `gs_common`'s world store, which has
/// access to the block iterator and entity spatial index this crate intentionally doesn't depend
/// on.
pub trait CollisionWorld {
    /// Returns the world-space AABBs of every solid block whose cell overlaps `min..=max` in
    /// `dimension`. Positions in different dimensions never interact physically, so callers must
    /// never mix blocks from one dimension into another's sweep.
    fn solid_block_aabbs(&self, dimension: Dimension, min: DVec3, max: DVec3) -> Vec<(DVec3, DVec3)>;
}

/// Advances a single [`PhysicsObject`] from `t0` to `t0 + dt`, resolving collisions against solid
/// blocks (via `world`, queried in the object's own dimension) and against `others` (other
/// entities' current AABB/velocity/properties, already filtered by the caller to the same
/// dimension as `object` and to the active region).
///
/// Returns `true` if, at the end of the step, the object is resting (supported) on an upward-facing
/// contact with near-zero approach velocity.
pub fn step(
    object: &mut PhysicsObject,
    world: &impl CollisionWorld,
    others: &[(DVec3, DVec3, DVec3, Properties)],
    dt: f64,
) {
    let PhysicsObject::AABox {
        position,
        half_extents,
        velocity,
        acceleration,
        delta_acceleration,
        properties,
        flying,
        supported,
    } = object
    else {
        return;
    };
    let dimension = position.dimension;

    // Semi-implicit Euler: fold this step's acceleration into velocity up front, then sweep the
    // resulting (locally constant) velocity against the world for the remainder of this function.
    // Gravity's vertical component is withheld while flying or supported, matching `integrate`.
    if !*flying {
        let mut accel = *acceleration;
        if *supported {
            accel.y = 0.0;
        }
        *velocity += accel * dt + 0.5 * *delta_acceleration * dt * dt;
        if *supported && velocity.y < 0.0 {
            velocity.y = 0.0;
        }
    }

    let mut remaining = dt;
    let mut iterations = 0;
    let mut any_supported = false;

    while remaining > GEOMETRIC_EPSILON && iterations < MAX_ITERATIONS_PER_STEP {
        iterations += 1;
        let a_min = position.pos - *half_extents;
        let a_max = position.pos + *half_extents;

        let mut best: Option<(f64, Axis, f64, DVec3, Properties)> = None;

        for (b_min, b_max) in world.solid_block_aabbs(dimension, a_min, a_max) {
            if let Some((t, axis, sign)) = sweep_aabb(a_min, a_max, *velocity, b_min, b_max, DVec3::ZERO, remaining) {
                if best.is_none_or(|(bt, ..)| t < bt) {
                    let infinite = Properties::new(Properties::INFINITE_MASS, 1.0, 0.0);
                    best = Some((t, axis, sign, DVec3::ZERO, infinite));
                }
            }
        }

        for &(b_min, b_max, b_vel, b_props) in others {
            if !properties.collides_with(&b_props) {
                continue;
            }
            if let Some((t, axis, sign)) = sweep_aabb(a_min, a_max, *velocity, b_min, b_max, b_vel, remaining) {
                if best.is_none_or(|(bt, ..)| t < bt) {
                    best = Some((t, axis, sign, b_vel, b_props));
                }
            }
        }

        match best {
            None => {
                position.pos += *velocity * remaining;
                remaining = 0.0;
            }
            Some((t_hit, axis, sign, b_vel, b_props)) => {
                position.pos += *velocity * t_hit;
                let normal = axis.as_vec(sign);
                let new_vel = resolve(*velocity, *properties, b_vel, b_props, normal);
                *velocity = new_vel;

                // Push the two objects apart by the contact epsilon along the normal to avoid
                // immediately re-detecting the same collision.
                position.pos += normal * CONTACT_EPSILON;

                if axis == Axis::Y && sign > 0.0 {
                    let approach = (*velocity - b_vel).dot(normal);
                    if approach.abs() < CONTACT_EPSILON {
                        any_supported = true;
                    }
                }

                remaining -= t_hit;
            }
        }
    }

    *supported = any_supported;
}

#[cfg(test)]
mod test {
    use super::*;

    struct NoBlocks;
    impl CollisionWorld for NoBlocks {
        fn solid_block_aabbs(&self, _dimension: Dimension, _min: DVec3, _max: DVec3) -> Vec<(DVec3, DVec3)> {
            Vec::new()
        }
    }

    struct FlatGround {
        surface_y: f64,
    }
    impl CollisionWorld for FlatGround {
        fn solid_block_aabbs(&self, _dimension: Dimension, min: DVec3, max: DVec3) -> Vec<(DVec3, DVec3)> {
            if min.y < self.surface_y {
                vec![(
                    DVec3::new(min.x - 10.0, self.surface_y - 1.0, min.z - 10.0),
                    DVec3::new(max.x + 10.0, self.surface_y, max.z + 10.0),
                )]
            } else {
                Vec::new()
            }
        }
    }

    #[test]
    fn unobstructed_object_integrates_freely() {
        let mut obj = PhysicsObject::new_aabox(
            PositionF::new(Default::default(), DVec3::new(0.0, 100.0, 0.0)),
            DVec3::splat(0.25),
            Properties::new(1.0, 0.0, 0.0),
        );
        if let PhysicsObject::AABox { velocity, .. } = &mut obj {
            *velocity = DVec3::new(1.0, 0.0, 0.0);
        }
        step(&mut obj, &NoBlocks, &[], 1.0);
        assert_eq!(obj.position().unwrap().pos, DVec3::new(1.0, 100.0, 0.0));
    }

    #[test]
    fn falling_object_comes_to_rest_on_ground_with_zero_bounciness() {
        let mut obj = PhysicsObject::new_aabox(
            PositionF::new(Default::default(), DVec3::new(0.5, 72.0, 0.5)),
            DVec3::splat(0.25),
            Properties::new(1.0, 0.5, 0.0),
        );
        let ground = FlatGround { surface_y: 64.0 };
        let gravity = DVec3::new(0.0, -9.8, 0.0);
        for _ in 0..500 {
            if let PhysicsObject::AABox { acceleration, .. } = &mut obj {
                *acceleration = gravity;
            }
            step(&mut obj, &ground, &[], 0.01);
        }
        let pos = obj.position().unwrap().pos;
        assert!(pos.y > 64.25, "object should not have sunk into the ground: y={}", pos.y);
        assert!(pos.y < 64.25 + 1e-3 + 1e-9, "expected to rest at y~=64.25, got {}", pos.y);
        if let PhysicsObject::AABox { velocity, .. } = &obj {
            assert!(velocity.length() < 1e-3, "expected velocity to have settled, got {velocity:?}");
        }
    }

    #[test]
    fn immovable_partner_never_changes_velocity() {
        let infinite = Properties::new(Properties::INFINITE_MASS, 0.0, 0.0);
        let finite = Properties::new(1.0, 0.0, 0.0);
        let normal = DVec3::new(0.0, 1.0, 0.0);
        let new_vel = resolve(DVec3::ZERO, infinite, DVec3::new(0.0, -5.0, 0.0), finite, normal);
        assert_eq!(new_vel, DVec3::ZERO);
    }

    #[test]
    fn contact_requires_nonzero_normal() {
        assert!(!Contact::default().valid());
        let c = Contact {
            position: PositionF::new(Default::default(), DVec3::ZERO),
            other_normal: DVec3::Y,
        };
        assert!(c.valid());
    }
}
