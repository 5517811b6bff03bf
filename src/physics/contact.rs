//! Collision records and the listener interface.
//!
//! [`CollisionPair`] and [`Collision`] are plain-old-data so the pipeline can
//! keep them in frame-arena containers.

use std::hash::{Hash, Hasher};

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use super::narrowphase::ContactInfo;

/// Unordered pair of bodies. `(a, b)` and `(b, a)` compare and hash equal.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CollisionPair {
    a: u64,
    b: u64,
}

impl CollisionPair {
    pub fn new(a: hecs::Entity, b: hecs::Entity) -> Self {
        Self {
            a: a.to_bits().get(),
            b: b.to_bits().get(),
        }
    }

    pub fn first(&self) -> hecs::Entity {
        entity_from_bits(self.a)
    }

    pub fn second(&self) -> hecs::Entity {
        entity_from_bits(self.b)
    }

    pub fn entities(&self) -> (hecs::Entity, hecs::Entity) {
        (self.first(), self.second())
    }

    pub fn contains(&self, entity: hecs::Entity) -> bool {
        let bits = entity.to_bits().get();
        self.a == bits || self.b == bits
    }

    /// The member of the pair that is not `entity`.
    pub fn other(&self, entity: hecs::Entity) -> Option<hecs::Entity> {
        let bits = entity.to_bits().get();
        if self.a == bits {
            Some(self.second())
        } else if self.b == bits {
            Some(self.first())
        } else {
            None
        }
    }

    fn ordered(&self) -> (u64, u64) {
        (self.a.min(self.b), self.a.max(self.b))
    }
}

fn entity_from_bits(bits: u64) -> hecs::Entity {
    hecs::Entity::from_bits(bits).unwrap_or(hecs::Entity::DANGLING)
}

impl PartialEq for CollisionPair {
    fn eq(&self, other: &Self) -> bool {
        self.ordered() == other.ordered()
    }
}

impl Eq for CollisionPair {}

impl Hash for CollisionPair {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ordered().hash(state);
    }
}

/// A narrowphase hit between the two bodies of a pair.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Collision {
    pub pair: CollisionPair,
    pub point: Vec2,
    /// Unit direction from the pair's first body toward the second.
    pub direction: Vec2,
    pub penetration: f32,
    sensor: u32,
}

impl Collision {
    pub fn new(pair: CollisionPair, info: ContactInfo, sensor: bool) -> Self {
        Self {
            pair,
            point: info.point,
            direction: info.direction,
            penetration: info.penetration,
            sensor: sensor as u32,
        }
    }

    #[inline]
    pub fn colliding(&self) -> bool {
        self.penetration > 0.0
    }

    /// Whether either body is a sensor. Sensor hits are reported but never resolved.
    #[inline]
    pub fn is_sensor(&self) -> bool {
        self.sensor != 0
    }
}

/// Stage of the step a collision event is published from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPhase {
    /// The narrowphase found an overlap. Sensor hits are included.
    Contact,
    /// The solver separated the bodies.
    Resolved,
}

/// Receives collision events during [`crate::physics::PhysicsWorld::update`].
///
/// Listeners may modify the world, e.g. deactivate or despawn bodies; later
/// pairs referencing a despawned entity are skipped.
pub trait CollisionListener {
    fn on_collision(
        &mut self,
        world: &mut hecs::World,
        collision: &Collision,
        phase: CollisionPhase,
    );
}

impl<F> CollisionListener for F
where
    F: FnMut(&mut hecs::World, &Collision, CollisionPhase),
{
    fn on_collision(
        &mut self,
        world: &mut hecs::World,
        collision: &Collision,
        phase: CollisionPhase,
    ) {
        self(world, collision, phase)
    }
}
