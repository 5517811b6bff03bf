//! Physics components attached by [`crate::physics::PhysicsWorld::create_body`].

use glam::Vec2;

use crate::physics::broadphase::NodeId;
use crate::physics::collider::Shape;

/// Material and mass properties of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    /// Inverse mass. Zero makes the body immovable.
    pub inv_mass: f32,
    pub friction: f32,
    pub restitution: f32,
    /// Sensors report collisions but are never resolved.
    pub sensor: bool,
    /// Fast movers collide with a capsule swept over the last step.
    pub fast_moving: bool,
}

impl Body {
    pub fn is_static(&self) -> bool {
        self.inv_mass == 0.0
    }
}

/// Linear velocity in units per second.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinearVelocity(pub Vec2);

/// Linear force accumulated until the next integration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinearForce(pub Vec2);

/// Angular velocity in radians per second.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngularVelocity(pub f32);

/// Torque accumulated until the next integration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngularForce(pub f32);

/// Set when position, rotation or scale changed since the last tree update.
///
/// Code that moves a body by writing its transform directly must raise this
/// flag, otherwise the broad phase keeps the old bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransformChanged(pub bool);

/// Position before the last integration; kept for fast movers only.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PreviousPosition(pub Vec2);

/// World-space shape of a body, recomputed when its transform changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub shape: Shape,
}

/// Local shape and broad-phase leaf of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NodeInfo {
    pub local_shape: Shape,
    /// `Some` exactly when the body is active.
    pub node: Option<NodeId>,
}
