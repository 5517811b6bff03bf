//! Single-pass impulse solver with positional correction.

use glam::Vec2;
use tracing::warn;

use crate::ecs::components::physics::{Body, LinearVelocity, TransformChanged};
use crate::ecs::components::transform::Position;

use super::contact::Collision;

/// Fraction of the penetration removed per step.
const CORRECTION_PERCENT: f32 = 0.2;

/// Resolve every collision in order, one pass each.
pub fn resolve_collisions(world: &mut hecs::World, collisions: impl IntoIterator<Item = Collision>) {
    for collision in collisions {
        resolve_collision(world, &collision);
    }
}

/// Apply the normal impulse and positional correction for one collision.
/// The direction points from the pair's first body to the second.
///
/// Only the normal component of the relative velocity changes; `Body::friction`
/// is stored for game code and does not affect resolution.
pub fn resolve_collision(world: &mut hecs::World, collision: &Collision) {
    let (entity_a, entity_b) = collision.pair.entities();
    let (Some(a), Some(b)) = (BodyData::fetch(world, entity_a), BodyData::fetch(world, entity_b))
    else {
        warn!(?entity_a, ?entity_b, "collision references an entity without a body");
        return;
    };

    // Skip if both are static
    let inv_mass_sum = a.inv_mass + b.inv_mass;
    if inv_mass_sum <= 0.0 {
        return;
    }

    let normal = collision.direction;
    let relative_velocity = b.velocity - a.velocity;
    let contact_velocity = relative_velocity.dot(normal);

    // Separating pairs only get position correction.
    let mut impulse = Vec2::ZERO;
    if contact_velocity < 0.0 {
        let restitution = a.restitution.max(b.restitution).clamp(0.0, 1.0);
        let j = -(1.0 + restitution) * contact_velocity / inv_mass_sum;
        impulse = normal * j;
    }

    let correction = normal * (collision.penetration.max(0.0) * CORRECTION_PERCENT / inv_mass_sum);

    apply(world, entity_a, -impulse * a.inv_mass, -correction * a.inv_mass);
    apply(world, entity_b, impulse * b.inv_mass, correction * b.inv_mass);
}

/// Solver inputs copied out of the world.
struct BodyData {
    inv_mass: f32,
    restitution: f32,
    velocity: Vec2,
}

impl BodyData {
    fn fetch(world: &hecs::World, entity: hecs::Entity) -> Option<Self> {
        let body = *world.get::<&Body>(entity).ok()?;
        // Static bodies carry no velocity component.
        let velocity = world
            .get::<&LinearVelocity>(entity)
            .map_or(Vec2::ZERO, |v| v.0);
        Some(Self {
            inv_mass: body.inv_mass,
            restitution: body.restitution,
            velocity,
        })
    }
}

fn apply(world: &mut hecs::World, entity: hecs::Entity, delta_velocity: Vec2, delta_position: Vec2) {
    if delta_velocity != Vec2::ZERO {
        if let Ok(mut velocity) = world.get::<&mut LinearVelocity>(entity) {
            velocity.0 += delta_velocity;
        }
    }
    if delta_position != Vec2::ZERO {
        if let Ok(mut position) = world.get::<&mut Position>(entity) {
            position.0 += delta_position;
        }
        if let Ok(mut changed) = world.get::<&mut TransformChanged>(entity) {
            changed.0 = true;
        }
    }
}
