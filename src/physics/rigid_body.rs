//! Rigid body integration functions.
//!
//! Force accumulators hold accelerations: gravity and drag are applied
//! independent of mass, which only matters to the solver.

use glam::Vec2;

use crate::ecs::components::physics::{
    AngularForce, AngularVelocity, LinearForce, LinearVelocity, PreviousPosition,
    TransformChanged,
};
use crate::ecs::components::transform::{Active, Position, Rotation};

use super::PhysicsConfig;

/// Squared speed above which linear drag applies.
const LINEAR_DRAG_THRESHOLD_SQ: f32 = 100.0;
/// Squared angular speed above which angular drag applies.
const ANGULAR_DRAG_THRESHOLD_SQ: f32 = 2.0;

#[inline]
fn near_zero(v: f32) -> bool {
    v.abs() <= f32::EPSILON
}

/// Integrate velocities of active bodies with force accumulators, then clear
/// the accumulators.
///
/// Fast bodies are slowed by a quadratic drag. Slow bodies with no force acting
/// on them stop outright.
pub fn integrate_velocities(world: &mut hecs::World, config: &PhysicsConfig, dt: f32) {
    for (_, (force, velocity)) in
        world.query_mut::<hecs::With<(&mut LinearForce, &mut LinearVelocity), &Active>>()
    {
        force.0 += config.gravity;

        let speed_sq = velocity.0.length_squared();
        if speed_sq > LINEAR_DRAG_THRESHOLD_SQ {
            force.0 -= velocity.0 / speed_sq.sqrt() * speed_sq * config.linear_damping;
        } else if near_zero(force.0.x) && near_zero(force.0.y) {
            velocity.0 = Vec2::ZERO;
        }

        velocity.0 += force.0 * dt;
        force.0 = Vec2::ZERO;
    }

    for (_, (torque, angular)) in
        world.query_mut::<hecs::With<(&mut AngularForce, &mut AngularVelocity), &Active>>()
    {
        let speed_sq = angular.0 * angular.0;
        if speed_sq > ANGULAR_DRAG_THRESHOLD_SQ {
            torque.0 -= angular.0.signum() * speed_sq * config.angular_damping;
        } else if near_zero(torque.0) {
            angular.0 = 0.0;
        }

        angular.0 += torque.0 * dt;
        torque.0 = 0.0;
    }
}

/// Move active bodies by their velocities and flag the ones that moved.
pub fn integrate_positions(world: &mut hecs::World, dt: f32) {
    for (_, (position, velocity, changed, previous)) in world.query_mut::<hecs::With<
        (
            &mut Position,
            &LinearVelocity,
            &mut TransformChanged,
            Option<&mut PreviousPosition>,
        ),
        &Active,
    >>() {
        if let Some(previous) = previous {
            previous.0 = position.0;
        }

        let delta = velocity.0 * dt;
        if delta != Vec2::ZERO {
            position.0 += delta;
            changed.0 = true;
        }
    }

    for (_, (rotation, angular, changed)) in world
        .query_mut::<hecs::With<(&mut Rotation, &AngularVelocity, &mut TransformChanged), &Active>>()
    {
        let delta = angular.0 * dt;
        if delta != 0.0 {
            rotation.angle += delta;
            rotation.update();
            changed.0 = true;
        }
    }
}
