//! Debug visualisation of bodies, the broad phase tree and contacts.
//!
//! The physics world keeps the candidate pairs and contacts of the last step
//! and replays them through a [`DebugDraw`] implementation supplied by the
//! renderer.

use glam::Vec2;

use super::collider::{Aabb, Shape};
use super::contact::{Collision, CollisionPair};

/// RGBA color in linear space.
pub type Color = [f32; 4];

pub const STATIC_COLOR: Color = [0.5, 0.5, 0.5, 1.0];
pub const DYNAMIC_COLOR: Color = [0.2, 0.8, 0.3, 1.0];
pub const SENSOR_COLOR: Color = [0.9, 0.8, 0.1, 0.6];
pub const LEAF_COLOR: Color = [0.2, 0.5, 0.9, 0.8];
pub const INTERNAL_COLOR: Color = [0.4, 0.3, 0.9, 0.4];
pub const PAIR_COLOR: Color = [0.9, 0.5, 0.1, 0.8];
pub const CONTACT_COLOR: Color = [0.9, 0.1, 0.1, 1.0];

/// Length of the drawn contact normal.
const NORMAL_LENGTH: f32 = 10.0;
const CONTACT_RADIUS: f32 = 2.0;

/// Primitive drawing backend.
pub trait DebugDraw {
    fn draw_circle(&mut self, center: Vec2, radius: f32, color: Color);
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color);
    fn draw_line(&mut self, start: Vec2, end: Vec2, color: Color);
    fn draw_capsule(&mut self, start: Vec2, end: Vec2, radius: f32, color: Color);
    fn fill_capsule(&mut self, start: Vec2, end: Vec2, radius: f32, color: Color);

    fn draw_aabb(&mut self, aabb: &Aabb, color: Color) {
        let top_right = Vec2::new(aabb.max.x, aabb.min.y);
        let bottom_left = Vec2::new(aabb.min.x, aabb.max.y);
        self.draw_line(aabb.min, top_right, color);
        self.draw_line(top_right, aabb.max, color);
        self.draw_line(aabb.max, bottom_left, color);
        self.draw_line(bottom_left, aabb.min, color);
    }

    fn draw_shape(&mut self, shape: &Shape, color: Color) {
        match shape {
            Shape::Circle(c) => self.draw_circle(c.center, c.radius, color),
            Shape::Line(l) => self.draw_line(l.start, l.end, color),
            Shape::Capsule(c) => self.draw_capsule(c.start, c.end, c.radius, color),
        }
    }
}

/// What [`crate::physics::PhysicsWorld::debug_draw`] renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugDrawFlags {
    pub shapes: bool,
    pub leaf_aabbs: bool,
    pub internal_aabbs: bool,
    pub possible_collisions: bool,
    pub collisions: bool,
}

impl DebugDrawFlags {
    pub fn all() -> Self {
        Self {
            shapes: true,
            leaf_aabbs: true,
            internal_aabbs: true,
            possible_collisions: true,
            collisions: true,
        }
    }
}

impl Default for DebugDrawFlags {
    fn default() -> Self {
        Self {
            shapes: true,
            leaf_aabbs: false,
            internal_aabbs: false,
            possible_collisions: false,
            collisions: true,
        }
    }
}

/// Broad phase candidate with the fat boxes that produced it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PossibleCollision {
    pub pair: CollisionPair,
    pub first: Aabb,
    pub second: Aabb,
}

/// Pairs and contacts retained from the last step.
#[derive(Debug, Default)]
pub(crate) struct DebugState {
    pub possible: Vec<PossibleCollision>,
    pub contacts: Vec<Collision>,
}

impl DebugState {
    pub fn clear(&mut self) {
        self.possible.clear();
        self.contacts.clear();
    }

    pub fn record_pair(&mut self, pair: CollisionPair, first: Aabb, second: Aabb) {
        self.possible.push(PossibleCollision {
            pair,
            first,
            second,
        });
    }

    pub fn record_contact(&mut self, collision: Collision) {
        self.contacts.push(collision);
    }

    /// Drop everything that references `entity`.
    pub fn forget(&mut self, entity: hecs::Entity) {
        self.possible.retain(|p| !p.pair.contains(entity));
        self.contacts.retain(|c| !c.pair.contains(entity));
    }

    pub fn draw(&self, draw: &mut impl DebugDraw, flags: DebugDrawFlags) {
        if flags.possible_collisions {
            for possible in &self.possible {
                draw.draw_aabb(&possible.first, PAIR_COLOR);
                draw.draw_aabb(&possible.second, PAIR_COLOR);
                draw.draw_line(possible.first.center(), possible.second.center(), PAIR_COLOR);
            }
        }
        if flags.collisions {
            for contact in &self.contacts {
                draw.fill_circle(contact.point, CONTACT_RADIUS, CONTACT_COLOR);
                draw.draw_line(
                    contact.point,
                    contact.point + contact.direction * NORMAL_LENGTH,
                    CONTACT_COLOR,
                );
            }
        }
    }
}
