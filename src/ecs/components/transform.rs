//! Transform components for 2D entities.

use glam::Vec2;

/// World-space position of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position(pub Vec2);

/// Heading of an entity.
///
/// `dir` caches `(sin(angle), cos(angle))`; call [`Rotation::update`] after
/// writing `angle` directly. An angle of zero faces `+Y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub angle: f32,
    pub dir: Vec2,
}

impl Rotation {
    pub fn from_angle(angle: f32) -> Self {
        let mut rotation = Self {
            angle,
            dir: Vec2::Y,
        };
        rotation.update();
        rotation
    }

    /// Recompute the cached direction from `angle`.
    pub fn update(&mut self) {
        let (sin, cos) = self.angle.sin_cos();
        self.dir = Vec2::new(sin, cos);
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::from_angle(0.0)
    }
}

/// Per-axis scale of an entity's shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale(pub Vec2);

impl Default for Scale {
    fn default() -> Self {
        Self(Vec2::ONE)
    }
}

/// Marks an entity as taking part in the simulation.
///
/// Bodies without it keep their components but leave the broad phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Active;
