//! Actor spawning helpers.

use glam::Vec2;

use crate::ecs::components::transform::{Active, Position, Rotation, Scale};

/// Spawn an entity carrying the transform components bodies need.
///
/// `active` attaches the [`Active`] marker so a body created on the entity
/// joins the broad phase immediately.
pub fn spawn_actor(
    world: &mut hecs::World,
    position: Vec2,
    angle: f32,
    scale: Vec2,
    active: bool,
) -> hecs::Entity {
    let position = Position(position);
    let rotation = Rotation::from_angle(angle);
    let scale = Scale(scale);
    if active {
        world.spawn((position, rotation, scale, Active))
    } else {
        world.spawn((position, rotation, scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_actor_components() {
        let mut world = hecs::World::new();
        let entity = spawn_actor(&mut world, Vec2::new(3.0, 4.0), 0.0, Vec2::ONE, true);
        assert_eq!(world.get::<&Position>(entity).unwrap().0, Vec2::new(3.0, 4.0));
        assert_eq!(world.get::<&Scale>(entity).unwrap().0, Vec2::ONE);
        assert!(world.satisfies::<&Active>(entity).unwrap());

        let inactive = spawn_actor(&mut world, Vec2::ZERO, 1.0, Vec2::ONE, false);
        assert!(!world.satisfies::<&Active>(inactive).unwrap());
        let rotation = *world.get::<&Rotation>(inactive).unwrap();
        assert!((rotation.dir.x - 1.0f32.sin()).abs() < 1e-6);
    }
}
