//! Scene setup shared by the benchmarks.

use glam::Vec2;
use ngn::ecs::actor::spawn_actor;
use ngn::{Aabb, BodyCreateInfo, DynamicTree, LinearVelocity, PhysicsConfig, PhysicsWorld, Shape};

/// Side length of the square the benchmark scenes are spread over.
pub const WORLD_SIZE: f32 = 2000.0;

/// Deterministic xorshift sequence so runs are comparable.
pub struct Rng(u32);

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self(seed.max(1))
    }

    pub fn next_f32(&mut self) -> f32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        (self.0 >> 8) as f32 / (1u32 << 24) as f32
    }

    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.next_f32()
    }

    pub fn point(&mut self) -> Vec2 {
        Vec2::new(self.range(0.0, WORLD_SIZE), self.range(0.0, WORLD_SIZE))
    }
}

/// `n` small random boxes.
pub fn random_aabbs(n: usize) -> Vec<Aabb> {
    let mut rng = Rng::new(0x5eed);
    (0..n)
        .map(|_| {
            let min = rng.point();
            let size = Vec2::new(rng.range(2.0, 20.0), rng.range(2.0, 20.0));
            Aabb::new(min, min + size)
        })
        .collect()
}

/// A tree holding `random_aabbs(n)`, payload is the box index.
pub fn setup_tree(n: usize) -> DynamicTree<u32> {
    let mut tree = DynamicTree::new();
    for (i, aabb) in random_aabbs(n).into_iter().enumerate() {
        tree.add_object(aabb, i as u32);
    }
    tree
}

/// `n` moving circles, no gravity, inside a box of static walls.
pub fn setup_circle_world(n: usize) -> anyhow::Result<(hecs::World, PhysicsWorld)> {
    let mut world = hecs::World::new();
    let mut physics = PhysicsWorld::new(PhysicsConfig::default());
    let mut rng = Rng::new(42);

    spawn_walls(&mut world, &mut physics)?;

    let info = BodyCreateInfo {
        use_force: false,
        ..Default::default()
    };
    for _ in 0..n {
        let entity = spawn_actor(&mut world, rng.point(), 0.0, Vec2::ONE, true);
        physics.create_body(&mut world, entity, info, Shape::circle(Vec2::ZERO, rng.range(3.0, 8.0)))?;
        let velocity = Vec2::new(rng.range(-50.0, 50.0), rng.range(-50.0, 50.0));
        world.get::<&mut LinearVelocity>(entity)?.0 = velocity;
    }

    Ok((world, physics))
}

/// Circles and capsules falling under gravity onto the walls.
pub fn setup_mixed_world(n: usize) -> anyhow::Result<(hecs::World, PhysicsWorld)> {
    let mut world = hecs::World::new();
    let mut physics = PhysicsWorld::new(PhysicsConfig {
        gravity: Vec2::new(0.0, -500.0),
        ..Default::default()
    });
    let mut rng = Rng::new(7);

    spawn_walls(&mut world, &mut physics)?;

    for i in 0..n {
        let entity = spawn_actor(&mut world, rng.point(), rng.range(0.0, 6.28), Vec2::ONE, true);
        let shape = if i % 2 == 0 {
            Shape::circle(Vec2::ZERO, 5.0)
        } else {
            Shape::capsule(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0), 3.0)
        };
        physics.create_body(&mut world, entity, BodyCreateInfo::default(), shape)?;
    }

    Ok((world, physics))
}

fn spawn_walls(world: &mut hecs::World, physics: &mut PhysicsWorld) -> anyhow::Result<()> {
    let corners = [
        Vec2::ZERO,
        Vec2::new(WORLD_SIZE, 0.0),
        Vec2::splat(WORLD_SIZE),
        Vec2::new(0.0, WORLD_SIZE),
    ];
    for i in 0..corners.len() {
        let wall = spawn_actor(world, Vec2::ZERO, 0.0, Vec2::ONE, true);
        physics.create_body(
            world,
            wall,
            BodyCreateInfo::fixed(),
            Shape::line(corners[i], corners[(i + 1) % corners.len()]),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_setup_spawns_walls_and_bodies() {
        let (_, physics) = setup_circle_world(10).unwrap();
        assert_eq!(physics.tree().leaf_count(), 14);

        let (world, physics) = setup_mixed_world(6).unwrap();
        assert_eq!(physics.tree().leaf_count(), 10);
        assert_eq!(world.len(), 10);
    }
}
