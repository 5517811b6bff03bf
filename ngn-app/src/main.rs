use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use glam::Vec2;
use ngn::ecs::actor::spawn_actor;
use ngn::{
    App, BodyCreateInfo, Collision, CollisionPhase, Engine, EngineConfig, LinearVelocity, Line,
    PhysicsConfig, PhysicsWorld, Position, Shape, SystemContext,
};

const SHOT_SPEED: f32 = 900.0;
const SHOT_COOLDOWN: f32 = 0.75;
const PLAYER_SPEED: f32 = 60.0;

/// Static maze geometry.
struct Wall;

struct Player;

struct Enemy {
    cooldown: f32,
}

struct Shot;

/// Entities the collision listener wants gone, processed after the step.
type RemovalQueue = Rc<RefCell<Vec<hecs::Entity>>>;

struct MazeApp {
    removals: RemovalQueue,
    hits: Rc<RefCell<u32>>,
    time: f32,
}

impl MazeApp {
    fn spawn_wall(
        world: &mut hecs::World,
        physics: &mut PhysicsWorld,
        start: Vec2,
        end: Vec2,
    ) -> anyhow::Result<()> {
        let wall = spawn_actor(world, Vec2::ZERO, 0.0, Vec2::ONE, true);
        world.insert_one(wall, Wall)?;
        physics.create_body(world, wall, BodyCreateInfo::fixed(), Shape::line(start, end))?;
        Ok(())
    }

    /// True when no wall blocks the straight line between the two points.
    fn line_of_sight(world: &hecs::World, physics: &PhysicsWorld, from: Vec2, to: Vec2) -> bool {
        let mut clear = true;
        physics.query_line(&Line::new(from, to), |entity, _| {
            if world.satisfies::<&Wall>(entity).unwrap_or(false) {
                clear = false;
            }
            clear
        });
        clear
    }
}

impl App for MazeApp {
    fn init(&mut self, world: &mut hecs::World, physics: &mut PhysicsWorld) -> anyhow::Result<()> {
        // Outer box and two inner walls.
        let corners = [
            Vec2::new(-200.0, -200.0),
            Vec2::new(200.0, -200.0),
            Vec2::new(200.0, 200.0),
            Vec2::new(-200.0, 200.0),
        ];
        for i in 0..corners.len() {
            Self::spawn_wall(world, physics, corners[i], corners[(i + 1) % corners.len()])?;
        }
        Self::spawn_wall(world, physics, Vec2::new(-200.0, 50.0), Vec2::new(60.0, 50.0))?;
        Self::spawn_wall(world, physics, Vec2::new(-60.0, -50.0), Vec2::new(200.0, -50.0))?;

        let pillar = spawn_actor(world, Vec2::new(0.0, 120.0), 0.6, Vec2::ONE, true);
        physics.create_body(
            world,
            pillar,
            BodyCreateInfo::fixed(),
            Shape::capsule(Vec2::new(0.0, -20.0), Vec2::new(0.0, 20.0), 8.0),
        )?;

        let player = spawn_actor(world, Vec2::new(-150.0, -150.0), 0.0, Vec2::ONE, true);
        world.insert_one(player, Player)?;
        physics.create_body(
            world,
            player,
            BodyCreateInfo {
                use_force: false,
                restitution: 0.2,
                ..Default::default()
            },
            Shape::circle(Vec2::ZERO, 8.0),
        )?;

        let enemy = spawn_actor(world, Vec2::new(150.0, -150.0), 0.0, Vec2::ONE, true);
        world.insert_one(enemy, Enemy { cooldown: 0.0 })?;
        physics.create_body(
            world,
            enemy,
            BodyCreateInfo {
                inv_mass: 0.25,
                use_force: false,
                ..Default::default()
            },
            Shape::circle(Vec2::ZERO, 10.0),
        )?;

        log::info!("Maze ready: {} bodies", physics.tree().leaf_count());
        Ok(())
    }

    fn fixed_update(&mut self, world: &mut hecs::World, _physics: &mut PhysicsWorld, dt: f32) {
        self.time += dt;
        // Player paces back and forth along the bottom corridor.
        let direction = if (self.time / 4.0) as u32 % 2 == 0 { 1.0 } else { -1.0 };
        for (_, velocity) in world.query_mut::<hecs::With<&mut LinearVelocity, &Player>>() {
            velocity.0 = Vec2::new(direction * PLAYER_SPEED, 0.0);
        }
    }

    fn update(&mut self, world: &mut hecs::World, ctx: &mut SystemContext) {
        let dt = ctx.delta_time as f32;

        let Some(target) = world
            .query::<hecs::With<&Position, &Player>>()
            .iter()
            .next()
            .map(|(_, position)| position.0)
        else {
            return;
        };

        let mut shots = Vec::new();
        for (_, (enemy, position)) in world.query::<(&mut Enemy, &Position)>().iter() {
            enemy.cooldown -= dt;
            if enemy.cooldown > 0.0 || !Self::line_of_sight(world, ctx.physics, position.0, target) {
                continue;
            }
            enemy.cooldown = SHOT_COOLDOWN;
            let aim = (target - position.0).normalize_or_zero();
            shots.push((position.0 + aim * 14.0, aim * SHOT_SPEED));
        }

        for (origin, velocity) in shots {
            let shot = spawn_actor(world, origin, 0.0, Vec2::ONE, true);
            let created = world.insert_one(shot, Shot).map_err(ngn::PhysicsError::from).and_then(|()| {
                ctx.physics.create_body(
                    world,
                    shot,
                    BodyCreateInfo {
                        sensor: true,
                        use_force: false,
                        fast_moving: true,
                        ..Default::default()
                    },
                    Shape::circle(Vec2::ZERO, 2.0),
                )
            });
            if let Err(err) = created {
                log::warn!("Failed to spawn shot: {err}");
                continue;
            }
            if let Ok(mut v) = world.get::<&mut LinearVelocity>(shot) {
                v.0 = velocity;
            }
        }

        let removals: Vec<_> = self.removals.borrow_mut().drain(..).collect();
        for entity in removals {
            if world.contains(entity) {
                ctx.physics.remove_body(world, entity);
                let _ = world.despawn(entity);
            }
        }
    }

    fn post_update(&mut self, _world: &mut hecs::World, ctx: &mut SystemContext) {
        if ctx.frame % 600 == 0 {
            log::info!(
                "t={:.1}s hits={} F-MEM peak {} bytes",
                ctx.elapsed_time,
                self.hits.borrow(),
                ctx.arena.high_water_mark()
            );
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let removals: RemovalQueue = Rc::default();
    let hits = Rc::new(RefCell::new(0u32));
    let app = MazeApp {
        removals: Rc::clone(&removals),
        hits: Rc::clone(&hits),
        time: 0.0,
    };

    let mut engine = Engine::new(EngineConfig::default(), PhysicsConfig::default(), app);
    engine.physics_mut().add_collision_listener(
        move |world: &mut hecs::World, collision: &Collision, phase: CollisionPhase| {
            if phase != CollisionPhase::Contact {
                return;
            }
            let (a, b) = collision.pair.entities();
            for (shot, other) in [(a, b), (b, a)] {
                if !world.satisfies::<&Shot>(shot).unwrap_or(false) {
                    continue;
                }
                if world.satisfies::<&Shot>(other).unwrap_or(false)
                    || world.satisfies::<&Enemy>(other).unwrap_or(false)
                {
                    continue;
                }
                if world.satisfies::<&Player>(other).unwrap_or(false) {
                    *hits.borrow_mut() += 1;
                    log::info!("Kill: shot {shot:?} hit the player");
                }
                removals.borrow_mut().push(shot);
            }
        },
    );

    engine.run_realtime(Duration::from_secs(30), Duration::from_millis(16))?;
    log::info!(
        "Done after {} frames, player hit {} times",
        engine.frame_count(),
        engine.app().hits.borrow()
    );
    Ok(())
}
