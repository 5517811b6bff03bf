//! Game engine module with App trait and game loop.
//!
//! [`Engine`] owns the ECS world, the physics world and the frame arena.
//! Every frame it resets the arena, runs physics at a fixed timestep, calls
//! the [`App`] hooks and periodically logs frame statistics.

use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::info;

use crate::core::{ArenaStats, FrameArena};
use crate::physics::{PhysicsConfig, PhysicsWorld};

/// Game loop configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fixed timestep for physics (seconds). Default: 1/60.
    pub fixed_timestep: f64,
    /// Maximum physics substeps per frame. Default: 4.
    pub max_substeps: u32,
    /// Frame arena capacity in bytes. Default: 1 MiB.
    pub arena_capacity: usize,
    /// Seconds between statistics log lines. Default: 5.
    pub stats_interval: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 4,
            arena_capacity: 1024 * 1024,
            stats_interval: 5.0,
        }
    }
}

/// System execution context passed to App callbacks.
pub struct SystemContext<'a> {
    pub physics: &'a mut PhysicsWorld,
    /// Frame memory, reset at the start of the next frame.
    pub arena: &'a FrameArena,
    /// Time since last frame (seconds).
    pub delta_time: f64,
    /// Fixed timestep interval (seconds).
    pub fixed_delta_time: f64,
    /// Time since the first frame (seconds).
    pub elapsed_time: f64,
    /// Index of the current frame.
    pub frame: u64,
}

/// Trait for ECS-based game applications driven by [`Engine`].
pub trait App {
    /// Called once before the first frame. Spawn entities and bodies here.
    fn init(&mut self, world: &mut hecs::World, physics: &mut PhysicsWorld) -> anyhow::Result<()>;

    /// Called each frame (variable timestep) after physics.
    fn update(&mut self, world: &mut hecs::World, ctx: &mut SystemContext);

    /// Called before each physics substep. Optional.
    fn fixed_update(&mut self, _world: &mut hecs::World, _physics: &mut PhysicsWorld, _dt: f32) {}

    /// Called at the end of each frame. Use for debug overlays. Optional.
    fn post_update(&mut self, _world: &mut hecs::World, _ctx: &mut SystemContext) {}
}

/// Frame counters for the periodic statistics line.
#[derive(Debug, Clone, Copy, Default)]
struct FrameStats {
    frames: u64,
    window_start: f64,
    arena_at_window_start: ArenaStats,
}

/// Runs an [`App`] with fixed-timestep physics.
pub struct Engine<A: App> {
    app: A,
    world: hecs::World,
    physics: PhysicsWorld,
    arena: FrameArena,
    config: EngineConfig,
    initialized: bool,
    accumulator: f64,
    elapsed_time: f64,
    frame: u64,
    stats: FrameStats,
}

impl<A: App> Engine<A> {
    pub fn new(config: EngineConfig, physics_config: PhysicsConfig, app: A) -> Self {
        Self {
            app,
            world: hecs::World::new(),
            physics: PhysicsWorld::new(physics_config),
            arena: FrameArena::new(config.arena_capacity),
            config,
            initialized: false,
            accumulator: 0.0,
            elapsed_time: 0.0,
            frame: 0,
            stats: FrameStats::default(),
        }
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut A {
        &mut self.app
    }

    pub fn world(&self) -> &hecs::World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut hecs::World {
        &mut self.world
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.physics
    }

    pub fn arena(&self) -> &FrameArena {
        &self.arena
    }

    /// Frames run so far.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Run one frame of `delta_time` seconds.
    ///
    /// 1. `App::init` on the first frame
    /// 2. Frame arena reset
    /// 3. `App::fixed_update` and a physics step per fixed interval
    /// 4. `App::update`, then `App::post_update`
    pub fn frame(&mut self, delta_time: f64) -> anyhow::Result<()> {
        if !self.initialized {
            self.app
                .init(&mut self.world, &mut self.physics)
                .context("app initialization failed")?;
            self.initialized = true;
        }

        self.arena.reset();

        // Fixed timestep loop
        self.accumulator += delta_time;
        let mut substeps = 0u32;
        while self.accumulator >= self.config.fixed_timestep && substeps < self.config.max_substeps {
            let dt = self.config.fixed_timestep as f32;
            self.app.fixed_update(&mut self.world, &mut self.physics, dt);
            self.physics
                .update(&mut self.world, &self.arena, dt)
                .with_context(|| format!("physics step failed in frame {}", self.frame))?;
            self.accumulator -= self.config.fixed_timestep;
            substeps += 1;
        }

        // Clamp accumulator to avoid spiral of death
        if self.accumulator > self.config.fixed_timestep * self.config.max_substeps as f64 {
            self.accumulator = 0.0;
        }

        self.elapsed_time += delta_time;
        let mut ctx = SystemContext {
            physics: &mut self.physics,
            arena: &self.arena,
            delta_time,
            fixed_delta_time: self.config.fixed_timestep,
            elapsed_time: self.elapsed_time,
            frame: self.frame,
        };
        self.app.update(&mut self.world, &mut ctx);
        self.app.post_update(&mut self.world, &mut ctx);

        self.frame += 1;
        self.report_stats();
        Ok(())
    }

    /// Simulate `duration` seconds in frames of `delta_time`, as fast as possible.
    pub fn run_for(&mut self, duration: f64, delta_time: f64) -> anyhow::Result<()> {
        anyhow::ensure!(delta_time > 0.0, "delta time must be positive, got {delta_time}");
        let frames = (duration / delta_time).round() as u64;
        for _ in 0..frames {
            self.frame(delta_time)?;
        }
        Ok(())
    }

    /// Run in wall-clock time for `duration`, sleeping to hold `target_frame_time`.
    pub fn run_realtime(&mut self, duration: Duration, target_frame_time: Duration) -> anyhow::Result<()> {
        let start = Instant::now();
        let mut last_frame = start;
        while start.elapsed() < duration {
            let now = Instant::now();
            let delta_time = (now - last_frame).as_secs_f64();
            last_frame = now;

            self.frame(delta_time)?;

            if let Some(remaining) = target_frame_time.checked_sub(now.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
        Ok(())
    }

    fn report_stats(&mut self) {
        self.stats.frames += 1;
        let window = self.elapsed_time - self.stats.window_start;
        if window < self.config.stats_interval {
            return;
        }

        let arena = self.arena.stats();
        let since = self.stats.arena_at_window_start;
        info!(
            "FPS: {:.1}, F-MEM: {}/{} bytes (peak {}), allocations: {} ({} bytes), frees: {}",
            self.stats.frames as f64 / window,
            self.arena.allocated(),
            self.arena.capacity(),
            self.arena.high_water_mark(),
            arena.allocation_count - since.allocation_count,
            arena.allocated_bytes - since.allocated_bytes,
            arena.deallocation_count - since.deallocation_count,
        );

        self.stats = FrameStats {
            frames: 0,
            window_start: self.elapsed_time,
            arena_at_window_start: arena,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::actor::spawn_actor;
    use crate::physics::collider::Shape;
    use crate::physics::BodyCreateInfo;
    use glam::Vec2;

    #[derive(Default)]
    struct CountingApp {
        inits: u32,
        updates: u32,
        fixed_updates: u32,
        post_updates: u32,
    }

    impl App for CountingApp {
        fn init(&mut self, world: &mut hecs::World, physics: &mut PhysicsWorld) -> anyhow::Result<()> {
            self.inits += 1;
            let entity = spawn_actor(world, Vec2::ZERO, 0.0, Vec2::ONE, true);
            physics.create_body(world, entity, BodyCreateInfo::default(), Shape::circle(Vec2::ZERO, 1.0))?;
            Ok(())
        }

        fn update(&mut self, _world: &mut hecs::World, _ctx: &mut SystemContext) {
            self.updates += 1;
        }

        fn fixed_update(&mut self, _world: &mut hecs::World, _physics: &mut PhysicsWorld, _dt: f32) {
            self.fixed_updates += 1;
        }

        fn post_update(&mut self, _world: &mut hecs::World, _ctx: &mut SystemContext) {
            self.post_updates += 1;
        }
    }

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert!((config.fixed_timestep - 1.0 / 60.0).abs() < 1e-10);
        assert_eq!(config.max_substeps, 4);
        assert_eq!(config.stats_interval, 5.0);
    }

    #[test]
    fn test_fixed_timestep_substeps() {
        let mut engine = Engine::new(EngineConfig::default(), PhysicsConfig::default(), CountingApp::default());

        engine.frame(1.0 / 30.0 + 1e-9).unwrap();
        assert_eq!(engine.app().inits, 1);
        assert_eq!(engine.app().fixed_updates, 2);
        assert_eq!(engine.app().updates, 1);
        assert_eq!(engine.app().post_updates, 1);

        engine.frame(1.0 / 120.0).unwrap();
        assert_eq!(engine.app().inits, 1);
        assert_eq!(engine.app().fixed_updates, 2);
    }

    #[test]
    fn test_spiral_of_death_is_clamped() {
        let mut engine = Engine::new(EngineConfig::default(), PhysicsConfig::default(), CountingApp::default());
        engine.frame(10.0).unwrap();
        assert_eq!(engine.app().fixed_updates, 4);
        engine.frame(0.0).unwrap();
        assert_eq!(engine.app().fixed_updates, 4);
    }

    #[test]
    fn test_run_for_counts_frames() {
        let config = EngineConfig {
            stats_interval: 0.5,
            ..Default::default()
        };
        let mut engine = Engine::new(config, PhysicsConfig::default(), CountingApp::default());
        engine.run_for(1.0, 0.01).unwrap();
        assert_eq!(engine.frame_count(), 100);
        assert_eq!(engine.physics().tree().leaf_count(), 1);
        assert!(engine.run_for(1.0, 0.0).is_err());
    }

    #[test]
    fn test_arena_exhaustion_surfaces_as_error() {
        struct CrowdApp;

        impl App for CrowdApp {
            fn init(&mut self, world: &mut hecs::World, physics: &mut PhysicsWorld) -> anyhow::Result<()> {
                for i in 0..8 {
                    let entity = spawn_actor(world, Vec2::new(i as f32, 0.0), 0.0, Vec2::ONE, true);
                    physics.create_body(world, entity, BodyCreateInfo::default(), Shape::circle(Vec2::ZERO, 2.0))?;
                }
                Ok(())
            }

            fn update(&mut self, _world: &mut hecs::World, _ctx: &mut SystemContext) {}
        }

        let config = EngineConfig {
            arena_capacity: 64,
            ..Default::default()
        };
        let mut engine = Engine::new(config, PhysicsConfig::default(), CrowdApp);
        let err = engine.frame(1.0 / 60.0).unwrap_err();
        assert!(err.to_string().contains("physics step failed"), "{err}");
    }
}
