//! 2D rigid body simulation and collision detection.
//!
//! # Architecture
//!
//! [`PhysicsWorld::update`] runs one step:
//!
//! 1. Sync the broad phase with the [`Active`] markers
//! 2. Integrate velocities, then positions
//! 3. Refit changed bodies in the dynamic tree
//! 4. Broadphase: query the tree with every body that moved
//! 5. Narrowphase: exact tests, publish contact events
//! 6. Resolve non-sensor collisions, publish resolved events
//!
//! All transient data of a step lives in the caller's [`FrameArena`]. Each
//! stage runs inside a `trace`-level span, so a `tracing` subscriber can time
//! the stages individually.

pub mod broadphase;
pub mod collider;
pub mod contact;
#[cfg(feature = "debug-draw")]
pub mod debug;
pub mod narrowphase;
pub mod rigid_body;
pub mod solver;

use glam::Vec2;
use tracing::{debug, trace, trace_span};

use crate::core::{FrameArena, FrameSet, FrameVec};
use crate::ecs::components::physics::{
    AngularForce, AngularVelocity, Body, Collider, LinearForce, LinearVelocity, NodeInfo,
    PreviousPosition, TransformChanged,
};
use crate::ecs::components::transform::{Active, Position, Rotation, Scale};
use crate::error::Result;

use self::broadphase::{DynamicTree, NodeId};
use self::collider::{Aabb, Line, Shape};
use self::contact::{Collision, CollisionListener, CollisionPair, CollisionPhase};

/// Configuration for the physics simulation. Changes apply from the next step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsConfig {
    /// Gravity acceleration. Default: zero.
    pub gravity: Vec2,
    /// Quadratic drag factor for fast bodies. Default: 1.
    pub linear_damping: f32,
    /// Quadratic drag factor for fast spinning bodies. Default: 1.
    pub angular_damping: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::ZERO,
            linear_damping: 1.0,
            angular_damping: 1.0,
        }
    }
}

/// Parameters of [`PhysicsWorld::create_body`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyCreateInfo {
    /// Inverse mass; zero for immovable bodies. Default: 1.
    pub inv_mass: f32,
    pub friction: f32,
    pub restitution: f32,
    pub sensor: bool,
    /// Dynamic bodies get velocity components.
    pub dynamic: bool,
    /// Dynamic bodies with force accumulators receive gravity and drag.
    pub use_force: bool,
    /// Sweep the shape over each step. Circles only.
    pub fast_moving: bool,
}

impl Default for BodyCreateInfo {
    fn default() -> Self {
        Self {
            inv_mass: 1.0,
            friction: 1.0,
            restitution: 1.0,
            sensor: false,
            dynamic: true,
            use_force: true,
            fast_moving: false,
        }
    }
}

impl BodyCreateInfo {
    /// An immovable, non-dynamic body.
    pub fn fixed() -> Self {
        Self {
            inv_mass: 0.0,
            dynamic: false,
            use_force: false,
            ..Default::default()
        }
    }
}

/// The physics world: owns the broad phase tree and the collision listeners.
pub struct PhysicsWorld {
    config: PhysicsConfig,
    tree: DynamicTree<hecs::Entity>,
    listeners: Vec<Box<dyn CollisionListener>>,
    #[cfg(feature = "debug-draw")]
    debug: debug::DebugState,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

impl PhysicsWorld {
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            config,
            tree: DynamicTree::new(),
            listeners: Vec::new(),
            #[cfg(feature = "debug-draw")]
            debug: debug::DebugState::default(),
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PhysicsConfig) {
        self.config = config;
    }

    /// The broad phase tree, for inspection.
    pub fn tree(&self) -> &DynamicTree<hecs::Entity> {
        &self.tree
    }

    /// Register a listener for contact and resolved events.
    pub fn add_collision_listener(&mut self, listener: impl CollisionListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Builder form of [`PhysicsWorld::add_collision_listener`].
    pub fn with_listener(mut self, listener: impl CollisionListener + 'static) -> Self {
        self.add_collision_listener(listener);
        self
    }

    /// Turn `entity` into a body with the local-space `shape`.
    ///
    /// Missing `Position`, `Rotation` or `Scale` components are added with
    /// their defaults. An entity carrying [`Active`] joins the broad phase
    /// immediately.
    pub fn create_body(
        &mut self,
        world: &mut hecs::World,
        entity: hecs::Entity,
        info: BodyCreateInfo,
        shape: Shape,
    ) -> Result<()> {
        let fast_moving = info.fast_moving && matches!(shape, Shape::Circle(_));
        debug_assert!(
            fast_moving == info.fast_moving,
            "only circles can be fast moving, got {shape:?}"
        );

        let position = ensure_component(world, entity, Position::default())?;
        let rotation = ensure_component(world, entity, Rotation::default())?;
        let scale = ensure_component(world, entity, Scale::default())?;
        let active = world.satisfies::<&Active>(entity)?;

        let body = Body {
            inv_mass: info.inv_mass,
            friction: info.friction,
            restitution: info.restitution,
            sensor: info.sensor,
            fast_moving,
        };
        let world_shape = shape.transform(position.0, rotation.dir, scale.0);
        let node = active.then(|| self.tree.add_object(world_shape.aabb(), entity));

        world.insert(
            entity,
            (
                body,
                Collider { shape: world_shape },
                NodeInfo {
                    local_shape: shape,
                    node,
                },
                TransformChanged(true),
            ),
        )?;
        if info.dynamic {
            world.insert(entity, (LinearVelocity::default(), AngularVelocity::default()))?;
            if info.use_force {
                world.insert(entity, (LinearForce::default(), AngularForce::default()))?;
            }
        }
        if fast_moving {
            world.insert_one(entity, PreviousPosition(position.0))?;
        }

        debug!(?entity, ?shape, active, dynamic = info.dynamic, "body created");
        Ok(())
    }

    /// Remove the physics components of `entity` and its broad phase leaf.
    ///
    /// Call this before despawning a body so the tree does not keep a stale leaf.
    pub fn remove_body(&mut self, world: &mut hecs::World, entity: hecs::Entity) {
        if let Ok(info) = world.get::<&NodeInfo>(entity) {
            if let Some(node) = info.node {
                self.tree.remove_object(node);
            }
        }
        #[cfg(feature = "debug-draw")]
        self.debug.forget(entity);

        world.remove_one::<Body>(entity).ok();
        world.remove_one::<Collider>(entity).ok();
        world.remove_one::<NodeInfo>(entity).ok();
        world.remove_one::<TransformChanged>(entity).ok();
        world.remove_one::<LinearVelocity>(entity).ok();
        world.remove_one::<AngularVelocity>(entity).ok();
        world.remove_one::<LinearForce>(entity).ok();
        world.remove_one::<AngularForce>(entity).ok();
        world.remove_one::<PreviousPosition>(entity).ok();
        debug!(?entity, "body removed");
    }

    /// Advance the simulation by `delta_time` seconds.
    ///
    /// Fails only when `arena` runs out of memory; the world is then left
    /// partially stepped.
    pub fn update(
        &mut self,
        world: &mut hecs::World,
        arena: &FrameArena,
        delta_time: f32,
    ) -> Result<()> {
        #[cfg(feature = "debug-draw")]
        self.debug.clear();

        let _step = trace_span!("physics_update", dt = delta_time).entered();

        trace_span!("update_active").in_scope(|| self.update_active(world));
        trace_span!("integrate").in_scope(|| {
            rigid_body::integrate_velocities(world, &self.config, delta_time);
            rigid_body::integrate_positions(world, delta_time);
        });

        let moved = trace_span!("update_tree").in_scope(|| self.update_tree(world, arena))?;
        let pairs = trace_span!("find_possible_collisions")
            .in_scope(|| self.find_possible_collisions(&moved, arena))?;
        let collisions = trace_span!("find_actual_collisions")
            .in_scope(|| self.find_actual_collisions(world, &pairs, arena))?;
        trace_span!("resolve_collisions").in_scope(|| self.resolve_collisions(world, &collisions));

        trace!(
            moved = moved.len(),
            pairs = pairs.len(),
            collisions = collisions.len(),
            "physics step"
        );
        Ok(())
    }

    /// Entities whose broad phase box overlaps `aabb`, with that box.
    ///
    /// Boxes are enlarged, so callers needing exact answers test shapes
    /// themselves. Returning `false` stops the query.
    pub fn query(&self, aabb: &Aabb, callback: impl FnMut(hecs::Entity, &Aabb) -> bool) {
        self.tree.query(aabb, callback);
    }

    /// Entities whose broad phase box overlaps the bounds of `shape`.
    pub fn query_shape(&self, shape: &Shape, callback: impl FnMut(hecs::Entity, &Aabb) -> bool) {
        self.query(&shape.aabb(), callback);
    }

    /// Entities whose broad phase box is crossed by `line`.
    pub fn query_line(&self, line: &Line, callback: impl FnMut(hecs::Entity, &Aabb) -> bool) {
        self.tree.query_line(line, callback);
    }

    /// Draw bodies, tree boxes and the pairs and contacts of the last step.
    #[cfg(feature = "debug-draw")]
    pub fn debug_draw(
        &self,
        world: &hecs::World,
        draw: &mut impl debug::DebugDraw,
        flags: debug::DebugDrawFlags,
    ) {
        if flags.shapes {
            for (_, (collider, body, active)) in world
                .query::<(&Collider, &Body, Option<&Active>)>()
                .iter()
            {
                if active.is_none() {
                    continue;
                }
                let color = if body.sensor {
                    debug::SENSOR_COLOR
                } else if body.is_static() {
                    debug::STATIC_COLOR
                } else {
                    debug::DYNAMIC_COLOR
                };
                draw.draw_shape(&collider.shape, color);
            }
        }

        if flags.leaf_aabbs || flags.internal_aabbs {
            self.tree.walk_tree(|node| {
                if node.is_leaf() && flags.leaf_aabbs {
                    draw.draw_aabb(&node.aabb, debug::LEAF_COLOR);
                } else if !node.is_leaf() && flags.internal_aabbs {
                    draw.draw_aabb(&node.aabb, debug::INTERNAL_COLOR);
                }
            });
        }

        self.debug.draw(draw, flags);
    }

    fn publish(&mut self, world: &mut hecs::World, collision: &Collision, phase: CollisionPhase) {
        for listener in &mut self.listeners {
            listener.on_collision(world, collision, phase);
        }
    }

    /// Give newly active bodies a leaf and take it from deactivated ones.
    fn update_active(&mut self, world: &mut hecs::World) {
        for (entity, (info, collider, position, rotation, scale, changed, previous, active)) in
            world.query_mut::<(
                &mut NodeInfo,
                &mut Collider,
                &Position,
                &Rotation,
                &Scale,
                &mut TransformChanged,
                Option<&mut PreviousPosition>,
                Option<&Active>,
            )>()
        {
            match (info.node, active.is_some()) {
                (None, true) => {
                    // Bodies may have been moved while inactive.
                    if let Some(previous) = previous {
                        previous.0 = position.0;
                    }
                    collider.shape = info
                        .local_shape
                        .transform(position.0, rotation.dir, scale.0);
                    info.node = Some(self.tree.add_object(collider.shape.aabb(), entity));
                    changed.0 = true;
                    debug!(?entity, "body activated");
                }
                (Some(node), false) => {
                    self.tree.remove_object(node);
                    info.node = None;
                    #[cfg(feature = "debug-draw")]
                    self.debug.forget(entity);
                    debug!(?entity, "body deactivated");
                }
                _ => {}
            }
        }
    }

    /// Recompute world shapes of changed bodies and refit their leaves.
    /// Returns the leaves of bodies with a linear velocity.
    fn update_tree<'a>(
        &mut self,
        world: &mut hecs::World,
        arena: &'a FrameArena,
    ) -> Result<FrameVec<'a, u32>> {
        let mut moved = FrameVec::new(arena);

        for (_, (info, collider, body, position, rotation, scale, changed, previous, velocity)) in
            world.query_mut::<(
                &NodeInfo,
                &mut Collider,
                &Body,
                &Position,
                &Rotation,
                &Scale,
                &mut TransformChanged,
                Option<&PreviousPosition>,
                Option<&LinearVelocity>,
            )>()
        {
            if !changed.0 {
                continue;
            }
            // Inactive bodies keep the flag until they are activated.
            let Some(node) = info.node else {
                continue;
            };
            changed.0 = false;

            let shape = info
                .local_shape
                .transform(position.0, rotation.dir, scale.0);
            collider.shape = match (shape, previous) {
                (Shape::Circle(circle), Some(previous)) if body.fast_moving => {
                    let start = circle.center - (position.0 - previous.0);
                    Shape::capsule(start, circle.center, circle.radius)
                }
                _ => shape,
            };

            self.tree.update_object(node, collider.shape.aabb());
            if velocity.is_some() {
                moved.push(node.to_raw())?;
            }
        }

        Ok(moved)
    }

    /// Pair every moved leaf with the leaves its fat box overlaps.
    fn find_possible_collisions<'a>(
        &mut self,
        moved: &FrameVec<'_, u32>,
        arena: &'a FrameArena,
    ) -> Result<FrameSet<'a, CollisionPair>> {
        let mut pairs = FrameSet::with_capacity(arena, moved.len() * 2)?;

        for raw in moved.iter() {
            let node = NodeId::from_raw(raw);
            let Some(entity) = self.tree.payload(node) else {
                continue;
            };
            let fat = self.tree.fat_aabb(node);

            let mut result = Ok(());
            self.tree.query(&fat, |other, other_aabb| {
                if other == entity {
                    return true;
                }
                let pair = CollisionPair::new(entity, other);
                match pairs.insert(pair) {
                    Ok(inserted) => {
                        #[cfg(feature = "debug-draw")]
                        if inserted {
                            self.debug.record_pair(pair, fat, *other_aabb);
                        }
                        #[cfg(not(feature = "debug-draw"))]
                        let _ = (inserted, other_aabb);
                        true
                    }
                    Err(err) => {
                        result = Err(err);
                        false
                    }
                }
            });
            result?;
        }

        Ok(pairs)
    }

    /// Run the narrow phase over `pairs` and publish contact events.
    /// Returns the collisions the solver must resolve.
    fn find_actual_collisions<'a>(
        &mut self,
        world: &mut hecs::World,
        pairs: &FrameSet<'_, CollisionPair>,
        arena: &'a FrameArena,
    ) -> Result<FrameVec<'a, Collision>> {
        let mut collisions = FrameVec::new(arena);

        for pair in pairs.iter() {
            let (a, b) = pair.entities();
            // Listeners may have despawned either body earlier in the step.
            let (Some((shape_a, sensor_a)), Some((shape_b, sensor_b))) =
                (collider_of(world, a), collider_of(world, b))
            else {
                continue;
            };

            let info = narrowphase::test_collision(&shape_a, &shape_b);
            if !info.colliding() {
                continue;
            }

            let collision = Collision::new(pair, info, sensor_a || sensor_b);
            #[cfg(feature = "debug-draw")]
            self.debug.record_contact(collision);

            self.publish(world, &collision, CollisionPhase::Contact);
            if !collision.is_sensor() {
                collisions.push(collision)?;
            }
        }

        Ok(collisions)
    }

    fn resolve_collisions(&mut self, world: &mut hecs::World, collisions: &FrameVec<'_, Collision>) {
        solver::resolve_collisions(world, collisions.iter());
        for collision in collisions.iter() {
            self.publish(world, &collision, CollisionPhase::Resolved);
        }
    }
}

/// World shape and sensor flag of a body.
fn collider_of(world: &hecs::World, entity: hecs::Entity) -> Option<(Shape, bool)> {
    let mut query = world.query_one::<(&Collider, &Body)>(entity).ok()?;
    let result = query.get().map(|(collider, body)| (collider.shape, body.sensor));
    result
}

/// Copy of `entity`'s `T`, inserting `default` first if it has none.
fn ensure_component<T: hecs::Component + Copy>(
    world: &mut hecs::World,
    entity: hecs::Entity,
    default: T,
) -> Result<T> {
    if let Ok(existing) = world.get::<&T>(entity) {
        return Ok(*existing);
    }
    world.insert_one(entity, default)?;
    Ok(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::actor::spawn_actor;
    use std::cell::RefCell;
    use std::rc::Rc;

    const DT: f32 = 1.0 / 60.0;

    fn spawn_circle(
        world: &mut hecs::World,
        physics: &mut PhysicsWorld,
        position: Vec2,
        radius: f32,
        info: BodyCreateInfo,
    ) -> hecs::Entity {
        let entity = spawn_actor(world, position, 0.0, Vec2::ONE, true);
        physics
            .create_body(world, entity, info, Shape::circle(Vec2::ZERO, radius))
            .unwrap();
        entity
    }

    type EventLog = Rc<RefCell<Vec<(CollisionPair, CollisionPhase, bool)>>>;

    fn recorder(physics: &mut PhysicsWorld) -> EventLog {
        let log: EventLog = Rc::default();
        let sink = Rc::clone(&log);
        physics.add_collision_listener(
            move |_: &mut hecs::World, collision: &Collision, phase: CollisionPhase| {
                sink.borrow_mut()
                    .push((collision.pair, phase, collision.is_sensor()));
            },
        );
        log
    }

    #[test]
    fn test_physics_config_default() {
        let config = PhysicsConfig::default();
        assert_eq!(config.gravity, Vec2::ZERO);
        assert_eq!(config.linear_damping, 1.0);
        assert_eq!(config.angular_damping, 1.0);

        let info = BodyCreateInfo::default();
        assert_eq!(info.inv_mass, 1.0);
        assert!(info.dynamic && info.use_force && !info.sensor && !info.fast_moving);
    }

    #[test]
    fn test_create_body_attaches_components() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::default();
        let entity = spawn_circle(&mut world, &mut physics, Vec2::new(10.0, 20.0), 3.0, BodyCreateInfo::default());

        assert!(world.satisfies::<&LinearVelocity>(entity).unwrap());
        assert!(world.satisfies::<&LinearForce>(entity).unwrap());
        let collider = *world.get::<&Collider>(entity).unwrap();
        assert_eq!(collider.shape, Shape::circle(Vec2::new(10.0, 20.0), 3.0));
        assert_eq!(physics.tree().leaf_count(), 1);
    }

    #[test]
    fn test_create_body_fills_missing_transform() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::default();
        let entity = world.spawn(());
        physics
            .create_body(&mut world, entity, BodyCreateInfo::fixed(), Shape::line(Vec2::ZERO, Vec2::X))
            .unwrap();

        assert!(world.satisfies::<&Position>(entity).unwrap());
        assert!(world.satisfies::<&Scale>(entity).unwrap());
        assert!(!world.satisfies::<&LinearVelocity>(entity).unwrap());
        // No Active marker: not in the tree.
        assert_eq!(physics.tree().leaf_count(), 0);
    }

    #[test]
    fn test_create_body_on_missing_entity_fails() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::default();
        let entity = world.spawn(());
        world.despawn(entity).unwrap();
        let result = physics.create_body(&mut world, entity, BodyCreateInfo::default(), Shape::circle(Vec2::ZERO, 1.0));
        assert!(matches!(result, Err(crate::error::PhysicsError::NoSuchEntity(_))));
    }

    #[test]
    fn test_active_marker_drives_tree_membership() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::default();
        let arena = FrameArena::new(64 * 1024);
        let entity = spawn_circle(&mut world, &mut physics, Vec2::ZERO, 1.0, BodyCreateInfo::default());

        world.remove_one::<Active>(entity).unwrap();
        physics.update(&mut world, &arena, DT).unwrap();
        assert_eq!(physics.tree().leaf_count(), 0);
        assert_eq!(world.get::<&NodeInfo>(entity).unwrap().node, None);

        world.get::<&mut Position>(entity).unwrap().0 = Vec2::new(500.0, 0.0);
        world.insert_one(entity, Active).unwrap();
        physics.update(&mut world, &arena, DT).unwrap();
        assert_eq!(physics.tree().leaf_count(), 1);

        let mut found = Vec::new();
        let window = Aabb::new(Vec2::new(499.0, -1.0), Vec2::new(501.0, 1.0));
        physics.query(&window, |e, aabb| {
            found.push((e, *aabb));
            true
        });
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, entity);
        // The reported box is the enlarged leaf box.
        let node = world.get::<&NodeInfo>(entity).unwrap().node.unwrap();
        assert!(found[0].1.contains(&window));
        assert_eq!(found[0].1, physics.tree().fat_aabb(node));
    }

    #[test]
    fn test_overlapping_circles_are_pushed_apart() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::default();
        let arena = FrameArena::new(64 * 1024);
        let log = recorder(&mut physics);

        let info = BodyCreateInfo {
            restitution: 0.0,
            ..Default::default()
        };
        let a = spawn_circle(&mut world, &mut physics, Vec2::ZERO, 5.0, info);
        let b = spawn_circle(&mut world, &mut physics, Vec2::new(8.0, 0.0), 4.0, info);

        physics.update(&mut world, &arena, DT).unwrap();

        let pa = world.get::<&Position>(a).unwrap().0;
        let pb = world.get::<&Position>(b).unwrap().0;
        assert!(pa.x < 0.0 && pb.x > 8.0, "pa = {pa}, pb = {pb}");

        let events = log.borrow();
        let contacts = events.iter().filter(|e| e.1 == CollisionPhase::Contact).count();
        let resolved = events.iter().filter(|e| e.1 == CollisionPhase::Resolved).count();
        assert_eq!(contacts, 1);
        assert_eq!(resolved, 1);
        assert_eq!(events[0].0, CollisionPair::new(a, b));
        assert_eq!(arena.allocated(), 0, "step must return all frame memory");
    }

    #[test]
    fn test_sensor_reports_without_resolution() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::default();
        let arena = FrameArena::new(64 * 1024);
        let log = recorder(&mut physics);

        let sensor = BodyCreateInfo {
            sensor: true,
            ..Default::default()
        };
        let a = spawn_circle(&mut world, &mut physics, Vec2::ZERO, 5.0, sensor);
        spawn_circle(&mut world, &mut physics, Vec2::new(8.0, 0.0), 4.0, BodyCreateInfo::default());

        physics.update(&mut world, &arena, DT).unwrap();

        assert_eq!(world.get::<&Position>(a).unwrap().0, Vec2::ZERO);
        let events = log.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1, CollisionPhase::Contact);
        assert!(events[0].2);
    }

    #[test]
    fn test_fast_mover_sweeps_capsule() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::default();
        let arena = FrameArena::new(64 * 1024);
        let log = recorder(&mut physics);

        // A thin wall the shot would tunnel through in one step.
        let wall = spawn_actor(&mut world, Vec2::ZERO, 0.0, Vec2::ONE, true);
        physics
            .create_body(
                &mut world,
                wall,
                BodyCreateInfo::fixed(),
                Shape::line(Vec2::new(50.0, -100.0), Vec2::new(50.0, 100.0)),
            )
            .unwrap();

        let shot = spawn_circle(
            &mut world,
            &mut physics,
            Vec2::ZERO,
            2.0,
            BodyCreateInfo {
                sensor: true,
                use_force: false,
                fast_moving: true,
                ..Default::default()
            },
        );
        world.get::<&mut LinearVelocity>(shot).unwrap().0 = Vec2::new(400.0, 0.0);

        physics.update(&mut world, &arena, 0.25).unwrap();

        assert_eq!(world.get::<&Position>(shot).unwrap().0, Vec2::new(100.0, 0.0));
        let Shape::Capsule(swept) = world.get::<&Collider>(shot).unwrap().shape else {
            panic!("fast mover should collide as a capsule");
        };
        assert_eq!(swept.start, Vec2::ZERO);
        assert_eq!(swept.end, Vec2::new(100.0, 0.0));
        assert!(log.borrow().iter().any(|e| e.0 == CollisionPair::new(shot, wall)));
    }

    #[test]
    fn test_query_line_finds_blockers() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::default();
        let near = spawn_circle(&mut world, &mut physics, Vec2::new(50.0, 0.0), 5.0, BodyCreateInfo::fixed());
        spawn_circle(&mut world, &mut physics, Vec2::new(50.0, 300.0), 5.0, BodyCreateInfo::fixed());

        let mut hits = Vec::new();
        physics.query_line(&Line::new(Vec2::ZERO, Vec2::new(100.0, 0.0)), |e, aabb| {
            assert!(aabb.contains(&Aabb::new(Vec2::new(45.0, -5.0), Vec2::new(55.0, 5.0))));
            hits.push(e);
            true
        });
        assert_eq!(hits, vec![near]);

        let mut shape_hits = Vec::new();
        physics.query_shape(&Shape::circle(Vec2::new(50.0, 290.0), 2.0), |e, _| {
            shape_hits.push(e);
            true
        });
        assert_eq!(shape_hits.len(), 1);
        assert_ne!(shape_hits[0], near);
    }

    #[test]
    fn test_remove_body_clears_leaf() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::default();
        let entity = spawn_circle(&mut world, &mut physics, Vec2::ZERO, 1.0, BodyCreateInfo::default());

        physics.remove_body(&mut world, entity);

        assert_eq!(physics.tree().leaf_count(), 0);
        assert!(!world.satisfies::<&Body>(entity).unwrap());
        assert!(world.satisfies::<&Position>(entity).unwrap());
    }

    #[test]
    fn test_arena_exhaustion_is_reported() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::default();
        let arena = FrameArena::new(8);
        let entity = spawn_circle(&mut world, &mut physics, Vec2::ZERO, 1.0, BodyCreateInfo::default());
        spawn_circle(&mut world, &mut physics, Vec2::new(1.0, 0.0), 1.0, BodyCreateInfo::default());
        world.get::<&mut LinearVelocity>(entity).unwrap().0 = Vec2::new(50.0, 0.0);

        let result = physics.update(&mut world, &arena, DT);
        assert!(matches!(result, Err(crate::error::PhysicsError::Arena(_))));
    }

    #[cfg(feature = "debug-draw")]
    #[test]
    fn test_debug_draw_replays_last_step() {
        use super::debug::tests::RecordingDraw;
        use super::debug::DebugDrawFlags;

        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::default();
        let arena = FrameArena::new(64 * 1024);
        spawn_circle(&mut world, &mut physics, Vec2::ZERO, 5.0, BodyCreateInfo::default());
        spawn_circle(&mut world, &mut physics, Vec2::new(8.0, 0.0), 4.0, BodyCreateInfo::default());
        physics.update(&mut world, &arena, DT).unwrap();

        let mut draw = RecordingDraw::default();
        physics.debug_draw(&world, &mut draw, DebugDrawFlags::all());

        assert_eq!(draw.circles, 2);
        assert_eq!(draw.filled_circles, 1);
        // 3 tree boxes, one pair (2 boxes + link), one contact normal.
        assert_eq!(draw.lines, 3 * 4 + 2 * 4 + 1 + 1);
    }
}
