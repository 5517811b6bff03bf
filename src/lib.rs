//! ngn 2D Engine
//!
//! A small 2D game engine core: frame memory, ECS components and a rigid body
//! physics world with a dynamic AABB tree broad phase.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! 1. **core** - Frame arena and the containers allocated from it
//! 2. **ecs** - hecs components for transforms and bodies
//! 3. **physics** - Rigid body simulation, collision detection, debug draw (feature = "debug-draw")
//! 4. **engine** - Game loop with App trait
//! 5. **error** - Error types shared by the layers above

pub mod core;
pub mod ecs;
pub mod engine;
pub mod error;
pub mod physics;

// Re-export commonly used types
pub use core::{ArenaBlock, ArenaStats, FrameArena, FrameSet, FrameVec};

pub use ecs::prelude::*;

pub use engine::{App, Engine, EngineConfig, SystemContext};

pub use error::{ArenaError, PhysicsError, Result};

pub use physics::broadphase::{DynamicTree, NodeId};
pub use physics::collider::{Aabb, Capsule, Circle, Line, Shape};
pub use physics::contact::{Collision, CollisionListener, CollisionPair, CollisionPhase};
pub use physics::{BodyCreateInfo, PhysicsConfig, PhysicsWorld};

#[cfg(feature = "debug-draw")]
pub use physics::debug::{DebugDraw, DebugDrawFlags};

// Re-export glam for convenience
pub use glam;
pub use hecs;
