//! Error types shared by the arena and the physics pipeline.

use thiserror::Error;

/// Failures of the per-frame bump allocator.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    #[error("frame arena out of memory: requested {requested} bytes, {remaining} of {capacity} available")]
    OutOfMemory {
        requested: usize,
        remaining: usize,
        capacity: usize,
    },

    #[error("invalid alignment {0}: must be a non-zero power of two")]
    InvalidAlignment(usize),
}

/// Failures surfaced by [`crate::physics::PhysicsWorld`].
#[derive(Error, Debug)]
pub enum PhysicsError {
    #[error("frame arena exhausted during physics step: {0}")]
    Arena(#[from] ArenaError),

    #[error("entity does not exist: {0}")]
    NoSuchEntity(#[from] hecs::NoSuchEntity),
}

pub type Result<T, E = PhysicsError> = std::result::Result<T, E>;
