//! Core memory primitives
//!
//! Per-frame bump allocation and the containers built on top of it.

pub mod arena;
pub mod frame_set;
pub mod frame_vec;

pub use arena::{ArenaBlock, ArenaStats, FrameArena};
pub use frame_set::FrameSet;
pub use frame_vec::FrameVec;
