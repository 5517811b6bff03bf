//! Entity Component System integration with hecs.

pub mod actor;
pub mod components;

pub mod prelude {
    pub use super::actor::*;
    pub use super::components::*;
}
