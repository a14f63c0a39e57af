//! The physics side of colliders: shapes, the index colliders register with,
//! and the layer masks used to filter collisions.

pub mod collision;
pub use collision::{Collider, ColliderId, CollisionResult, Shape};

pub mod index;
pub use index::{BruteForceIndex, PhysicsIndex};

pub mod layers;
pub use layers::CollisionLayers;
