mod aabb;
pub use aabb::AABB;

mod shape;
pub use shape::{Shape, ShapeError, ShapeKind, ShapePose, WorldShape};

pub mod shape_shape;
pub use shape_shape::ShapeContact;

mod collider;
pub use collider::{Collider, ColliderError, ColliderId, CollisionResult, Registration};

mod params;
pub use params::{ColliderParams, ShapeParams};
