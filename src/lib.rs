/// Open a profiling span that lasts as long as the returned value.
/// Evaluates to `()` unless the `tracy` feature is enabled.
macro_rules! tracy_span {
    ($name:literal, $fn_name:literal) => {{
        #[cfg(feature = "tracy")]
        let span = tracy_client::Client::running()
            .map(|client| client.span_alloc(Some($name), $fn_name, file!(), line!(), 0));
        #[cfg(not(feature = "tracy"))]
        let span = ();
        span
    }};
}

pub mod math;
pub use math::{uv, Angle, Unit, Vec2};

pub mod transform;
pub use transform::{Transform, TransformComponent, TransformSource};

pub mod render;
pub use render::RenderableBoundsSource;

pub mod physics;
pub use physics::{
    collision::{
        self, Collider, ColliderError, ColliderId, ColliderParams, CollisionResult, Registration,
        Shape, ShapeContact, ShapeError, ShapeKind, ShapeParams, AABB,
    },
    index::{BruteForceIndex, PhysicsIndex},
    layers::CollisionLayers,
};

pub mod entity;
pub use entity::{ColliderKey, Entity};
