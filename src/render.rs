use crate::physics::collision::AABB;

/// Something drawn on screen that knows how much space it takes up.
/// Colliders only look at this once, when sizing themselves automatically.
pub trait RenderableBoundsSource {
    /// World-space bounds of the rendered thing.
    fn bounds(&self) -> AABB;
}

/// A fixed rectangle, handy when the real renderable lives elsewhere.
impl RenderableBoundsSource for AABB {
    #[inline]
    fn bounds(&self) -> AABB {
        *self
    }
}
