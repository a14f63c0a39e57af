//! The owning entity's placement in the world, as seen by its colliders.

use crate::math::{self as m, Angle};

/// Which part of a transform changed.
/// Sent to colliders so they know which cached values went stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransformComponent {
    Position,
    Rotation,
    Scale,
}

/// Anything that can tell a collider where its owner is.
///
/// Colliders never store a reference to their owner.
/// Every operation that needs the owner's placement takes one of these explicitly.
pub trait TransformSource {
    /// World position of the owner.
    fn position(&self) -> m::Vec2;
    /// Move the owner. Only used by speculative queries, which restore it afterwards.
    fn set_position(&mut self, position: m::Vec2);
    /// World rotation of the owner in radians.
    fn rotation(&self) -> f64;
    /// World scale of the owner.
    fn scale(&self) -> m::Vec2;
}

/// A plain position, rotation and non-uniform scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: m::Vec2,
    pub rotation: Angle,
    pub scale: m::Vec2,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: m::Vec2::zero(),
            rotation: Angle::default(),
            scale: m::Vec2::new(1.0, 1.0),
        }
    }
}

impl Transform {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_position(mut self, pos: impl Into<[f64; 2]>) -> Self {
        let [x, y] = pos.into();
        self.position = m::Vec2::new(x, y);
        self
    }

    #[inline]
    pub fn with_rotation(mut self, angle: Angle) -> Self {
        self.rotation = angle;
        self
    }

    #[inline]
    pub fn with_scale(mut self, scale: impl Into<[f64; 2]>) -> Self {
        let [x, y] = scale.into();
        self.scale = m::Vec2::new(x, y);
        self
    }
}

impl TransformSource for Transform {
    #[inline]
    fn position(&self) -> m::Vec2 {
        self.position
    }

    #[inline]
    fn set_position(&mut self, position: m::Vec2) {
        self.position = position;
    }

    #[inline]
    fn rotation(&self) -> f64 {
        self.rotation.rad()
    }

    #[inline]
    fn scale(&self) -> m::Vec2 {
        self.scale
    }
}
