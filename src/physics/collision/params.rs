use super::{Collider, Shape, ShapeError};
use crate::{math as m, physics::layers::CollisionLayers};

/// Serializable description of a collider's shape.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub enum ShapeParams {
    Circle { radius: f64 },
    Box { width: f64, height: f64 },
    Polygon { points: Vec<[f64; 2]> },
    /// A circle sized from the entity's renderable when attached.
    AutoCircle,
    /// A box sized from the entity's renderable when attached.
    AutoBox,
}

impl Default for ShapeParams {
    fn default() -> Self {
        ShapeParams::AutoBox
    }
}

/// A builder to create [`Collider`][super::Collider]s,
/// and the format colliders are read from data files in.
///
/// Every field is optional when deserializing.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ColliderParams {
    pub shape: ShapeParams,
    pub is_trigger: bool,
    pub physics_layer: CollisionLayers,
    pub collides_with_layers: CollisionLayers,
    pub local_offset: [f64; 2],
    pub scale_rotate_with_transform: bool,
}

impl Default for ColliderParams {
    fn default() -> Self {
        Self {
            shape: ShapeParams::default(),
            is_trigger: false,
            physics_layer: CollisionLayers::DEFAULT,
            collides_with_layers: CollisionLayers::ALL,
            local_offset: [0.0, 0.0],
            scale_rotate_with_transform: true,
        }
    }
}

impl ColliderParams {
    pub fn new(shape: ShapeParams) -> Self {
        Self {
            shape,
            ..Default::default()
        }
    }

    #[inline]
    pub fn with_trigger(mut self, is_trigger: bool) -> Self {
        self.is_trigger = is_trigger;
        self
    }

    #[inline]
    pub fn with_layers(mut self, member_of: CollisionLayers, collides_with: CollisionLayers) -> Self {
        self.physics_layer = member_of;
        self.collides_with_layers = collides_with;
        self
    }

    #[inline]
    pub fn with_local_offset(mut self, offset: impl Into<[f64; 2]>) -> Self {
        self.local_offset = offset.into();
        self
    }

    #[inline]
    pub fn with_scale_rotate_with_transform(mut self, enabled: bool) -> Self {
        self.scale_rotate_with_transform = enabled;
        self
    }

    /// Create a detached collider. Fails only if polygon points are unusable.
    pub fn build(&self) -> Result<Collider, ShapeError> {
        let collider = match &self.shape {
            ShapeParams::Circle { radius } => Collider::new_circle(*radius),
            ShapeParams::Box { width, height } => Collider::new_rect(*width, *height),
            ShapeParams::Polygon { points } => Collider::new(Shape::polygon(
                points
                    .iter()
                    .map(|&[x, y]| m::Vec2::new(x, y))
                    .collect::<Vec<_>>(),
            )?),
            ShapeParams::AutoCircle => Collider::new_auto_circle(),
            ShapeParams::AutoBox => Collider::new_auto_rect(),
        };
        let [x, y] = self.local_offset;
        Ok(collider
            .with_trigger(self.is_trigger)
            .with_physics_layer(self.physics_layer)
            .with_collides_with_layers(self.collides_with_layers)
            .with_local_offset(m::Vec2::new(x, y))
            .with_scale_rotate_with_transform(self.scale_rotate_with_transform))
    }
}

impl From<ShapeParams> for ColliderParams {
    fn from(shape: ShapeParams) -> Self {
        Self::new(shape)
    }
}

impl TryFrom<ColliderParams> for Collider {
    type Error = ShapeError;

    fn try_from(params: ColliderParams) -> Result<Self, Self::Error> {
        params.build()
    }
}
