use super::{shape_shape, ShapeContact, AABB};
use crate::math as m;

/// Tag identifying which variant a [`Shape`][self::Shape] is,
/// used to decide what a shape is capable of without matching on its data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub enum ShapeKind {
    Circle,
    Box,
    Polygon,
}

impl ShapeKind {
    /// Whether a shape of this kind can size itself from a renderable's bounds.
    #[inline]
    pub fn supports_auto_sizing(self) -> bool {
        matches!(self, ShapeKind::Circle | ShapeKind::Box)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("A polygon needs at least 3 points, got {0}")]
    TooFewPoints(usize),
    #[error("Polygon points don't enclose any area")]
    ZeroArea,
}

/// Everything a shape needs to know about the collider that owns it
/// in order to place itself in the world.
#[derive(Clone, Copy, Debug)]
pub struct ShapePose {
    /// World position of the owning entity.
    pub position: m::Vec2,
    /// Rotation of the collider in radians.
    /// Already zero if the collider doesn't rotate with its transform.
    pub rotation: f64,
    pub scale: m::Vec2,
    pub local_offset: m::Vec2,
    /// Cached magnitude of `local_offset`.
    pub local_offset_length: f64,
    pub scale_rotate_with_transform: bool,
}

impl Default for ShapePose {
    fn default() -> Self {
        Self {
            position: m::Vec2::zero(),
            rotation: 0.0,
            scale: m::Vec2::new(1.0, 1.0),
            local_offset: m::Vec2::zero(),
            local_offset_length: 0.0,
            scale_rotate_with_transform: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Geometry {
    Circle { radius: f64 },
    /// Boxes are stored as full side lengths and turned into polygons when placed.
    Box { width: f64, height: f64 },
    /// Convex, counterclockwise, relative to the shape's origin.
    Polygon { points: Vec<m::Vec2> },
}

/// A shape placed in the world. Overlap tests operate on these.
#[derive(Clone, Debug, PartialEq)]
pub enum WorldShape {
    Circle {
        center: m::Vec2,
        radius: f64,
    },
    /// Convex polygon with counterclockwise world-space points.
    Polygon {
        center: m::Vec2,
        points: Vec<m::Vec2>,
    },
}

impl WorldShape {
    #[inline]
    pub fn center(&self) -> m::Vec2 {
        match self {
            WorldShape::Circle { center, .. } | WorldShape::Polygon { center, .. } => *center,
        }
    }

    pub fn bounds(&self) -> AABB {
        match self {
            WorldShape::Circle { center, radius } => {
                AABB::from_center_size(*center, 2.0 * radius, 2.0 * radius)
            }
            WorldShape::Polygon { center, points } => {
                AABB::from_points(points.iter().copied())
                    .unwrap_or_else(|| AABB::from_center_size(*center, 0.0, 0.0))
            }
        }
    }

    /// Whether the two shapes intersect at all.
    #[inline]
    pub fn overlaps(&self, other: &WorldShape) -> bool {
        self.contact(other).is_some()
    }

    /// Contact data if the shapes intersect, with the normal pointing from `self` toward `other`.
    pub fn contact(&self, other: &WorldShape) -> Option<ShapeContact> {
        use WorldShape::*;
        match (self, other) {
            (Circle { center: c1, radius: r1 }, Circle { center: c2, radius: r2 }) => {
                shape_shape::circle_circle(*c1, *r1, *c2, *r2)
            }
            (Circle { center, radius }, Polygon { points, .. }) => {
                shape_shape::circle_polygon(*center, *radius, points)
            }
            (Polygon { points, .. }, Circle { center, radius }) => {
                shape_shape::circle_polygon(*center, *radius, points).map(ShapeContact::flipped)
            }
            (Polygon { points: p1, .. }, Polygon { points: p2, .. }) => {
                shape_shape::polygon_polygon(p1, p2)
            }
        }
    }
}

/// The geometric shape of a collider.
///
/// Holds the shape's local geometry as well as where it was last placed in the world.
/// The placement is only refreshed by [`recalculate_bounds`][Self::recalculate_bounds],
/// which the owning collider calls whenever its cached bounds have gone stale.
#[derive(Clone, Debug)]
pub struct Shape {
    geometry: Geometry,
    world: WorldShape,
    bounds: AABB,
}

impl Shape {
    fn from_geometry(geometry: Geometry) -> Self {
        let world = place(&geometry, &ShapePose::default());
        let bounds = world.bounds();
        Self {
            geometry,
            world,
            bounds,
        }
    }

    /// Create a circle shape from a radius.
    pub fn circle(radius: f64) -> Self {
        Self::from_geometry(Geometry::Circle { radius })
    }

    /// Create a box shape with two different side lengths.
    pub fn rect(width: f64, height: f64) -> Self {
        Self::from_geometry(Geometry::Box { width, height })
    }

    /// Create a box shape with both sides set to the same length.
    pub fn square(side_length: f64) -> Self {
        Self::rect(side_length, side_length)
    }

    /// Create a convex polygon from points relative to the shape's origin.
    /// Points may be given in either winding order.
    pub fn polygon(points: impl Into<Vec<m::Vec2>>) -> Result<Self, ShapeError> {
        let mut points = points.into();
        if points.len() < 3 {
            return Err(ShapeError::TooFewPoints(points.len()));
        }
        let area = signed_area(&points);
        if area.abs() < f64::EPSILON {
            return Err(ShapeError::ZeroArea);
        }
        if area < 0.0 {
            points.reverse();
        }
        Ok(Self::from_geometry(Geometry::Polygon { points }))
    }

    #[inline]
    pub fn kind(&self) -> ShapeKind {
        match self.geometry {
            Geometry::Circle { .. } => ShapeKind::Circle,
            Geometry::Box { .. } => ShapeKind::Box,
            Geometry::Polygon { .. } => ShapeKind::Polygon,
        }
    }

    /// Radius of a circle shape, unscaled.
    #[inline]
    pub fn radius(&self) -> Option<f64> {
        match self.geometry {
            Geometry::Circle { radius } => Some(radius),
            _ => None,
        }
    }

    /// Width and height of a box shape, unscaled.
    #[inline]
    pub fn size(&self) -> Option<(f64, f64)> {
        match self.geometry {
            Geometry::Box { width, height } => Some((width, height)),
            _ => None,
        }
    }

    /// Local points of a box or polygon, counterclockwise.
    pub fn local_points(&self) -> Option<Vec<m::Vec2>> {
        match &self.geometry {
            Geometry::Circle { .. } => None,
            Geometry::Box { width, height } => Some(box_points(*width, *height).to_vec()),
            Geometry::Polygon { points } => Some(points.clone()),
        }
    }

    /// Bounds as of the last call to `recalculate_bounds`.
    #[inline]
    pub fn bounds(&self) -> AABB {
        self.bounds
    }

    /// The shape as it was last placed in the world.
    #[inline]
    pub fn world(&self) -> &WorldShape {
        &self.world
    }

    /// Place the shape in the world according to its owner and refresh the bounds.
    pub fn recalculate_bounds(&mut self, owner: &ShapePose) {
        self.world = place(&self.geometry, owner);
        self.bounds = self.world.bounds();
    }

    /// Compute where the shape would be for the given owner pose,
    /// without touching the stored placement.
    #[inline]
    pub fn placed_at(&self, owner: &ShapePose) -> WorldShape {
        place(&self.geometry, owner)
    }

    /// Check whether this shape overlaps another, as both were last placed.
    #[inline]
    pub fn overlaps(&self, other: &Shape) -> bool {
        self.world.overlaps(&other.world)
    }

    /// Check for intersection with another shape, as both were last placed,
    /// and get contact data if they do.
    #[inline]
    pub fn collides_with_shape(&self, other: &Shape) -> Option<ShapeContact> {
        self.world.contact(&other.world)
    }

    /// Set the radius of a circle. Returns false if this isn't a circle or nothing changed.
    pub(super) fn set_radius(&mut self, new_radius: f64) -> bool {
        match &mut self.geometry {
            Geometry::Circle { radius } if *radius != new_radius => {
                *radius = new_radius;
                true
            }
            _ => false,
        }
    }

    /// Set the size of a box. Returns false if this isn't a box or nothing changed.
    pub(super) fn set_size(&mut self, new_width: f64, new_height: f64) -> bool {
        match &mut self.geometry {
            Geometry::Box { width, height } if (*width, *height) != (new_width, new_height) => {
                *width = new_width;
                *height = new_height;
                true
            }
            _ => false,
        }
    }
}

fn signed_area(points: &[m::Vec2]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| m::cross(points[i], points[(i + 1) % n]))
        .sum::<f64>()
        / 2.0
}

fn box_points(width: f64, height: f64) -> [m::Vec2; 4] {
    let (hw, hh) = (width / 2.0, height / 2.0);
    [
        m::Vec2::new(-hw, -hh),
        m::Vec2::new(hw, -hh),
        m::Vec2::new(hw, hh),
        m::Vec2::new(-hw, hh),
    ]
}

fn place(geometry: &Geometry, owner: &ShapePose) -> WorldShape {
    match geometry {
        Geometry::Circle { radius } => place_circle(*radius, owner),
        Geometry::Box { width, height } => place_polygon(&box_points(*width, *height), owner),
        Geometry::Polygon { points } => place_polygon(points, owner),
    }
}

fn place_circle(radius: f64, owner: &ShapePose) -> WorldShape {
    if !owner.scale_rotate_with_transform {
        return WorldShape::Circle {
            center: owner.position + owner.local_offset,
            radius,
        };
    }

    // circles can't be stretched, use the larger scale factor for everything
    let scale = owner.scale.x.max(owner.scale.y);
    let offset = if owner.rotation != 0.0 {
        let offset_angle = owner.local_offset.y.atan2(owner.local_offset.x) + owner.rotation;
        let (sin, cos) = offset_angle.sin_cos();
        m::Vec2::new(cos, sin) * (owner.local_offset_length * scale)
    } else {
        owner.local_offset * scale
    };

    WorldShape::Circle {
        center: owner.position + offset,
        radius: radius * scale,
    }
}

fn place_polygon(local_points: &[m::Vec2], owner: &ShapePose) -> WorldShape {
    if !owner.scale_rotate_with_transform {
        let center = owner.position + owner.local_offset;
        return WorldShape::Polygon {
            center,
            points: local_points.iter().map(|p| *p + center).collect(),
        };
    }

    let has_unit_scale = owner.scale.x == 1.0 && owner.scale.y == 1.0;
    let mut offset = m::scale(owner.local_offset, owner.scale);
    if owner.rotation != 0.0 {
        let offset_angle = offset.y.atan2(offset.x) + owner.rotation;
        let offset_length = if has_unit_scale {
            owner.local_offset_length
        } else {
            offset.mag()
        };
        let (sin, cos) = offset_angle.sin_cos();
        offset = m::Vec2::new(cos, sin) * offset_length;
    }

    let center = owner.position + offset;
    // negative scale mirrors the polygon, which flips its winding
    let mirrored = owner.scale.x * owner.scale.y < 0.0;
    let mut points: Vec<m::Vec2> = local_points
        .iter()
        .map(|p| center + m::rotate(m::scale(*p, owner.scale), owner.rotation))
        .collect();
    if mirrored {
        points.reverse();
    }

    WorldShape::Polygon { center, points }
}
