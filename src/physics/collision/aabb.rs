use crate::math as m;

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct AABB {
    pub min: m::Vec2,
    pub max: m::Vec2,
}

impl AABB {
    #[inline]
    pub fn from_center_size(center: m::Vec2, width: f64, height: f64) -> Self {
        let half = m::Vec2::new(width / 2.0, height / 2.0);
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// The smallest AABB containing every given point, or None if there are no points.
    pub fn from_points(points: impl IntoIterator<Item = m::Vec2>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(
            Self {
                min: first,
                max: first,
            },
            |acc, p| Self {
                min: m::Vec2::new(acc.min.x.min(p.x), acc.min.y.min(p.y)),
                max: m::Vec2::new(acc.max.x.max(p.x), acc.max.y.max(p.y)),
            },
        ))
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn center(&self) -> m::Vec2 {
        (self.min + self.max) / 2.0
    }

    /// Get the smallest AABB that contains both this and another AABB.
    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: m::Vec2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: m::Vec2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Get the intersection of two AABBs, if they intersect.
    #[inline]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let min = m::Vec2::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y));
        let max = m::Vec2::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y));
        if min.x > max.x || min.y > max.y {
            None
        } else {
            Some(Self { min, max })
        }
    }

    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.intersection(other).is_some()
    }

    #[inline]
    pub fn contains_point(&self, point: m::Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Extend every edge outwards by the given amount.
    #[inline]
    pub fn padded(&self, amount: f64) -> Self {
        let pad = m::Vec2::new(amount, amount);
        Self {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    /// Move the box by an offset.
    #[inline]
    pub fn translated(&self, offset: m::Vec2) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }
}
