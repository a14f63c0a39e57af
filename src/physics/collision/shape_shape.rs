//! Intersection tests between placed shapes.
//!
//! Only what's needed to answer "do these overlap and how":
//! circles against circles, circles against convex polygons,
//! and convex polygons against each other with the separating axis test.

use crate::math::{self as m, Unit};
use itertools::{Itertools, MinMaxResult};

/// An intersection between two shapes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeContact {
    /// The normal, facing away from the first shape toward the second.
    pub normal: Unit<m::Vec2>,
    /// How far the shapes overlap along the normal.
    pub depth: f64,
    /// World-space point where the shapes touch.
    pub point: m::Vec2,
}

impl ShapeContact {
    /// The smallest translation that moves the first shape out of the second.
    #[inline]
    pub fn min_translation(&self) -> m::Vec2 {
        -(*self.normal * self.depth)
    }

    /// The same contact seen from the other shape.
    #[inline]
    pub fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            ..self
        }
    }
}

//
// CIRCLE <-> CIRCLE
//

pub fn circle_circle(c1: m::Vec2, r1: f64, c2: m::Vec2, r2: f64) -> Option<ShapeContact> {
    let dist = c2 - c1;
    let dist_sq = dist.mag_sq();
    let r_sum = r1 + r2;
    if dist_sq >= r_sum * r_sum {
        return None;
    }

    let normal = if dist_sq < 0.001 {
        // same position, consider penetration to be on x axis
        Unit::unit_x()
    } else {
        Unit::new_normalize(dist)
    };

    Some(ShapeContact {
        normal,
        depth: r_sum - dist_sq.sqrt(),
        point: c1 + *normal * r1,
    })
}

//
// CIRCLE <-> POLYGON
//

pub fn circle_polygon(center: m::Vec2, radius: f64, points: &[m::Vec2]) -> Option<ShapeContact> {
    let mut closest = None;
    let mut closest_dist_sq = f64::MAX;
    let mut inside = true;
    for (start, end) in edges(points) {
        let edge = end - start;
        if m::cross(edge, center - start) < 0.0 {
            inside = false;
        }
        let point = closest_point_on_segment(center, start, end);
        let dist_sq = (center - point).mag_sq();
        if dist_sq < closest_dist_sq {
            closest_dist_sq = dist_sq;
            closest = Some((point, edge));
        }
    }
    let (closest_point, closest_edge) = closest?;

    let dist = closest_dist_sq.sqrt();
    if !inside && dist >= radius {
        return None;
    }

    let (normal, depth) = if dist < 1e-9 {
        // center exactly on the boundary, fall back to the edge normal
        let outward = Unit::new_normalize(m::right_normal(closest_edge));
        (-outward, radius)
    } else if inside {
        // pushing the circle out goes toward the closest boundary point,
        // so the polygon is on the opposite side
        (Unit::new_normalize(center - closest_point), radius + dist)
    } else {
        (Unit::new_normalize(closest_point - center), radius - dist)
    };

    Some(ShapeContact {
        normal,
        depth,
        point: closest_point,
    })
}

//
// POLYGON <-> POLYGON
//

pub fn polygon_polygon(p1: &[m::Vec2], p2: &[m::Vec2]) -> Option<ShapeContact> {
    let mut best: Option<(f64, m::Vec2)> = None;
    for (start, end) in edges(p1).chain(edges(p2)) {
        let axis = m::right_normal(end - start);
        if axis.mag_sq() < f64::EPSILON {
            continue;
        }
        let axis = axis.normalized();
        let (min1, max1) = project(p1, axis);
        let (min2, max2) = project(p2, axis);
        let overlap = max1.min(max2) - min1.max(min2);
        if overlap <= 0.0 {
            // found a separating axis
            return None;
        }
        if best.map_or(true, |(depth, _)| overlap < depth) {
            best = Some((overlap, axis));
        }
    }
    let (depth, mut axis) = best?;

    if (centroid(p2) - centroid(p1)).dot(axis) < 0.0 {
        axis = -axis;
    }
    // deepest point of the second polygon inside the first
    let point = p2
        .iter()
        .copied()
        .min_by(|a, b| a.dot(axis).total_cmp(&b.dot(axis)))
        .unwrap_or_else(|| centroid(p2));

    Some(ShapeContact {
        normal: Unit::new_unchecked(axis),
        depth,
        point,
    })
}

//
// helpers
//

fn edges(points: &[m::Vec2]) -> impl Iterator<Item = (m::Vec2, m::Vec2)> + '_ {
    let n = points.len();
    (0..n).map(move |i| (points[i], points[(i + 1) % n]))
}

fn project(points: &[m::Vec2], axis: m::Vec2) -> (f64, f64) {
    match points.iter().map(|p| p.dot(axis)).minmax() {
        MinMaxResult::MinMax(min, max) => (min, max),
        MinMaxResult::OneElement(x) => (x, x),
        MinMaxResult::NoElements => (0.0, 0.0),
    }
}

fn centroid(points: &[m::Vec2]) -> m::Vec2 {
    if points.is_empty() {
        return m::Vec2::zero();
    }
    points.iter().fold(m::Vec2::zero(), |acc, p| acc + *p) / points.len() as f64
}

fn closest_point_on_segment(point: m::Vec2, start: m::Vec2, end: m::Vec2) -> m::Vec2 {
    let edge = end - start;
    let len_sq = edge.mag_sq();
    if len_sq < f64::EPSILON {
        return start;
    }
    let t = ((point - start).dot(edge) / len_sq).clamp(0.0, 1.0);
    start + edge * t
}
