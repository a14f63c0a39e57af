//! The index colliders register themselves with,
//! so that broad phase queries can find them without asking every collider.

use super::{collision::AABB, layers::CollisionLayers, ColliderId};
use crate::math as m;
use std::collections::HashMap;

/// A spatial registry of colliders.
///
/// Colliders are the only ones that write their own entries.
/// Every call hands over the bounds involved, so implementations that file entries
/// by position can always find them again even after the collider has moved.
pub trait PhysicsIndex {
    /// Start tracking a collider.
    /// Returns the bounds the entry was filed under,
    /// which the collider must hand back to remove or update itself later.
    fn add(&mut self, id: ColliderId, bounds: AABB, layer: CollisionLayers) -> AABB;

    /// Stop tracking a collider, locating it by the bounds it was filed under.
    fn remove(&mut self, id: ColliderId, registered_bounds: AABB);

    /// Refile a collider under new bounds.
    fn update(
        &mut self,
        id: ColliderId,
        registered_bounds: AABB,
        new_bounds: AABB,
        layer: CollisionLayers,
    ) -> AABB {
        self.remove(id, registered_bounds);
        self.add(id, new_bounds, layer)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Entry {
    bounds: AABB,
    layer: CollisionLayers,
}

/// The simplest possible physics index, which checks every collider on every query.
/// Very inefficient for large scenes, but can work for small ones.
#[derive(Clone, Debug, Default)]
pub struct BruteForceIndex {
    entries: HashMap<ColliderId, Entry>,
}

impl BruteForceIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: ColliderId) -> bool {
        self.entries.contains_key(&id)
    }

    /// The bounds a collider is currently filed under, if it's registered.
    #[inline]
    pub fn registered_bounds(&self, id: ColliderId) -> Option<AABB> {
        self.entries.get(&id).map(|e| e.bounds)
    }

    /// The layer a collider was registered on, if it's registered.
    #[inline]
    pub fn registered_layer(&self, id: ColliderId) -> Option<CollisionLayers> {
        self.entries.get(&id).map(|e| e.layer)
    }

    /// Every collider on one of the given layers whose bounds intersect the given AABB.
    pub fn query_aabb(
        &self,
        aabb: AABB,
        layer_mask: CollisionLayers,
    ) -> impl Iterator<Item = ColliderId> + '_ {
        self.entries
            .iter()
            .filter(move |(_, e)| e.layer.intersects(layer_mask) && e.bounds.intersects(&aabb))
            .map(|(id, _)| *id)
    }

    /// Every collider on one of the given layers whose bounds contain the given point.
    pub fn query_point(
        &self,
        point: m::Vec2,
        layer_mask: CollisionLayers,
    ) -> impl Iterator<Item = ColliderId> + '_ {
        self.entries
            .iter()
            .filter(move |(_, e)| e.layer.intersects(layer_mask) && e.bounds.contains_point(point))
            .map(|(id, _)| *id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl PhysicsIndex for BruteForceIndex {
    fn add(&mut self, id: ColliderId, bounds: AABB, layer: CollisionLayers) -> AABB {
        let _span = tracy_span!("index add", "add");
        if self.entries.insert(id, Entry { bounds, layer }).is_some() {
            log::warn!("{id:?} was added to the physics index twice");
        }
        bounds
    }

    fn remove(&mut self, id: ColliderId, registered_bounds: AABB) {
        let _span = tracy_span!("index remove", "remove");
        match self.entries.remove(&id) {
            Some(entry) if entry.bounds != registered_bounds => {
                log::warn!(
                    "{id:?} was removed with bounds {registered_bounds:?} \
                    but was filed under {:?}",
                    entry.bounds
                );
            }
            Some(_) => {}
            None => log::warn!("{id:?} was removed from the physics index but wasn't in it"),
        }
    }
}
