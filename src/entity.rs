//! A minimal owner for colliders that drives their lifecycle.
//!
//! Colliders don't know about entities or scenes,
//! so something has to call their `on_*` methods at the right times.
//! [`Entity`] does that for a transform, an optional renderable and any number of colliders.

use crate::{
    math::{self as m, Angle},
    physics::{
        collision::{Collider, CollisionResult, AABB},
        index::PhysicsIndex,
    },
    render::RenderableBoundsSource,
    transform::{Transform, TransformComponent},
};

use thunderdome as td;

/// Key type to look up a collider attached to an [`Entity`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColliderKey(td::Index);

impl ColliderKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

struct ColliderSlot {
    collider: Collider,
    enabled: bool,
}

/// A game object with a transform, optionally something rendered, and colliders.
#[derive(Default)]
pub struct Entity {
    transform: Transform,
    renderable: Option<Box<dyn RenderableBoundsSource>>,
    colliders: td::Arena<ColliderSlot>,
    in_scene: bool,
}

impl Entity {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            ..Default::default()
        }
    }

    /// Give the entity something colliders can size themselves from.
    pub fn with_renderable(mut self, renderable: impl RenderableBoundsSource + 'static) -> Self {
        self.renderable = Some(Box::new(renderable));
        self
    }

    /// Replace the renderable. Colliders that were already sized keep their size.
    pub fn set_renderable(&mut self, renderable: Option<Box<dyn RenderableBoundsSource>>) {
        self.renderable = renderable;
    }

    #[inline]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    #[inline]
    pub fn is_in_scene(&self) -> bool {
        self.in_scene
    }

    #[inline]
    pub fn collider(&self, key: ColliderKey) -> Option<&Collider> {
        self.colliders.get(key.0).map(|slot| &slot.collider)
    }

    #[inline]
    pub fn is_collider_enabled(&self, key: ColliderKey) -> Option<bool> {
        self.colliders.get(key.0).map(|slot| slot.enabled)
    }

    pub fn colliders(&self) -> impl Iterator<Item = (ColliderKey, &Collider)> {
        self.colliders
            .iter()
            .map(|(idx, slot)| (ColliderKey(idx), &slot.collider))
    }

    //
    // scene membership
    //

    /// Put the entity in the scene, attaching all of its colliders.
    pub fn add_to_scene(&mut self, index: &mut impl PhysicsIndex) {
        if self.in_scene {
            return;
        }
        self.in_scene = true;
        log::debug!("adding entity with {} colliders to scene", self.colliders.len());
        for (_, slot) in self.colliders.iter_mut() {
            attach(slot, &self.transform, self.renderable.as_deref(), index);
        }
    }

    /// Take the entity out of the scene, detaching all of its colliders.
    pub fn remove_from_scene(&mut self, index: &mut impl PhysicsIndex) {
        if !self.in_scene {
            return;
        }
        self.in_scene = false;
        for (_, slot) in self.colliders.iter_mut() {
            slot.collider.on_removed_from_entity(index);
        }
    }

    //
    // collider management
    //

    /// Give the entity a collider, attaching it right away if the entity is in the scene.
    pub fn add_collider(&mut self, collider: Collider, index: &mut impl PhysicsIndex) -> ColliderKey {
        let mut slot = ColliderSlot {
            collider,
            enabled: true,
        };
        if self.in_scene {
            attach(&mut slot, &self.transform, self.renderable.as_deref(), index);
        }
        ColliderKey(self.colliders.insert(slot))
    }

    /// Take a collider off the entity. The returned collider is detached.
    pub fn remove_collider(
        &mut self,
        key: ColliderKey,
        index: &mut impl PhysicsIndex,
    ) -> Option<Collider> {
        let mut slot = self.colliders.remove(key.0)?;
        slot.collider.on_removed_from_entity(index);
        Some(slot.collider)
    }

    /// Enable or disable a collider.
    /// Disabled colliders stay attached but aren't in the physics index.
    /// Returns false if there's no such collider.
    pub fn set_collider_enabled(
        &mut self,
        key: ColliderKey,
        enabled: bool,
        index: &mut impl PhysicsIndex,
    ) -> bool {
        let Some(slot) = self.colliders.get_mut(key.0) else {
            return false;
        };
        if slot.enabled == enabled {
            return true;
        }
        slot.enabled = enabled;
        if self.in_scene {
            if enabled {
                slot.collider.on_enabled(&self.transform, index);
            } else {
                slot.collider.on_disabled(index);
            }
        }
        true
    }

    /// Move a collider relative to the entity.
    pub fn set_collider_local_offset(
        &mut self,
        key: ColliderKey,
        offset: m::Vec2,
        index: &mut impl PhysicsIndex,
    ) -> bool {
        match self.colliders.get_mut(key.0) {
            Some(slot) => {
                slot.collider.set_local_offset(offset, &self.transform, index);
                true
            }
            None => false,
        }
    }

    /// Up-to-date world bounds of a collider.
    pub fn collider_bounds(&mut self, key: ColliderKey) -> Option<AABB> {
        let slot = self.colliders.get_mut(key.0)?;
        Some(slot.collider.bounds(&self.transform))
    }

    //
    // transform
    //

    pub fn set_position(&mut self, position: m::Vec2, index: &mut impl PhysicsIndex) {
        self.transform.position = position;
        self.notify_transform_changed(TransformComponent::Position, index);
    }

    pub fn set_rotation(&mut self, rotation: Angle, index: &mut impl PhysicsIndex) {
        self.transform.rotation = rotation;
        self.notify_transform_changed(TransformComponent::Rotation, index);
    }

    pub fn set_scale(&mut self, scale: m::Vec2, index: &mut impl PhysicsIndex) {
        self.transform.scale = scale;
        self.notify_transform_changed(TransformComponent::Scale, index);
    }

    fn notify_transform_changed(
        &mut self,
        component: TransformComponent,
        index: &mut impl PhysicsIndex,
    ) {
        let _span = tracy_span!("notify colliders", "notify_transform_changed");
        for (_, slot) in self.colliders.iter_mut() {
            slot.collider
                .on_entity_transform_changed(component, &self.transform, index);
        }
    }

    //
    // queries
    //

    /// Check whether one of this entity's colliders would hit `other`
    /// if the entity moved by `motion`.
    /// The entity ends up exactly where it started.
    pub fn collides_with(
        &mut self,
        key: ColliderKey,
        other: &Collider,
        motion: m::Vec2,
    ) -> Option<CollisionResult> {
        let slot = self.colliders.get(key.0)?;
        slot.collider
            .collides_with(&mut self.transform, other, motion)
    }

    /// Check whether one of this entity's colliders would hit another one of its colliders
    /// if the entity moved by `motion`.
    ///
    /// Both colliders share the moved transform, but `other` is tested where it was last placed.
    pub fn collides_with_sibling(
        &mut self,
        key: ColliderKey,
        other: ColliderKey,
        motion: m::Vec2,
    ) -> Option<CollisionResult> {
        let slot = self.colliders.get(key.0)?;
        let other = self.colliders.get(other.0)?;
        slot.collider
            .collides_with(&mut self.transform, &other.collider, motion)
    }

    /// Find the first of `candidates` that one of this entity's colliders would hit
    /// if the entity moved by `motion`.
    ///
    /// The collider itself and candidates outside its `collides_with_layers` are skipped.
    pub fn collides_with_any<'a>(
        &mut self,
        key: ColliderKey,
        motion: m::Vec2,
        candidates: impl IntoIterator<Item = &'a Collider>,
    ) -> Option<CollisionResult> {
        let slot = self.colliders.get(key.0)?;
        let mask = slot.collider.collides_with_layers();
        candidates
            .into_iter()
            .filter(|c| c.id() != slot.collider.id() && c.physics_layer().intersects(mask))
            .find_map(|c| {
                slot.collider
                    .collides_with(&mut self.transform, c, motion)
            })
    }
}

fn attach(
    slot: &mut ColliderSlot,
    transform: &Transform,
    renderable: Option<&dyn RenderableBoundsSource>,
    index: &mut impl PhysicsIndex,
) {
    if slot.enabled {
        slot.collider.on_added_to_entity(transform, renderable, index);
    } else {
        slot.collider
            .on_added_to_entity_disabled(transform, renderable, index);
    }
}
