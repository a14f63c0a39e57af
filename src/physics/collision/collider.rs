use super::{Shape, ShapeContact, ShapeError, ShapeKind, ShapePose, AABB};
use crate::{
    math::{self as m, Unit},
    physics::{index::PhysicsIndex, layers::CollisionLayers},
    render::RenderableBoundsSource,
    transform::{TransformComponent, TransformSource},
};

use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a collider, unique for the lifetime of the process.
/// This is what physics indices file colliders under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColliderId(u64);

impl ColliderId {
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Things that can go wrong while a collider is being attached.
///
/// None of these stop the attach: the collider is logged about and registered unsized.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ColliderError {
    #[error("Only box and circle colliders can be sized automatically, this one is a {0:?}")]
    UnsupportedAutoSize(ShapeKind),
    #[error("Collider has no explicit size and its entity has no renderable to size it from")]
    MissingRenderable,
}

/// Where a collider is in its lifecycle.
///
/// A collider is in the physics index exactly when it's `AttachedRegistered`,
/// and the bounds stored there are the ones the index filed it under.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Registration {
    /// Not part of a scene.
    Detached,
    /// Part of a scene but not in the physics index, typically because it's disabled.
    AttachedUnregistered,
    /// Part of a scene and in the physics index.
    AttachedRegistered { bounds: AABB },
}

/// A hit found by [`Collider::collides_with`][Collider::collides_with].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionResult {
    /// The collider that was hit.
    pub collider: ColliderId,
    /// The normal of the contact, facing away from the querying collider.
    pub normal: Unit<m::Vec2>,
    /// How far the colliders overlap along the normal.
    pub depth: f64,
    /// World-space point where the colliders touch.
    pub point: m::Vec2,
}

impl CollisionResult {
    fn new(collider: ColliderId, contact: ShapeContact) -> Self {
        Self {
            collider,
            normal: contact.normal,
            depth: contact.depth,
            point: contact.point,
        }
    }

    /// The smallest translation that moves the querying collider out of the one it hit.
    #[inline]
    pub fn min_translation(&self) -> m::Vec2 {
        -(*self.normal * self.depth)
    }
}

/// A component that allows a game object to collide with others.
///
/// The collider doesn't know about its owner. Operations that need the owner's
/// transform or the physics index take them as arguments, and the owning entity is
/// expected to call the `on_*` lifecycle methods at the appropriate times
/// (see [`Entity`][crate::Entity] for a driver that does).
#[derive(Debug)]
pub struct Collider {
    id: ColliderId,
    shape: Shape,
    /// Triggers detect collisions but aren't meant to be pushed out of things.
    /// Interpreted by whoever resolves collisions.
    pub is_trigger: bool,
    physics_layer: CollisionLayers,
    collides_with_layers: CollisionLayers,
    scale_rotate_with_transform: bool,
    local_offset: m::Vec2,
    local_offset_length: f64,
    is_position_dirty: bool,
    is_rotation_dirty: bool,
    requires_auto_sizing: bool,
    registration: Registration,
}

impl Collider {
    /// Create a collider with the given shape.
    pub fn new(shape: Shape) -> Self {
        Self {
            id: ColliderId::next(),
            shape,
            is_trigger: false,
            physics_layer: CollisionLayers::DEFAULT,
            collides_with_layers: CollisionLayers::ALL,
            scale_rotate_with_transform: true,
            local_offset: m::Vec2::zero(),
            local_offset_length: 0.0,
            is_position_dirty: true,
            is_rotation_dirty: true,
            requires_auto_sizing: false,
            registration: Registration::Detached,
        }
    }

    /// Create a collider that sizes itself from its entity's renderable
    /// when it's first added to the scene.
    /// Until then (or if there's nothing to size from) it keeps the given shape.
    ///
    /// Only circles and boxes can be sized automatically.
    pub fn new_auto(shape: Shape) -> Self {
        Self {
            requires_auto_sizing: true,
            ..Self::new(shape)
        }
    }

    /// Create a circle collider from a radius.
    pub fn new_circle(radius: f64) -> Self {
        Self::new(Shape::circle(radius))
    }

    /// Create a rect collider with two different side lengths.
    pub fn new_rect(width: f64, height: f64) -> Self {
        Self::new(Shape::rect(width, height))
    }

    /// Create a rect collider with both sides set to the same length.
    pub fn new_square(side_length: f64) -> Self {
        Self::new(Shape::square(side_length))
    }

    /// Create a convex polygon collider from points relative to the collider's origin.
    pub fn new_polygon(points: impl Into<Vec<m::Vec2>>) -> Result<Self, ShapeError> {
        Ok(Self::new(Shape::polygon(points)?))
    }

    /// Create a unit circle collider that takes its radius from the entity's renderable.
    pub fn new_auto_circle() -> Self {
        Self::new_auto(Shape::circle(1.0))
    }

    /// Create a unit square collider that takes its size from the entity's renderable.
    pub fn new_auto_rect() -> Self {
        Self::new_auto(Shape::square(1.0))
    }

    //
    // builder methods, for configuring colliders before they're attached
    //

    pub fn with_trigger(mut self, is_trigger: bool) -> Self {
        self.is_trigger = is_trigger;
        self
    }

    pub fn with_physics_layer(mut self, layer: CollisionLayers) -> Self {
        if self.accepts_builder("with_physics_layer") {
            self.physics_layer = layer;
        }
        self
    }

    pub fn with_collides_with_layers(mut self, layers: CollisionLayers) -> Self {
        self.collides_with_layers = layers;
        self
    }

    pub fn with_local_offset(mut self, offset: m::Vec2) -> Self {
        if self.accepts_builder("with_local_offset") {
            self.apply_local_offset(offset);
        }
        self
    }

    pub fn with_scale_rotate_with_transform(mut self, enabled: bool) -> Self {
        if self.accepts_builder("with_scale_rotate_with_transform") {
            self.scale_rotate_with_transform = enabled;
            self.is_position_dirty = true;
            self.is_rotation_dirty = true;
        }
        self
    }

    /// Builders can't reach the physics index,
    /// so settings that affect registration are only taken while detached.
    fn accepts_builder(&self, name: &str) -> bool {
        if self.is_attached() {
            log::warn!(
                "{name} ignored on attached {:?}, use the matching set_* method instead",
                self.id
            );
            return false;
        }
        true
    }

    //
    // accessors
    //

    #[inline]
    pub fn id(&self) -> ColliderId {
        self.id
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn physics_layer(&self) -> CollisionLayers {
        self.physics_layer
    }

    #[inline]
    pub fn collides_with_layers(&self) -> CollisionLayers {
        self.collides_with_layers
    }

    #[inline]
    pub fn scale_rotate_with_transform(&self) -> bool {
        self.scale_rotate_with_transform
    }

    /// Offset of the collider from its entity, in the entity's unscaled, unrotated space.
    #[inline]
    pub fn local_offset(&self) -> m::Vec2 {
        self.local_offset
    }

    #[inline]
    pub fn local_offset_length(&self) -> f64 {
        self.local_offset_length
    }

    #[inline]
    pub fn registration(&self) -> Registration {
        self.registration
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        !matches!(self.registration, Registration::Detached)
    }

    #[inline]
    pub fn is_registered(&self) -> bool {
        matches!(self.registration, Registration::AttachedRegistered { .. })
    }

    /// The bounds this collider is filed under in the physics index, if it's registered.
    #[inline]
    pub fn registered_bounds(&self) -> Option<AABB> {
        match self.registration {
            Registration::AttachedRegistered { bounds } => Some(bounds),
            _ => None,
        }
    }

    #[inline]
    pub fn is_position_dirty(&self) -> bool {
        self.is_position_dirty
    }

    #[inline]
    pub fn is_rotation_dirty(&self) -> bool {
        self.is_rotation_dirty
    }

    /// Whether the collider will size itself when next added to an entity.
    #[inline]
    pub fn requires_auto_sizing(&self) -> bool {
        self.requires_auto_sizing
    }

    //
    // placement
    //

    /// Rotation of the collider in radians.
    /// Always zero if the collider doesn't rotate with its transform.
    #[inline]
    pub fn rotation<T: TransformSource + ?Sized>(&self, transform: &T) -> f64 {
        if self.scale_rotate_with_transform {
            transform.rotation()
        } else {
            0.0
        }
    }

    /// Position of the entity plus the local offset.
    /// The offset isn't scaled or rotated here; shapes do that when computing bounds.
    #[inline]
    pub fn absolute_position<T: TransformSource + ?Sized>(&self, transform: &T) -> m::Vec2 {
        transform.position() + self.local_offset
    }

    fn shape_pose<T: TransformSource + ?Sized>(&self, transform: &T) -> ShapePose {
        ShapePose {
            position: transform.position(),
            rotation: self.rotation(transform),
            scale: transform.scale(),
            local_offset: self.local_offset,
            local_offset_length: self.local_offset_length,
            scale_rotate_with_transform: self.scale_rotate_with_transform,
        }
    }

    /// World-space bounds of the collider, recomputed if anything moved since last time.
    pub fn bounds<T: TransformSource + ?Sized>(&mut self, transform: &T) -> AABB {
        if self.is_position_dirty || self.is_rotation_dirty {
            let pose = self.shape_pose(transform);
            self.shape.recalculate_bounds(&pose);
            self.is_position_dirty = false;
            self.is_rotation_dirty = false;
        }
        self.shape.bounds()
    }

    //
    // registration
    //

    /// Add the collider to the physics index if it's attached and not already there.
    pub fn register_with_physics<T, I>(&mut self, transform: &T, index: &mut I)
    where
        T: TransformSource + ?Sized,
        I: PhysicsIndex + ?Sized,
    {
        if !matches!(self.registration, Registration::AttachedUnregistered) {
            return;
        }
        let bounds = self.bounds(transform);
        let stored = index.add(self.id, bounds, self.physics_layer);
        log::trace!("registered {:?} with bounds {stored:?}", self.id);
        self.registration = Registration::AttachedRegistered { bounds: stored };
    }

    /// Remove the collider from the physics index if it's there,
    /// using the bounds it was filed under rather than where it is now.
    pub fn unregister_with_physics<I: PhysicsIndex + ?Sized>(&mut self, index: &mut I) {
        if let Registration::AttachedRegistered { bounds } = self.registration {
            index.remove(self.id, bounds);
            log::trace!("unregistered {:?}", self.id);
            self.registration = Registration::AttachedUnregistered;
        }
    }

    /// Refile the collider in the index under its current bounds, if it's registered.
    fn update_index<T, I>(&mut self, transform: &T, index: &mut I)
    where
        T: TransformSource + ?Sized,
        I: PhysicsIndex + ?Sized,
    {
        if let Registration::AttachedRegistered { bounds: registered } = self.registration {
            let new_bounds = self.bounds(transform);
            let stored = index.update(self.id, registered, new_bounds, self.physics_layer);
            self.registration = Registration::AttachedRegistered { bounds: stored };
        }
    }

    /// Run a mutation that changes how bounds are derived.
    /// A registered collider is taken out of the index for the duration
    /// so the index never holds bounds from before the change.
    fn reregister_around<T, I>(
        &mut self,
        transform: &T,
        index: &mut I,
        mutate: impl FnOnce(&mut Self),
    ) where
        T: TransformSource + ?Sized,
        I: PhysicsIndex + ?Sized,
    {
        let was_registered = self.is_registered();
        self.unregister_with_physics(index);
        mutate(self);
        if was_registered {
            self.register_with_physics(transform, index);
        }
    }

    //
    // lifecycle callbacks
    //

    /// Called by the owning entity when the collider enters the scene,
    /// either because it was added to an entity in the scene
    /// or because its entity was added to the scene.
    ///
    /// Sizes the collider first if it was created without a size, then registers it.
    pub fn on_added_to_entity<T, I>(
        &mut self,
        transform: &T,
        renderable: Option<&dyn RenderableBoundsSource>,
        index: &mut I,
    ) where
        T: TransformSource + ?Sized,
        I: PhysicsIndex + ?Sized,
    {
        if self.attach(transform, renderable, index) {
            self.register_with_physics(transform, index);
        }
    }

    /// Like [`on_added_to_entity`][Self::on_added_to_entity] for a collider that starts disabled.
    /// The collider is sized and attached but stays out of the index until
    /// [`on_enabled`][Self::on_enabled].
    pub fn on_added_to_entity_disabled<T, I>(
        &mut self,
        transform: &T,
        renderable: Option<&dyn RenderableBoundsSource>,
        index: &mut I,
    ) where
        T: TransformSource + ?Sized,
        I: PhysicsIndex + ?Sized,
    {
        self.attach(transform, renderable, index);
    }

    /// Auto-size if requested and move to `AttachedUnregistered`.
    /// Returns false if the collider was already attached.
    fn attach<T, I>(
        &mut self,
        transform: &T,
        renderable: Option<&dyn RenderableBoundsSource>,
        index: &mut I,
    ) -> bool
    where
        T: TransformSource + ?Sized,
        I: PhysicsIndex + ?Sized,
    {
        if self.is_attached() {
            log::debug!("{:?} was added to an entity while already attached", self.id);
            return false;
        }

        if self.requires_auto_sizing {
            self.requires_auto_sizing = false;
            match self.auto_size(transform, renderable, index) {
                Ok(()) => {}
                Err(err @ ColliderError::MissingRenderable) => log::warn!("{err}"),
                Err(err @ ColliderError::UnsupportedAutoSize(_)) => log::error!("{err}"),
            }
        }

        self.registration = Registration::AttachedUnregistered;
        true
    }

    /// Called by the owning entity when the collider leaves the scene.
    pub fn on_removed_from_entity<I: PhysicsIndex + ?Sized>(&mut self, index: &mut I) {
        self.unregister_with_physics(index);
        self.registration = Registration::Detached;
    }

    /// Called by the owning entity when the collider is enabled.
    pub fn on_enabled<T, I>(&mut self, transform: &T, index: &mut I)
    where
        T: TransformSource + ?Sized,
        I: PhysicsIndex + ?Sized,
    {
        self.register_with_physics(transform, index);
        // the entity may have moved while we were out of the index
        self.is_position_dirty = true;
        self.is_rotation_dirty = true;
    }

    /// Called by the owning entity when the collider is disabled.
    pub fn on_disabled<I: PhysicsIndex + ?Sized>(&mut self, index: &mut I) {
        self.unregister_with_physics(index);
    }

    /// Called by the owning entity whenever its transform changes.
    pub fn on_entity_transform_changed<T, I>(
        &mut self,
        component: TransformComponent,
        transform: &T,
        index: &mut I,
    ) where
        T: TransformSource + ?Sized,
        I: PhysicsIndex + ?Sized,
    {
        match component {
            TransformComponent::Position | TransformComponent::Scale => {
                self.is_position_dirty = true
            }
            TransformComponent::Rotation => self.is_rotation_dirty = true,
        }
        self.update_index(transform, index);
    }

    //
    // configuration that affects bounds
    //

    fn apply_local_offset(&mut self, offset: m::Vec2) {
        self.local_offset = offset;
        self.local_offset_length = offset.mag();
        self.is_position_dirty = true;
    }

    /// Move the collider relative to its entity.
    /// Multiple colliders on one entity can be positioned separately this way.
    pub fn set_local_offset<T, I>(&mut self, offset: m::Vec2, transform: &T, index: &mut I) -> &mut Self
    where
        T: TransformSource + ?Sized,
        I: PhysicsIndex + ?Sized,
    {
        if offset != self.local_offset {
            self.reregister_around(transform, index, |c| c.apply_local_offset(offset));
        }
        self
    }

    /// Choose whether the collider scales and rotates along with its entity.
    pub fn set_scale_rotate_with_transform<T, I>(
        &mut self,
        enabled: bool,
        transform: &T,
        index: &mut I,
    ) -> &mut Self
    where
        T: TransformSource + ?Sized,
        I: PhysicsIndex + ?Sized,
    {
        self.scale_rotate_with_transform = enabled;
        self.is_position_dirty = true;
        self.is_rotation_dirty = true;
        self.update_index(transform, index);
        self
    }

    /// Move the collider to different layers.
    pub fn set_physics_layer<T, I>(
        &mut self,
        layer: CollisionLayers,
        transform: &T,
        index: &mut I,
    ) -> &mut Self
    where
        T: TransformSource + ?Sized,
        I: PhysicsIndex + ?Sized,
    {
        if layer != self.physics_layer {
            self.reregister_around(transform, index, |c| c.physics_layer = layer);
        }
        self
    }

    /// Layers are only interpreted by whoever moves the collider, so no need to touch the index.
    pub fn set_collides_with_layers(&mut self, layers: CollisionLayers) -> &mut Self {
        self.collides_with_layers = layers;
        self
    }

    /// Change the radius of a circle collider. Does nothing to other shapes.
    pub fn set_radius<T, I>(&mut self, radius: f64, transform: &T, index: &mut I) -> &mut Self
    where
        T: TransformSource + ?Sized,
        I: PhysicsIndex + ?Sized,
    {
        if self.shape.radius().map_or(false, |r| r != radius) {
            self.reregister_around(transform, index, |c| {
                c.shape.set_radius(radius);
                c.is_position_dirty = true;
            });
        }
        self
    }

    /// Change the size of a box collider. Does nothing to other shapes.
    pub fn set_size<T, I>(&mut self, width: f64, height: f64, transform: &T, index: &mut I) -> &mut Self
    where
        T: TransformSource + ?Sized,
        I: PhysicsIndex + ?Sized,
    {
        if self.shape.size().map_or(false, |s| s != (width, height)) {
            self.reregister_around(transform, index, |c| {
                c.shape.set_size(width, height);
                c.is_position_dirty = true;
            });
        }
        self
    }

    /// Replace the shape entirely.
    pub fn set_shape<T, I>(&mut self, shape: Shape, transform: &T, index: &mut I) -> &mut Self
    where
        T: TransformSource + ?Sized,
        I: PhysicsIndex + ?Sized,
    {
        self.reregister_around(transform, index, |c| {
            c.shape = shape;
            c.is_position_dirty = true;
            c.is_rotation_dirty = true;
        });
        self
    }

    fn auto_size<T, I>(
        &mut self,
        transform: &T,
        renderable: Option<&dyn RenderableBoundsSource>,
        index: &mut I,
    ) -> Result<(), ColliderError>
    where
        T: TransformSource + ?Sized,
        I: PhysicsIndex + ?Sized,
    {
        let kind = self.shape.kind();
        if !kind.supports_auto_sizing() {
            return Err(ColliderError::UnsupportedAutoSize(kind));
        }
        let render_bounds = renderable.ok_or(ColliderError::MissingRenderable)?.bounds();

        // the transform's scale gets applied again whenever bounds are computed,
        // so the stored size must be unscaled
        let scale = transform.scale();
        let width = render_bounds.width() / scale.x;
        let height = render_bounds.height() / scale.y;
        if kind == ShapeKind::Circle {
            self.shape.set_radius(width.max(height) * 0.5);
        } else {
            self.shape.set_size(width, height);
        }
        self.is_position_dirty = true;

        // taken as-is in world units, so a scaled or rotated entity
        // places the collider away from the renderable's center
        let offset = render_bounds.center() - transform.position();
        self.set_local_offset(offset, transform, index);
        log::debug!(
            "auto-sized {:?} to {width}x{height} at offset {offset:?}",
            self.id
        );
        Ok(())
    }

    //
    // queries
    //

    /// Check whether this collider overlaps another, as both were last placed.
    ///
    /// Placement is refreshed by [`bounds`][Self::bounds] and by transform notifications
    /// while registered. A collider whose entity moved without it recomputing its bounds
    /// is tested where it used to be.
    pub fn overlaps(&self, other: &Collider) -> bool {
        self.shape.overlaps(&other.shape)
    }

    /// Check whether this collider would hit another if its entity was moved by `motion`.
    ///
    /// The entity's transform is moved for the duration of the test and put back
    /// afterwards no matter what happens, including a panic during the test.
    /// The collider's cached bounds and registration are not touched.
    /// `other` is tested as it was last placed, like in [`overlaps`][Self::overlaps].
    pub fn collides_with<T: TransformSource + ?Sized>(
        &self,
        transform: &mut T,
        other: &Collider,
        motion: m::Vec2,
    ) -> Option<CollisionResult> {
        let displaced = DisplacedTransform::new(transform, motion);
        let moved_shape = self.shape.placed_at(&self.shape_pose(displaced.get()));
        let contact = moved_shape.contact(other.shape.world())?;
        Some(CollisionResult::new(other.id, contact))
    }
}

/// Moves a transform for as long as it's alive
/// and puts it back where it was when dropped.
struct DisplacedTransform<'a, T: TransformSource + ?Sized> {
    transform: &'a mut T,
    original: m::Vec2,
}

impl<'a, T: TransformSource + ?Sized> DisplacedTransform<'a, T> {
    fn new(transform: &'a mut T, motion: m::Vec2) -> Self {
        let original = transform.position();
        transform.set_position(original + motion);
        Self {
            transform,
            original,
        }
    }

    #[inline]
    fn get(&self) -> &T {
        &*self.transform
    }
}

impl<'a, T: TransformSource + ?Sized> Drop for DisplacedTransform<'a, T> {
    fn drop(&mut self) {
        self.transform.set_position(self.original);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        math::Angle,
        physics::index::testing::{IndexCall, RecordingIndex},
        Transform,
    };
    use std::f64::consts::PI;

    fn approx_eq(a: m::Vec2, b: m::Vec2) -> bool {
        (a - b).mag() < 1e-9
    }

    fn at(x: f64, y: f64) -> Transform {
        Transform::new().with_position([x, y])
    }

    #[test]
    fn registration_is_idempotent() {
        let tr = Transform::new();
        let mut index = RecordingIndex::new();
        let mut coll = Collider::new_circle(1.0);

        // nothing to unregister yet, and can't register while detached
        coll.on_disabled(&mut index);
        coll.register_with_physics(&tr, &mut index);
        assert!(index.calls.is_empty());

        coll.on_added_to_entity(&tr, None, &mut index);
        coll.on_enabled(&tr, &mut index);
        coll.on_enabled(&tr, &mut index);
        assert_eq!(index.adds(), 1);
        assert!(coll.is_registered());

        coll.on_disabled(&mut index);
        coll.on_disabled(&mut index);
        assert_eq!(index.removes(), 1);
        assert_eq!(coll.registration(), Registration::AttachedUnregistered);

        coll.on_enabled(&tr, &mut index);
        coll.on_added_to_entity(&tr, None, &mut index);
        coll.on_removed_from_entity(&mut index);
        coll.on_removed_from_entity(&mut index);
        assert_eq!(coll.registration(), Registration::Detached);

        assert_eq!(index.adds(), 2);
        assert_eq!(index.removes(), 2);
        index.assert_alternating();
        assert!(index.inner.is_empty());
    }

    #[test]
    fn bounds_follow_transform_notifications() {
        let mut tr = Transform::new();
        let mut index = RecordingIndex::new();
        let mut coll = Collider::new_rect(2.0, 4.0);
        coll.on_added_to_entity(&tr, None, &mut index);
        assert_eq!(
            index.inner.registered_bounds(coll.id()),
            Some(AABB::from_center_size(m::Vec2::zero(), 2.0, 4.0))
        );

        tr.position = m::Vec2::new(10.0, 0.0);
        coll.on_entity_transform_changed(TransformComponent::Position, &tr, &mut index);
        let expected = AABB::from_center_size(m::Vec2::new(10.0, 0.0), 2.0, 4.0);
        assert_eq!(coll.bounds(&tr), expected);
        assert_eq!(coll.registered_bounds(), Some(expected));
        assert_eq!(index.inner.registered_bounds(coll.id()), Some(expected));

        tr.rotation = Angle::Deg(90.0);
        coll.on_entity_transform_changed(TransformComponent::Rotation, &tr, &mut index);
        let rotated = coll.bounds(&tr);
        assert!((rotated.width() - 4.0).abs() < 1e-9);
        assert!((rotated.height() - 2.0).abs() < 1e-9);

        tr.scale = m::Vec2::new(2.0, 2.0);
        coll.on_entity_transform_changed(TransformComponent::Scale, &tr, &mut index);
        let scaled = coll.bounds(&tr);
        assert!((scaled.width() - 8.0).abs() < 1e-9);
        assert_eq!(index.inner.registered_bounds(coll.id()), Some(scaled));

        index.assert_alternating();
    }

    #[test]
    fn bounds_recomputed_only_when_dirty() {
        let mut tr = Transform::new();
        let mut coll = Collider::new_circle(1.0);
        assert!(coll.is_position_dirty() && coll.is_rotation_dirty());
        let first = coll.bounds(&tr);
        assert!(!coll.is_position_dirty() && !coll.is_rotation_dirty());

        // moving without telling the collider leaves the cache alone
        tr.position = m::Vec2::new(5.0, 5.0);
        assert_eq!(coll.bounds(&tr), first);

        let mut index = RecordingIndex::new();
        coll.on_entity_transform_changed(TransformComponent::Position, &tr, &mut index);
        // not registered, so the index hears nothing but the cache is stale
        assert!(index.calls.is_empty());
        assert!(coll.is_position_dirty());
        assert_eq!(
            coll.bounds(&tr),
            AABB::from_center_size(m::Vec2::new(5.0, 5.0), 2.0, 2.0)
        );
    }

    #[test]
    fn removal_uses_registered_bounds() {
        let mut tr = Transform::new();
        let mut index = RecordingIndex::new();
        let mut coll = Collider::new_square(1.0);
        coll.on_added_to_entity(&tr, None, &mut index);
        let registered = coll.registered_bounds().unwrap();

        // the entity moves without a notification, then the collider leaves
        tr.position = m::Vec2::new(100.0, 0.0);
        coll.on_enabled(&tr, &mut index);
        coll.on_removed_from_entity(&mut index);
        assert_eq!(
            index.calls.last(),
            Some(&IndexCall::Remove(coll.id(), registered))
        );
        assert!(index.inner.is_empty());
    }

    #[test]
    fn enabling_marks_bounds_dirty() {
        let tr = Transform::new();
        let mut index = RecordingIndex::new();
        let mut coll = Collider::new_circle(1.0);
        coll.on_added_to_entity(&tr, None, &mut index);
        coll.bounds(&tr);
        coll.on_disabled(&mut index);
        coll.on_enabled(&tr, &mut index);
        assert!(coll.is_registered());
        assert!(coll.is_position_dirty() && coll.is_rotation_dirty());
    }

    #[test]
    fn offset_change_reregisters_once() {
        let tr = Transform::new();
        let mut index = RecordingIndex::new();
        let mut coll = Collider::new_square(2.0);
        coll.on_added_to_entity(&tr, None, &mut index);
        let old_bounds = coll.registered_bounds().unwrap();
        index.calls.clear();

        coll.set_local_offset(m::Vec2::new(3.0, 4.0), &tr, &mut index);
        let new_bounds = AABB::from_center_size(m::Vec2::new(3.0, 4.0), 2.0, 2.0);
        assert_eq!(
            index.calls,
            vec![
                IndexCall::Remove(coll.id(), old_bounds),
                IndexCall::Add(coll.id(), new_bounds),
            ]
        );
        assert_eq!(index.inner.registered_bounds(coll.id()), Some(new_bounds));
        assert_eq!(coll.local_offset_length(), 5.0);

        // same offset again is not a change
        coll.set_local_offset(m::Vec2::new(3.0, 4.0), &tr, &mut index);
        assert_eq!(index.calls.len(), 2);
    }

    #[test]
    fn offset_change_keeps_disabled_collider_out_of_index() {
        let tr = Transform::new();
        let mut index = RecordingIndex::new();
        let mut coll = Collider::new_square(2.0);
        coll.on_added_to_entity(&tr, None, &mut index);
        coll.on_disabled(&mut index);
        coll.set_local_offset(m::Vec2::new(1.0, 0.0), &tr, &mut index)
            .set_radius(5.0, &tr, &mut index)
            .set_size(3.0, 3.0, &tr, &mut index);
        assert!(!coll.is_registered());
        assert_eq!(index.adds(), 1);
        assert_eq!(
            coll.bounds(&tr),
            AABB::from_center_size(m::Vec2::new(1.0, 0.0), 3.0, 3.0)
        );
    }

    #[test]
    fn extent_and_layer_changes_reregister() {
        let tr = Transform::new();
        let mut index = RecordingIndex::new();
        let mut coll = Collider::new_circle(1.0);
        coll.on_added_to_entity(&tr, None, &mut index);

        coll.set_radius(3.0, &tr, &mut index);
        assert_eq!(
            index.inner.registered_bounds(coll.id()),
            Some(AABB::from_center_size(m::Vec2::zero(), 6.0, 6.0))
        );
        coll.set_physics_layer(CollisionLayers::layer(4), &tr, &mut index);
        assert_eq!(
            index.inner.registered_layer(coll.id()),
            Some(CollisionLayers::layer(4))
        );
        coll.set_shape(Shape::rect(1.0, 2.0), &tr, &mut index);
        assert_eq!(
            index.inner.registered_bounds(coll.id()),
            Some(AABB::from_center_size(m::Vec2::zero(), 1.0, 2.0))
        );
        assert_eq!(index.adds(), 4);
        assert_eq!(index.removes(), 3);
        index.assert_alternating();
    }

    #[test]
    fn builders_leave_attached_collider_alone() {
        let tr = Transform::new();
        let mut index = RecordingIndex::new();
        let mut coll = Collider::new_square(2.0);
        coll.on_added_to_entity(&tr, None, &mut index);
        let id = coll.id();

        let mut coll = coll
            .with_local_offset(m::Vec2::new(10.0, 0.0))
            .with_physics_layer(CollisionLayers::layer(5))
            .with_scale_rotate_with_transform(false);
        assert_eq!(coll.local_offset(), m::Vec2::zero());
        assert_eq!(coll.physics_layer(), CollisionLayers::DEFAULT);
        assert!(coll.scale_rotate_with_transform());
        assert_eq!(index.inner.registered_bounds(id), Some(coll.bounds(&tr)));
        assert_eq!(index.inner.registered_layer(id), Some(coll.physics_layer()));
        assert_eq!(index.calls.len(), 1);

        // detached again, builders work as usual
        coll.on_removed_from_entity(&mut index);
        let coll = coll.with_physics_layer(CollisionLayers::layer(5));
        assert_eq!(coll.physics_layer(), CollisionLayers::layer(5));
    }

    #[test]
    fn attaching_disabled_does_not_touch_index() {
        let render_bounds = AABB::from_center_size(m::Vec2::new(2.0, 0.0), 6.0, 6.0);
        let tr = Transform::new();
        let mut index = RecordingIndex::new();
        let mut coll = Collider::new_auto_circle();
        coll.on_added_to_entity_disabled(&tr, Some(&render_bounds), &mut index);
        assert!(index.calls.is_empty());
        assert_eq!(coll.registration(), Registration::AttachedUnregistered);
        assert_eq!(coll.shape().radius(), Some(3.0));

        coll.on_enabled(&tr, &mut index);
        assert_eq!(
            index.calls,
            vec![IndexCall::Add(
                coll.id(),
                AABB::from_center_size(m::Vec2::new(2.0, 0.0), 6.0, 6.0)
            )]
        );
    }

    #[test]
    fn overlaps_uses_last_placement() {
        let mut tr = Transform::new();
        let mut index = RecordingIndex::new();
        let mut a = Collider::new_circle(1.0);
        let mut b = Collider::new_circle(1.0);
        a.on_added_to_entity(&tr, None, &mut index);
        b.on_added_to_entity(&tr, None, &mut index);
        b.on_disabled(&mut index);

        // b's entity moves away without b refreshing its placement
        tr.position = m::Vec2::new(10.0, 0.0);
        b.on_entity_transform_changed(TransformComponent::Position, &tr, &mut index);
        assert!(b.is_position_dirty());
        assert!(a.overlaps(&b));

        b.bounds(&tr);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn rotation_suppressed_without_scale_rotate() {
        let tr = Transform::new().with_rotation(Angle::Deg(45.0));
        let coll = Collider::new_square(1.0).with_scale_rotate_with_transform(false);
        assert_eq!(coll.rotation(&tr), 0.0);

        let coll = Collider::new_square(1.0);
        assert!((coll.rotation(&tr) - PI / 4.0).abs() < 1e-12);
    }

    #[test]
    fn toggling_scale_rotate_refreshes_index() {
        let tr = Transform::new().with_scale([2.0, 2.0]);
        let mut index = RecordingIndex::new();
        let mut coll = Collider::new_square(1.0);
        coll.on_added_to_entity(&tr, None, &mut index);
        assert_eq!(index.inner.registered_bounds(coll.id()).unwrap().width(), 2.0);

        coll.set_scale_rotate_with_transform(false, &tr, &mut index);
        assert!(!coll.scale_rotate_with_transform());
        assert_eq!(index.inner.registered_bounds(coll.id()).unwrap().width(), 1.0);
        index.assert_alternating();
    }

    #[test]
    fn absolute_position_adds_unscaled_offset() {
        let tr = at(1.0, 2.0).with_scale([3.0, 3.0]);
        let coll = Collider::new_circle(1.0).with_local_offset(m::Vec2::new(1.0, 0.0));
        assert_eq!(coll.absolute_position(&tr), m::Vec2::new(2.0, 2.0));
    }

    //
    // auto-sizing
    //

    #[test]
    fn auto_sized_circle_uses_larger_side() {
        let render_bounds = AABB::from_center_size(m::Vec2::new(3.0, 1.0), 40.0, 20.0);
        let tr = at(1.0, 1.0);
        let mut index = RecordingIndex::new();
        let mut coll = Collider::new_auto_circle();
        assert!(coll.requires_auto_sizing());
        coll.on_added_to_entity(&tr, Some(&render_bounds), &mut index);

        assert_eq!(coll.shape().radius(), Some(20.0));
        assert_eq!(coll.local_offset(), m::Vec2::new(2.0, 0.0));
        assert!(!coll.requires_auto_sizing());
        // sizing happens before registration, so the index only sees the final shape
        assert_eq!(index.calls.len(), 1);
        assert_eq!(
            index.inner.registered_bounds(coll.id()),
            Some(AABB::from_center_size(m::Vec2::new(3.0, 1.0), 40.0, 40.0))
        );
    }

    #[test]
    fn auto_sizing_divides_by_scale_first() {
        let render_bounds = AABB::from_center_size(m::Vec2::zero(), 40.0, 20.0);
        let tr = Transform::new().with_scale([2.0, 1.0]);
        let mut index = RecordingIndex::new();
        let mut coll = Collider::new_auto_circle();
        coll.on_added_to_entity(&tr, Some(&render_bounds), &mut index);
        // 40/2 x 20/1 is 20x20, so the radius is half of 20
        assert_eq!(coll.shape().radius(), Some(10.0));
        // scaled back up by the larger scale factor when placed
        assert_eq!(coll.bounds(&tr).width(), 40.0);
    }

    #[test]
    fn auto_sized_rect() {
        let render_bounds = AABB::from_center_size(m::Vec2::new(5.0, 5.0), 8.0, 6.0);
        let tr = at(5.0, 4.0).with_scale([2.0, 3.0]);
        let mut index = RecordingIndex::new();
        let mut coll = Collider::new_auto_rect();
        coll.on_added_to_entity(&tr, Some(&render_bounds), &mut index);
        assert_eq!(coll.shape().size(), Some((4.0, 2.0)));
        assert_eq!(coll.local_offset(), m::Vec2::new(0.0, 1.0));
        assert!(coll.is_registered());
        // the offset is in world units but gets scaled like any other offset,
        // so the collider ends up above the renderable's center at y = 5
        assert_eq!(
            coll.bounds(&tr),
            AABB::from_center_size(m::Vec2::new(5.0, 7.0), 8.0, 6.0)
        );
    }

    #[test]
    fn auto_sizing_without_renderable_keeps_default_size() {
        let tr = Transform::new();
        let mut index = RecordingIndex::new();
        let mut coll = Collider::new_auto_circle();
        coll.on_added_to_entity(&tr, None, &mut index);
        assert_eq!(coll.shape().radius(), Some(1.0));
        assert_eq!(coll.local_offset(), m::Vec2::zero());
        assert!(coll.is_registered());
    }

    #[test]
    fn auto_sizing_unsupported_shape_is_not_fatal() {
        let tr = Transform::new();
        let render_bounds = AABB::from_center_size(m::Vec2::new(9.0, 9.0), 40.0, 20.0);
        let mut index = RecordingIndex::new();
        let triangle = Shape::polygon(vec![
            m::Vec2::new(0.0, 1.0),
            m::Vec2::new(-1.0, -1.0),
            m::Vec2::new(1.0, -1.0),
        ])
        .unwrap();
        let mut coll = Collider::new_auto(triangle);
        assert_eq!(
            coll.auto_size(&tr, Some(&render_bounds), &mut index),
            Err(ColliderError::UnsupportedAutoSize(ShapeKind::Polygon))
        );

        coll.on_added_to_entity(&tr, Some(&render_bounds), &mut index);
        assert_eq!(coll.local_offset(), m::Vec2::zero());
        assert!(coll.is_registered());
        assert_eq!(
            index.inner.registered_bounds(coll.id()),
            Some(AABB::from_center_size(m::Vec2::zero(), 2.0, 2.0))
        );
    }

    //
    // queries
    //

    /// Entity at the origin with two colliders on it:
    /// a small circle offset to the right and a box covering that spot.
    fn shared_entity_pair(index: &mut RecordingIndex) -> (Transform, Collider, Collider) {
        let tr = Transform::new();
        let mut a = Collider::new_circle(1.0).with_local_offset(m::Vec2::new(5.0, 0.0));
        let mut b = Collider::new_square(12.0);
        a.on_added_to_entity(&tr, None, index);
        b.on_added_to_entity(&tr, None, index);
        (tr, a, b)
    }

    #[test]
    fn colliders_on_one_entity_collide() {
        let mut index = RecordingIndex::new();
        let (mut tr, a, b) = shared_entity_pair(&mut index);
        let calls_before = index.calls.len();

        let result = a.collides_with(&mut tr, &b, m::Vec2::zero()).unwrap();
        assert_eq!(result.collider, b.id());
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert_eq!(tr.position, m::Vec2::zero());
        assert_eq!(index.calls.len(), calls_before);
    }

    #[test]
    fn speculative_motion_leaves_no_trace() {
        let mut index = RecordingIndex::new();
        let mut tr = Transform::new();
        let mut mover = Collider::new_circle(1.0);
        let wall_tr = at(10.0, 0.0);
        let mut wall = Collider::new_rect(2.0, 10.0);
        mover.on_added_to_entity(&tr, None, &mut index);
        wall.on_added_to_entity(&wall_tr, None, &mut index);
        let registration = mover.registration();
        let bounds = mover.bounds(&tr);
        let calls_before = index.calls.len();

        assert!(mover.collides_with(&mut tr, &wall, m::Vec2::new(2.0, 0.0)).is_none());
        assert_eq!(tr.position, m::Vec2::zero());

        let hit = mover
            .collides_with(&mut tr, &wall, m::Vec2::new(8.5, 0.0))
            .unwrap();
        assert_eq!(tr.position, m::Vec2::zero());
        assert_eq!(hit.collider, wall.id());
        assert!(approx_eq(*hit.normal, m::Vec2::unit_x()));
        assert!((hit.depth - 0.5).abs() < 1e-9);
        assert!(approx_eq(hit.min_translation(), m::Vec2::new(-0.5, 0.0)));

        assert!(!mover.is_position_dirty() && !mover.is_rotation_dirty());
        assert_eq!(mover.registration(), registration);
        assert_eq!(mover.bounds(&tr), bounds);
        assert_eq!(index.calls.len(), calls_before);
        assert!(!mover.overlaps(&wall));
    }

    /// A transform that blows up if it's asked about rotation while displaced.
    struct FragileTransform {
        inner: Transform,
        home: m::Vec2,
    }

    impl TransformSource for FragileTransform {
        fn position(&self) -> m::Vec2 {
            self.inner.position
        }
        fn set_position(&mut self, position: m::Vec2) {
            self.inner.position = position;
        }
        fn rotation(&self) -> f64 {
            assert_eq!(self.inner.position, self.home, "rotation unavailable while moving");
            0.0
        }
        fn scale(&self) -> m::Vec2 {
            self.inner.scale
        }
    }

    #[test]
    fn panicking_query_restores_position() {
        let mut index = RecordingIndex::new();
        let (_, a, b) = shared_entity_pair(&mut index);
        let home = m::Vec2::new(1.0, 1.0);
        let mut tr = FragileTransform {
            inner: at(1.0, 1.0),
            home,
        };

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            a.collides_with(&mut tr, &b, m::Vec2::new(3.0, 0.0))
        }));
        assert!(outcome.is_err());
        assert_eq!(tr.position(), home);
    }
}
