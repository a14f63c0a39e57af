/// A bitmask of collision layers.
///
/// A collider is a member of the layers in its `physics_layer` mask
/// and considers the layers in its `collides_with_layers` mask when moving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct CollisionLayers(pub u32);

impl CollisionLayers {
    /// Every layer.
    pub const ALL: Self = Self(u32::MAX);
    /// No layers at all.
    pub const NONE: Self = Self(0);
    /// Layer 0, which colliders are members of unless told otherwise.
    pub const DEFAULT: Self = Self(1);

    /// Number of distinct layers a mask can hold.
    pub const COUNT: u32 = u32::BITS;

    /// A mask containing only the given layer.
    ///
    /// Panics if `idx` is 32 or more, here and in the other methods taking a layer index.
    #[inline]
    pub const fn layer(idx: u32) -> Self {
        Self(bit(idx))
    }

    /// Add a layer to the mask.
    #[inline]
    pub const fn with(self, idx: u32) -> Self {
        Self(self.0 | bit(idx))
    }

    /// Remove a layer from the mask.
    #[inline]
    pub const fn without(self, idx: u32) -> Self {
        Self(self.0 & !bit(idx))
    }

    /// Check whether a single layer is set.
    #[inline]
    pub const fn contains(self, idx: u32) -> bool {
        self.0 & bit(idx) != 0
    }

    /// Check whether the masks share any layer.
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

#[inline]
const fn bit(idx: u32) -> u32 {
    assert!(idx < CollisionLayers::COUNT, "collision layer index out of range");
    1 << idx
}

impl Default for CollisionLayers {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::ops::BitOr for CollisionLayers {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
