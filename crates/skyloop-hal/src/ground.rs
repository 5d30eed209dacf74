//! Ground detection contract used by the landing descent.

use nalgebra::Vector3;

/// Bit mask of collision layers a probe is allowed to hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerMask(pub u32);

impl LayerMask {
    /// Matches every layer.
    pub const ALL: LayerMask = LayerMask(u32::MAX);

    /// Mask containing only `layer` (0-based).
    pub fn single(layer: u8) -> Self {
        LayerMask(1u32.checked_shl(u32::from(layer)).unwrap_or(0))
    }

    /// `true` if any bit is shared with `other`.
    pub fn intersects(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        LayerMask::ALL
    }
}

/// Casts rays straight down into the world's collision geometry.
pub trait GroundProbe: Send + Sync {
    /// Distance from `origin` to the first surface below it on a layer in
    /// `mask`, or `None` when nothing is hit within `max_distance`.
    fn raycast_down(&self, origin: Vector3<f32>, max_distance: f32, mask: LayerMask)
    -> Option<f32>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_layer_masks() {
        assert_eq!(LayerMask::single(0), LayerMask(1));
        assert_eq!(LayerMask::single(3), LayerMask(8));
        assert_eq!(LayerMask::single(40), LayerMask(0));
    }

    #[test]
    fn intersects_checks_shared_bits() {
        assert!(LayerMask::ALL.intersects(LayerMask::single(6)));
        assert!(!LayerMask::single(1).intersects(LayerMask::single(2)));
    }
}
