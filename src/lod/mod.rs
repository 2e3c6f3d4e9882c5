//! Level-of-detail selection.
//!
//! A policy maps a patch's bounds and the reference position to an integer
//! detail level. The split/merge edge-triggers only converge if the policy
//! returns the maximum level inside the bounds and never increases with
//! distance; [`DistanceLod`] satisfies both.

use glam::Vec2;

use crate::geometry::Rect;
use crate::TerrainConfig;

pub trait LodPolicy: Send + Sync {
    /// Detail level in `[0, max_level]` for a patch with these bounds.
    fn level(&self, bounds: &Rect, reference: Vec2) -> u32;
}

/// Distance-based LOD curve: maximum inside the bounds, then a falloff
/// shaped by `exponent` out to `view_distance`, where it reaches zero.
#[derive(Clone, Copy, Debug)]
pub struct DistanceLod {
    view_distance: f32,
    max_level: u32,
    exponent: f32,
}

impl DistanceLod {
    pub fn new(view_distance: f32, max_level: u32, exponent: f32) -> Self {
        Self {
            view_distance,
            max_level,
            exponent,
        }
    }

    pub fn from_config(config: &TerrainConfig) -> Self {
        Self::new(
            config.view_distance,
            config.levels_of_detail,
            config.lod_exponent,
        )
    }
}

impl LodPolicy for DistanceLod {
    fn level(&self, bounds: &Rect, reference: Vec2) -> u32 {
        if bounds.contains(reference) {
            return self.max_level;
        }
        let t = 1.0 - (bounds.distance(reference) / self.view_distance).min(1.0);
        (t.powf(self.exponent) * self.max_level as f32).floor() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maximum_inside_bounds() {
        let policy = DistanceLod::new(1024.0, 7, 1.0);
        let bounds = Rect::new(Vec2::ZERO, 64.0);
        assert_eq!(policy.level(&bounds, Vec2::new(10.0, -30.0)), 7);
        assert_eq!(policy.level(&bounds, Vec2::new(32.0, 32.0)), 7);
    }

    #[test]
    fn non_increasing_with_distance() {
        let policy = DistanceLod::new(1024.0, 7, 1.0);
        let bounds = Rect::new(Vec2::ZERO, 64.0);
        let mut last = u32::MAX;
        for step in 0..40 {
            let reference = Vec2::new(40.0 + step as f32 * 50.0, 0.0);
            let level = policy.level(&bounds, reference);
            assert!(level <= last, "level increased with distance");
            last = level;
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn exponent_steepens_the_falloff() {
        let gentle = DistanceLod::new(1024.0, 7, 1.0);
        let steep = DistanceLod::new(1024.0, 7, 2.0);
        let bounds = Rect::new(Vec2::ZERO, 64.0);
        let reference = Vec2::new(500.0, 0.0);
        assert!(steep.level(&bounds, reference) <= gentle.level(&bounds, reference));
    }
}
