//! Adaptive level-of-detail terrain meshing around a moving viewpoint.
//!
//! The world is a quadtree of square mesh patches. Patches near the
//! reference point subdivide, distant ones fold back, and vertices on the
//! boundary between coarse and fine patches are stitched through shared,
//! reference-counted corner vertices so the surface never cracks. Above
//! the patches sits a tree of spatial nodes that keeps triangle batches
//! bounded and doubles the world outward when the viewer walks off the
//! edge.
//!
//! ```no_run
//! use glam::Vec2;
//! use relief::{Terrain, TerrainConfig};
//!
//! let mut terrain = Terrain::with_defaults(TerrainConfig::default())?;
//! terrain.update(Vec2::new(10.0, -40.0));
//! let mesh = terrain.mesh();
//! println!("{} triangles", mesh.triangle_count());
//! # Ok::<(), relief::TerrainError>(())
//! ```
//!
//! Heights come from a pluggable [`HeightField`] (a fractal simplex field
//! by default), detail selection from a pluggable [`LodPolicy`], and
//! renderer-side resources from an optional [`VisualPool`].

pub mod constants;
pub mod error;
pub mod geometry;
pub mod heightfield;
pub mod lod;
pub mod mesh;
pub mod pool;
pub mod tree;

use serde::{Deserialize, Serialize};

pub use error::{TerrainError, TerrainResult};
pub use geometry::{MeshBuffers, Quadrant, Rect, Triangle, TriangleBuffer};
pub use heightfield::{FractalHeightField, HeightField};
pub use lod::{DistanceLod, LodPolicy};
pub use mesh::{Corner, CornerId};
pub use pool::{NullVisualPool, RecyclingPool, VisualHandle, VisualPool};
pub use tree::{NodeId, Terrain, TerrainStats, UpdateStats};

use glam::Vec2;

/// Terrain tuning parameters. All fields have working defaults, so partial
/// TOML configs deserialize cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Side length of the initial root node; detail fades to zero at this
    /// distance from the reference point.
    pub view_distance: f32,
    /// Mesh subdivision levels below each spatial node.
    pub levels_of_detail: u32,
    /// Spatial nodes stop splitting below this side length.
    pub min_node_size: f32,
    /// Shape of the distance-to-detail falloff curve. 1.0 is linear;
    /// larger values concentrate detail near the viewer.
    pub lod_exponent: f32,
    /// World-space center of the initial root node. Mesh vertices are
    /// emitted relative to this point.
    pub origin: Vec2,
    /// Seed for the default fractal height field.
    pub seed: u32,
    pub noise_octaves: u32,
    pub noise_frequency: f32,
    pub noise_amplitude: f32,
    pub noise_lacunarity: f32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            view_distance: constants::DEFAULT_VIEW_DISTANCE,
            levels_of_detail: constants::DEFAULT_LEVELS_OF_DETAIL,
            min_node_size: constants::DEFAULT_MIN_NODE_SIZE,
            lod_exponent: constants::DEFAULT_LOD_EXPONENT,
            origin: Vec2::ZERO,
            seed: 0,
            noise_octaves: constants::DEFAULT_NOISE_OCTAVES,
            noise_frequency: constants::DEFAULT_NOISE_FREQUENCY,
            noise_amplitude: constants::DEFAULT_NOISE_AMPLITUDE,
            noise_lacunarity: constants::DEFAULT_NOISE_LACUNARITY,
        }
    }
}

impl TerrainConfig {
    /// Checks every parameter before the terrain is built. Corner identity
    /// relies on subdivision coordinates being exact in f32, which bounds
    /// how fine the grid may get relative to the world size.
    pub fn validate(&self) -> TerrainResult<()> {
        fn fail(field: &'static str, value: String, reason: &'static str) -> TerrainResult<()> {
            Err(TerrainError::InvalidConfig {
                field,
                value,
                reason,
            })
        }

        if !(self.view_distance.is_finite() && self.view_distance > 0.0) {
            return fail(
                "view_distance",
                self.view_distance.to_string(),
                "must be positive and finite",
            );
        }
        if !(self.min_node_size.is_finite() && self.min_node_size > 0.0) {
            return fail(
                "min_node_size",
                self.min_node_size.to_string(),
                "must be positive and finite",
            );
        }
        if self.min_node_size > self.view_distance {
            return fail(
                "min_node_size",
                self.min_node_size.to_string(),
                "must not exceed view_distance",
            );
        }
        if self.view_distance / self.min_node_size > (1u32 << 20) as f32 {
            return fail(
                "min_node_size",
                self.min_node_size.to_string(),
                "grid too fine relative to view_distance for exact f32 corner positions",
            );
        }
        if self.levels_of_detail == 0 || self.levels_of_detail > constants::MAX_LEVELS {
            return fail(
                "levels_of_detail",
                self.levels_of_detail.to_string(),
                "must be between 1 and MAX_LEVELS",
            );
        }
        if !(self.lod_exponent.is_finite() && self.lod_exponent > 0.0) {
            return fail(
                "lod_exponent",
                self.lod_exponent.to_string(),
                "must be positive and finite",
            );
        }
        if !self.origin.is_finite() {
            return fail("origin", format!("{:?}", self.origin), "must be finite");
        }
        if self.noise_octaves == 0 || self.noise_octaves > 32 {
            return fail(
                "noise_octaves",
                self.noise_octaves.to_string(),
                "must be between 1 and 32",
            );
        }
        if !(self.noise_frequency.is_finite() && self.noise_frequency > 0.0) {
            return fail(
                "noise_frequency",
                self.noise_frequency.to_string(),
                "must be positive and finite",
            );
        }
        if !self.noise_amplitude.is_finite() {
            return fail(
                "noise_amplitude",
                self.noise_amplitude.to_string(),
                "must be finite",
            );
        }
        if !(self.noise_lacunarity.is_finite() && self.noise_lacunarity > 1.0) {
            return fail(
                "noise_lacunarity",
                self.noise_lacunarity.to_string(),
                "must be greater than 1",
            );
        }
        Ok(())
    }

    /// Parses and validates a TOML config. Missing fields fall back to
    /// defaults.
    pub fn from_toml_str(text: &str) -> TerrainResult<Self> {
        let config: Self = toml::from_str(text).map_err(|err| TerrainError::InvalidConfig {
            field: "config",
            value: err.to_string(),
            reason: "TOML parse error",
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TerrainConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_sizes() {
        let config = TerrainConfig {
            view_distance: -1.0,
            ..TerrainConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TerrainConfig {
            min_node_size: 4096.0,
            view_distance: 1024.0,
            ..TerrainConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TerrainConfig {
            levels_of_detail: 0,
            ..TerrainConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = TerrainConfig::from_toml_str(
            "view_distance = 512.0\nlevels_of_detail = 5\nseed = 42\n",
        )
        .expect("parses");
        assert_eq!(config.view_distance, 512.0);
        assert_eq!(config.levels_of_detail, 5);
        assert_eq!(config.seed, 42);
        assert_eq!(config.min_node_size, constants::DEFAULT_MIN_NODE_SIZE);
    }

    #[test]
    fn toml_garbage_is_an_error() {
        assert!(TerrainConfig::from_toml_str("view_distance = \"wide\"").is_err());
    }
}
