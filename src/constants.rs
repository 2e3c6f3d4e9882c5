//! Tuning constants shared across the crate.
//!
//! Everything here is a default; the effective values travel in
//! [`TerrainConfig`](crate::TerrainConfig).

/// Default horizontal extent of the root node (and the distance at which
/// the LOD curve bottoms out).
pub const DEFAULT_VIEW_DISTANCE: f32 = 1024.0;

/// Default number of mesh detail levels below each spatial node.
pub const DEFAULT_LEVELS_OF_DETAIL: u32 = 7;

/// Default side-length floor below which spatial nodes stop splitting.
pub const DEFAULT_MIN_NODE_SIZE: f32 = 4.0;

/// Hard cap on `levels_of_detail`. Beyond this the patch grid spacing
/// approaches f32 resolution and position-keyed corner identity breaks.
pub const MAX_LEVELS: u32 = 24;

/// A spatial node only splits once its mesh subtree is deeper than this.
/// Guards a freshly created node against immediately re-splitting.
pub const NODE_SPLIT_MESH_DEPTH: u32 = 3;

/// Upper bound on root-growing steps in a single tick.
pub const MAX_GROW_STEPS: u32 = 16;

/// Default LOD falloff exponent. Detail drops steeply with distance so
/// the finest levels stay confined to the viewer's immediate surroundings.
pub const DEFAULT_LOD_EXPONENT: f32 = 6.0;

/// Defaults for the fractal height field (8 octaves over simplex noise).
pub const DEFAULT_NOISE_OCTAVES: u32 = 8;
pub const DEFAULT_NOISE_FREQUENCY: f32 = 1.0 / 2048.0;
pub const DEFAULT_NOISE_AMPLITUDE: f32 = 150.0;
pub const DEFAULT_NOISE_LACUNARITY: f32 = 3.8729833;
