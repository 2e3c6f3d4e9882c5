//! Error types for the terrain core.
//!
//! This crate is a deterministic geometry generator with no I/O on the hot
//! path, so the only runtime errors are configuration problems caught at
//! startup and contract violations at the height-field boundary.

use thiserror::Error;

/// Crate-wide result type.
pub type TerrainResult<T> = Result<T, TerrainError>;

#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("invalid config: {field} = {value} ({reason})")]
    InvalidConfig {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("height field returned a non-finite sample at ({x}, {z})")]
    NonFiniteHeight { x: f32, z: f32 },
}
