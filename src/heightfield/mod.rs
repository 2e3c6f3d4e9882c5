//! Elevation sampling.
//!
//! The mesh core treats elevation as an opaque function of the horizontal
//! position. [`FractalHeightField`] is the stock implementation: a fractal
//! sum of simplex noise, deterministic for a fixed seed.

use glam::Vec2;
use noise::{NoiseFn, OpenSimplex};

use crate::TerrainConfig;

/// Deterministic elevation function. Must be pure: the core caches the
/// result per corner and only re-samples after an explicit reset.
pub trait HeightField: Send + Sync {
    fn height(&self, position: Vec2) -> f32;
}

/// Fractal sum of simplex noise octaves. Frequency is multiplied and
/// amplitude divided by the lacunarity each octave.
pub struct FractalHeightField {
    noise: OpenSimplex,
    octaves: u32,
    base_frequency: f64,
    base_amplitude: f64,
    lacunarity: f64,
}

impl FractalHeightField {
    pub fn new(seed: u32, octaves: u32, frequency: f32, amplitude: f32, lacunarity: f32) -> Self {
        Self {
            noise: OpenSimplex::new(seed),
            octaves,
            base_frequency: frequency as f64,
            base_amplitude: amplitude as f64,
            lacunarity: lacunarity as f64,
        }
    }

    pub fn from_config(config: &TerrainConfig) -> Self {
        Self::new(
            config.seed,
            config.noise_octaves,
            config.noise_frequency,
            config.noise_amplitude,
            config.noise_lacunarity,
        )
    }
}

impl HeightField for FractalHeightField {
    fn height(&self, position: Vec2) -> f32 {
        let mut frequency = self.base_frequency;
        let mut amplitude = self.base_amplitude;
        let gain = 1.0 / self.lacunarity;
        let mut result = 0.0;
        for _ in 0..self.octaves {
            result += self
                .noise
                .get([position.x as f64 * frequency, position.y as f64 * frequency])
                * amplitude;
            frequency *= self.lacunarity;
            amplitude *= gain;
        }
        result as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_a_fixed_seed() {
        let a = FractalHeightField::new(7, 8, 1.0 / 2048.0, 150.0, 3.8729833);
        let b = FractalHeightField::new(7, 8, 1.0 / 2048.0, 150.0, 3.8729833);
        let p = Vec2::new(31.5, -142.25);
        assert_eq!(a.height(p), b.height(p));
        assert_ne!(a.height(p), a.height(Vec2::new(40.0, 9.0)));
    }

    #[test]
    fn samples_stay_finite_and_bounded() {
        let field = FractalHeightField::new(0, 8, 1.0 / 2048.0, 150.0, 3.8729833);
        for i in -8..8 {
            for j in -8..8 {
                let h = field.height(Vec2::new(i as f32 * 97.0, j as f32 * 61.0));
                assert!(h.is_finite());
                // geometric series of octave amplitudes bounds the sum
                assert!(h.abs() < 150.0 * 2.0);
            }
        }
    }
}
