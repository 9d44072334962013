//! Random streams of a single engine.
//!
//! Two independent generators: a high-quality one for acceptance tests, displacement
//! magnitudes and fresh coordinates, and a cheap one for picking indices.

use nalgebra::Vector3;
use rand::rngs::{SmallRng, StdRng};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};

use crate::geometry::fold_position;

/// Mixed into the seed of the index stream so both streams differ for the same seed.
const INDEX_STREAM_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone)]
pub struct RandomSource {
    precise: StdRng,
    cheap: SmallRng,
    unit: Uniform<f64>,
}

impl RandomSource {
    /// Reproducible streams for a given seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            precise: StdRng::seed_from_u64(seed),
            cheap: SmallRng::seed_from_u64(seed ^ INDEX_STREAM_SALT),
            unit: Uniform::new(0.0, 1.0),
        }
    }

    /// Streams seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            precise: StdRng::from_entropy(),
            cheap: SmallRng::from_entropy(),
            unit: Uniform::new(0.0, 1.0),
        }
    }

    /// Uniform in `[0, 1)`.
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        self.unit.sample(&mut self.precise)
    }

    /// Uniform in `[0, size)`. A product that rounds up to `size` folds back to 0.
    #[inline]
    pub fn uniform_in(&mut self, size: f64) -> f64 {
        fold_position(self.uniform() * size, size)
    }

    /// Uniform in the open interval `(-1, 1)`.
    #[inline]
    pub fn symmetric(&mut self) -> f64 {
        loop {
            let value = 2.0 * self.uniform() - 1.0;
            if value > -1.0 {
                return value;
            }
        }
    }

    /// Uniform index in `[0, n)`.
    #[inline]
    pub fn index(&mut self, n: usize) -> usize {
        debug_assert!(n > 0, "cannot pick an index out of an empty range");
        self.cheap.gen_range(0..n)
    }

    /// Uniform point of the cube `[0, width)³`.
    pub fn point_in_box(&mut self, width: f64) -> Vector3<f64> {
        Vector3::new(self.uniform_in(width), self.uniform_in(width), self.uniform_in(width))
    }

    /// Displacement with every component uniform in `(-scale, scale)`.
    pub fn displacement(&mut self, scale: f64) -> Vector3<f64> {
        Vector3::new(self.symmetric(), self.symmetric(), self.symmetric()) * scale
    }
}
