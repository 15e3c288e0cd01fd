use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ---------------------------------------------------------------------------
// Seedable noise generator shared by the saturator and the sensor model
// ---------------------------------------------------------------------------

/// Uniform noise source. Each consumer owns its own stream so a fixed seed
/// reproduces a whole run bit-for-bit.
#[derive(Debug, Clone)]
pub struct NoiseSource {
    rng: StdRng,
}

impl NoiseSource {
    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    /// Draw from U(-1, 1).
    pub fn unit(&mut self) -> f64 {
        self.rng.gen_range(-1.0..=1.0)
    }

    /// Multiplicative perturbation factor `1 + level * U(-1, 1)`.
    ///
    /// A zero level still consumes a draw, keeping the stream aligned
    /// regardless of which channels are noisy.
    pub fn scale(&mut self, level: f64) -> f64 {
        1.0 + level * self.unit()
    }
}
