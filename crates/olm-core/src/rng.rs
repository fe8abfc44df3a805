//! Seeded normal deviates for ensemble population.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// Seeded generator of standard normal deviates.
///
/// Substream seeds hash `(seed, index)` with zero-keyed SipHash-1-3, so a
/// particle drawn from substream `i` does not depend on how many others
/// are drawn.
#[derive(Debug, Clone)]
pub struct RngHandle {
    rng: StdRng,
}

impl RngHandle {
    /// Generator seeded directly with `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generator for substream `index` of `seed`.
    pub fn substream(seed: u64, index: u64) -> Self {
        Self::from_seed(derive_substream_seed(seed, index))
    }

    /// Standard normal deviate.
    pub fn standard_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }
}

/// Seed of substream `index` under `seed`.
pub fn derive_substream_seed(seed: u64, index: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(seed);
    hasher.write_u64(index);
    hasher.finish()
}
