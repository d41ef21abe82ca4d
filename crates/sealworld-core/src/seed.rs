//! Deterministic randomness
//!
//! Every random choice in sealing, attacking and resampling comes from a
//! `ChaCha8Rng` whose seed is derived from the unit seed plus a domain
//! string and purpose-specific parts. Two units never share RNG state, and
//! the same `(seed, domain, parts)` always yields the same stream.

use crate::hash::ContentHasher;
use crate::scope::Seed;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Derives independent RNG streams from a seed
#[derive(Debug, Clone, Copy)]
pub struct SeedStream {
    seed: Seed,
}

impl SeedStream {
    /// Stream family for one seed
    #[inline]
    #[must_use]
    pub const fn new(seed: Seed) -> Self {
        Self { seed }
    }

    /// Seed this family was built from
    #[inline]
    #[must_use]
    pub const fn seed(&self) -> Seed {
        self.seed
    }

    /// 32 bytes of key material for `(domain, parts)`
    #[must_use]
    pub fn material(&self, domain: &str, parts: &[&[u8]]) -> [u8; 32] {
        let mut hasher = ContentHasher::new("sealworld seed stream v1");
        hasher.part(domain.as_bytes());
        hasher.part(&self.seed.value().to_le_bytes());
        for part in parts {
            hasher.part(part);
        }
        *hasher.finish().as_bytes()
    }

    /// Fresh RNG for `(domain, parts)`
    #[must_use]
    pub fn rng(&self, domain: &str, parts: &[&[u8]]) -> ChaCha8Rng {
        ChaCha8Rng::from_seed(self.material(domain, parts))
    }

    /// Seeded permutation of `0..n`
    #[must_use]
    pub fn permutation(&self, domain: &str, parts: &[&[u8]], n: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut self.rng(domain, parts));
        order
    }
}
