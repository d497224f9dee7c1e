//! Deterministic PRNG for every random decision in the simulation
//!
//! Park-Miller multiplicative congruential generator (multiplier 48271,
//! modulus 2^31 - 1). Integer-only state update, so a seed reproduces the
//! same sequence on every platform.

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Generator modulus (2^31 - 1)
pub const MODULUS: i64 = 2_147_483_647;
const MULTIPLIER: i64 = 48_271;

/// Seeded simulation RNG
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimRng {
    state: i64,
}

impl SimRng {
    /// Create a generator; out-of-range seeds (including ≤ 0) are remapped
    pub fn new(seed: i64) -> Self {
        Self {
            state: remap_seed(seed),
        }
    }

    /// Advance and return a float in [0, 1)
    pub fn next(&mut self) -> f32 {
        let raw = self.advance();
        // Top 24 bits of (raw - 1) keep the result strictly below 1.0 in f32
        ((raw - 1) >> 7) as f32 / (1u32 << 24) as f32
    }

    /// Uniform float in [lo, hi)
    pub fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next()
    }

    /// Uniform angle in [0, τ)
    pub fn angle(&mut self) -> f32 {
        self.next() * std::f32::consts::TAU
    }

    /// Symmetric jitter in [-spread/2, spread/2)
    pub fn jitter(&mut self, spread: f32) -> f32 {
        (self.next() - 0.5) * spread
    }

    /// Current internal state (for hashing/serialization)
    pub fn state(&self) -> i64 {
        self.state
    }

    fn advance(&mut self) -> i64 {
        self.state = (self.state * MULTIPLIER) % MODULUS;
        self.state
    }
}

/// Map any integer seed into the generator's valid state range [1, 2^31 - 2]
pub fn remap_seed(seed: i64) -> i64 {
    if seed > 0 && seed < MODULUS - 1 {
        seed
    } else {
        seed.rem_euclid(MODULUS - 1).max(1)
    }
}

/// Wall-clock derived seed for fresh matches (need not be secret)
pub fn fresh_seed() -> i64 {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(1);
    remap_seed((millis % (MODULUS as u128 - 1)) as i64)
}

impl RngCore for SimRng {
    fn next_u32(&mut self) -> u32 {
        // Each draw carries 31 bits; the second fills the low bit
        let hi = (self.advance() as u32) << 1;
        let lo = (self.advance() as u32) & 1;
        hi | lo
    }

    fn next_u64(&mut self) -> u64 {
        ((self.next_u32() as u64) << 32) | self.next_u32() as u64
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for chunk in dst.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_deterministic() {
        let mut a = SimRng::new(42);
        let mut b = SimRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn test_minimal_standard_reference_value() {
        // The 10000th state from seed 1 is the published check value for
        // the 48271 multiplier.
        let mut rng = SimRng::new(1);
        for _ in 0..10_000 {
            rng.advance();
        }
        assert_eq!(rng.state(), 399_268_537);
    }

    #[test]
    fn test_non_positive_seeds_are_remapped() {
        for seed in [0, -1, -42, i64::MIN, MODULUS, MODULUS - 1, i64::MAX] {
            let state = SimRng::new(seed).state();
            assert!(state >= 1 && state < MODULUS - 1, "seed {seed} -> {state}");
        }
        assert_eq!(SimRng::new(7).state(), 7);
    }

    #[test]
    fn test_rng_core_is_deterministic() {
        let mut a = SimRng::new(99);
        let mut b = SimRng::new(99);
        let mut bytes_a = [0u8; 13];
        let mut bytes_b = [0u8; 13];
        a.fill_bytes(&mut bytes_a);
        b.fill_bytes(&mut bytes_b);
        assert_eq!(bytes_a, bytes_b);
        assert_eq!(a.next_u64(), b.next_u64());
    }

    proptest! {
        #[test]
        fn prop_next_in_unit_interval(seed in any::<i64>()) {
            let mut rng = SimRng::new(seed);
            for _ in 0..64 {
                let v = rng.next();
                prop_assert!((0.0..1.0).contains(&v));
            }
        }

        #[test]
        fn prop_range_respects_bounds(seed in 1i64..1_000_000, lo in -100.0f32..0.0, width in 0.1f32..100.0) {
            let mut rng = SimRng::new(seed);
            let v = rng.range(lo, lo + width);
            prop_assert!(v >= lo && v <= lo + width);
        }
    }
}
