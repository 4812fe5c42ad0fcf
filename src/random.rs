//! Seeded random number generation.
//!
//! Every stochastic component owns its own generator created here, so a fixed
//! seed reproduces a run and worker threads never share generator state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Creates a deterministic generator from a seed.
pub fn create_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Creates a generator from an optional seed, drawing a fresh seed when `None`.
pub fn rng_from_option(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => create_rng(seed),
        None => create_rng(rand::random()),
    }
}

/// Derives a child seed for a sub-run from a parent generator.
pub fn derive_seed<R: Rng>(rng: &mut R) -> u64 {
    rng.random()
}

/// Clamps `p` to `[0, 1]`; non-finite values become 0.
pub fn probability(p: f64) -> f64 {
    if p.is_finite() {
        p.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
