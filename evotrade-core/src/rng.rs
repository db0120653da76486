//! Deterministic RNG hierarchy.
//!
//! A master seed generates deterministic sub-seeds for each
//! `(stream, generation, index)` tuple. Sub-seeds are derived via BLAKE3 hashing,
//! independently of thread scheduling order, so an optimizer run is identical
//! regardless of worker count.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Stream label for the initial population.
pub const STREAM_INITIAL: &str = "initial";
/// Stream label for offspring mutation in one generation.
pub const STREAM_OFFSPRING: &str = "offspring";
/// Stream label for random immigrants.
pub const STREAM_IMMIGRANT: &str = "immigrant";

/// Deterministic RNG hierarchy.
///
/// Derivation is hash-based, not order-dependent: the same master seed yields
/// the same sub-seed for a tuple no matter which tuples were derived before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    pub fn sub_seed(&self, stream: &str, generation: u64, index: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(stream.as_bytes());
        hasher.update(&generation.to_le_bytes());
        hasher.update(&index.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, stream: &str, generation: u64, index: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(stream, generation, index))
    }
}

/// Seed derived from a label alone (e.g. a ticker symbol).
pub fn seed_from_label(label: &str) -> u64 {
    let hash = blake3::hash(label.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}
