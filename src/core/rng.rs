//! Deterministic Random Number Generator
//!
//! Xorshift128+ seeded through SplitMix64. The arena only needs uniform
//! index selection (safe-tile choice), but it must replay identically from
//! the match seed, so the generator is owned by the grid rather than pulled
//! from thread-local entropy.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

/// Deterministic PRNG using the Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use shrinking_arena::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Xorshift is stuck at zero forever if both words are zero
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Uniform index in `[0, len)`; `None` when `len == 0`.
    ///
    /// Uses Lemire's widening multiply so small ranges carry no modulo bias
    /// worth measuring.
    #[inline]
    pub fn next_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let hi = ((self.next_u64() as u128 * len as u128) >> 64) as usize;
        Some(hi)
    }

    /// Select a random element from a slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        self.next_index(slice.len()).map(|idx| &slice[idx])
    }
}

/// SplitMix64 step for seed initialization.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive an arena seed from the match id and the registered tile count.
///
/// Both inputs are fixed before the first tick, so every observer holding
/// them can reproduce the relocation choices of the server.
pub fn derive_arena_seed(match_id: &[u8; 16], tile_count: usize) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(b"SHRINKING_ARENA_SEED_V1");
    hasher.update(match_id);
    hasher.update((tile_count as u64).to_le_bytes());
    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================
