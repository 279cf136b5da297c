//! Snapshot Hashing
//!
//! Deterministic SHA-256 digest of the replicated arena projection.
//! Observers recompute it from the views they received to detect a
//! divergent or truncated snapshot.

use sha2::{Sha256, Digest};
use super::vec3::Vec3;

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for replicated arena state.
///
/// Order of updates is part of the format.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for an arena snapshot.
    pub fn for_arena_snapshot() -> Self {
        Self::new(b"SHRINKING_ARENA_SNAPSHOT_V1")
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an f32 by bit pattern.
    ///
    /// `-0.0` is folded into `0.0` so a countdown clamped from either side
    /// hashes the same.
    #[inline]
    pub fn update_f32(&mut self, value: f32) {
        let value = if value == 0.0 { 0.0 } else { value };
        self.hasher.update(value.to_bits().to_le_bytes());
    }

    /// Update with a Vec3.
    #[inline]
    pub fn update_vec3(&mut self, value: Vec3) {
        self.update_f32(value.x);
        self.update_f32(value.y);
        self.update_f32(value.z);
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}
