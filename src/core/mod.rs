//! Core primitives.
//!
//! Geometry, seeded randomness and snapshot hashing shared by the arena
//! simulation and the server runtime.

pub mod vec3;
pub mod rng;
pub mod hash;

// Re-export core types
pub use vec3::Vec3;
pub use rng::DeterministicRng;
pub use hash::{StateHash, StateHasher};
