//! Server runtime (non-deterministic).
//!
//! Owns the clock and the channels around the deterministic arena.

pub mod runtime;

pub use runtime::{ArenaHandle, ArenaServer, ServerConfig, ServerError};
