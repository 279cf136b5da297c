//! # Shrinking Arena Server
//!
//! Server-authoritative simulation of a tile arena that shrinks under its
//! players: tiles count down while occupied, the outer ring collapses on a
//! timer, and anyone standing on a tile when it falls is moved to a tile
//! that is still safe.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  SHRINKING ARENA SERVER                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Shared primitives                       │
//! │  ├── vec3.rs       - 3D float vector                         │
//! │  ├── rng.rs        - Seeded Xorshift128+ PRNG                │
//! │  └── hash.rs       - Snapshot hashing                        │
//! │                                                              │
//! │  arena/            - Arena simulation (single writer)        │
//! │  ├── config.rs     - Tunables, JSON loading                  │
//! │  ├── world.rs      - Occupant ids, overlaps, entity lookup   │
//! │  ├── tile.rs       - Tile countdown and lifecycle            │
//! │  ├── fall.rs       - Timed fall and relocation               │
//! │  ├── grid.rs       - Ring collapse, safe-tile queries        │
//! │  ├── tick.rs       - Authoritative tick                      │
//! │  ├── events.rs     - Lifecycle events                        │
//! │  ├── replication.rs- Observer views and snapshots            │
//! │  └── wobble.rs     - Countdown shake for observers           │
//! │                                                              │
//! │  server/           - Async runtime (non-deterministic)       │
//! │  └── runtime.rs    - Tick loop, overlap queue, broadcast     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! Given the same config (including `rng_seed`), the same overlap events
//! in the same ticks and the same `dt`, the arena produces identical
//! snapshots:
//! - Tiles iterate in registration order
//! - Occupant sets are `BTreeSet`s
//! - The safe-tile choice comes from the grid's own seeded RNG
//! - No wall-clock reads inside `arena/`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod arena;
pub mod server;

// Re-export commonly used types
pub use crate::core::rng::DeterministicRng;
pub use crate::core::vec3::Vec3;
pub use crate::arena::config::ArenaConfig;
pub use crate::arena::grid::ArenaGrid;
pub use crate::arena::tile::{Tile, TileId, TileLifecycle};
pub use crate::arena::world::{OccupantId, OverlapEvent, WorldDirectory};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default server tick rate (Hz)
pub const TICK_RATE: u32 = 60;
