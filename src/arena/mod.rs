//! Arena simulation.
//!
//! Tiles, their countdowns and lifecycle, the grid that sweeps them and the
//! per-tick pipeline tying them together. Nothing in here touches the
//! network or a clock; time only enters through `dt`.

pub mod config;
pub mod world;
pub mod tile;
pub mod fall;
pub mod wobble;
pub mod grid;
pub mod events;
pub mod replication;
pub mod tick;

pub use config::{ArenaConfig, ConfigError};
pub use world::{EntityDirectory, OccupantId, OverlapEvent, OverlapKind, WorldDirectory};
pub use tile::{FallCause, Tile, TileId, TileLifecycle};
pub use fall::{FallPhase, FallSequencer, Relocation, RelocationOutcome};
pub use grid::ArenaGrid;
pub use events::{ArenaEvent, ArenaEventData};
pub use replication::{ArenaSnapshot, SnapshotError, TileView};
pub use tick::{tick, TickResult};
