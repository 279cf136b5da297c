//! Arena Events
//!
//! Lifecycle changes produced by a tick, in the order they happened.
//! Despawn of a tile always precedes the relocation events of its
//! occupants.

use serde::{Serialize, Deserialize};

use crate::arena::fall::{Relocation, RelocationOutcome};
use crate::arena::tile::{FallCause, TileId};
use crate::arena::world::OccupantId;
use crate::core::vec3::Vec3;

/// Arena event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ArenaEventData {
    /// Tile entered Falling.
    FallStarted {
        /// Falling tile
        tile: TileId,
        /// What triggered it
        cause: FallCause,
        /// Size of the frozen snapshot
        occupants: u32,
    },

    /// Tile left the world.
    TileDespawned {
        /// Despawned tile
        tile: TileId,
    },

    /// Occupant of a despawned tile was teleported.
    OccupantRelocated {
        /// Relocated occupant
        occupant: OccupantId,
        /// Tile that fell
        from_tile: TileId,
        /// Safe tile it was moved above
        to_tile: TileId,
        /// Where it was placed
        position: Vec3,
    },

    /// Occupant of a despawned tile had nowhere to go.
    OccupantStranded {
        /// Stranded occupant
        occupant: OccupantId,
        /// Tile that fell
        from_tile: TileId,
    },

    /// Occupant of a despawned tile no longer resolves to an entity.
    OccupantUnresolved {
        /// Occupant that no longer resolves
        occupant: OccupantId,
        /// Tile that fell
        from_tile: TileId,
    },

    /// Outer-ring sweep forced these tiles to fall.
    RingCollapsed {
        /// Tiles force-fallen, registration order
        tiles: Vec<TileId>,
    },
}

/// An arena event with the tick it happened on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArenaEvent {
    /// Tick when event occurred
    pub tick: u32,

    /// Event data
    pub data: ArenaEventData,
}

impl ArenaEvent {
    /// Create a new event.
    pub fn new(tick: u32, data: ArenaEventData) -> Self {
        Self { tick, data }
    }

    /// Create fall started event.
    pub fn fall_started(tick: u32, tile: TileId, cause: FallCause, occupants: usize) -> Self {
        Self::new(
            tick,
            ArenaEventData::FallStarted {
                tile,
                cause,
                occupants: occupants as u32,
            },
        )
    }

    /// Create tile despawned event.
    pub fn tile_despawned(tick: u32, tile: TileId) -> Self {
        Self::new(tick, ArenaEventData::TileDespawned { tile })
    }

    /// Create ring collapsed event.
    pub fn ring_collapsed(tick: u32, tiles: Vec<TileId>) -> Self {
        Self::new(tick, ArenaEventData::RingCollapsed { tiles })
    }

    /// Map one relocation outcome to its event.
    pub fn from_relocation(tick: u32, from_tile: TileId, outcome: RelocationOutcome) -> Self {
        let occupant = outcome.occupant;
        let data = match outcome.result {
            Relocation::Moved { tile, position } => ArenaEventData::OccupantRelocated {
                occupant,
                from_tile,
                to_tile: tile,
                position,
            },
            Relocation::Stranded => ArenaEventData::OccupantStranded { occupant, from_tile },
            Relocation::Unresolved => ArenaEventData::OccupantUnresolved { occupant, from_tile },
        };
        Self::new(tick, data)
    }

    /// Tile the event is about, if any.
    pub fn tile(&self) -> Option<TileId> {
        match &self.data {
            ArenaEventData::FallStarted { tile, .. } => Some(*tile),
            ArenaEventData::TileDespawned { tile } => Some(*tile),
            ArenaEventData::OccupantRelocated { from_tile, .. } => Some(*from_tile),
            ArenaEventData::OccupantStranded { from_tile, .. } => Some(*from_tile),
            ArenaEventData::OccupantUnresolved { from_tile, .. } => Some(*from_tile),
            ArenaEventData::RingCollapsed { .. } => None,
        }
    }

    /// Occupant the event is about, if any.
    pub fn occupant(&self) -> Option<OccupantId> {
        match &self.data {
            ArenaEventData::OccupantRelocated { occupant, .. } => Some(*occupant),
            ArenaEventData::OccupantStranded { occupant, .. } => Some(*occupant),
            ArenaEventData::OccupantUnresolved { occupant, .. } => Some(*occupant),
            _ => None,
        }
    }
}
