//! Replication Projection
//!
//! Read-only view types published to observers. Only the countdown and tile
//! existence (plus the cosmetic position) leave the server; occupancy sets
//! and fall snapshots never do.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::arena::grid::ArenaGrid;
use crate::arena::tile::TileId;
use crate::core::hash::{StateHash, StateHasher};
use crate::core::vec3::Vec3;

/// Observer-facing copy of one tile.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileView {
    /// Tile identity
    pub id: TileId,
    /// Current position (includes fall offset)
    pub position: Vec3,
    /// Authoritative countdown at capture time
    pub countdown_remaining: f32,
    /// False once the tile has been despawned
    pub spawned: bool,
}

impl TileView {
    /// Countdown rounded up to whole seconds.
    pub fn display_seconds(&self) -> u32 {
        self.countdown_remaining.max(0.0).ceil() as u32
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.id.0);
        hasher.update_vec3(self.position);
        hasher.update_f32(self.countdown_remaining);
        hasher.update_bool(self.spawned);
    }
}

/// Snapshot encode/decode errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// bincode failed.
    #[error("Snapshot codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Decoded views do not match the carried hash.
    #[error("Snapshot hash mismatch")]
    HashMismatch,
}

/// Everything an observer needs for one tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArenaSnapshot {
    /// Server tick the snapshot was taken after
    pub tick: u32,
    /// Every registered tile, registration order
    pub tiles: Vec<TileView>,
    /// Digest of `tick` and `tiles`
    pub state_hash: StateHash,
}

impl ArenaSnapshot {
    /// Capture the current grid state.
    pub fn capture(grid: &ArenaGrid) -> Self {
        let tiles: Vec<TileView> = grid.tiles().map(|t| t.view()).collect();
        let tick = grid.current_tick();
        let state_hash = Self::compute_hash(tick, &tiles);
        Self { tick, tiles, state_hash }
    }

    /// Digest of a tick's views, in the order given.
    pub fn compute_hash(tick: u32, tiles: &[TileView]) -> StateHash {
        let mut hasher = StateHasher::for_arena_snapshot();
        hasher.update_u32(tick);
        hasher.update_u32(tiles.len() as u32);
        for view in tiles {
            view.hash_into(&mut hasher);
        }
        hasher.finalize()
    }

    /// True if the carried hash matches the views.
    pub fn verify(&self) -> bool {
        Self::compute_hash(self.tick, &self.tiles) == self.state_hash
    }

    /// Views of tiles still in the world.
    pub fn spawned(&self) -> impl Iterator<Item = &TileView> {
        self.tiles.iter().filter(|v| v.spawned)
    }

    /// Look up one tile.
    pub fn tile(&self, id: TileId) -> Option<&TileView> {
        self.tiles.iter().find(|v| v.id == id)
    }

    /// Encode for the transport layer.
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode and verify a snapshot received from the transport layer.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self = bincode::deserialize(bytes)?;
        if !snapshot.verify() {
            return Err(SnapshotError::HashMismatch);
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::config::ArenaConfig;
    use crate::arena::world::OccupantId;

    fn grid() -> ArenaGrid {
        ArenaGrid::square(3, 2.0, ArenaConfig::default())
    }

    #[test]
    fn test_capture_lists_every_tile() {
        let g = grid();
        let snap = ArenaSnapshot::capture(&g);
        assert_eq!(snap.tiles.len(), 9);
        assert!(snap.tiles.iter().all(|v| v.spawned && v.countdown_remaining == 15.0));
        assert!(snap.verify());
    }

    #[test]
    fn test_encode_decode() {
        let mut g = grid();
        g.tile_mut(TileId(4)).unwrap().register_occupant(OccupantId(1));
        g.tile_mut(TileId(4)).unwrap().tick(3.5);

        let snap = ArenaSnapshot::capture(&g);
        let bytes = snap.encode().unwrap();
        let decoded = ArenaSnapshot::decode(&bytes).unwrap();

        assert_eq!(decoded, snap);
        assert_eq!(decoded.tile(TileId(4)).unwrap().countdown_remaining, 11.5);
        assert_eq!(decoded.tile(TileId(4)).unwrap().display_seconds(), 12);
    }

    #[test]
    fn test_tampered_snapshot_rejected() {
        let g = grid();
        let mut snap = ArenaSnapshot::capture(&g);
        snap.tiles[0].countdown_remaining = 1.0;
        let bytes = snap.encode().unwrap();
        assert!(matches!(ArenaSnapshot::decode(&bytes), Err(SnapshotError::HashMismatch)));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(ArenaSnapshot::decode(&[1, 2, 3]), Err(SnapshotError::Codec(_))));
    }
}
