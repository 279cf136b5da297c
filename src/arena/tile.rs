//! Destructible Tiles
//!
//! One floor cell of the arena: a server-owned countdown that drains while
//! someone stands on it, the set of occupants currently overlapping its
//! trigger volume, and the one-way Active → Falling → Despawned lifecycle.
//!
//! Every mutator is a guarded no-op outside the state it applies to. There
//! is no error channel: a late overlap, a second fall trigger or a tick on
//! a despawned tile simply has no effect.

use std::collections::BTreeSet;
use std::fmt;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::arena::config::{ArenaConfig, FallConfig};
use crate::arena::fall::{FallSequencer, FallStep};
use crate::arena::replication::TileView;
use crate::arena::world::OccupantId;
use crate::core::vec3::Vec3;

/// Stable tile identity, assigned in registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TileId(pub u32);

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tile#{}", self.0)
    }
}

/// Tile lifecycle. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TileLifecycle {
    /// Standing; counts down while occupied.
    Active,
    /// Committed to falling; no way back.
    Falling,
    /// Removed from the world. Terminal.
    Despawned,
}

/// Why a tile started falling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallCause {
    /// Occupancy drained the countdown.
    CountdownExpired,
    /// Forced by the outer-ring sweep.
    RingCollapse,
}

/// One destructible floor cell.
#[derive(Clone, Debug)]
pub struct Tile {
    id: TileId,
    position: Vec3,
    countdown_remaining: f32,
    occupants: BTreeSet<OccupantId>,
    lifecycle: TileLifecycle,
    fall_config: FallConfig,
    fall: Option<FallSequencer>,
}

impl Tile {
    /// Create an Active tile with a full countdown.
    pub fn new(id: TileId, position: Vec3, config: &ArenaConfig) -> Self {
        Self {
            id,
            position,
            countdown_remaining: config.tile.initial_countdown.max(0.0),
            occupants: BTreeSet::new(),
            lifecycle: TileLifecycle::Active,
            fall_config: config.fall.clone(),
            fall: None,
        }
    }

    // -------------------------------------------------------------------------
    // Read-only accessors
    // -------------------------------------------------------------------------

    /// Tile identity.
    #[inline]
    pub fn id(&self) -> TileId {
        self.id
    }

    /// Rest position (where the tile was placed).
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Where the tile currently is, including any fall offset.
    pub fn current_position(&self) -> Vec3 {
        match &self.fall {
            Some(seq) => seq.position(),
            None => self.position,
        }
    }

    /// Authoritative countdown (seconds of occupancy left).
    #[inline]
    pub fn countdown_remaining(&self) -> f32 {
        self.countdown_remaining
    }

    /// Lifecycle state.
    #[inline]
    pub fn lifecycle(&self) -> TileLifecycle {
        self.lifecycle
    }

    /// Active and not falling: eligible as a relocation target.
    #[inline]
    pub fn is_safe(&self) -> bool {
        self.lifecycle == TileLifecycle::Active
    }

    /// Still present in the replicated world.
    #[inline]
    pub fn is_spawned(&self) -> bool {
        self.lifecycle != TileLifecycle::Despawned
    }

    /// Is this occupant tracked on the tile?
    pub fn has_occupant(&self, occupant: OccupantId) -> bool {
        self.occupants.contains(&occupant)
    }

    /// Occupants in id order.
    pub fn occupants(&self) -> impl Iterator<Item = OccupantId> + '_ {
        self.occupants.iter().copied()
    }

    /// Number of tracked occupants.
    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }

    /// Occupants frozen at the start of the fall. `None` unless the tile is
    /// currently Falling.
    pub fn fall_snapshot(&self) -> Option<&[OccupantId]> {
        match (&self.fall, self.lifecycle) {
            (Some(seq), TileLifecycle::Falling) => Some(seq.snapshot()),
            _ => None,
        }
    }

    /// The running fall sequence, if any.
    pub fn fall_sequence(&self) -> Option<&FallSequencer> {
        self.fall.as_ref()
    }

    /// Read-only projection for observers.
    pub fn view(&self) -> TileView {
        TileView {
            id: self.id,
            position: self.current_position(),
            countdown_remaining: self.countdown_remaining,
            spawned: self.is_spawned(),
        }
    }

    // -------------------------------------------------------------------------
    // Occupancy (overlap contract)
    // -------------------------------------------------------------------------

    /// Track an occupant. Ignored unless Active; returns true if added.
    pub fn register_occupant(&mut self, occupant: OccupantId) -> bool {
        if self.lifecycle != TileLifecycle::Active {
            return false;
        }
        self.occupants.insert(occupant)
    }

    /// Stop tracking an occupant, in any state. Returns true if it was
    /// tracked.
    pub fn unregister_occupant(&mut self, occupant: OccupantId) -> bool {
        self.occupants.remove(&occupant)
    }

    // -------------------------------------------------------------------------
    // Server-side mutation
    // -------------------------------------------------------------------------

    /// Drain the countdown by `dt` while occupied.
    ///
    /// Returns the cause if the tile started falling on this tick. A tile
    /// that is Active with an already-empty countdown falls regardless of
    /// occupancy.
    pub fn tick(&mut self, dt: f32) -> Option<FallCause> {
        if self.lifecycle != TileLifecycle::Active {
            return None;
        }

        if self.countdown_remaining <= 0.0 {
            self.countdown_remaining = 0.0;
            return self.begin_fall(FallCause::CountdownExpired);
        }

        if self.occupants.is_empty() {
            return None;
        }

        self.countdown_remaining = (self.countdown_remaining - dt.max(0.0)).max(0.0);

        if self.countdown_remaining <= 0.0 {
            return self.begin_fall(FallCause::CountdownExpired);
        }

        None
    }

    /// Force the tile to fall now, regardless of countdown or occupancy.
    ///
    /// Returns true if this call started the fall.
    pub fn force_fall(&mut self) -> bool {
        if self.lifecycle != TileLifecycle::Active {
            return false;
        }
        self.countdown_remaining = 0.0;
        self.begin_fall(FallCause::RingCollapse).is_some()
    }

    /// Advance the fall sequence by `dt`.
    ///
    /// On the step the sequence completes, the tile is despawned (its
    /// occupancy cleared) and the frozen snapshot is handed back for
    /// relocation. Returns `None` on every other call.
    pub fn advance_fall(&mut self, dt: f32) -> Option<Vec<OccupantId>> {
        if self.lifecycle != TileLifecycle::Falling {
            return None;
        }

        let seq = self.fall.as_mut()?;
        match seq.advance(dt) {
            FallStep::Finished(snapshot) => {
                self.despawn();
                Some(snapshot)
            }
            _ => None,
        }
    }

    /// Countdown rounded up to whole seconds, as shown on the tile's HUD.
    pub fn display_seconds(&self) -> u32 {
        self.countdown_remaining.max(0.0).ceil() as u32
    }

    fn begin_fall(&mut self, cause: FallCause) -> Option<FallCause> {
        if self.lifecycle != TileLifecycle::Active {
            return None;
        }

        self.lifecycle = TileLifecycle::Falling;
        let snapshot: Vec<OccupantId> = self.occupants.iter().copied().collect();
        debug!("{} falling ({:?}) with {} occupants", self.id, cause, snapshot.len());
        self.fall = Some(FallSequencer::new(self.position, &self.fall_config, snapshot));
        Some(cause)
    }

    fn despawn(&mut self) {
        self.lifecycle = TileLifecycle::Despawned;
        self.occupants.clear();
        debug!("{} despawned", self.id);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::fall::FallPhase;
    use proptest::prelude::*;

    fn tile() -> Tile {
        Tile::new(TileId(0), Vec3::ZERO, &ArenaConfig::default())
    }

    fn fall_to_despawn(tile: &mut Tile) -> Vec<OccupantId> {
        for _ in 0..100 {
            if let Some(snapshot) = tile.advance_fall(0.25) {
                return snapshot;
            }
        }
        panic!("fall never completed");
    }

    #[test]
    fn test_countdown_drains_only_while_occupied() {
        let mut t = tile();
        for _ in 0..10 {
            assert_eq!(t.tick(1.0), None);
        }
        assert_eq!(t.countdown_remaining(), 15.0);

        t.register_occupant(OccupantId(1));
        t.tick(1.0);
        assert_eq!(t.countdown_remaining(), 14.0);

        t.unregister_occupant(OccupantId(1));
        t.tick(1.0);
        assert_eq!(t.countdown_remaining(), 14.0);
    }

    #[test]
    fn test_fifteen_second_scenario() {
        let mut t = tile();
        t.register_occupant(OccupantId(1));

        for _ in 0..7 {
            assert_eq!(t.tick(1.0), None);
        }
        assert_eq!(t.countdown_remaining(), 8.0);
        assert_eq!(t.lifecycle(), TileLifecycle::Active);

        let mut causes = Vec::new();
        for _ in 0..8 {
            if let Some(cause) = t.tick(1.0) {
                causes.push(cause);
            }
        }
        assert_eq!(t.countdown_remaining(), 0.0);
        assert_eq!(t.lifecycle(), TileLifecycle::Falling);
        assert_eq!(causes, vec![FallCause::CountdownExpired]);
    }

    #[test]
    fn test_countdown_floors_at_zero() {
        let mut t = tile();
        t.register_occupant(OccupantId(1));
        assert_eq!(t.tick(100.0), Some(FallCause::CountdownExpired));
        assert_eq!(t.countdown_remaining(), 0.0);
    }

    #[test]
    fn test_force_fall_idempotent() {
        let mut t = tile();
        assert!(t.force_fall());
        assert!(!t.force_fall());
        assert_eq!(t.lifecycle(), TileLifecycle::Falling);
        assert_eq!(t.countdown_remaining(), 0.0);
    }

    #[test]
    fn test_force_fall_on_despawned_is_noop() {
        let mut t = tile();
        t.force_fall();
        fall_to_despawn(&mut t);
        assert_eq!(t.lifecycle(), TileLifecycle::Despawned);

        assert!(!t.force_fall());
        assert_eq!(t.lifecycle(), TileLifecycle::Despawned);
        assert!(t.fall_snapshot().is_none());
        assert_eq!(t.advance_fall(10.0), None);
    }

    #[test]
    fn test_force_fall_with_empty_countdown() {
        let config = ArenaConfig {
            tile: crate::arena::config::TileConfig {
                initial_countdown: 0.0,
                ..Default::default()
            },
            ..ArenaConfig::default()
        };
        let mut t = Tile::new(TileId(0), Vec3::ZERO, &config);
        assert!(t.force_fall());
        assert_eq!(t.lifecycle(), TileLifecycle::Falling);
    }

    #[test]
    fn test_empty_countdown_falls_on_next_tick() {
        let config = ArenaConfig {
            tile: crate::arena::config::TileConfig {
                initial_countdown: 0.0,
                ..Default::default()
            },
            ..ArenaConfig::default()
        };
        let mut t = Tile::new(TileId(0), Vec3::ZERO, &config);
        assert_eq!(t.tick(0.016), Some(FallCause::CountdownExpired));
        assert_eq!(t.tick(0.016), None);
    }

    #[test]
    fn test_snapshot_frozen_while_falling() {
        let mut t = tile();
        t.register_occupant(OccupantId(2));
        t.register_occupant(OccupantId(1));
        assert!(t.fall_sequence().is_none());
        assert_eq!(t.occupants().collect::<Vec<_>>(), vec![OccupantId(1), OccupantId(2)]);
        t.force_fall();

        assert_eq!(t.fall_snapshot(), Some(&[OccupantId(1), OccupantId(2)][..]));
        assert_eq!(t.fall_sequence().unwrap().phase(), FallPhase::Descending);

        // Late enter is ignored, exit still applies to the live set
        assert!(!t.register_occupant(OccupantId(3)));
        assert!(t.unregister_occupant(OccupantId(1)));
        assert!(!t.has_occupant(OccupantId(3)));
        assert_eq!(t.occupants().collect::<Vec<_>>(), vec![OccupantId(2)]);
        assert_eq!(t.fall_snapshot(), Some(&[OccupantId(1), OccupantId(2)][..]));

        let snapshot = fall_to_despawn(&mut t);
        assert_eq!(snapshot, vec![OccupantId(1), OccupantId(2)]);
        assert_eq!(t.occupants().count(), 0);
        assert!(t.fall_snapshot().is_none());
        assert_eq!(t.fall_sequence().unwrap().phase(), FallPhase::Complete);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut t = tile();
        assert!(!t.unregister_occupant(OccupantId(9)));
        t.register_occupant(OccupantId(9));
        assert!(t.unregister_occupant(OccupantId(9)));
        assert!(!t.unregister_occupant(OccupantId(9)));
        assert!(!t.has_occupant(OccupantId(9)));
    }

    #[test]
    fn test_fall_moves_tile_down() {
        let mut t = Tile::new(TileId(0), Vec3::on_floor(2.0, 2.0), &ArenaConfig::default());
        t.force_fall();
        t.advance_fall(1.0);
        assert_eq!(t.position(), Vec3::on_floor(2.0, 2.0));
        assert_eq!(t.current_position(), Vec3::new(2.0, -2.5, 2.0));
        assert_eq!(t.view().position, t.current_position());
    }

    #[test]
    fn test_display_seconds_rounds_up() {
        let mut t = tile();
        t.register_occupant(OccupantId(1));
        t.tick(0.5);
        assert_eq!(t.display_seconds(), 15);
        t.tick(0.5);
        assert_eq!(t.display_seconds(), 14);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Enter(u64),
        Exit(u64),
        Tick(f32),
        Force,
        Advance(f32),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..4).prop_map(Op::Enter),
            (0u64..4).prop_map(Op::Exit),
            (0.0f32..3.0).prop_map(Op::Tick),
            Just(Op::Force),
            (0.0f32..1.0).prop_map(Op::Advance),
        ]
    }

    proptest! {
        #[test]
        fn prop_lifecycle_only_moves_forward(ops in prop::collection::vec(op_strategy(), 0..200)) {
            let mut t = tile();
            let mut last = t.lifecycle();
            let mut falls = 0;
            let mut last_countdown = t.countdown_remaining();

            for op in ops {
                let occupied = t.occupant_count() > 0;
                match op {
                    Op::Enter(id) => { t.register_occupant(OccupantId(id)); }
                    Op::Exit(id) => { t.unregister_occupant(OccupantId(id)); }
                    Op::Tick(dt) => {
                        if t.tick(dt).is_some() { falls += 1; }
                        if !occupied && last_countdown > 0.0 {
                            prop_assert_eq!(t.countdown_remaining(), last_countdown);
                        }
                    }
                    Op::Force => { if t.force_fall() { falls += 1; } }
                    Op::Advance(dt) => { t.advance_fall(dt); }
                }

                prop_assert!(t.lifecycle() >= last);
                prop_assert!(t.countdown_remaining() >= 0.0);
                prop_assert!(t.countdown_remaining() <= last_countdown);
                if t.lifecycle() == TileLifecycle::Despawned {
                    prop_assert_eq!(t.occupant_count(), 0);
                }
                last = t.lifecycle();
                last_countdown = t.countdown_remaining();
            }

            prop_assert!(falls <= 1);
        }
    }
}
