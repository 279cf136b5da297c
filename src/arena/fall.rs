//! Fall Sequencing
//!
//! Timed descent of one tile followed by despawn and relocation of the
//! occupants captured when the fall began. The sequence is advanced by the
//! server tick, never by rendering, so completion is purely a function of
//! accumulated time.

use tracing::{debug, info};

use crate::arena::config::{FallConfig, FallEasing};
use crate::arena::tile::TileId;
use crate::arena::world::{OccupantId, WorldDirectory};
use crate::core::vec3::Vec3;

/// Phase of a fall sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallPhase {
    /// Tile is moving down.
    Descending,
    /// Tile is at the bottom, waiting out the post-fall delay.
    Settling,
    /// Despawn and relocation have been handed off.
    Complete,
}

/// Result of advancing a sequence by one step.
#[derive(Clone, Debug, PartialEq)]
pub enum FallStep {
    /// Still moving; carries the current cosmetic position.
    Descending(Vec3),
    /// At the bottom, delay not yet elapsed.
    Settling,
    /// The sequence finished on this step. Carries the frozen snapshot,
    /// which the sequencer no longer holds.
    Finished(Vec<OccupantId>),
    /// The sequence had already finished; nothing happened.
    Idle,
}

/// Time-boxed descent owned by a single falling tile.
#[derive(Clone, Debug)]
pub struct FallSequencer {
    start: Vec3,
    distance: f32,
    duration: f32,
    post_fall_delay: f32,
    easing: FallEasing,
    elapsed: f32,
    phase: FallPhase,
    snapshot: Vec<OccupantId>,
}

impl FallSequencer {
    /// Start a sequence from `start` with the occupants present at the
    /// Active→Falling transition.
    pub fn new(start: Vec3, config: &FallConfig, snapshot: Vec<OccupantId>) -> Self {
        Self {
            start,
            distance: config.distance,
            duration: config.duration,
            post_fall_delay: config.post_fall_delay,
            easing: config.easing,
            elapsed: 0.0,
            phase: FallPhase::Descending,
            snapshot,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> FallPhase {
        self.phase
    }

    /// Seconds since the fall began.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Total time from fall start to despawn.
    pub fn total_duration(&self) -> f32 {
        self.duration + self.post_fall_delay
    }

    /// The frozen occupant snapshot. Empty once the sequence finished.
    pub fn snapshot(&self) -> &[OccupantId] {
        &self.snapshot
    }

    /// Cosmetic position of the tile at the current elapsed time.
    pub fn position(&self) -> Vec3 {
        let progress = if self.duration > 0.0 {
            self.elapsed / self.duration
        } else {
            1.0
        };
        let end = self.start + Vec3::DOWN.scale(self.distance);
        self.start.lerp(end, self.easing.apply(progress))
    }

    /// Advance by `dt` seconds.
    ///
    /// Returns [`FallStep::Finished`] exactly once, on the step where the
    /// fall duration plus the post-fall delay has elapsed.
    pub fn advance(&mut self, dt: f32) -> FallStep {
        if self.phase == FallPhase::Complete {
            return FallStep::Idle;
        }

        self.elapsed += dt.max(0.0);

        if self.elapsed >= self.total_duration() {
            self.phase = FallPhase::Complete;
            return FallStep::Finished(std::mem::take(&mut self.snapshot));
        }

        if self.elapsed >= self.duration {
            self.phase = FallPhase::Settling;
            FallStep::Settling
        } else {
            FallStep::Descending(self.position())
        }
    }
}

/// Where relocated occupants can be sent.
///
/// Implemented by the arena grid; the relocation pass only sees this seam,
/// never a process-wide grid instance.
pub trait SafeTileSource {
    /// Remove the occupant from every tile's occupancy set.
    fn clear_occupant_from_all_tiles(&mut self, occupant: OccupantId);

    /// Pick one safe tile, skipping `exclude`. Returns its id and rest
    /// position.
    fn pick_safe_tile(&mut self, exclude: Option<TileId>) -> Option<(TileId, Vec3)>;
}

/// What happened to one snapshot occupant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Relocation {
    /// Teleported above `tile`.
    Moved {
        /// Target tile
        tile: TileId,
        /// Position the occupant was placed at
        position: Vec3,
    },
    /// No safe tile remained; left where it was.
    Stranded,
    /// The occupant no longer resolves to a world entity.
    Unresolved,
}

/// Relocation outcome for one occupant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelocationOutcome {
    /// The occupant
    pub occupant: OccupantId,
    /// What happened to it
    pub result: Relocation,
}

/// Relocate every occupant of a despawned tile's snapshot.
///
/// Must run after the tile is despawned so it can never be picked as a
/// target. Each occupant is first scrubbed from every tile (it may still be
/// registered somewhere it never properly exited), then resolved, then
/// moved `height` above a random safe tile. A failure for one occupant
/// never aborts the rest of the batch.
pub fn relocate_snapshot<S, W>(
    source: &mut S,
    world: &mut W,
    from: TileId,
    snapshot: &[OccupantId],
    height: f32,
) -> Vec<RelocationOutcome>
where
    S: SafeTileSource + ?Sized,
    W: WorldDirectory + ?Sized,
{
    let mut outcomes = Vec::with_capacity(snapshot.len());

    for &occupant in snapshot {
        source.clear_occupant_from_all_tiles(occupant);

        if world.position_of(occupant).is_none() {
            debug!("{} from {} no longer resolves, skipping", occupant, from);
            outcomes.push(RelocationOutcome { occupant, result: Relocation::Unresolved });
            continue;
        }

        let result = match source.pick_safe_tile(None) {
            Some((tile, rest)) => {
                let position = rest.raised(height);
                if world.teleport(occupant, position) {
                    info!("{} relocated from {} to {} at {}", occupant, from, tile, position);
                    Relocation::Moved { tile, position }
                } else {
                    Relocation::Unresolved
                }
            }
            None => {
                info!("{} from {} stranded: no safe tile left", occupant, from);
                Relocation::Stranded
            }
        };

        outcomes.push(RelocationOutcome { occupant, result });
    }

    outcomes
}
