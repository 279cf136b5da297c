//! Authoritative Arena Tick
//!
//! One fixed step of the arena. Every state change happens here, on the
//! single writer, in a fixed order so that the same seed and the same
//! overlap script always produce the same snapshots.

use tracing::trace;

use crate::arena::events::ArenaEvent;
use crate::arena::grid::ArenaGrid;
use crate::arena::world::{OverlapEvent, WorldDirectory};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Tick number that just ran
    pub tick: u32,
    /// Events generated this tick, in order
    pub events: Vec<ArenaEvent>,
    /// Safe tiles left after the tick
    pub safe_tiles: usize,
    /// Every tile has despawned
    pub arena_cleared: bool,
}

/// Run one arena tick.
///
/// # Order
///
/// 0. Seal registration and advance the tick counter
/// 1. Apply overlap events in arrival order
/// 2. Advance running falls (despawn, then relocate the snapshot)
/// 3. Drain countdowns of occupied tiles
/// 4. Accumulate the collapse timer and sweep the outer ring
///
/// Falls started in steps 3 and 4 first advance on the next tick.
pub fn tick<W, I>(grid: &mut ArenaGrid, overlaps: I, world: &mut W, dt: f32) -> TickResult
where
    W: WorldDirectory + ?Sized,
    I: IntoIterator<Item = OverlapEvent>,
{
    let dt = dt.max(0.0);

    // 0. Advance tick counter
    let tick = grid.begin_tick();

    // 1. Apply overlaps
    let mut applied = 0usize;
    for event in overlaps {
        if grid.apply_overlap(event) {
            applied += 1;
        }
    }

    // 2. Advance falls started on earlier ticks
    grid.advance_falls(dt, world);

    // 3. Countdowns
    grid.tick_countdowns(dt);

    // 4. Ring collapse
    grid.tick(dt);

    let result = TickResult {
        tick,
        events: grid.take_events(),
        safe_tiles: grid.safe_tile_count(),
        arena_cleared: grid.is_cleared(),
    };

    trace!(
        "Tick {}: {} overlaps applied, {} events, {} safe tiles",
        tick,
        applied,
        result.events.len(),
        result.safe_tiles
    );

    result
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::config::ArenaConfig;
    use crate::arena::events::ArenaEventData;
    use crate::arena::replication::ArenaSnapshot;
    use crate::arena::tile::{FallCause, TileId, TileLifecycle};
    use crate::arena::world::{EntityDirectory, OccupantId};
    use crate::core::vec3::Vec3;

    fn run_script(seed: u64, ticks: u32) -> (ArenaSnapshot, Vec<ArenaEvent>, EntityDirectory) {
        let config = ArenaConfig { rng_seed: seed, ..ArenaConfig::default() };
        let mut grid = ArenaGrid::square(5, 2.0, config);
        let mut world = EntityDirectory::new();
        let mut events = Vec::new();

        for raw in 1..=4u64 {
            world.insert(OccupantId(raw), Vec3::new(0.0, 1.0, 0.0));
        }

        for n in 0..ticks {
            let mut overlaps = Vec::new();
            if n == 0 {
                for raw in 1..=4u64 {
                    overlaps.push(OverlapEvent::enter(TileId((raw * 5) as u32), OccupantId(raw)));
                }
            }
            let result = tick(&mut grid, overlaps, &mut world, 0.5);
            events.extend(result.events);
        }

        (ArenaSnapshot::capture(&grid), events, world)
    }

    #[test]
    fn test_tick_counter_and_seal() {
        let mut grid = ArenaGrid::new(ArenaConfig::default());
        grid.register_tile(Vec3::ZERO);
        let mut world = EntityDirectory::new();

        let result = tick(&mut grid, Vec::new(), &mut world, 1.0 / 60.0);
        assert_eq!(result.tick, 1);
        assert!(grid.is_sealed());
        assert_eq!(grid.register_tile(Vec3::UP), None);

        let result = tick(&mut grid, Vec::new(), &mut world, 1.0 / 60.0);
        assert_eq!(result.tick, 2);
        assert_eq!(result.safe_tiles, 1);
        assert!(!result.arena_cleared);
    }

    #[test]
    fn test_occupied_tile_falls_after_fifteen_seconds() {
        let mut grid = ArenaGrid::square(3, 2.0, ArenaConfig::default());
        let mut world = EntityDirectory::new();
        let a = OccupantId(1);
        world.insert(a, Vec3::new(0.0, 1.0, 0.0));

        let first = tick(&mut grid, [OverlapEvent::enter(TileId(4), a)], &mut world, 1.0);
        assert!(first.events.is_empty());
        assert_eq!(grid.tile(TileId(4)).unwrap().countdown_remaining(), 14.0);

        let mut started = None;
        for _ in 1..15 {
            let result = tick(&mut grid, [], &mut world, 1.0);
            for event in result.events {
                if let ArenaEventData::FallStarted { tile: TileId(4), cause, .. } = event.data {
                    started = Some((result.tick, cause));
                }
            }
        }
        // The ring collapse at t=10 already took the perimeter; the centre
        // falls on its own countdown
        assert_eq!(started, Some((15, FallCause::CountdownExpired)));
        assert_eq!(grid.tile(TileId(4)).unwrap().lifecycle(), TileLifecycle::Falling);
    }

    #[test]
    fn test_late_overlap_does_not_join_snapshot() {
        let mut grid = ArenaGrid::square(3, 2.0, ArenaConfig::default());
        let mut world = EntityDirectory::new();
        let a = OccupantId(1);
        let late = OccupantId(2);
        world.insert(a, Vec3::ZERO);
        world.insert(late, Vec3::ZERO);

        grid.tile_mut(TileId(0)).unwrap().register_occupant(a);
        grid.tile_mut(TileId(0)).unwrap().force_fall();

        let result = tick(&mut grid, [OverlapEvent::enter(TileId(0), late)], &mut world, 0.1);
        assert!(result.events.is_empty());
        assert!(!grid.tile(TileId(0)).unwrap().has_occupant(late));
        assert_eq!(grid.tile(TileId(0)).unwrap().fall_snapshot(), Some(&[a][..]));
    }

    #[test]
    fn test_exit_during_fall_still_relocates_snapshot() {
        let mut grid = ArenaGrid::square(3, 2.0, ArenaConfig::default());
        let mut world = EntityDirectory::new();
        let a = OccupantId(1);
        world.insert(a, Vec3::ZERO);

        grid.tile_mut(TileId(0)).unwrap().register_occupant(a);
        grid.tile_mut(TileId(0)).unwrap().force_fall();

        let mut relocated = false;
        let mut overlaps = vec![OverlapEvent::exit(TileId(0), a)];
        for _ in 0..10 {
            let result = tick(&mut grid, overlaps.drain(..), &mut world, 0.5);
            relocated |= result
                .events
                .iter()
                .any(|e| matches!(e.data, ArenaEventData::OccupantRelocated { occupant, .. } if occupant == a));
        }
        assert!(relocated);
    }

    #[test]
    fn test_unresolved_occupant_skipped() {
        let mut grid = ArenaGrid::square(3, 2.0, ArenaConfig::default());
        let mut world = EntityDirectory::new();
        let gone = OccupantId(1);
        let kept = OccupantId(2);
        world.insert(kept, Vec3::ZERO);

        grid.tile_mut(TileId(4)).unwrap().register_occupant(gone);
        grid.tile_mut(TileId(4)).unwrap().register_occupant(kept);
        grid.tile_mut(TileId(4)).unwrap().force_fall();

        let mut events = Vec::new();
        for _ in 0..10 {
            events.extend(tick(&mut grid, [], &mut world, 0.5).events);
        }

        assert!(events.iter().any(|e| matches!(
            e.data,
            ArenaEventData::OccupantUnresolved { occupant, .. } if occupant == gone
        )));
        assert!(events.iter().any(|e| matches!(
            e.data,
            ArenaEventData::OccupantRelocated { occupant, .. } if occupant == kept
        )));
        assert!(grid.tiles().all(|t| !t.has_occupant(gone)));
    }

    #[test]
    fn test_arena_eventually_clears() {
        let mut grid = ArenaGrid::square(3, 2.0, ArenaConfig::default());
        let mut world = EntityDirectory::new();

        let mut cleared_at = None;
        for _ in 0..40 {
            let result = tick(&mut grid, [], &mut world, 1.0);
            if result.arena_cleared {
                cleared_at = Some(result.tick);
                break;
            }
        }

        // Perimeter at t=10, centre at t=20, plus one fall duration
        assert_eq!(cleared_at, Some(23));
    }

    #[test]
    fn test_same_seed_same_snapshots() {
        let (snap_a, events_a, world_a) = run_script(99, 80);
        let (snap_b, events_b, world_b) = run_script(99, 80);

        assert_eq!(snap_a.state_hash, snap_b.state_hash);
        assert_eq!(events_a, events_b);
        assert_eq!(world_a.iter().collect::<Vec<_>>(), world_b.iter().collect::<Vec<_>>());
        assert!(events_a.iter().any(|e| matches!(e.data, ArenaEventData::OccupantRelocated { .. })));
    }

    #[test]
    fn test_negative_dt_is_zero() {
        let mut grid = ArenaGrid::square(2, 2.0, ArenaConfig::default());
        let mut world = EntityDirectory::new();
        tick(&mut grid, [OverlapEvent::enter(TileId(0), OccupantId(1))], &mut world, -5.0);
        assert_eq!(grid.tile(TileId(0)).unwrap().countdown_remaining(), 15.0);
        assert_eq!(grid.collapse_timer(), 0.0);
    }
}
