//! Shrinking Arena Server
//!
//! Runs a scripted demo match on a 7×7 arena and replays it from the same
//! seed to check that the outcome is reproducible.

use std::collections::BTreeMap;
use anyhow::{bail, Context};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use shrinking_arena::{
    ArenaConfig, ArenaGrid, OccupantId, OverlapEvent, TileId, Vec3, VERSION,
    arena::{
        events::ArenaEventData,
        replication::ArenaSnapshot,
        tick::tick,
        wobble::Wobble,
        world::{EntityDirectory, WorldDirectory},
    },
    core::{hash::StateHash, rng::{derive_arena_seed, DeterministicRng}},
};

const GRID_SIZE: usize = 7;
const OCCUPANTS: u64 = 4;
const WALK_SPEED: f32 = 3.0;
const MAX_SECONDS: u32 = 180;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Shrinking Arena Server v{}", VERSION);

    let mut config = match std::env::var("ARENA_CONFIG") {
        Ok(path) => {
            info!("Loading config from {}", path);
            ArenaConfig::from_file(&path).with_context(|| format!("Failed to load {}", path))?
        }
        Err(_) => ArenaConfig::default(),
    };

    let match_id = [7u8; 16];
    if config.rng_seed == 0 {
        config.rng_seed = derive_arena_seed(&match_id, GRID_SIZE * GRID_SIZE);
    }

    info!("Match ID: {}", hex::encode(match_id));
    info!("RNG Seed: {}", config.rng_seed);
    info!("Tick Rate: {} Hz", config.tick_rate);

    info!("=== Starting Demo Match ===");
    let first = demo_match(&config, true);

    info!("=== Verifying Determinism ===");
    let replay = demo_match(&config, false);

    if first != replay {
        bail!(
            "Replay diverged: {} vs {}",
            hex::encode(first),
            hex::encode(replay)
        );
    }

    info!("Replay hash matches: {}", hex::encode(replay));
    Ok(())
}

/// Scripted occupants wandering between tiles.
struct Walkers {
    rng: DeterministicRng,
    targets: BTreeMap<OccupantId, Vec3>,
    standing: BTreeMap<OccupantId, TileId>,
}

impl Walkers {
    fn new(seed: u64) -> Self {
        Self {
            rng: DeterministicRng::new(seed ^ 0x5741_4C4B),
            targets: BTreeMap::new(),
            standing: BTreeMap::new(),
        }
    }

    /// Move every occupant towards its target and report tile changes as
    /// overlap events, the way a collision layer would.
    fn step(&mut self, grid: &ArenaGrid, world: &mut EntityDirectory, dt: f32) -> Vec<OverlapEvent> {
        let spawned: Vec<Vec3> = grid
            .tiles()
            .filter(|t| t.is_spawned())
            .map(|t| t.position())
            .collect();
        let half = grid.config().tile.tile_size * 0.5;

        let occupants: Vec<(OccupantId, Vec3)> = world.iter().collect();
        let mut overlaps = Vec::new();

        for (occupant, position) in occupants {
            let target = match self.targets.get(&occupant) {
                Some(target) if target.distance_squared(position) > 0.01 => *target,
                _ => {
                    let Some(next) = self.rng.choose(&spawned) else {
                        continue;
                    };
                    let next = next.raised(1.0);
                    self.targets.insert(occupant, next);
                    next
                }
            };

            let to_target = target - position;
            let distance = to_target.length();
            let stride = WALK_SPEED * dt;
            let moved = if distance <= stride {
                target
            } else {
                position + to_target.scale(stride / distance)
            };
            world.teleport(occupant, moved);

            let under = grid.nearest_tile(moved).filter(|t| {
                let p = t.position();
                (moved.x - p.x).abs() <= half && (moved.z - p.z).abs() <= half
            });
            let now = under.map(|t| t.id());
            let before = self.standing.get(&occupant).copied();

            if now != before {
                if let Some(old) = before {
                    overlaps.push(OverlapEvent::exit(old, occupant));
                }
                match now {
                    Some(new) => {
                        overlaps.push(OverlapEvent::enter(new, occupant));
                        self.standing.insert(occupant, new);
                    }
                    None => {
                        self.standing.remove(&occupant);
                    }
                }
            }
        }

        overlaps
    }
}

/// Run one scripted match and return the final snapshot hash.
fn demo_match(config: &ArenaConfig, verbose: bool) -> StateHash {
    let mut grid = ArenaGrid::square(GRID_SIZE, config.tile.tile_size, config.clone());
    let mut world = EntityDirectory::new();
    let mut walkers = Walkers::new(config.rng_seed);

    for raw in 1..=OCCUPANTS {
        let corner = if raw % 2 == 0 { 1.0 } else { -1.0 };
        let side = if raw <= 2 { 1.0 } else { -1.0 };
        world.insert(OccupantId(raw), Vec3::new(corner * 2.0, 1.0, side * 2.0));
    }

    let dt = config.tick_dt();
    let max_ticks = MAX_SECONDS * config.tick_rate;
    let mut wobble: BTreeMap<TileId, Wobble> = BTreeMap::new();
    let mut total_events = 0usize;

    for _ in 0..max_ticks {
        let overlaps = walkers.step(&grid, &mut world, dt);
        let result = tick(&mut grid, overlaps, &mut world, dt);
        total_events += result.events.len();

        if verbose {
            for event in &result.events {
                match &event.data {
                    ArenaEventData::FallStarted { tile, cause, occupants } => {
                        info!("Tick {}: {} falling ({:?}, {} aboard)", event.tick, tile, cause, occupants);
                    }
                    ArenaEventData::OccupantRelocated { occupant, from_tile, to_tile, .. } => {
                        info!("Tick {}: {} moved {} -> {}", event.tick, occupant, from_tile, to_tile);
                    }
                    ArenaEventData::OccupantStranded { occupant, .. } => {
                        warn!("Tick {}: {} has nowhere left to stand", event.tick, occupant);
                    }
                    ArenaEventData::RingCollapsed { tiles } => {
                        info!("Tick {}: ring collapsed ({} tiles)", event.tick, tiles.len());
                    }
                    _ => {}
                }
            }

            // Report every second with the observer-side shake
            if result.tick % config.tick_rate == 0 {
                let snapshot = ArenaSnapshot::capture(&grid);
                let time = result.tick as f64 * dt as f64;
                let mut shaking = 0;
                for view in snapshot.spawned() {
                    let offset = wobble
                        .entry(view.id)
                        .or_default()
                        .sample(view.countdown_remaining, time, &config.wobble);
                    if offset != 0.0 {
                        shaking += 1;
                    }
                }
                debug!(
                    "Tick {}: {} safe, {} falling, {} spawned, {} shaking",
                    result.tick,
                    result.safe_tiles,
                    grid.falling_tile_count(),
                    snapshot.spawned().count(),
                    shaking
                );
            }
        }

        if result.safe_tiles <= 1 {
            if verbose {
                info!("Arena down to {} safe tile(s) at tick {}", result.safe_tiles, result.tick);
            }
            break;
        }
    }

    let snapshot = ArenaSnapshot::capture(&grid);
    if verbose {
        info!("=== Match Results ===");
        for (occupant, position) in world.iter() {
            info!("{} finished at {}", occupant, position);
        }
        info!("Total events: {}", total_events);
        info!("Final State Hash: {}", hex::encode(snapshot.state_hash));
    }

    snapshot.state_hash
}
