//! Arena Grid
//!
//! Owns every tile of one match, runs the periodic outer-ring collapse and
//! answers the safe-tile and nearest-tile queries used for relocation.
//!
//! Tiles are kept in registration order; that order is the iteration order
//! for every sweep and the tie-break for `nearest_tile`.

use tracing::{debug, info, warn};

use crate::arena::config::ArenaConfig;
use crate::arena::events::ArenaEvent;
use crate::arena::fall::{relocate_snapshot, SafeTileSource};
use crate::arena::tile::{FallCause, Tile, TileId, TileLifecycle};
use crate::arena::world::{OccupantId, OverlapEvent, OverlapKind, WorldDirectory};
use crate::core::rng::DeterministicRng;
use crate::core::vec3::Vec3;

/// Axis-aligned rectangle on the floor plane (X/Z).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloorBounds {
    /// Smallest X
    pub min_x: f32,
    /// Largest X
    pub max_x: f32,
    /// Smallest Z
    pub min_z: f32,
    /// Largest Z
    pub max_z: f32,
}

impl FloorBounds {
    /// Bounds of a set of points; `None` if empty.
    pub fn enclosing(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut bounds: Option<Self> = None;
        for p in points {
            let b = bounds.get_or_insert(Self {
                min_x: p.x,
                max_x: p.x,
                min_z: p.z,
                max_z: p.z,
            });
            b.min_x = b.min_x.min(p.x);
            b.max_x = b.max_x.max(p.x);
            b.min_z = b.min_z.min(p.z);
            b.max_z = b.max_z.max(p.z);
        }
        bounds
    }

    /// True if `p` lies within `tolerance` of any of the four edges.
    pub fn is_on_edge(&self, p: Vec3, tolerance: f32) -> bool {
        (p.x - self.min_x).abs() <= tolerance
            || (p.x - self.max_x).abs() <= tolerance
            || (p.z - self.min_z).abs() <= tolerance
            || (p.z - self.max_z).abs() <= tolerance
    }
}

/// All tiles of one match.
#[derive(Clone, Debug)]
pub struct ArenaGrid {
    tiles: Vec<Tile>,
    config: ArenaConfig,
    collapse_timer: f32,
    rng: DeterministicRng,
    sealed: bool,
    tick: u32,
    pending_events: Vec<ArenaEvent>,
}

impl ArenaGrid {
    /// Create an empty grid. Tiles are added with [`register_tile`].
    ///
    /// [`register_tile`]: ArenaGrid::register_tile
    pub fn new(config: ArenaConfig) -> Self {
        let rng = DeterministicRng::new(config.rng_seed);
        Self {
            tiles: Vec::new(),
            config,
            collapse_timer: 0.0,
            rng,
            sealed: false,
            tick: 0,
            pending_events: Vec::new(),
        }
    }

    /// Build an `n`×`n` grid centred on the origin, row-major (Z outer,
    /// X inner), and seal it.
    pub fn square(n: usize, spacing: f32, config: ArenaConfig) -> Self {
        let mut grid = Self::new(config);
        let half = (n as f32 - 1.0) * spacing * 0.5;
        for row in 0..n {
            for col in 0..n {
                let x = col as f32 * spacing - half;
                let z = row as f32 * spacing - half;
                grid.register_tile(Vec3::on_floor(x, z));
            }
        }
        grid.seal();
        grid
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Register a tile at `position`. Ignored once the grid is sealed.
    pub fn register_tile(&mut self, position: Vec3) -> Option<TileId> {
        if self.sealed {
            warn!("Tile registration at {} after arena start ignored", position);
            return None;
        }
        let id = TileId(self.tiles.len() as u32);
        self.tiles.push(Tile::new(id, position, &self.config));
        Some(id)
    }

    /// Close registration. The first tick seals implicitly.
    pub fn seal(&mut self) {
        if !self.sealed {
            self.sealed = true;
            info!("Arena sealed with {} tiles", self.tiles.len());
        }
    }

    /// Is registration closed?
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    // -------------------------------------------------------------------------
    // Read-only views
    // -------------------------------------------------------------------------

    /// Configuration the grid was built with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Tiles in registration order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    /// Tile by id.
    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.0 as usize)
    }

    /// Tile by registration index.
    pub fn tile_at(&self, index: usize) -> Option<&Tile> {
        self.tiles.get(index)
    }

    /// Mutable tile by id (server side only).
    pub fn tile_mut(&mut self, id: TileId) -> Option<&mut Tile> {
        self.tiles.get_mut(id.0 as usize)
    }

    /// Number of registered tiles.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// True if no tiles are registered.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Ticks run so far.
    pub fn current_tick(&self) -> u32 {
        self.tick
    }

    /// Seconds accumulated towards the next ring collapse.
    pub fn collapse_timer(&self) -> f32 {
        self.collapse_timer
    }

    /// Tiles that are Active and not falling.
    pub fn safe_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter().filter(|t| t.is_safe())
    }

    /// Number of safe tiles.
    pub fn safe_tile_count(&self) -> usize {
        self.safe_tiles().count()
    }

    /// Number of tiles currently falling.
    pub fn falling_tile_count(&self) -> usize {
        self.tiles
            .iter()
            .filter(|t| t.lifecycle() == TileLifecycle::Falling)
            .count()
    }

    /// No tile is safe and none is still falling: nothing left can change.
    pub fn is_cleared(&self) -> bool {
        self.tiles.iter().all(|t| t.lifecycle() == TileLifecycle::Despawned)
    }

    /// Bounding rectangle of the safe tiles.
    pub fn live_bounds(&self) -> Option<FloorBounds> {
        FloorBounds::enclosing(self.safe_tiles().map(|t| t.position()))
    }

    /// Closest spawned tile to `position` by squared distance.
    ///
    /// Ties go to the earliest registered tile.
    pub fn nearest_tile(&self, position: Vec3) -> Option<&Tile> {
        let mut nearest: Option<&Tile> = None;
        let mut best = f32::INFINITY;

        for tile in self.tiles.iter().filter(|t| t.is_spawned()) {
            let dist = position.distance_squared(tile.position());
            if dist < best {
                best = dist;
                nearest = Some(tile);
            }
        }

        nearest
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Route one overlap event to its tile. Unknown tiles are ignored.
    pub fn apply_overlap(&mut self, event: OverlapEvent) -> bool {
        let Some(tile) = self.tiles.get_mut(event.tile.0 as usize) else {
            debug!("Overlap for unknown {} ignored", event.tile);
            return false;
        };

        match event.kind {
            OverlapKind::Enter => tile.register_occupant(event.occupant),
            OverlapKind::Exit => tile.unregister_occupant(event.occupant),
        }
    }

    /// Pick one safe tile uniformly at random, skipping `exclude`.
    pub fn random_safe_tile(&mut self, exclude: Option<TileId>) -> Option<&Tile> {
        let candidates: Vec<usize> = self
            .tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_safe() && Some(t.id()) != exclude)
            .map(|(i, _)| i)
            .collect();

        let pick = *self.rng.choose(&candidates)?;
        self.tiles.get(pick)
    }

    /// Remove the occupant from every tile's occupancy set.
    pub fn clear_occupant_from_all_tiles(&mut self, occupant: OccupantId) {
        for tile in &mut self.tiles {
            tile.unregister_occupant(occupant);
        }
    }

    /// Accumulate the collapse timer and sweep the outer ring when it fires.
    ///
    /// Returns the tiles force-fallen by the sweep, if one ran.
    pub fn tick(&mut self, dt: f32) -> Option<Vec<TileId>> {
        if self.tiles.is_empty() {
            return None;
        }

        self.collapse_timer += dt.max(0.0);
        if self.collapse_timer < self.config.collapse.interval {
            return None;
        }

        self.collapse_timer = 0.0;
        Some(self.collapse_outer_ring())
    }

    /// Force-fall every safe tile lying on the edge of the safe tiles'
    /// bounding rectangle.
    ///
    /// Falling and despawned tiles take no part in the bounds, so the ring
    /// shrinks with the live arena.
    pub fn collapse_outer_ring(&mut self) -> Vec<TileId> {
        let Some(bounds) = self.live_bounds() else {
            return Vec::new();
        };
        let tolerance = self.config.edge_tolerance();

        // Decide the whole ring before mutating anything
        let ring: Vec<usize> = self
            .tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_safe() && bounds.is_on_edge(t.position(), tolerance))
            .map(|(i, _)| i)
            .collect();

        let mut collapsed = Vec::with_capacity(ring.len());
        for index in ring {
            let tile = &mut self.tiles[index];
            let occupants = tile.occupant_count();
            if tile.force_fall() {
                collapsed.push(tile.id());
                let event = ArenaEvent::fall_started(self.tick, tile.id(), FallCause::RingCollapse, occupants);
                self.pending_events.push(event);
            }
        }

        info!(
            "Ring collapse at tick {}: {} tiles fell, {} safe remain",
            self.tick,
            collapsed.len(),
            self.safe_tile_count()
        );
        self.pending_events.push(ArenaEvent::ring_collapsed(self.tick, collapsed.clone()));
        collapsed
    }

    /// Drain every Active tile's countdown by `dt`.
    pub fn tick_countdowns(&mut self, dt: f32) {
        for tile in &mut self.tiles {
            let occupants = tile.occupant_count();
            if let Some(cause) = tile.tick(dt) {
                info!("{} countdown expired with {} occupants", tile.id(), occupants);
                self.pending_events.push(ArenaEvent::fall_started(self.tick, tile.id(), cause, occupants));
            }
        }
    }

    /// Advance every running fall. A finished tile is despawned first, then
    /// its snapshot is relocated onto the remaining safe tiles.
    pub fn advance_falls<W>(&mut self, dt: f32, world: &mut W)
    where
        W: WorldDirectory + ?Sized,
    {
        let height = self.config.fall.relocation_height;

        for index in 0..self.tiles.len() {
            let Some(snapshot) = self.tiles[index].advance_fall(dt) else {
                continue;
            };
            let from = self.tiles[index].id();
            self.pending_events.push(ArenaEvent::tile_despawned(self.tick, from));

            let outcomes = relocate_snapshot(self, world, from, &snapshot, height);
            for outcome in outcomes {
                self.pending_events.push(ArenaEvent::from_relocation(self.tick, from, outcome));
            }
        }
    }

    pub(crate) fn begin_tick(&mut self) -> u32 {
        self.seal();
        self.tick += 1;
        self.tick
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<ArenaEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

impl SafeTileSource for ArenaGrid {
    fn clear_occupant_from_all_tiles(&mut self, occupant: OccupantId) {
        ArenaGrid::clear_occupant_from_all_tiles(self, occupant);
    }

    fn pick_safe_tile(&mut self, exclude: Option<TileId>) -> Option<(TileId, Vec3)> {
        self.random_safe_tile(exclude).map(|t| (t.id(), t.position()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
