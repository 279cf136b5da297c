//! Arena Server Runtime
//!
//! Runs one arena as a single async writer. Overlap events are queued from
//! anywhere through an [`ArenaHandle`] and applied at the start of the next
//! tick; snapshots and events fan out to any number of observers.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::arena::config::ArenaConfig;
use crate::arena::events::ArenaEvent;
use crate::arena::grid::ArenaGrid;
use crate::arena::replication::ArenaSnapshot;
use crate::arena::tick::{tick, TickResult};
use crate::arena::world::{OverlapEvent, WorldDirectory};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Tick rate (Hz).
    pub tick_rate: u32,
    /// Capacity of the inbound overlap queue.
    pub overlap_queue: usize,
    /// Snapshots buffered per observer before it lags.
    pub snapshot_buffer: usize,
    /// Events buffered per observer before it lags.
    pub event_buffer: usize,
    /// Stop the loop once every tile has despawned.
    pub stop_when_cleared: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: crate::TICK_RATE,
            overlap_queue: 1024,
            snapshot_buffer: 16,
            event_buffer: 256,
            stop_when_cleared: true,
        }
    }
}

impl ServerConfig {
    /// Runtime defaults at the arena's tick rate.
    pub fn for_arena(config: &ArenaConfig) -> Self {
        Self {
            tick_rate: config.tick_rate,
            ..Self::default()
        }
    }

    fn tick_duration(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate.max(1) as u64)
    }
}

/// Runtime errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServerError {
    /// The server loop is gone.
    #[error("Arena server has stopped")]
    Stopped,

    /// The overlap queue is at capacity.
    #[error("Overlap queue full")]
    QueueFull,
}

/// Cloneable handle to a running arena.
#[derive(Debug, Clone)]
pub struct ArenaHandle {
    overlap_tx: mpsc::Sender<OverlapEvent>,
    snapshot_tx: broadcast::Sender<ArenaSnapshot>,
    event_tx: broadcast::Sender<ArenaEvent>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ArenaHandle {
    /// Queue an overlap event, waiting for queue space.
    pub async fn send_overlap(&self, event: OverlapEvent) -> Result<(), ServerError> {
        self.overlap_tx
            .send(event)
            .await
            .map_err(|_| ServerError::Stopped)
    }

    /// Queue an overlap event without waiting.
    pub fn try_send_overlap(&self, event: OverlapEvent) -> Result<(), ServerError> {
        self.overlap_tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => ServerError::QueueFull,
            TrySendError::Closed(_) => ServerError::Stopped,
        })
    }

    /// Receive a snapshot after every tick.
    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<ArenaSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Receive every arena event.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ArenaEvent> {
        self.event_tx.subscribe()
    }

    /// Ask the loop to stop after the current tick.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// The single writer for one arena.
pub struct ArenaServer<W> {
    grid: ArenaGrid,
    world: W,
    config: ServerConfig,
    overlap_rx: mpsc::Receiver<OverlapEvent>,
    snapshot_tx: broadcast::Sender<ArenaSnapshot>,
    event_tx: broadcast::Sender<ArenaEvent>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl<W: WorldDirectory> ArenaServer<W> {
    /// Create a server and the handle used to feed it.
    pub fn new(grid: ArenaGrid, world: W, config: ServerConfig) -> (Self, ArenaHandle) {
        let (overlap_tx, overlap_rx) = mpsc::channel(config.overlap_queue.max(1));
        let (snapshot_tx, _) = broadcast::channel(config.snapshot_buffer.max(1));
        let (event_tx, _) = broadcast::channel(config.event_buffer.max(1));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = ArenaHandle {
            overlap_tx,
            snapshot_tx: snapshot_tx.clone(),
            event_tx: event_tx.clone(),
            shutdown_tx,
        };

        let server = Self {
            grid,
            world,
            config,
            overlap_rx,
            snapshot_tx,
            event_tx,
            shutdown_rx,
        };

        (server, handle)
    }

    /// The arena.
    pub fn grid(&self) -> &ArenaGrid {
        &self.grid
    }

    /// The world directory.
    pub fn world(&self) -> &W {
        &self.world
    }

    /// Split into the arena and the world directory.
    pub fn into_parts(self) -> (ArenaGrid, W) {
        (self.grid, self.world)
    }

    /// Run one tick now: drain queued overlaps, tick, publish.
    pub fn step(&mut self, dt: f32) -> TickResult {
        let mut overlaps = Vec::new();
        while let Ok(event) = self.overlap_rx.try_recv() {
            overlaps.push(event);
        }

        let result = tick(&mut self.grid, overlaps, &mut self.world, dt);

        // No subscribers is fine
        for event in &result.events {
            let _ = self.event_tx.send(event.clone());
        }
        let _ = self.snapshot_tx.send(ArenaSnapshot::capture(&self.grid));

        result
    }

    /// Tick at the configured rate until shutdown is requested, every
    /// handle is dropped, or (if configured) the arena is cleared.
    pub async fn run(mut self) -> Self {
        let dt = 1.0 / self.config.tick_rate.max(1) as f32;
        let mut tick_interval = interval(self.config.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Arena loop starting: {} tiles at {} Hz",
            self.grid.len(),
            self.config.tick_rate
        );

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("Arena loop shutdown at tick {}", self.grid.current_tick());
                    break;
                }
                _ = tick_interval.tick() => {
                    let result = self.step(dt);
                    if !result.events.is_empty() {
                        debug!("Tick {} produced {} events", result.tick, result.events.len());
                    }
                    if result.arena_cleared && self.config.stop_when_cleared {
                        info!("Arena cleared at tick {}", result.tick);
                        break;
                    }
                }
            }
        }

        self
    }
}
