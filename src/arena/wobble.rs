//! Countdown Wobble
//!
//! Presentational shake derived from the replicated countdown. Any observer
//! can compute it from a [`TileView`](crate::arena::replication::TileView)
//! and its own clock; nothing here feeds back into server state.

use crate::arena::config::WobbleConfig;

/// Oscillation parameters for one countdown value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WobbleParams {
    /// Peak vertical offset
    pub amplitude: f32,
    /// Angular frequency (radians per second)
    pub frequency: f32,
}

/// Oscillation for `countdown`, or `None` outside the wobble band.
///
/// Inside the band amplitude and frequency grow linearly from their base
/// values as the countdown approaches zero. At zero the tile is falling and
/// does not wobble.
pub fn wobble_params(countdown: f32, config: &WobbleConfig) -> Option<WobbleParams> {
    if countdown <= 0.0 || countdown > config.start_below {
        return None;
    }

    let urgency = 1.0 - countdown / config.start_below;
    Some(WobbleParams {
        amplitude: config.base_amplitude + urgency * config.amplitude_gain,
        frequency: config.base_frequency + urgency * config.frequency_gain,
    })
}

/// Per-observer wobble state for one tile.
///
/// Only the residual offset is remembered, so a tile leaving the band
/// settles back to baseline instead of snapping.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Wobble {
    offset: f32,
}

impl Wobble {
    /// Baseline (no offset).
    pub fn new() -> Self {
        Self::default()
    }

    /// Current vertical offset.
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Sample the offset for `countdown` at observer time `time` (seconds).
    pub fn sample(&mut self, countdown: f32, time: f64, config: &WobbleConfig) -> f32 {
        self.offset = if countdown <= 0.0 {
            0.0
        } else if let Some(params) = wobble_params(countdown, config) {
            ((time * params.frequency as f64).sin() as f32) * params.amplitude
        } else {
            self.offset * (1.0 - config.decay)
        };
        self.offset
    }
}
