//! Arena Configuration
//!
//! Every tunable of the arena in one serde-loadable tree. Missing fields
//! fall back to the defaults, so a config file only needs the values it
//! changes.

use std::path::Path;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Tile countdown tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    /// Cumulative occupancy (seconds) a tile survives before falling.
    pub initial_countdown: f32,
    /// Edge length of one square tile (world units).
    pub tile_size: f32,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            initial_countdown: 15.0,
            tile_size: 2.0,
        }
    }
}

/// Easing applied to the cosmetic descent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallEasing {
    /// Constant speed.
    #[default]
    Linear,
    /// Starts slow, accelerates (quadratic).
    EaseIn,
    /// Slow at both ends (smoothstep).
    SmoothStep,
}

impl FallEasing {
    /// Map linear progress `t` in [0, 1] to eased progress in [0, 1].
    #[inline]
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            FallEasing::Linear => t,
            FallEasing::EaseIn => t * t,
            FallEasing::SmoothStep => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// Fall sequence tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallConfig {
    /// How far the tile drops (world units).
    pub distance: f32,
    /// How long the drop takes (seconds).
    pub duration: f32,
    /// Pause at the bottom before despawn and relocation (seconds).
    pub post_fall_delay: f32,
    /// Height above the target tile an occupant is placed at.
    pub relocation_height: f32,
    /// Descent easing.
    pub easing: FallEasing,
}

impl Default for FallConfig {
    fn default() -> Self {
        Self {
            distance: 5.0,
            duration: 2.0,
            post_fall_delay: 0.75,
            relocation_height: 1.0,
            easing: FallEasing::Linear,
        }
    }
}

/// Presentational wobble tunables (observer side only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WobbleConfig {
    /// Countdown (seconds) below which the tile starts wobbling.
    pub start_below: f32,
    /// Amplitude at the start of the wobble band.
    pub base_amplitude: f32,
    /// Extra amplitude reached at countdown zero.
    pub amplitude_gain: f32,
    /// Angular frequency at the start of the wobble band.
    pub base_frequency: f32,
    /// Extra frequency reached at countdown zero.
    pub frequency_gain: f32,
    /// Fraction of residual offset removed per sample outside the band.
    pub decay: f32,
}

impl Default for WobbleConfig {
    fn default() -> Self {
        Self {
            start_below: 8.0,
            base_amplitude: 0.05,
            amplitude_gain: 0.05,
            base_frequency: 3.0,
            frequency_gain: 10.0,
            decay: 0.2,
        }
    }
}

/// Ring collapse tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollapseConfig {
    /// Seconds between outer-ring sweeps.
    pub interval: f32,
    /// Edge tolerance as a multiple of the tile size.
    pub edge_tolerance_factor: f32,
}

impl Default for CollapseConfig {
    fn default() -> Self {
        Self {
            interval: 10.0,
            edge_tolerance_factor: 0.5,
        }
    }
}

/// Full arena configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Tile tunables
    pub tile: TileConfig,
    /// Fall tunables
    pub fall: FallConfig,
    /// Wobble tunables
    pub wobble: WobbleConfig,
    /// Ring collapse tunables
    pub collapse: CollapseConfig,
    /// Server tick rate (Hz)
    pub tick_rate: u32,
    /// Seed for safe-tile selection
    pub rng_seed: u64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            tile: TileConfig::default(),
            fall: FallConfig::default(),
            wobble: WobbleConfig::default(),
            collapse: CollapseConfig::default(),
            tick_rate: crate::TICK_RATE,
            rng_seed: 0,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config text is not valid JSON for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds a value the arena cannot run with.
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted field path.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl ArenaConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Seconds per server tick.
    #[inline]
    pub fn tick_dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    /// Absolute edge tolerance used by the ring sweep.
    #[inline]
    pub fn edge_tolerance(&self) -> f32 {
        self.tile.tile_size * self.collapse.edge_tolerance_factor
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("tile.initial_countdown", self.tile.initial_countdown)?;
        if !(self.tile.tile_size.is_finite() && self.tile.tile_size > 0.0) {
            return Err(ConfigError::Invalid {
                field: "tile.tile_size",
                reason: "must be finite and positive",
            });
        }
        non_negative("fall.distance", self.fall.distance)?;
        non_negative("fall.duration", self.fall.duration)?;
        non_negative("fall.post_fall_delay", self.fall.post_fall_delay)?;
        if !self.fall.relocation_height.is_finite() {
            return Err(ConfigError::Invalid {
                field: "fall.relocation_height",
                reason: "must be finite",
            });
        }
        non_negative("wobble.start_below", self.wobble.start_below)?;
        if !(0.0..=1.0).contains(&self.wobble.decay) {
            return Err(ConfigError::Invalid {
                field: "wobble.decay",
                reason: "must be within [0, 1]",
            });
        }
        if !(self.collapse.interval.is_finite() && self.collapse.interval > 0.0) {
            return Err(ConfigError::Invalid {
                field: "collapse.interval",
                reason: "must be finite and positive",
            });
        }
        non_negative("collapse.edge_tolerance_factor", self.collapse.edge_tolerance_factor)?;
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_rate",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: "must be finite and non-negative",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ArenaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tile.initial_countdown, 15.0);
        assert_eq!(config.edge_tolerance(), 1.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ArenaConfig::from_json_str(
            r#"{ "collapse": { "interval": 4.0 }, "fall": { "easing": "smooth_step" } }"#,
        )
        .unwrap();

        assert_eq!(config.collapse.interval, 4.0);
        assert_eq!(config.collapse.edge_tolerance_factor, 0.5);
        assert_eq!(config.fall.easing, FallEasing::SmoothStep);
        assert_eq!(config.fall.duration, 2.0);
        assert_eq!(config.tile, TileConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = ArenaConfig::from_json_str(r#"{ "tile": { "tile_size": 0.0 } }"#);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "tile.tile_size", .. })
        ));

        let result = ArenaConfig::from_json_str(r#"{ "fall": { "duration": -1.0 } }"#);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "fall.duration", .. })
        ));

        let result = ArenaConfig::from_json_str(r#"{ "tick_rate": 0 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid { field: "tick_rate", .. })));
    }

    #[test]
    fn test_malformed_json() {
        let result = ArenaConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = ArenaConfig::from_file("/definitely/not/here/arena.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_easing_endpoints() {
        for easing in [FallEasing::Linear, FallEasing::EaseIn, FallEasing::SmoothStep] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
            assert_eq!(easing.apply(2.0), 1.0);
        }
        assert_eq!(FallEasing::SmoothStep.apply(0.5), 0.5);
        assert_eq!(FallEasing::EaseIn.apply(0.5), 0.25);
    }
}
