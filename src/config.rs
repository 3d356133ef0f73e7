//! Tracker configuration
//!
//! All tunables of the tracking pipeline live here. Every field has a default,
//! so a partial JSON document overrides only what it names.

use crate::error::TrackingError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default number of attempts to obtain the initial fix
pub const DEFAULT_INITIAL_FIX_ATTEMPTS: u32 = 3;

/// Default pause between initial-fix attempts (ms)
pub const DEFAULT_INITIAL_FIX_BACKOFF_MS: u64 = 1000;

/// Default elapsed-time refresh period (ms)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Fixes worse than this are excluded from a finalized path (meters)
pub const DEFAULT_MAX_PATH_ACCURACY_M: f64 = 20.0;

/// Linear energy model: kcal burned per kilometer
pub const DEFAULT_CALORIES_PER_KM: f64 = 60.0;

/// Delivery constraints requested from a live location subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    /// Minimum displacement between delivered fixes (meters)
    pub min_distance_m: f64,
    /// Minimum time between delivered fixes (ms)
    pub min_interval_ms: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            min_distance_m: 5.0,
            min_interval_ms: 1000,
        }
    }
}

/// Simulated GPS feed settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Interpolated steps between consecutive waypoints
    pub steps_per_segment: u32,
    /// Delivery period of one interpolated point (ms)
    pub point_interval_ms: u64,
    /// Speed stamped on every synthetic fix (m/s)
    pub synthetic_speed_mps: f64,
    /// Accuracy stamped on every synthetic fix (meters)
    pub synthetic_accuracy_m: f64,
    /// Spacing of synthetic timestamps (ms)
    pub synthetic_timestamp_step_ms: i64,
    /// Prefix the route with the last recorded sample so the path stays continuous
    pub lead_in_from_last_sample: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            steps_per_segment: 10,
            point_interval_ms: 200,
            synthetic_speed_mps: 3.0,
            synthetic_accuracy_m: 10.0,
            synthetic_timestamp_step_ms: 1000,
            lead_in_from_last_sample: true,
        }
    }
}

/// Top-level tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub initial_fix_attempts: u32,
    pub initial_fix_backoff_ms: u64,
    pub tick_interval_ms: u64,
    pub watch: WatchOptions,
    pub simulation: SimulationConfig,
    pub max_path_accuracy_m: f64,
    pub calories_per_km: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            initial_fix_attempts: DEFAULT_INITIAL_FIX_ATTEMPTS,
            initial_fix_backoff_ms: DEFAULT_INITIAL_FIX_BACKOFF_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            watch: WatchOptions::default(),
            simulation: SimulationConfig::default(),
            max_path_accuracy_m: DEFAULT_MAX_PATH_ACCURACY_M,
            calories_per_km: DEFAULT_CALORIES_PER_KM,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, TrackingError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TrackingError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            TrackingError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Reject values the tracker cannot run with
    pub fn validate(&self) -> Result<(), TrackingError> {
        if self.initial_fix_attempts == 0 {
            return Err(TrackingError::InvalidConfig(
                "initial_fix_attempts must be at least 1".to_string(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(TrackingError::InvalidConfig(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.simulation.steps_per_segment == 0 {
            return Err(TrackingError::InvalidConfig(
                "simulation.steps_per_segment must be at least 1".to_string(),
            ));
        }
        if self.simulation.point_interval_ms == 0 {
            return Err(TrackingError::InvalidConfig(
                "simulation.point_interval_ms must be positive".to_string(),
            ));
        }
        if !(self.calories_per_km.is_finite() && self.calories_per_km >= 0.0) {
            return Err(TrackingError::InvalidConfig(
                "calories_per_km must be a non-negative number".to_string(),
            ));
        }
        if !(self.max_path_accuracy_m.is_finite() && self.max_path_accuracy_m > 0.0) {
            return Err(TrackingError::InvalidConfig(
                "max_path_accuracy_m must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_initial_fix_attempts(mut self, attempts: u32) -> Self {
        self.initial_fix_attempts = attempts;
        self
    }

    pub fn with_tick_interval_ms(mut self, interval_ms: u64) -> Self {
        self.tick_interval_ms = interval_ms;
        self
    }

    pub fn with_simulation(mut self, simulation: SimulationConfig) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn with_max_path_accuracy_m(mut self, accuracy_m: f64) -> Self {
        self.max_path_accuracy_m = accuracy_m;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn initial_fix_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_fix_backoff_ms)
    }
}

impl SimulationConfig {
    pub fn point_interval(&self) -> Duration {
        Duration::from_millis(self.point_interval_ms)
    }
}
