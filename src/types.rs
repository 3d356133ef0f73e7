//! Core types for the Synheart Stride tracker
//!
//! This module defines the data structures that flow through a tracking
//! session: raw location samples, the observable session snapshot, the
//! result of stopping a session, and the completed activity record that is
//! handed to the activity store.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single position fix, immutable once recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Fix time (ms since Unix epoch)
    pub timestamp: i64,
    /// Horizontal accuracy radius (meters)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Altitude (meters)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Ground speed reported by the source (m/s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            accuracy: None,
            altitude: None,
            speed: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy = Some(accuracy_m);
        self
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed = Some(speed_mps);
        self
    }

    /// Whether this fix is precise enough to keep in a finalized path.
    /// Fixes without a reported accuracy are kept.
    pub fn is_precise(&self, max_accuracy_m: f64) -> bool {
        self.accuracy.map_or(true, |acc| acc <= max_accuracy_m)
    }
}

/// A fixed point on a simulated route
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl Waypoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<&LocationSample> for Waypoint {
    fn from(sample: &LocationSample) -> Self {
        Self::new(sample.latitude, sample.longitude)
    }
}

/// Lifecycle state of the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    Idle,
    Active,
    Paused,
}

impl TrackingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingState::Idle => "idle",
            TrackingState::Active => "active",
            TrackingState::Paused => "paused",
        }
    }
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable view of the live session, published after every mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: TrackingState,
    /// True only while a simulated source feeds an active session
    pub simulating: bool,
    /// Session start (ms since epoch)
    pub started_at: Option<i64>,
    pub elapsed_seconds: u64,
    pub distance_km: f64,
    pub speed_kmh: f64,
    pub calories: u32,
    pub sample_count: usize,
    /// Set when the live source stopped delivering mid-session
    pub stream_interrupted: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: TrackingState::Idle,
            simulating: false,
            started_at: None,
            elapsed_seconds: 0,
            distance_km: 0.0,
            speed_kmh: 0.0,
            calories: 0,
            sample_count: 0,
            stream_interrupted: false,
        }
    }
}

/// Everything a stopped session leaves behind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedSession {
    /// Session start (ms since epoch)
    pub started_at: i64,
    pub elapsed_seconds: u64,
    pub distance_km: f64,
    pub speed_kmh: f64,
    pub calories: u32,
    /// Every sample recorded, in arrival order
    pub samples: Vec<LocationSample>,
}

/// Immutable record of a finished activity, as persisted by the activity store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedActivity {
    pub id: String,
    /// Human-readable day, e.g. "October 17"
    pub date: String,
    /// Session start in the device's local offset
    pub started_at: DateTime<FixedOffset>,
    pub distance_km: f64,
    pub duration_seconds: u64,
    pub calories: u32,
    /// Last instantaneous speed shown when the run was finished (km/h)
    pub speed_kmh: f64,
    /// Distance over moving time (km/h)
    pub average_speed_kmh: f64,
    /// Finalized path (low-accuracy fixes removed)
    pub route: Vec<LocationSample>,
}

impl CompletedActivity {
    /// Duration formatted as HH:MM:SS
    pub fn duration_label(&self) -> String {
        format_duration(self.duration_seconds)
    }

    /// Distance with two decimals, as shown in activity lists
    pub fn distance_label(&self) -> String {
        format!("{:.2}", self.distance_km)
    }

    /// Speed with one decimal
    pub fn speed_label(&self) -> String {
        format!("{:.1}", self.speed_kmh)
    }

    pub fn duration_minutes(&self) -> u64 {
        self.duration_seconds / 60
    }
}

/// Format a number of seconds as HH:MM:SS
pub fn format_duration(seconds: u64) -> String {
    let hrs = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hrs:02}:{mins:02}:{secs:02}")
}
