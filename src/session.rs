//! Live tracking session state
//!
//! `TrackingSession` holds the numbers of one run and the rules for updating
//! them. It owns no resources and never reads the clock itself: every
//! time-dependent operation takes `now` (ms since epoch), which keeps the
//! elapsed-time invariant `elapsed = now - started - paused` checkable in
//! isolation. The tracker actor is its only writer.

use crate::error::TrackingError;
use crate::geo::sample_distance_km;
use crate::types::{FinishedSession, LocationSample, SessionSnapshot, TrackingState};

/// m/s to km/h
const MPS_TO_KMH: f64 = 3.6;

#[derive(Debug, Clone)]
pub struct TrackingSession {
    state: TrackingState,
    started_at: i64,
    accumulated_pause_ms: i64,
    last_pause_at: Option<i64>,
    elapsed_seconds: u64,
    distance_km: f64,
    speed_kmh: f64,
    calories: u32,
    samples: Vec<LocationSample>,
    calories_per_km: f64,
    /// Index of the first sample of the running simulated segment
    simulation_start: Option<usize>,
    stream_interrupted: bool,
}

impl TrackingSession {
    /// Open an active session at `started_at`
    pub fn new(started_at: i64, calories_per_km: f64) -> Self {
        Self {
            state: TrackingState::Active,
            started_at,
            accumulated_pause_ms: 0,
            last_pause_at: None,
            elapsed_seconds: 0,
            distance_km: 0.0,
            speed_kmh: 0.0,
            calories: 0,
            samples: Vec::new(),
            calories_per_km,
            simulation_start: None,
            stream_interrupted: false,
        }
    }

    /// Open an active session whose path starts at the initial fix
    pub fn with_initial_fix(started_at: i64, calories_per_km: f64, fix: LocationSample) -> Self {
        let mut session = Self::new(started_at, calories_per_km);
        session.samples.push(fix);
        session
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TrackingState::Active
    }

    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed_kmh
    }

    pub fn calories(&self) -> u32 {
        self.calories
    }

    pub fn samples(&self) -> &[LocationSample] {
        &self.samples
    }

    pub fn last_sample(&self) -> Option<&LocationSample> {
        self.samples.last()
    }

    pub fn is_simulating(&self) -> bool {
        self.simulation_start.is_some()
    }

    /// Append a sample and update distance, speed and calories
    pub fn apply_sample(&mut self, sample: LocationSample) {
        if let Some(previous) = self.samples.last() {
            self.distance_km += sample_distance_km(previous, &sample);
        }

        self.speed_kmh = sample.speed.map_or(0.0, |mps| mps * MPS_TO_KMH);
        self.calories = (self.distance_km * self.calories_per_km).floor() as u32;
        self.samples.push(sample);
        self.stream_interrupted = false;
    }

    /// Elapsed whole seconds at `now`, excluding every paused interval
    /// (including one still in progress)
    pub fn elapsed_at(&self, now: i64) -> u64 {
        let open_pause = self.last_pause_at.map_or(0, |paused_at| now - paused_at);
        let active_ms = now - self.started_at - self.accumulated_pause_ms - open_pause;
        (active_ms.max(0) / 1000) as u64
    }

    /// Recompute elapsed time from the clock. No-op unless active.
    pub fn refresh_elapsed(&mut self, now: i64) {
        if self.is_active() {
            self.elapsed_seconds = self.elapsed_at(now);
        }
    }

    pub fn pause(&mut self, now: i64) -> Result<(), TrackingError> {
        if !self.is_active() {
            return Err(TrackingError::InvalidTransition {
                operation: "pause",
                state: self.state,
            });
        }
        self.elapsed_seconds = self.elapsed_at(now);
        self.last_pause_at = Some(now);
        self.state = TrackingState::Paused;
        Ok(())
    }

    pub fn resume(&mut self, now: i64) -> Result<(), TrackingError> {
        if self.state != TrackingState::Paused {
            return Err(TrackingError::InvalidTransition {
                operation: "resume",
                state: self.state,
            });
        }
        if let Some(paused_at) = self.last_pause_at.take() {
            self.accumulated_pause_ms += (now - paused_at).max(0);
        }
        self.state = TrackingState::Active;
        self.elapsed_seconds = self.elapsed_at(now);
        Ok(())
    }

    /// Mark the start of a simulated segment
    pub fn begin_simulated_segment(&mut self) {
        if self.simulation_start.is_none() {
            self.simulation_start = Some(self.samples.len());
        }
    }

    /// Close the simulated segment and return the samples it recorded
    pub fn end_simulated_segment(&mut self) -> Vec<LocationSample> {
        match self.simulation_start.take() {
            Some(start) => self.samples[start.min(self.samples.len())..].to_vec(),
            None => Vec::new(),
        }
    }

    pub fn mark_stream_interrupted(&mut self) {
        self.stream_interrupted = true;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            simulating: self.is_simulating(),
            started_at: Some(self.started_at),
            elapsed_seconds: self.elapsed_seconds,
            distance_km: self.distance_km,
            speed_kmh: self.speed_kmh,
            calories: self.calories,
            sample_count: self.samples.len(),
            stream_interrupted: self.stream_interrupted,
        }
    }

    /// Close the session, handing back everything it recorded
    pub fn finish(self, now: i64) -> FinishedSession {
        FinishedSession {
            started_at: self.started_at,
            elapsed_seconds: self.elapsed_at(now),
            distance_km: self.distance_km,
            speed_kmh: self.speed_kmh,
            calories: self.calories,
            samples: self.samples,
        }
    }
}
