//! Simulated GPS feed
//!
//! A closed-loop polyline is densified by linear interpolation and replayed
//! one point per period, once, after which the source reports that it has
//! finished.

use super::{SampleSink, TaskSubscription};
use crate::config::SimulationConfig;
use crate::types::{LocationSample, Waypoint};
use std::time::Duration;

/// Default loop: a ~300 m circuit in central Angers, closed on its first point
pub const DEFAULT_LOOP: [Waypoint; 6] = [
    Waypoint::new(47.478870, -0.563408),
    Waypoint::new(47.479200, -0.563150),
    Waypoint::new(47.479500, -0.563800),
    Waypoint::new(47.479100, -0.564500),
    Waypoint::new(47.478600, -0.564000),
    Waypoint::new(47.478870, -0.563408),
];

/// A polyline to replay
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedRoute {
    waypoints: Vec<Waypoint>,
}

impl Default for SimulatedRoute {
    fn default() -> Self {
        Self::new(DEFAULT_LOOP.to_vec())
    }
}

impl SimulatedRoute {
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self { waypoints }
    }

    /// Prefix the route with `start` so replay begins where the runner is
    pub fn with_lead_in(mut self, start: Waypoint) -> Self {
        self.waypoints.insert(0, start);
        self
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Densify the route: `steps` points per segment plus the final waypoint,
    /// i.e. `(n - 1) * steps + 1` points for `n` waypoints.
    pub fn interpolate(&self, steps: u32) -> Vec<Waypoint> {
        let Some(last) = self.waypoints.last() else {
            return Vec::new();
        };
        let steps = steps.max(1);

        let mut points = Vec::with_capacity((self.waypoints.len() - 1) * steps as usize + 1);
        for segment in self.waypoints.windows(2) {
            let (from, to) = (segment[0], segment[1]);
            for step in 0..steps {
                let progress = f64::from(step) / f64::from(steps);
                points.push(Waypoint::new(
                    from.latitude + (to.latitude - from.latitude) * progress,
                    from.longitude + (to.longitude - from.longitude) * progress,
                ));
            }
        }
        points.push(*last);
        points
    }

    /// Synthetic fixes for the whole route, timestamped from `start_ms`
    pub fn samples(&self, config: &SimulationConfig, start_ms: i64) -> Vec<LocationSample> {
        self.interpolate(config.steps_per_segment)
            .into_iter()
            .enumerate()
            .map(|(i, point)| {
                LocationSample::new(
                    point.latitude,
                    point.longitude,
                    start_ms + i as i64 * config.synthetic_timestamp_step_ms,
                )
                .with_accuracy(config.synthetic_accuracy_m)
                .with_speed(config.synthetic_speed_mps)
            })
            .collect()
    }
}

/// Replay `points` into `sink`, one per `period`, then report completion.
/// The first point is delivered one period after the call.
pub(crate) fn spawn_replay(
    points: Vec<LocationSample>,
    period: Duration,
    sink: SampleSink,
) -> TaskSubscription {
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        let total = points.len();

        for point in points {
            ticker.tick().await;
            if !sink.push(point) {
                return;
            }
        }

        tracing::debug!(points = total, "Simulated route replay complete");
        sink.finished();
    });

    TaskSubscription::new(handle)
}
