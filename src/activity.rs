//! Activity finalization
//!
//! Turns the raw result of a stopped session into the immutable record kept
//! in activity history. Live statistics were computed over every fix; the
//! persisted route keeps only fixes precise enough to draw.

use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::geo::path_length_km;
use crate::types::{CompletedActivity, FinishedSession, LocationSample};
use uuid::Uuid;

/// Keep only fixes whose reported accuracy is within `max_accuracy_m`
pub fn filter_precise(samples: Vec<LocationSample>, max_accuracy_m: f64) -> Vec<LocationSample> {
    samples
        .into_iter()
        .filter(|s| s.is_precise(max_accuracy_m))
        .collect()
}

/// Average speed in km/h over `seconds` of moving time
pub fn average_speed_kmh(distance_km: f64, seconds: u64) -> f64 {
    if seconds == 0 {
        return 0.0;
    }
    distance_km / (seconds as f64 / 3600.0)
}

impl FinishedSession {
    /// Build the activity record for this session
    pub fn into_activity(self, clock: &dyn Clock, config: &TrackerConfig) -> CompletedActivity {
        let started_at = clock.local_time(self.started_at);
        let recorded = self.samples.len();
        let route = filter_precise(self.samples, config.max_path_accuracy_m);

        if route.len() < recorded {
            tracing::debug!(
                dropped = recorded - route.len(),
                max_accuracy_m = config.max_path_accuracy_m,
                route_km = path_length_km(&route),
                "Excluded imprecise fixes from route"
            );
        }

        CompletedActivity {
            id: Uuid::new_v4().to_string(),
            date: started_at.format("%B %-d").to_string(),
            started_at,
            distance_km: self.distance_km,
            duration_seconds: self.elapsed_seconds,
            calories: self.calories,
            speed_kmh: self.speed_kmh,
            average_speed_kmh: average_speed_kmh(self.distance_km, self.elapsed_seconds),
            route,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{FixedOffset, Timelike};

    // 2024-10-17T05:45:00Z
    const STARTED: i64 = 1_729_143_900_000;

    fn finished() -> FinishedSession {
        FinishedSession {
            started_at: STARTED,
            elapsed_seconds: 1800,
            distance_km: 5.2,
            speed_kmh: 10.8,
            calories: 312,
            samples: vec![
                LocationSample::new(47.0, -0.5, STARTED).with_accuracy(5.0),
                LocationSample::new(47.001, -0.5, STARTED + 1000).with_accuracy(35.0),
                LocationSample::new(47.002, -0.5, STARTED + 2000),
                LocationSample::new(47.003, -0.5, STARTED + 3000).with_accuracy(20.0),
            ],
        }
    }

    #[test]
    fn test_route_excludes_imprecise_fixes_only() {
        let clock = ManualClock::new(STARTED);
        let activity = finished().into_activity(&clock, &TrackerConfig::default());

        let timestamps: Vec<i64> = activity.route.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![STARTED, STARTED + 2000, STARTED + 3000]);
        // Statistics are carried over untouched
        assert_eq!(activity.distance_km, 5.2);
        assert_eq!(activity.calories, 312);
    }

    #[test]
    fn test_labels_and_local_start() {
        let clock = ManualClock::with_offset(STARTED, FixedOffset::east_opt(2 * 3600).unwrap());
        let activity = finished().into_activity(&clock, &TrackerConfig::default());

        assert_eq!(activity.date, "October 17");
        assert_eq!(activity.started_at.hour(), 7);
        assert_eq!(activity.duration_label(), "00:30:00");
        assert_eq!(activity.distance_label(), "5.20");
        assert_eq!(activity.speed_label(), "10.8");
        assert!((activity.average_speed_kmh - 10.4).abs() < 1e-9);
        assert!(Uuid::parse_str(&activity.id).is_ok());
    }

    #[test]
    fn test_zero_duration_average() {
        assert_eq!(average_speed_kmh(1.0, 0), 0.0);
        assert!((average_speed_kmh(6.0, 1800) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_activity_json_roundtrip() {
        let clock = ManualClock::new(STARTED);
        let activity = finished().into_activity(&clock, &TrackerConfig::default());
        let json = serde_json::to_string(&activity).unwrap();
        let parsed: CompletedActivity = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, activity);
    }
}
