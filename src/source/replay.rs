//! Recorded-track provider
//!
//! Plays back a recorded sequence of fixes through the live-provider path,
//! honoring the subscription's delivery minimums. Used by the CLI and for
//! running the tracker against field recordings without a device.

use super::{
    LocationProvider, PermissionStatus, SampleSink, Subscription, TaskSubscription, WatchFilter,
};
use crate::config::WatchOptions;
use crate::error::{ProviderError, TrackingError};
use crate::types::LocationSample;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Replays a recording like a positioning service would: the track keeps
/// moving forward across subscriptions and never rewinds.
#[derive(Debug, Clone)]
pub struct ReplayProvider {
    samples: Arc<Vec<LocationSample>>,
    pace: Duration,
    /// Index of the next fix to play; the fix before it is the current position
    cursor: Arc<AtomicUsize>,
}

impl ReplayProvider {
    /// Replay `samples`, delivering one raw fix per `pace`.
    /// The first sample serves as the initial fix.
    pub fn new(samples: Vec<LocationSample>, pace: Duration) -> Self {
        Self {
            samples: Arc::new(samples),
            pace,
            cursor: Arc::new(AtomicUsize::new(1)),
        }
    }

    /// Parse NDJSON (one sample per line)
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<LocationSample>, TrackingError> {
        let mut samples = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let sample: LocationSample = serde_json::from_str(trimmed).map_err(|e| {
                TrackingError::Provider(format!("Failed to parse line {}: {}", line_num + 1, e))
            })?;
            samples.push(sample);
        }
        Ok(samples)
    }

    /// Load an NDJSON recording from disk
    pub fn from_path(path: impl AsRef<Path>, pace: Duration) -> Result<Self, TrackingError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            TrackingError::Provider(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(Self::new(Self::parse_ndjson(&text)?, pace))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total playback time of the recording, saturating for absurd paces
    pub fn duration(&self) -> Duration {
        let count = u32::try_from(self.samples.len()).unwrap_or(u32::MAX);
        self.pace.checked_mul(count).unwrap_or(Duration::MAX)
    }

    /// Fixes not yet played back
    pub fn remaining(&self) -> usize {
        self.samples
            .len()
            .saturating_sub(self.cursor.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl LocationProvider for ReplayProvider {
    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn current_position(&self) -> Result<LocationSample, ProviderError> {
        let played = self.cursor.load(Ordering::SeqCst);
        played
            .checked_sub(1)
            .and_then(|i| self.samples.get(i))
            .cloned()
            .ok_or_else(|| ProviderError::NoFix("recording is empty".to_string()))
    }

    async fn watch_position(
        &self,
        options: &WatchOptions,
        sink: SampleSink,
    ) -> Result<Box<dyn Subscription>, ProviderError> {
        let samples = Arc::clone(&self.samples);
        let cursor = Arc::clone(&self.cursor);
        let start = cursor.load(Ordering::SeqCst);

        // Displacement minimums apply from the position already played
        let mut filter = WatchFilter::new(options);
        if let Some(current) = start.checked_sub(1).and_then(|i| samples.get(i)) {
            filter.admit(current);
        }
        let pace = self.pace;

        let handle = tokio::spawn(async move {
            for (index, sample) in samples.iter().enumerate().skip(start) {
                tokio::time::sleep(pace).await;
                cursor.store(index + 1, Ordering::SeqCst);
                if filter.admit(sample) && !sink.push(sample.clone()) {
                    return;
                }
            }
            sink.interrupted("recording exhausted");
        });

        Ok(Box::new(TaskSubscription::new(handle)))
    }
}
