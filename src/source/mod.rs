//! Location sample sources
//!
//! A source pushes fixes into a [`SampleSink`] handed to it by the tracker.
//! Two variants exist: the live variant backed by a [`LocationProvider`]
//! (the platform positioning service), and the simulated variant replaying a
//! fixed route. Both deliver through the same sink, and both hand back a
//! [`Subscription`] whose cancellation stops delivery before it returns.

mod live;
mod replay;
pub mod simulated;

#[cfg(test)]
pub(crate) mod scripted;

pub use live::{acquire_initial_fix, request_access, subscribe_live};
pub use replay::ReplayProvider;
pub use simulated::{SimulatedRoute, DEFAULT_LOOP};

use crate::config::WatchOptions;
use crate::error::ProviderError;
use crate::geo::sample_distance_km;
use crate::types::LocationSample;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Outcome of a location permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Platform positioning service
#[async_trait]
pub trait LocationProvider: Send + Sync + 'static {
    /// Ask the user for foreground location access
    async fn request_permission(&self) -> PermissionStatus;

    /// Obtain a single fix
    async fn current_position(&self) -> Result<LocationSample, ProviderError>;

    /// Start a continuous subscription delivering fixes into `sink`
    async fn watch_position(
        &self,
        options: &WatchOptions,
        sink: SampleSink,
    ) -> Result<Box<dyn Subscription>, ProviderError>;
}

/// Handle on a running source
pub trait Subscription: Send {
    /// Stop delivery. Idempotent; no fix reaches the sink once this returns.
    fn cancel(&mut self);
}

/// What a source can report
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Sample(LocationSample),
    /// The source stopped delivering on its own
    Interrupted(String),
    /// A simulated route has been fully replayed
    Finished,
}

/// Source event tagged with the epoch of the subscription that produced it
#[derive(Debug, Clone)]
pub(crate) struct SourceMessage {
    pub epoch: u64,
    pub event: SourceEvent,
}

/// Callback endpoint handed to a source
#[derive(Debug, Clone)]
pub struct SampleSink {
    epoch: u64,
    tx: mpsc::UnboundedSender<SourceMessage>,
}

impl SampleSink {
    pub(crate) fn new(epoch: u64, tx: mpsc::UnboundedSender<SourceMessage>) -> Self {
        Self { epoch, tx }
    }

    /// Deliver a fix. Returns false once the tracker is gone.
    pub fn push(&self, sample: LocationSample) -> bool {
        self.send(SourceEvent::Sample(sample))
    }

    /// Report that the source stopped delivering
    pub fn interrupted(&self, reason: impl Into<String>) -> bool {
        self.send(SourceEvent::Interrupted(reason.into()))
    }

    pub(crate) fn finished(&self) -> bool {
        self.send(SourceEvent::Finished)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, event: SourceEvent) -> bool {
        self.tx
            .send(SourceMessage {
                epoch: self.epoch,
                event,
            })
            .is_ok()
    }
}

/// Subscription backed by a spawned task
#[derive(Debug)]
pub struct TaskSubscription {
    handle: Option<JoinHandle<()>>,
}

impl TaskSubscription {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Subscription for TaskSubscription {
    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TaskSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Admission filter applying the subscription's displacement and interval
/// minimums to a raw fix stream. The first fix is always admitted.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    min_distance_km: f64,
    min_interval_ms: i64,
    last: Option<LocationSample>,
}

impl WatchFilter {
    pub fn new(options: &WatchOptions) -> Self {
        Self {
            min_distance_km: options.min_distance_m / 1000.0,
            min_interval_ms: options.min_interval_ms as i64,
            last: None,
        }
    }

    /// Whether `sample` should be delivered
    pub fn admit(&mut self, sample: &LocationSample) -> bool {
        let admitted = match &self.last {
            None => true,
            Some(last) => {
                sample.timestamp - last.timestamp >= self.min_interval_ms
                    && sample_distance_km(last, sample) >= self.min_distance_km
            }
        };
        if admitted {
            self.last = Some(sample.clone());
        }
        admitted
    }
}
