//! Synheart Stride - On-device live activity tracking engine
//!
//! Stride turns a stream of location fixes into run statistics through a
//! single-owner tracking session: location source → incremental distance,
//! speed and calories → pause-aware elapsed time → completed activity.
//!
//! ## Modules
//!
//! - **Tracking**: [`Tracker`] drives a session from a live or simulated
//!   location source and publishes [`SessionSnapshot`]s
//! - **History**: finalized activities, the activity store and badge evaluation
//! - **Sensors**: platform step counting

pub mod achievements;
pub mod activity;
pub mod clock;
pub mod config;
pub mod error;
pub mod geo;
pub mod pedometer;
pub mod session;
pub mod source;
pub mod store;
pub mod timer;
pub mod tracker;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use achievements::{evaluate as evaluate_badges, BadgeBook, BadgeId, UnlockedBadge};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{SimulationConfig, TrackerConfig, WatchOptions};
pub use error::{ProviderError, StoreError, TrackingError};
pub use geo::distance_km;
pub use pedometer::{Pedometer, Platform};
pub use source::{LocationProvider, PermissionStatus, ReplayProvider, SimulatedRoute};
pub use store::{ActivityStore, JsonFileStore, MemoryStore};
pub use tracker::Tracker;
pub use types::{
    CompletedActivity, FinishedSession, LocationSample, SessionSnapshot, TrackingState,
};

/// Stride library version
pub const STRIDE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "synheart-stride";
