//! Error types for Synheart Stride

use thiserror::Error;

use crate::types::TrackingState;

/// Errors surfaced by the tracker and its collaborators
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Unable to obtain an initial position after {attempts} attempts")]
    InitialFixUnavailable { attempts: u32 },

    /// A source stopped delivering mid-session. The session survives and
    /// reports it through `SessionSnapshot::stream_interrupted`.
    #[error("Location stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("A tracking session is already running")]
    SessionAlreadyActive,

    #[error("Cannot {operation} while {state}")]
    InvalidTransition {
        operation: &'static str,
        state: TrackingState,
    },

    #[error("Location provider error: {0}")]
    Provider(String),

    #[error("Tracker is no longer running")]
    TrackerClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Errors reported by a location provider
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("No position available: {0}")]
    NoFix(String),

    #[error("Subscription failed: {0}")]
    Subscription(String),
}

impl From<ProviderError> for TrackingError {
    fn from(err: ProviderError) -> Self {
        TrackingError::Provider(err.to_string())
    }
}

/// Errors from the activity store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt stored record: {0}")]
    Json(#[from] serde_json::Error),
}
