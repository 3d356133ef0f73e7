//! Activity history storage
//!
//! The store is an external collaborator: the tracker never waits on it and
//! a failed write never touches session state. Writes are handed to the
//! blocking pool and their failures are logged.

use crate::error::StoreError;
use crate::types::CompletedActivity;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Durable activity history, newest first
pub trait ActivityStore: Send + Sync + 'static {
    /// Record a completed activity
    fn append(&self, activity: &CompletedActivity) -> Result<(), StoreError>;

    /// Every stored activity, newest first
    fn load_all(&self) -> Result<Vec<CompletedActivity>, StoreError>;
}

/// History kept as a single JSON array on disk
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<CompletedActivity>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(Vec::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, activities: &[CompletedActivity]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(activities)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Move an unreadable history file out of the way, keeping it for inspection
    fn quarantine(&self) -> Result<PathBuf, StoreError> {
        let target = self.path.with_extension("json.corrupt");
        std::fs::rename(&self.path, &target)?;
        Ok(target)
    }
}

impl ActivityStore for JsonFileStore {
    fn append(&self, activity: &CompletedActivity) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut activities = match self.read() {
            Ok(activities) => activities,
            Err(StoreError::Json(err)) => {
                let moved_to = self.quarantine()?;
                tracing::error!(
                    path = %self.path.display(),
                    moved_to = %moved_to.display(),
                    %err,
                    "Unreadable activity history set aside, starting a new one"
                );
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        activities.insert(0, activity.clone());
        self.write(&activities)
    }

    fn load_all(&self) -> Result<Vec<CompletedActivity>, StoreError> {
        self.read()
    }
}

/// In-memory history
#[derive(Debug, Default)]
pub struct MemoryStore {
    activities: Mutex<Vec<CompletedActivity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActivityStore for MemoryStore {
    fn append(&self, activity: &CompletedActivity) -> Result<(), StoreError> {
        let mut activities = self
            .activities
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        activities.insert(0, activity.clone());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<CompletedActivity>, StoreError> {
        let activities = self
            .activities
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(activities.clone())
    }
}

/// Write `activity` off the caller's task. Failures are logged, never returned.
pub fn persist_in_background(
    store: Arc<dyn ActivityStore>,
    activity: CompletedActivity,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || match store.append(&activity) {
        Ok(()) => tracing::debug!(id = %activity.id, "Activity saved"),
        Err(err) => tracing::error!(id = %activity.id, %err, "Error saving activity"),
    })
}

/// Load history at startup; an unreadable store yields an empty history
pub fn load_history(store: &dyn ActivityStore) -> Vec<CompletedActivity> {
    match store.load_all() {
        Ok(activities) => activities,
        Err(err) => {
            tracing::error!(%err, "Error loading activities");
            Vec::new()
        }
    }
}
