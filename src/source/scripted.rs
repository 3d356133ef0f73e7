//! Scripted location provider for tests

use super::{LocationProvider, PermissionStatus, SampleSink, Subscription};
use crate::config::WatchOptions;
use crate::error::ProviderError;
use crate::types::LocationSample;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct ScriptState {
    permission_granted: bool,
    fixes: VecDeque<Result<LocationSample, ProviderError>>,
    fallback_fix: Option<LocationSample>,
    fail_watch: bool,
    next_id: u64,
    sinks: Vec<(u64, SampleSink)>,
    permission_requests: usize,
    fix_requests: usize,
    watch_calls: usize,
}

/// Provider whose behavior is set up by the test and whose fixes are pushed by hand
#[derive(Clone)]
pub(crate) struct ScriptedProvider {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedProvider {
    pub fn granted() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                permission_granted: true,
                ..Default::default()
            })),
        }
    }

    pub fn denied() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState::default())),
        }
    }

    /// Granted provider that answers every fix request with `fix`
    pub fn with_fix(fix: LocationSample) -> Self {
        let provider = Self::granted();
        provider.lock().fallback_fix = Some(fix);
        provider
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap()
    }

    pub fn push_fix(&self, fix: Result<LocationSample, ProviderError>) {
        self.lock().fixes.push_back(fix);
    }

    pub fn set_permission(&self, granted: bool) {
        self.lock().permission_granted = granted;
    }

    pub fn fail_watch(&self, fail: bool) {
        self.lock().fail_watch = fail;
    }

    /// Deliver a fix to every open subscription; returns how many received it
    pub fn emit(&self, sample: LocationSample) -> usize {
        self.lock()
            .sinks
            .iter()
            .filter(|(_, sink)| sink.push(sample.clone()))
            .count()
    }

    pub fn interrupt(&self, reason: &str) {
        for (_, sink) in &self.lock().sinks {
            sink.interrupted(reason);
        }
    }

    pub fn open_subscriptions(&self) -> usize {
        self.lock().sinks.len()
    }

    pub fn permission_requests(&self) -> usize {
        self.lock().permission_requests
    }

    pub fn fix_requests(&self) -> usize {
        self.lock().fix_requests
    }

    pub fn watch_calls(&self) -> usize {
        self.lock().watch_calls
    }
}

struct ScriptedSubscription {
    id: u64,
    state: Arc<Mutex<ScriptState>>,
}

impl Subscription for ScriptedSubscription {
    fn cancel(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.sinks.retain(|(id, _)| *id != self.id);
    }
}

#[async_trait]
impl LocationProvider for ScriptedProvider {
    async fn request_permission(&self) -> PermissionStatus {
        let mut state = self.lock();
        state.permission_requests += 1;
        if state.permission_granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }

    async fn current_position(&self) -> Result<LocationSample, ProviderError> {
        let mut state = self.lock();
        state.fix_requests += 1;
        match state.fixes.pop_front() {
            Some(fix) => fix,
            None => state
                .fallback_fix
                .clone()
                .ok_or_else(|| ProviderError::NoFix("no satellites".to_string())),
        }
    }

    async fn watch_position(
        &self,
        _options: &WatchOptions,
        sink: SampleSink,
    ) -> Result<Box<dyn Subscription>, ProviderError> {
        let mut state = self.lock();
        state.watch_calls += 1;
        if state.fail_watch {
            return Err(ProviderError::Subscription("sensor busy".to_string()));
        }
        state.next_id += 1;
        let id = state.next_id;
        state.sinks.push((id, sink));
        Ok(Box::new(ScriptedSubscription {
            id,
            state: Arc::clone(&self.state),
        }))
    }
}
