//! Elapsed-time tick driver
//!
//! A single repeating task sends a tick into the tracker once per period.
//! Ticks carry no time value: the tracker re-derives elapsed time from its
//! clock on each one, so a late or dropped tick never skews the counter.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Default)]
pub struct TimerDriver {
    handle: Option<JoinHandle<()>>,
}

impl TimerDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking into `tx`. A no-op while a tick task is already running.
    pub fn start(&mut self, period: Duration, tx: mpsc::UnboundedSender<()>) {
        if self.is_running() {
            tracing::debug!("Timer already running");
            return;
        }

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tx.send(()).is_err() {
                    break;
                }
            }
        });
        self.handle = Some(handle);
    }

    /// Stop ticking. Safe to call when already stopped.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
