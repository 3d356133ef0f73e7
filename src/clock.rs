//! Wall-clock access
//!
//! Elapsed time is always derived from clock readings, so the clock is
//! injected rather than read globally.

use chrono::{DateTime, FixedOffset, Local, Offset, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of the current time
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> i64;

    /// Local UTC offset applied to clock readings
    fn offset(&self) -> FixedOffset;

    /// A clock reading rendered in the local offset
    fn local_time(&self, epoch_ms: i64) -> DateTime<FixedOffset> {
        let utc = Utc
            .timestamp_millis_opt(epoch_ms)
            .single()
            .unwrap_or_else(Utc::now);
        utc.with_timezone(&self.offset())
    }
}

/// The system clock in the device's local offset
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn offset(&self) -> FixedOffset {
        *Local::now().offset()
    }
}

/// A manually advanced clock with a fixed offset
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
    offset: FixedOffset,
}

impl ManualClock {
    /// Create a UTC clock starting at `start_ms`
    pub fn new(start_ms: i64) -> Self {
        Self::with_offset(start_ms, Utc.fix())
    }

    pub fn with_offset(start_ms: i64, offset: FixedOffset) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(start_ms)),
            offset,
        }
    }

    pub fn advance_ms(&self, ms: i64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance_ms(secs * 1000);
    }

    pub fn set_ms(&self, ms: i64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_manual_clock_shares_state_across_clones() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();
        clock.advance_secs(2);
        assert_eq!(other.now_ms(), 3_000);
        other.set_ms(10);
        assert_eq!(clock.now_ms(), 10);
    }

    #[test]
    fn test_local_time_uses_offset() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        // 2024-01-15T04:30:00Z
        let clock = ManualClock::with_offset(1_705_293_000_000, offset);
        let local = clock.local_time(clock.now_ms());
        assert_eq!(local.hour(), 6);
        assert_eq!(local.minute(), 30);
    }
}
