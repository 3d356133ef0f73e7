//! Step counting
//!
//! Platforms disagree on what a step update means: iOS reports the running
//! total since the subscription began and can also report steps since
//! midnight, while Android reports one event per detected step. Each meaning
//! has its own [`StepCounting`] implementation, chosen once at startup.

use serde::{Deserialize, Serialize};

/// Mobile platform family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    /// The platform this binary was built for (Android semantics elsewhere)
    pub fn current() -> Self {
        if cfg!(target_os = "ios") {
            Platform::Ios
        } else {
            Platform::Android
        }
    }
}

/// Interpretation of pedometer updates
pub trait StepCounting: Send {
    /// Seed with the steps already taken today, when the platform can report them
    fn seed(&mut self, steps_today: u32);

    /// Apply one update; `reported` is the platform's raw value
    fn apply(&mut self, reported: u32);

    fn total(&self) -> u32;
}

/// Updates carry the running total since the subscription began
#[derive(Debug, Clone, Default)]
pub struct CumulativeSteps {
    baseline: u32,
    since_subscribe: u32,
}

impl StepCounting for CumulativeSteps {
    fn seed(&mut self, steps_today: u32) {
        self.baseline = steps_today;
    }

    fn apply(&mut self, reported: u32) {
        // Totals only grow within a subscription
        self.since_subscribe = self.since_subscribe.max(reported);
    }

    fn total(&self) -> u32 {
        self.baseline.saturating_add(self.since_subscribe)
    }
}

/// Each update is a single detected step; history is not available
#[derive(Debug, Clone, Default)]
pub struct IncrementalSteps {
    count: u32,
}

impl StepCounting for IncrementalSteps {
    fn seed(&mut self, _steps_today: u32) {}

    fn apply(&mut self, _reported: u32) {
        self.count = self.count.saturating_add(1);
    }

    fn total(&self) -> u32 {
        self.count
    }
}

/// Step counter bound to a platform's semantics
pub struct Pedometer {
    available: bool,
    counter: Box<dyn StepCounting>,
}

impl Default for Pedometer {
    /// Counter for the platform this binary targets
    fn default() -> Self {
        Self::for_platform(Platform::current())
    }
}

impl Pedometer {
    pub fn for_platform(platform: Platform) -> Self {
        let counter: Box<dyn StepCounting> = match platform {
            Platform::Ios => Box::new(CumulativeSteps::default()),
            Platform::Android => Box::new(IncrementalSteps::default()),
        };
        tracing::debug!(?platform, "Pedometer configured");
        Self {
            available: true,
            counter,
        }
    }

    /// A pedometer for a device without a step sensor
    pub fn unavailable() -> Self {
        Self {
            available: false,
            counter: Box::new(IncrementalSteps::default()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn seed(&mut self, steps_today: u32) {
        if self.available {
            self.counter.seed(steps_today);
        }
    }

    pub fn on_update(&mut self, reported: u32) {
        if self.available {
            self.counter.apply(reported);
        }
    }

    /// Mark the sensor as failed; the count reads zero from now on
    pub fn mark_unavailable(&mut self, reason: &str) {
        tracing::warn!(%reason, "Pedometer unavailable");
        self.available = false;
    }

    pub fn step_count(&self) -> u32 {
        if self.available {
            self.counter.total()
        } else {
            0
        }
    }
}
