//! Event rate monitoring over a sliding window.

use std::sync::Arc;

use diagwatch_types::{Level, StatusRecord};
use parking_lot::Mutex;

use crate::clock::{system_clock, Clock};
use crate::config::FrequencyConfig;
use crate::error::Result;
use crate::task::DiagnosticTask;

/// Tick count and time at the start of one window slot.
#[derive(Debug, Clone, Copy)]
struct Slot {
    count: u64,
    time: f64,
}

#[derive(Debug)]
struct FrequencyState {
    tick_count: u64,
    slots: Vec<Slot>,
    index: usize,
    /// No evaluation has happened since the last clear.
    fresh: bool,
}

impl FrequencyState {
    fn new(window_size: usize, now: f64) -> Self {
        Self {
            tick_count: 0,
            slots: vec![Slot { count: 0, time: now }; window_size],
            index: 0,
            fresh: true,
        }
    }
}

/// Checks that events arrive at a rate inside a configured band.
///
/// The window spans the last `window_size` evaluations. Each evaluation
/// measures from the oldest slot to now, then overwrites that slot with the
/// current count and time, so the window slides by one slot per cycle
/// rather than resetting.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use diagwatch_sdk::{DiagnosticTask, FrequencyConfig, FrequencyMonitor, Level, ManualClock};
///
/// let clock = ManualClock::new(0.0);
/// let monitor = FrequencyMonitor::with_clock(FrequencyConfig::new(10.0, 20.0), Arc::new(clock.clone()))?;
///
/// for _ in 0..15 {
///     monitor.tick();
/// }
/// clock.advance(1.0);
///
/// assert_eq!(monitor.evaluate().level, Level::Ok);
/// # Ok::<(), diagwatch_sdk::DiagnosticError>(())
/// ```
pub struct FrequencyMonitor {
    config: FrequencyConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<FrequencyState>,
}

impl FrequencyMonitor {
    pub const NAME: &'static str = "Frequency Status";

    /// Create a monitor on the system clock.
    pub fn new(config: FrequencyConfig) -> Result<Self> {
        Self::with_clock(config, system_clock())
    }

    /// Create a monitor on a specific clock.
    pub fn with_clock(config: FrequencyConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let state = FrequencyState::new(config.window_size, clock.now());
        Ok(Self {
            config,
            clock,
            state: Mutex::new(state),
        })
    }

    /// Record one event.
    pub fn tick(&self) {
        self.state.lock().tick_count += 1;
    }

    /// Forget all events and restart the window from now.
    pub fn clear(&self) {
        let now = self.clock.now();
        *self.state.lock() = FrequencyState::new(self.config.window_size, now);
    }

    /// Events recorded since construction or the last clear.
    pub fn tick_count(&self) -> u64 {
        self.state.lock().tick_count
    }

    pub fn config(&self) -> &FrequencyConfig {
        &self.config
    }

    fn classify(&self, rate: f64) -> (Level, &'static str) {
        let config = &self.config;
        if rate < config.hard_min() {
            (Level::Error, "Frequency too low.")
        } else if rate < config.min_rate {
            (Level::Warn, "Frequency slightly low.")
        } else if rate > config.hard_max() {
            (Level::Warn, "Frequency too high.")
        } else if rate > config.max_rate {
            (Level::Warn, "Frequency slightly high.")
        } else {
            (Level::Ok, "Desired frequency met")
        }
    }
}

impl DiagnosticTask for FrequencyMonitor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&self) -> StatusRecord {
        let now = self.clock.now();

        let (events, total, window, fresh) = {
            let mut state = self.state.lock();
            let index = state.index;
            let oldest = state.slots[index];
            let total = state.tick_count;
            let fresh = state.fresh;

            state.slots[index] = Slot { count: total, time: now };
            state.index = (index + 1) % state.slots.len();
            state.fresh = false;

            (total.saturating_sub(oldest.count), total, now - oldest.time, fresh)
        };

        let mut record = StatusRecord::new(Self::NAME);

        // Nothing to judge until time has passed or a first event has arrived.
        let rate = if window < 0.0 {
            record.summary(Level::Warn, "Clock moved backwards; frequency unknown.");
            0.0
        } else if events == 0 && (window == 0.0 || fresh) {
            record.summary(Level::Ok, "No events recorded.");
            0.0
        } else if window == 0.0 {
            record.summary(Level::Ok, "No time elapsed since last update.");
            0.0
        } else {
            let rate = events as f64 / window;
            let (level, message) = self.classify(rate);
            record.summary(level, message);
            rate
        };

        record.add("Events in window", events);
        record.add("Events since startup", total);
        record.add("Duration of window (s)", window.max(0.0));
        record.add("Actual frequency (Hz)", rate);
        if self.config.min_rate == self.config.max_rate {
            record.add("Target frequency (Hz)", self.config.min_rate);
        }
        if self.config.min_rate > 0.0 {
            record.add("Minimum acceptable frequency (Hz)", self.config.hard_min());
        }
        if self.config.max_rate.is_finite() {
            record.add("Maximum acceptable frequency (Hz)", self.config.hard_max());
        }
        record
    }
}

impl std::fmt::Debug for FrequencyMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrequencyMonitor")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish()
    }
}
