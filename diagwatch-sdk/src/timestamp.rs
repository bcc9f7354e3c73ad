//! Event timestamp delay monitoring.

use std::sync::Arc;

use diagwatch_types::{Level, StatusRecord};
use parking_lot::Mutex;
use tracing::debug;

use crate::clock::{system_clock, Clock};
use crate::config::TimestampConfig;
use crate::error::Result;
use crate::task::DiagnosticTask;

/// Delays folded since the last evaluation.
#[derive(Debug, Default)]
struct Window {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    zero_seen: bool,
    skewed: u64,
    invalid: u64,
}

impl Window {
    fn fold(&mut self, delta: f64) {
        if self.count == 0 {
            self.min = delta;
            self.max = delta;
        } else {
            self.min = self.min.min(delta);
            self.max = self.max.max(delta);
        }
        self.count += 1;
        self.sum += delta;
    }

    fn is_silent(&self) -> bool {
        self.count == 0 && self.skewed == 0 && self.invalid == 0 && !self.zero_seen
    }
}

#[derive(Debug, Default)]
struct TimestampState {
    window: Window,
    late_count: u64,
    early_count: u64,
    zero_count: u64,
    skew_count: u64,
    invalid_count: u64,
    empty_windows: u32,
}

/// Checks how far behind (or ahead of) the clock event stamps are.
///
/// Each tick records `now - stamp`. On evaluation the average delay of the
/// window is compared against `[min_acceptable, max_acceptable]` and the
/// window is reset, so each record describes exactly one reporting cycle.
///
/// Stamps more than `max_future_skew` seconds ahead of the clock are not
/// averaged; they are counted and turn the next record into an ERROR. A
/// stamp of exactly zero is treated the same way, as it almost always means
/// the producer never filled the stamp in. Non-finite stamps (NaN, infinity)
/// are likewise kept out of the average and counted as invalid.
pub struct TimestampMonitor {
    config: TimestampConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<TimestampState>,
}

impl TimestampMonitor {
    pub const NAME: &'static str = "Timestamp Status";

    /// Create a monitor on the system clock.
    pub fn new(config: TimestampConfig) -> Result<Self> {
        Self::with_clock(config, system_clock())
    }

    /// Create a monitor on a specific clock.
    pub fn with_clock(config: TimestampConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            state: Mutex::new(TimestampState::default()),
        })
    }

    /// Record an event stamped `stamp` seconds since the epoch.
    pub fn tick(&self, stamp: f64) {
        let now = self.clock.now();
        let delta = now - stamp;

        let rejected = {
            let mut state = self.state.lock();
            if !delta.is_finite() {
                state.window.invalid += 1;
                state.invalid_count += 1;
                true
            } else if stamp == 0.0 {
                state.window.zero_seen = true;
                false
            } else if delta < -self.config.max_future_skew {
                state.window.skewed += 1;
                state.skew_count += 1;
                true
            } else {
                state.window.fold(delta);
                false
            }
        };

        if rejected {
            debug!(stamp, delta, "timestamp rejected from delay window");
        }
    }

    /// Windows whose average delay exceeded `max_acceptable`.
    pub fn late_count(&self) -> u64 {
        self.state.lock().late_count
    }

    /// Windows whose average delay was below `min_acceptable`.
    pub fn early_count(&self) -> u64 {
        self.state.lock().early_count
    }

    /// Windows that contained a zero stamp.
    pub fn zero_count(&self) -> u64 {
        self.state.lock().zero_count
    }

    /// Stamps rejected for being too far in the future.
    pub fn skew_count(&self) -> u64 {
        self.state.lock().skew_count
    }

    /// Non-finite stamps rejected.
    pub fn invalid_count(&self) -> u64 {
        self.state.lock().invalid_count
    }

    /// Delays folded since the last evaluation.
    pub fn samples_in_window(&self) -> u64 {
        self.state.lock().window.count
    }

    pub fn config(&self) -> &TimestampConfig {
        &self.config
    }
}

impl DiagnosticTask for TimestampMonitor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&self) -> StatusRecord {
        let config = &self.config;
        let mut record = StatusRecord::new(Self::NAME);

        let mut state = self.state.lock();
        let window = std::mem::take(&mut state.window);

        if window.is_silent() {
            state.empty_windows = state.empty_windows.saturating_add(1);
            let mut level = config.no_data_level;
            if config.no_data_escalation > 0 && state.empty_windows >= config.no_data_escalation {
                level = level.max(Level::Warn);
            }
            record.summary(level, "No data since last update.");
        } else {
            state.empty_windows = 0;
        }

        if window.count > 0 {
            let average = window.sum / window.count as f64;
            record.summary(Level::Ok, "Timestamps are reasonable.");

            if average < config.min_acceptable {
                record.merge_summary(Level::Error, "Timestamps too far in future seen.");
                state.early_count += 1;
            }
            if average > config.max_acceptable {
                record.merge_summary(config.stale_level, "Timestamps too far in past seen.");
                state.late_count += 1;
            }

            record.add("Samples in window", window.count);
            record.add("Earliest timestamp delay", window.min);
            record.add("Latest timestamp delay", window.max);
            record.add("Average timestamp delay", average);
        }

        if window.skewed > 0 {
            record.merge_summary(Level::Error, "Timestamps beyond clock skew tolerance seen.");
        }
        if window.invalid > 0 {
            record.merge_summary(Level::Error, "Invalid timestamp seen.");
        }
        if window.zero_seen {
            record.merge_summary(Level::Error, "Zero timestamp seen.");
            state.zero_count += 1;
        }

        record.add("Earliest acceptable timestamp delay", config.min_acceptable);
        record.add("Latest acceptable timestamp delay", config.max_acceptable);
        record.add("Late diagnostic update count", state.late_count);
        record.add("Early diagnostic update count", state.early_count);
        record.add("Zero seen diagnostic update count", state.zero_count);
        record.add("Skewed timestamp count", state.skew_count);
        record.add("Invalid timestamp count", state.invalid_count);
        record
    }
}

impl std::fmt::Debug for TimestampMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampMonitor")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish()
    }
}
