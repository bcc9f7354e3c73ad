//! Ready-made diagnostics for a published topic.

use std::sync::Arc;

use diagwatch_types::{Level, StatusRecord};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::clock::{system_clock, Clock};
use crate::config::{FrequencyConfig, TimestampConfig};
use crate::error::Result;
use crate::frequency::FrequencyMonitor;
use crate::task::{CompositeTask, DiagnosticTask, Reporter};
use crate::timestamp::TimestampMonitor;

/// Frequency and (optionally) timestamp diagnostics for one topic.
///
/// Reported as a single composite task named `"<topic> topic status"`.
/// Topics whose messages carry no header stamp use [`headerless`], which
/// attaches only a frequency monitor.
///
/// Building a diagnostic has no side effects; call [`attach`] to register
/// it with a reporter.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use diagwatch_sdk::{FrequencyConfig, TimestampConfig, TopicDiagnostic, Updater};
///
/// let updater = Updater::new();
/// let camera = Arc::new(TopicDiagnostic::new(
///     "camera",
///     FrequencyConfig::new(25.0, 35.0),
///     TimestampConfig::new(0.0, 0.5),
/// )?);
/// camera.attach(&updater)?;
///
/// // once per published frame
/// # let frame_stamp = 0.0;
/// camera.tick_stamp(frame_stamp);
/// # Ok::<(), diagwatch_sdk::DiagnosticError>(())
/// ```
///
/// [`headerless`]: TopicDiagnostic::headerless
/// [`attach`]: TopicDiagnostic::attach
pub struct TopicDiagnostic {
    composite: CompositeTask,
    frequency: Arc<FrequencyMonitor>,
    timestamp: Option<Arc<TimestampMonitor>>,
    last_level: Mutex<Level>,
}

impl TopicDiagnostic {
    /// Frequency monitoring only.
    pub fn headerless(topic: &str, frequency: FrequencyConfig) -> Result<Self> {
        Self::builder(topic).frequency(frequency).build()
    }

    /// Frequency and timestamp monitoring.
    pub fn new(topic: &str, frequency: FrequencyConfig, timestamp: TimestampConfig) -> Result<Self> {
        Self::builder(topic)
            .frequency(frequency)
            .timestamp(timestamp)
            .build()
    }

    pub fn builder(topic: &str) -> TopicDiagnosticBuilder {
        TopicDiagnosticBuilder::new(topic)
    }

    /// Register with a reporter.
    pub fn attach<R>(self: &Arc<Self>, reporter: &R) -> Result<()>
    where
        R: Reporter + ?Sized,
    {
        reporter.register(self.clone())?;
        debug!(task = self.name(), "attached topic diagnostic");
        Ok(())
    }

    /// Record one publication.
    pub fn tick(&self) {
        self.frequency.tick();
    }

    /// Record one publication stamped `stamp` seconds since the epoch.
    ///
    /// The timestamp is recorded before the frequency tick. Without a
    /// timestamp monitor the stamp is ignored.
    pub fn tick_stamp(&self, stamp: f64) {
        if let Some(timestamp) = &self.timestamp {
            timestamp.tick(stamp);
        }
        self.frequency.tick();
    }

    /// Restart the frequency statistics.
    pub fn clear_window(&self) {
        self.frequency.clear();
    }

    pub fn frequency(&self) -> &FrequencyMonitor {
        &self.frequency
    }

    pub fn timestamp(&self) -> Option<&TimestampMonitor> {
        self.timestamp.as_deref()
    }

    pub fn has_timestamp_monitor(&self) -> bool {
        self.timestamp.is_some()
    }
}

impl DiagnosticTask for TopicDiagnostic {
    fn name(&self) -> &str {
        self.composite.name()
    }

    fn evaluate(&self) -> StatusRecord {
        let record = self.composite.evaluate();

        let previous = std::mem::replace(&mut *self.last_level.lock(), record.level);
        if record.level == Level::Error && previous != Level::Error {
            warn!(task = self.name(), message = %record.message, "topic diagnostic entered error");
        }
        record
    }
}

impl std::fmt::Debug for TopicDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicDiagnostic")
            .field("name", &self.name())
            .field("frequency", &self.frequency)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Builder for `TopicDiagnostic`.
pub struct TopicDiagnosticBuilder {
    topic: String,
    frequency: FrequencyConfig,
    timestamp: Option<TimestampConfig>,
    clock: Option<Arc<dyn Clock>>,
}

impl TopicDiagnosticBuilder {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            frequency: FrequencyConfig::default(),
            timestamp: None,
            clock: None,
        }
    }

    /// Frequency monitor parameters. Defaults accept any rate.
    pub fn frequency(mut self, config: FrequencyConfig) -> Self {
        self.frequency = config;
        self
    }

    /// Attach a timestamp monitor.
    pub fn timestamp(mut self, config: TimestampConfig) -> Self {
        self.timestamp = Some(config);
        self
    }

    /// Clock shared by both monitors. Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the parameters and build the diagnostic.
    pub fn build(self) -> Result<TopicDiagnostic> {
        let clock = self.clock.unwrap_or_else(system_clock);

        let frequency = Arc::new(FrequencyMonitor::with_clock(self.frequency, clock.clone())?);
        let timestamp = self
            .timestamp
            .map(|config| TimestampMonitor::with_clock(config, clock).map(Arc::new))
            .transpose()?;

        let mut composite = CompositeTask::new(format!("{} topic status", self.topic));
        composite.add_task(frequency.clone());
        if let Some(timestamp) = &timestamp {
            composite.add_task(timestamp.clone());
        }

        Ok(TopicDiagnostic {
            composite,
            frequency,
            timestamp,
            last_level: Mutex::new(Level::Ok),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::DiagnosticError;
    use crate::updater::Updater;

    const NOW: f64 = 1_700_000_000.0;

    fn diagnostic(timestamp: Option<TimestampConfig>) -> (TopicDiagnostic, ManualClock) {
        let clock = ManualClock::new(NOW);
        let mut builder = TopicDiagnostic::builder("camera")
            .frequency(FrequencyConfig::new(10.0, 20.0))
            .clock(Arc::new(clock.clone()));
        if let Some(config) = timestamp {
            builder = builder.timestamp(config);
        }
        (builder.build().unwrap(), clock)
    }

    #[test]
    fn composite_is_named_after_topic() {
        let (diag, _) = diagnostic(None);
        assert_eq!(diag.name(), "camera topic status");
        assert!(!diag.has_timestamp_monitor());
    }

    #[test]
    fn headerless_reports_frequency_only() {
        let (diag, clock) = diagnostic(None);
        for _ in 0..15 {
            diag.tick();
        }
        clock.advance(1.0);

        let record = diag.evaluate();
        assert_eq!(record.level, Level::Ok);
        assert!(record.message.is_empty());
        assert!(record.value("Events in window").is_some());
        assert!(record.value("Average timestamp delay").is_none());
    }

    #[test]
    fn tick_stamp_feeds_both_monitors() {
        let (diag, clock) = diagnostic(Some(TimestampConfig::new(0.0, 0.5)));
        for _ in 0..15 {
            diag.tick_stamp(clock.now() - 0.1);
        }
        clock.advance(1.0);

        assert_eq!(diag.frequency().tick_count(), 15);
        assert_eq!(diag.timestamp().unwrap().samples_in_window(), 15);
    }

    #[test]
    fn headerless_ignores_stamp() {
        let (diag, _) = diagnostic(None);
        diag.tick_stamp(NOW);
        assert_eq!(diag.frequency().tick_count(), 1);
    }

    #[test]
    fn worst_child_wins() {
        let (diag, clock) = diagnostic(Some(TimestampConfig::new(0.0, 0.5)));
        for _ in 0..15 {
            diag.tick_stamp(clock.now() - 3.0);
        }
        clock.advance(1.0);

        let record = diag.evaluate();
        assert_eq!(record.level, Level::Error);
        assert_eq!(record.message, "Timestamps too far in past seen.");
        // facts from both children survive the merge
        assert!(record.value("Actual frequency (Hz)").is_some());
        assert!(record.value("Average timestamp delay").is_some());
    }

    #[test]
    fn clear_window_resets_frequency() {
        let (diag, _) = diagnostic(None);
        diag.tick();
        diag.tick();
        diag.clear_window();

        assert_eq!(diag.frequency().tick_count(), 0);
        let record = diag.frequency().evaluate();
        assert_eq!(record.level, Level::Ok);
        assert_eq!(record.message, "No events recorded.");
    }

    #[test]
    fn invalid_config_fails_before_registration() {
        let result = TopicDiagnostic::new(
            "camera",
            FrequencyConfig::new(10.0, 20.0),
            TimestampConfig::new(1.0, -1.0),
        );
        assert!(matches!(result, Err(DiagnosticError::Configuration(_))));
    }

    #[test]
    fn attach_registers_composite_once() {
        let updater = Updater::new();
        let (diag, _) = diagnostic(None);
        let diag = Arc::new(diag);

        diag.attach(&updater).unwrap();
        let report = updater.collect();
        assert_eq!(report.len(), 1);
        assert!(report.get("camera topic status").is_some());

        let err = diag.attach(&updater).unwrap_err();
        assert!(matches!(err, DiagnosticError::DuplicateTask(_)));
    }
}
