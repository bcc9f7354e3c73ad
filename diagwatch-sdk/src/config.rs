//! Monitor parameters and file-based settings.
//!
//! Parameters are plain serde structs so hosts can embed them in their own
//! configuration. [`Settings`] loads a whole set of topic diagnostics from a
//! file with `DIAGWATCH__*` environment overrides
//! (`DIAGWATCH__PERIOD_SECS=0.5`, `DIAGWATCH__TOPICS__CAMERA__FREQUENCY__MIN_RATE=20`).

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use diagwatch_types::Level;
use serde::Deserialize;

use crate::error::{DiagnosticError, Result};
use crate::topic::TopicDiagnostic;

/// Parameters for a [`FrequencyMonitor`](crate::FrequencyMonitor).
///
/// The acceptable band is `[min_rate, max_rate]`. Rates within
/// `tolerance` (a fraction) outside the band are reported at WARN; a rate
/// below `min_rate * (1 - tolerance)` is an ERROR.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrequencyConfig {
    pub min_rate: f64,
    pub max_rate: f64,
    pub tolerance: f64,
    /// Number of evaluation cycles the sliding window spans.
    pub window_size: usize,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            min_rate: 0.0,
            max_rate: f64::INFINITY,
            tolerance: 0.1,
            window_size: 5,
        }
    }
}

impl FrequencyConfig {
    /// Accept rates in `[min_rate, max_rate]`.
    pub fn new(min_rate: f64, max_rate: f64) -> Self {
        Self {
            min_rate,
            max_rate,
            ..Default::default()
        }
    }

    /// Expect exactly `rate` events per second.
    pub fn target(rate: f64) -> Self {
        Self::new(rate, rate)
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Below this rate the monitor reports ERROR.
    pub fn hard_min(&self) -> f64 {
        self.min_rate * (1.0 - self.tolerance)
    }

    /// Above this rate the monitor reports "too high" rather than "slightly high".
    pub fn hard_max(&self) -> f64 {
        self.max_rate * (1.0 + self.tolerance)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(DiagnosticError::config("window_size must be at least 1"));
        }
        if self.min_rate.is_nan() || self.max_rate.is_nan() {
            return Err(DiagnosticError::config("rate bounds must be numbers"));
        }
        if self.min_rate < 0.0 {
            return Err(DiagnosticError::config(format!(
                "min_rate must not be negative, got {}",
                self.min_rate
            )));
        }
        if self.min_rate > self.max_rate {
            return Err(DiagnosticError::config(format!(
                "min_rate {} exceeds max_rate {}",
                self.min_rate, self.max_rate
            )));
        }
        if !(0.0..1.0).contains(&self.tolerance) {
            return Err(DiagnosticError::config(format!(
                "tolerance must be in [0, 1), got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Parameters for a [`TimestampMonitor`](crate::TimestampMonitor).
///
/// Delays are `now - stamp` in seconds. A negative delay means the stamp
/// is in the future.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TimestampConfig {
    pub min_acceptable: f64,
    pub max_acceptable: f64,
    /// Stamps further than this in the future are not averaged, only counted.
    pub max_future_skew: f64,
    /// Level reported when the average delay exceeds `max_acceptable`.
    pub stale_level: Level,
    /// Level reported for a window with no samples.
    pub no_data_level: Level,
    /// Consecutive empty windows after which silence is at least WARN.
    /// Zero disables escalation.
    pub no_data_escalation: u32,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            min_acceptable: -1.0,
            max_acceptable: 5.0,
            max_future_skew: 60.0,
            stale_level: Level::Error,
            no_data_level: Level::Ok,
            no_data_escalation: 1,
        }
    }
}

impl TimestampConfig {
    /// Accept delays in `[min_acceptable, max_acceptable]`.
    pub fn new(min_acceptable: f64, max_acceptable: f64) -> Self {
        Self {
            min_acceptable,
            max_acceptable,
            ..Default::default()
        }
    }

    pub fn with_max_future_skew(mut self, seconds: f64) -> Self {
        self.max_future_skew = seconds;
        self
    }

    pub fn with_stale_level(mut self, level: Level) -> Self {
        self.stale_level = level;
        self
    }

    pub fn with_no_data(mut self, level: Level, escalate_after: u32) -> Self {
        self.no_data_level = level;
        self.no_data_escalation = escalate_after;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_acceptable.is_nan() || self.max_acceptable.is_nan() {
            return Err(DiagnosticError::config("acceptable delays must be numbers"));
        }
        if self.min_acceptable > self.max_acceptable {
            return Err(DiagnosticError::config(format!(
                "min_acceptable {} exceeds max_acceptable {}",
                self.min_acceptable, self.max_acceptable
            )));
        }
        if self.max_future_skew.is_nan() || self.max_future_skew < 0.0 {
            return Err(DiagnosticError::config(format!(
                "max_future_skew must be non-negative, got {}",
                self.max_future_skew
            )));
        }
        if !self.stale_level.is_problem() {
            return Err(DiagnosticError::config("stale_level must not be OK"));
        }
        Ok(())
    }
}

/// Monitors attached to one topic.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TopicSettings {
    #[serde(default)]
    pub frequency: FrequencyConfig,
    /// Omit for messages without a header stamp.
    #[serde(default)]
    pub timestamp: Option<TimestampConfig>,
}

/// Settings for a whole diagnostics setup.
///
/// ```toml
/// hardware_id = "robot-7"
/// period_secs = 1.0
///
/// [topics.camera.frequency]
/// min_rate = 25.0
/// max_rate = 35.0
///
/// [topics.camera.timestamp]
/// max_acceptable = 0.5
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub hardware_id: String,
    /// Seconds between reporting cycles.
    pub period_secs: f64,
    pub topics: BTreeMap<String, TopicSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hardware_id: String::new(),
            period_secs: 1.0,
            topics: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load from a file, with `DIAGWATCH__*` environment variables on top.
    pub fn load(path: &Path) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("DIAGWATCH").separator("__"))
            .build()?;
        Self::finish(config)
    }

    /// Parse settings from a TOML string.
    pub fn from_toml(source: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.period_secs.is_finite() && self.period_secs > 0.0) {
            return Err(DiagnosticError::config(format!(
                "period_secs must be positive, got {}",
                self.period_secs
            )));
        }
        for (name, topic) in &self.topics {
            let checked = topic
                .frequency
                .validate()
                .and_then(|_| topic.timestamp.as_ref().map_or(Ok(()), |t| t.validate()));
            if let Err(err) = checked {
                return Err(match err {
                    DiagnosticError::Configuration(msg) => {
                        DiagnosticError::config(format!("topic {name}: {msg}"))
                    }
                    other => other,
                });
            }
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(self.period_secs)
    }

    /// Build the diagnostic configured for `topic`.
    pub fn topic_diagnostic(&self, topic: &str) -> Result<TopicDiagnostic> {
        let settings = self
            .topics
            .get(topic)
            .ok_or_else(|| DiagnosticError::config(format!("no settings for topic {topic}")))?;

        let mut builder = TopicDiagnostic::builder(topic).frequency(settings.frequency.clone());
        if let Some(stamp) = &settings.timestamp {
            builder = builder.timestamp(stamp.clone());
        }
        builder.build()
    }
}
