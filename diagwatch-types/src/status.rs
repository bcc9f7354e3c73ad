//! Status records - the result of one diagnostic evaluation.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::Level;

/// A single named fact attached to a status record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct KeyValue {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub key: String,

    #[cfg_attr(feature = "minicbor", n(1))]
    pub value: String,
}

impl KeyValue {
    /// Create a fact from anything displayable.
    pub fn new(key: impl Into<String>, value: impl ToString) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

/// The outcome of evaluating one diagnostic task.
///
/// Records are value objects: a task builds a fresh one on every
/// evaluation and hands it out owned. Facts keep insertion order and
/// keys may repeat (a composite task concatenates its children's facts).
///
/// # Example
///
/// ```rust
/// use diagwatch_types::{Level, StatusRecord};
///
/// let mut record = StatusRecord::new("lidar topic status");
/// record.summary(Level::Ok, "Desired frequency met");
/// record.add("Actual frequency (Hz)", 10.0);
///
/// assert_eq!(record.value("Actual frequency (Hz)"), Some("10"));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct StatusRecord {
    /// Name of the task that produced this record.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub name: String,

    #[cfg_attr(feature = "minicbor", n(1))]
    pub level: Level,

    /// Human readable summary.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub message: String,

    /// Ordered key/value facts.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    #[cfg_attr(feature = "minicbor", n(3))]
    pub values: Vec<KeyValue>,
}

impl StatusRecord {
    /// Create an empty OK record for a task.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create a builder for a status record.
    pub fn builder(name: impl Into<String>) -> StatusRecordBuilder {
        StatusRecordBuilder::new(name)
    }

    /// Overwrite level and message.
    pub fn summary(&mut self, level: Level, message: impl Into<String>) {
        self.level = level;
        self.message = message.into();
    }

    /// Fold another level/message pair into this record's summary.
    ///
    /// If the incoming level has the same OK/problem standing as the
    /// current one, the messages are joined with `"; "`. If it is worse
    /// and its standing differs, its message replaces the current one.
    /// A better level is ignored. The resulting level is the maximum.
    pub fn merge_summary(&mut self, level: Level, message: &str) {
        if level.is_problem() == self.level.is_problem() {
            if !message.is_empty() {
                if !self.message.is_empty() {
                    self.message.push_str("; ");
                }
                self.message.push_str(message);
            }
        } else if level > self.level {
            self.message = message.to_string();
        }

        if level > self.level {
            self.level = level;
        }
    }

    /// Merge another record's summary and append all of its facts.
    pub fn merge(&mut self, other: &StatusRecord) {
        self.merge_summary(other.level, &other.message);
        self.values.extend(other.values.iter().cloned());
    }

    /// Append a fact.
    pub fn add(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.push(KeyValue::new(key, value));
    }

    /// First value recorded under `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }

    /// Every value recorded under `key`, in order.
    pub fn values_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.values
            .iter()
            .filter(move |kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }

    /// Check if the record reports anything other than OK.
    pub fn is_problem(&self) -> bool {
        self.level.is_problem()
    }
}

/// Builder for `StatusRecord`.
#[derive(Debug, Default)]
pub struct StatusRecordBuilder {
    record: StatusRecord,
}

impl StatusRecordBuilder {
    /// Create a new builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            record: StatusRecord::new(name),
        }
    }

    /// Set the level.
    pub fn level(mut self, level: Level) -> Self {
        self.record.level = level;
        self
    }

    /// Set the summary message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.record.message = message.into();
        self
    }

    /// Append a fact.
    pub fn value(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.record.add(key, value);
        self
    }

    /// Build the record.
    pub fn build(self) -> StatusRecord {
        self.record
    }
}
