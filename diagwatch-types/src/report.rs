//! Report - one reporting cycle's worth of status records.

use alloc::string::String;
use alloc::vec::Vec;

use crate::{Level, SchemaVersion, StatusRecord};

/// All status records produced in one reporting cycle.
///
/// A reporter evaluates each registered task once per cycle and collects
/// the records, in registration order, into a report.
///
/// # Example
///
/// ```rust
/// use diagwatch_types::{Level, Report, StatusRecord};
///
/// let report = Report::builder()
///     .timestamp_ms(1703160000000)
///     .hardware_id("base-station")
///     .status(StatusRecord::builder("gps topic status").level(Level::Ok).build())
///     .build();
///
/// assert_eq!(report.len(), 1);
/// // Serialize with serde (requires "serde" feature)
/// // let json = serde_json::to_string(&report)?;
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct Report {
    /// Schema version for forward compatibility.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub version: SchemaVersion,

    /// Unix timestamp in milliseconds when this report was collected.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub timestamp_ms: u64,

    /// Identifier of the host or device the tasks run on.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "String::is_empty"))]
    #[cfg_attr(feature = "minicbor", n(2))]
    pub hardware_id: String,

    /// Records in task registration order.
    #[cfg_attr(feature = "minicbor", n(3))]
    pub statuses: Vec<StatusRecord>,
}

impl Report {
    /// Create an empty report with the current timestamp.
    #[cfg(feature = "std")]
    pub fn new() -> Self {
        Self::with_timestamp(current_timestamp_ms())
    }

    /// Create an empty report with a specific timestamp.
    pub fn with_timestamp(timestamp_ms: u64) -> Self {
        Self {
            version: SchemaVersion::current(),
            timestamp_ms,
            hardware_id: String::new(),
            statuses: Vec::new(),
        }
    }

    /// Create a builder for constructing reports.
    pub fn builder() -> ReportBuilder {
        ReportBuilder::new()
    }

    /// Check if the report carries no records.
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    /// Find a record by task name.
    pub fn get(&self, name: &str) -> Option<&StatusRecord> {
        self.statuses.iter().find(|s| s.name == name)
    }

    /// Iterate over all records.
    pub fn iter(&self) -> impl Iterator<Item = &StatusRecord> {
        self.statuses.iter()
    }

    /// Highest severity across all records, `Ok` when empty.
    pub fn worst_level(&self) -> Level {
        self.statuses
            .iter()
            .map(|s| s.level)
            .max()
            .unwrap_or(Level::Ok)
    }
}

#[cfg(feature = "std")]
impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing `Report` instances.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    timestamp_ms: Option<u64>,
    hardware_id: String,
    statuses: Vec<StatusRecord>,
}

impl ReportBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a specific timestamp (milliseconds since Unix epoch).
    pub fn timestamp_ms(mut self, ts: u64) -> Self {
        self.timestamp_ms = Some(ts);
        self
    }

    /// Set the hardware identifier.
    pub fn hardware_id(mut self, id: impl Into<String>) -> Self {
        self.hardware_id = id.into();
        self
    }

    /// Append a record.
    pub fn status(mut self, record: StatusRecord) -> Self {
        self.statuses.push(record);
        self
    }

    /// Append several records.
    pub fn statuses(mut self, records: impl IntoIterator<Item = StatusRecord>) -> Self {
        self.statuses.extend(records);
        self
    }

    /// Build the report.
    #[cfg(feature = "std")]
    pub fn build(self) -> Report {
        Report {
            version: SchemaVersion::current(),
            timestamp_ms: self.timestamp_ms.unwrap_or_else(current_timestamp_ms),
            hardware_id: self.hardware_id,
            statuses: self.statuses,
        }
    }

    /// Build the report with a specific timestamp (for no_std).
    #[cfg(not(feature = "std"))]
    pub fn build(self) -> Report {
        Report {
            version: SchemaVersion::current(),
            timestamp_ms: self.timestamp_ms.unwrap_or(0),
            hardware_id: self.hardware_id,
            statuses: self.statuses,
        }
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
#[cfg(feature = "std")]
fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
