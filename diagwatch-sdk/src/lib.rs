//! # diagwatch-sdk
//!
//! Health diagnostics for publishers and data streams.
//!
//! Monitors watch how often events happen and how old their stamps are,
//! and turn that into leveled [`StatusRecord`]s. A reporter collects the
//! records from every registered task once per cycle.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use diagwatch_sdk::{FrequencyConfig, Output, TimestampConfig, TopicDiagnostic, Updater};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), diagwatch_sdk::DiagnosticError> {
//!     // Emit a report every second
//!     let updater = Updater::builder()
//!         .hardware_id("robot-7")
//!         .output(Output::file("diagnostics.json"))
//!         .period(Duration::from_secs(1))
//!         .build();
//!
//!     // Expect 25-35 frames per second, at most half a second old
//!     let camera = Arc::new(TopicDiagnostic::new(
//!         "camera",
//!         FrequencyConfig::new(25.0, 35.0),
//!         TimestampConfig::new(0.0, 0.5),
//!     )?);
//!     camera.attach(&updater)?;
//!
//!     let _emission = updater.start();
//!
//!     // ... for every published frame ...
//!     # let frame_stamp = 0.0;
//!     camera.tick_stamp(frame_stamp);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Frequency and timestamp monitors** with sliding-window statistics
//! - **Composite tasks** that merge child records by worst level
//! - **Diagnosed publishers** that record every message they send
//! - **Thread-safe**: tick from any thread while the reporter evaluates
//! - **Settings** from TOML files and `DIAGWATCH__*` environment variables

mod clock;
mod config;
mod error;
mod frequency;
mod output;
mod publisher;
mod task;
mod timestamp;
mod topic;
mod updater;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FrequencyConfig, Settings, TimestampConfig, TopicSettings};
pub use error::{DiagnosticError, Result};
pub use frequency::FrequencyMonitor;
pub use output::Output;
pub use publisher::{DiagnosedPublisher, Header, PublishChannel, Stamp, Stamped};
pub use task::{CompositeTask, DiagnosticTask, FnTask, Reporter};
pub use timestamp::TimestampMonitor;
pub use topic::{TopicDiagnostic, TopicDiagnosticBuilder};
pub use updater::{Updater, UpdaterBuilder};

#[cfg(feature = "tokio")]
pub use publisher::ChannelPublisher;
#[cfg(feature = "tokio")]
pub use updater::EmissionHandle;

// Re-export types for convenience
pub use diagwatch_types::{KeyValue, Level, Report, SchemaVersion, StatusRecord};
