//! # diagwatch-types
//!
//! Core value types for health diagnostics. This crate defines the records
//! that diagnostic tasks produce each reporting cycle and the reports that
//! carry many of them to a sink.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable `serde` and/or `minicbor` features as needed
//! - **Value semantics**: A record is built fresh on every evaluation and handed out owned
//! - **Versioned schema**: Reports include version info for forward compatibility
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON/MessagePack/etc. serialization via serde
//! - `minicbor`: Compact binary serialization via CBOR
//! - `all`: Enable all serialization formats
//!
//! ## Example
//!
//! ```rust
//! use diagwatch_types::{Level, Report, StatusRecord};
//!
//! let camera = StatusRecord::builder("camera topic status")
//!     .level(Level::Warn)
//!     .message("Frequency slightly low.")
//!     .value("Actual frequency (Hz)", 9.5)
//!     .build();
//!
//! let report = Report::builder()
//!     .hardware_id("robot-7")
//!     .status(camera)
//!     .build();
//!
//! assert_eq!(report.worst_level(), Level::Warn);
//! ```
//!
//! ## Schema Version
//!
//! The current schema version is **1**.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod level;
mod report;
mod status;
mod version;

pub use level::*;
pub use report::*;
pub use status::*;
pub use version::*;

/// Current schema version.
///
/// Increment this when making breaking changes to the report format.
pub const SCHEMA_VERSION: u32 = 1;
