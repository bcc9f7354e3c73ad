//! Error types for the diagnostics engine.

use thiserror::Error;

/// Errors surfaced to the code that builds or drives diagnostics.
///
/// Monitored conditions (a low rate, a stale timestamp) are never errors;
/// they show up as levels in the next status record. These variants are
/// reserved for misuse and for failures of collaborators.
#[derive(Debug, Error)]
pub enum DiagnosticError {
    /// Monitor parameters are inconsistent.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A published message has no `header.stamp` to read the event time from.
    #[error("Message has no header timestamp")]
    MissingTimestampField,

    /// A task with this name is already registered.
    #[error("Task already registered: {0}")]
    DuplicateTask(String),

    /// The publish channel rejected a message.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Settings could not be loaded.
    #[error("Failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),
}

impl DiagnosticError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        DiagnosticError::Configuration(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DiagnosticError>;
