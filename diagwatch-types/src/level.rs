//! Severity levels for status records.

use core::fmt;

/// Severity of a single diagnostic evaluation.
///
/// Variants are declared in merge order, so the derived `Ord` is the
/// severity used when several records are folded into one:
/// `Ok < Warn < Stale < Error`. A stale task is at least as bad as a
/// warning, but an explicit error always wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
#[cfg_attr(feature = "minicbor", cbor(index_only))]
pub enum Level {
    /// Everything is within bounds.
    #[default]
    #[cfg_attr(feature = "minicbor", n(0))]
    Ok,
    /// Degraded but still functional.
    #[cfg_attr(feature = "minicbor", n(1))]
    Warn,
    /// No recent information to judge by.
    #[cfg_attr(feature = "minicbor", n(2))]
    Stale,
    /// Out of bounds.
    #[cfg_attr(feature = "minicbor", n(3))]
    Error,
}

impl Level {
    /// Returns true for anything other than `Ok`.
    pub fn is_problem(&self) -> bool {
        *self != Level::Ok
    }

    /// Short uppercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Ok => "OK",
            Level::Warn => "WARN",
            Level::Stale => "STALE",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
