//! Wall-clock timestamps used for process creation time, log entries and
//! termination records.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A point in local wall-clock time, rendered as `(MM/DD/YYYY HH:MM:SSAM/PM)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Local>);

impl Timestamp {
    /// Captures the current local time.
    pub fn now() -> Self {
        Self(Local::now())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.format("%m/%d/%Y %I:%M:%S%p"))
    }
}
