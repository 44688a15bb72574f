//! Database model types.

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::probe::Classification;

/// Format of every stored timestamp, local time at second granularity.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The outcome of one probe. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingRecord {
    target: String,
    classification: Classification,
    timestamp: String,
}

impl PingRecord {
    /// Record a probe that completed just now.
    pub fn new(classification: Classification, target: impl Into<String>) -> Self {
        Self::at(classification, target, Local::now().naive_local())
    }

    /// Record a probe that completed at `time`.
    pub fn at(classification: Classification, target: impl Into<String>, time: NaiveDateTime) -> Self {
        Self {
            target: target.into(),
            classification,
            timestamp: time.format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    pub(crate) fn from_row(classification: Classification, timestamp: String, target: String) -> Self {
        Self {
            target,
            classification,
            timestamp,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

impl fmt::Display for PingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.classification, self.timestamp)
    }
}

/// A stored record together with its row identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Store-assigned identifier, only meaningful for deletion.
    pub id: i64,
    #[serde(flatten)]
    pub record: PingRecord,
}

/// Filters for querying stored records. All set filters must match.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Case-sensitive substring of the target. Empty means no filter.
    pub target: Option<String>,
    pub classification: Option<Classification>,
    /// Inclusive, from the start of this day.
    pub from: Option<NaiveDate>,
    /// Inclusive, through the end of this day.
    pub to: Option<NaiveDate>,
}

impl LogFilter {
    pub(crate) fn target_substring(&self) -> Option<&str> {
        self.target.as_deref().filter(|t| !t.is_empty())
    }

    pub(crate) fn from_bound(&self) -> Option<String> {
        self.from.map(|d| format!("{} 00:00:00", d.format("%Y-%m-%d")))
    }

    pub(crate) fn to_bound(&self) -> Option<String> {
        self.to.map(|d| format!("{} 23:59:59", d.format("%Y-%m-%d")))
    }
}
