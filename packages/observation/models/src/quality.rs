//! Record-level data-quality issues and the reporting interface.
//!
//! Component functions never fail on a single bad row. They exclude the
//! row (or the offending field) and hand a [`RecordQualityError`] to the
//! [`Diagnostics`] implementation the caller passed in.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

/// Which input table a record came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dataset {
    /// Air-quality station readings.
    AirQuality,
    /// Satellite wildfire detections.
    Wildfire,
}

/// A problem with a single record. Recovered locally, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordQualityError {
    /// The date field could not be parsed; the record is excluded.
    #[error("row {row}: unparseable date {raw:?}")]
    InvalidDate {
        /// 1-based data row.
        row: usize,
        /// Raw field contents.
        raw: String,
    },

    /// The coordinate is missing, unparseable, or out of range; the record
    /// is excluded from spatial tests.
    #[error("row {row}: invalid coordinate ({latitude:?}, {longitude:?})")]
    InvalidCoordinate {
        /// 1-based data row.
        row: usize,
        /// Raw latitude field.
        latitude: String,
        /// Raw longitude field.
        longitude: String,
    },

    /// The row itself could not be decoded; it is excluded.
    #[error("row {row}: malformed record: {message}")]
    MalformedRow {
        /// 1-based data row.
        row: usize,
        /// Decoder message.
        message: String,
    },

    /// A numeric field could not be parsed; it is treated as missing.
    #[error("row {row}: unparseable {column} value {raw:?}")]
    InvalidValue {
        /// 1-based data row.
        row: usize,
        /// Canonical column name.
        column: String,
        /// Raw field contents.
        raw: String,
    },
}

impl RecordQualityError {
    /// 1-based data row the issue was found on.
    #[must_use]
    pub const fn row(&self) -> usize {
        match self {
            Self::InvalidDate { row, .. }
            | Self::InvalidCoordinate { row, .. }
            | Self::MalformedRow { row, .. }
            | Self::InvalidValue { row, .. } => *row,
        }
    }
}

/// Receives data-quality reports from the enrichment components.
pub trait Diagnostics: Send + Sync {
    /// Reports one record-level issue.
    fn record_issue(&self, dataset: Dataset, issue: &RecordQualityError);
}

/// Forwards every issue to `log::warn!`.
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn record_issue(&self, dataset: Dataset, issue: &RecordQualityError) {
        log::warn!("{dataset}: {issue}");
    }
}

/// Keeps every reported issue in memory.
#[derive(Default)]
pub struct CollectingDiagnostics {
    issues: Mutex<Vec<(Dataset, RecordQualityError)>>,
}

impl CollectingDiagnostics {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the issues reported so far.
    #[must_use]
    pub fn issues(&self) -> Vec<(Dataset, RecordQualityError)> {
        self.issues
            .lock()
            .map(|issues| issues.clone())
            .unwrap_or_default()
    }

    /// Number of issues reported so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.issues.lock().map(|issues| issues.len()).unwrap_or(0)
    }

    /// Returns `true` if nothing has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn record_issue(&self, dataset: Dataset, issue: &RecordQualityError) {
        if let Ok(mut issues) = self.issues.lock() {
            issues.push((dataset, issue.clone()));
        }
    }
}

/// Per-kind tallies of excluded records, reported in the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionCounts {
    /// Records dropped for an unparseable date.
    pub invalid_date: u64,
    /// Records excluded from spatial tests for a bad coordinate.
    pub invalid_coordinate: u64,
    /// Numeric fields treated as missing because they did not parse.
    pub invalid_value: u64,
    /// Rows that could not be decoded at all.
    pub malformed_row: u64,
}

impl ExclusionCounts {
    /// Counts one issue.
    pub const fn record(&mut self, issue: &RecordQualityError) {
        match issue {
            RecordQualityError::InvalidDate { .. } => self.invalid_date += 1,
            RecordQualityError::InvalidCoordinate { .. } => self.invalid_coordinate += 1,
            RecordQualityError::InvalidValue { .. } => self.invalid_value += 1,
            RecordQualityError::MalformedRow { .. } => self.malformed_row += 1,
        }
    }

    /// Adds another set of tallies into this one.
    pub const fn merge(&mut self, other: &Self) {
        self.invalid_date += other.invalid_date;
        self.invalid_coordinate += other.invalid_coordinate;
        self.invalid_value += other.invalid_value;
        self.malformed_row += other.malformed_row;
    }

    /// Total number of counted issues.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.invalid_date + self.invalid_coordinate + self.invalid_value + self.malformed_row
    }
}
