#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Readers for the air-quality and wildfire CSV exports.
//!
//! Each reader validates the header against the table's column contract
//! once, up front, then parses rows into typed records. Bad individual
//! rows never fail a read: they are excluded (or have the offending field
//! blanked) and reported through the caller's
//! [`wildfire_aqi_observation_models::Diagnostics`].

pub mod aqi;
pub mod parsing;
pub mod progress;
pub mod schema;
pub mod wildfire;

use std::{fs::File, path::Path};

use wildfire_aqi_observation_models::{
    Dataset, Diagnostics, ExclusionCounts, RecordQualityError,
};

pub use aqi::read_air_quality;
pub use progress::{NullProgress, ProgressCallback};
pub use schema::SchemaError;
pub use wildfire::read_wildfires;

/// Errors that can occur while reading a source table.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The file is missing or unreadable.
    #[error("Failed to open {path}: {source}")]
    DataSource {
        /// Path of the table.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The header row could not be read.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path of the table.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Required columns are absent.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Options shared by both readers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadOptions {
    /// Numeric value that marks a field as invalid; read as missing.
    pub invalid_sentinel: f64,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            invalid_sentinel: -999.0,
        }
    }
}

/// Records read from one table, with the tally of reported issues.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTable<T> {
    /// Parsed records in file order.
    pub records: Vec<T>,
    /// Number of data rows in the file, including excluded ones.
    pub rows_read: usize,
    /// Issues reported while parsing.
    pub exclusions: ExclusionCounts,
}

fn open_csv(path: &Path) -> Result<csv::Reader<File>, SourceError> {
    let file = File::open(path).map_err(|e| SourceError::DataSource {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

/// Opens a table and validates its header against `contract`.
fn open_table(
    path: &Path,
    contract: &[schema::ColumnSpec],
) -> Result<(csv::Reader<File>, schema::ColumnMap), SourceError> {
    let mut reader = open_csv(path)?;
    let table = path.display().to_string();

    let header = reader
        .headers()
        .map_err(|e| SourceError::Csv {
            path: table.clone(),
            source: e,
        })?
        .clone();
    let columns = schema::validate_header(&table, &header, contract)?;

    Ok((reader, columns))
}

/// Forwards issues to the caller's diagnostics and tallies them.
struct IssueReporter<'a> {
    dataset: Dataset,
    diagnostics: &'a dyn Diagnostics,
    counts: ExclusionCounts,
}

impl<'a> IssueReporter<'a> {
    const fn new(dataset: Dataset, diagnostics: &'a dyn Diagnostics) -> Self {
        Self {
            dataset,
            diagnostics,
            counts: ExclusionCounts {
                invalid_date: 0,
                invalid_coordinate: 0,
                invalid_value: 0,
                malformed_row: 0,
            },
        }
    }

    fn report(&mut self, issue: &RecordQualityError) {
        self.diagnostics.record_issue(self.dataset, issue);
        self.counts.record(issue);
    }
}
