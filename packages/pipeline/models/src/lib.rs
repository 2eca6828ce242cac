#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Enrichment pipeline configuration and run reporting types.
//!
//! [`PipelineConfig`] is loaded from TOML. [`RunSummary`] is written as
//! `run_summary.json` at the end of every run and carries no timings, so
//! unchanged inputs produce an unchanged summary.

pub mod config;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use wildfire_aqi_observation_models::{Dataset, ExclusionCounts};

pub use config::{
    AirQualityConfig, ConfigError, PipelineConfig, RegionsConfig, RollingGroup, TableSource,
    WildfireConfig,
};

/// A step of the per-partition state machine.
///
/// Air-quality partitions pass through every stage in declaration order.
/// Wildfire partitions go straight from `region_assigned` to `persisted`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    /// Raw rows read and schema-validated.
    Loaded,
    /// Dates parsed, sentinels normalized, partition rows selected.
    Cleaned,
    /// Region names assigned.
    RegionAssigned,
    /// Severity labels assigned.
    Categorized,
    /// Wildfire flags assigned.
    Correlated,
    /// Rolling statistics computed.
    Aggregated,
    /// Output written.
    Persisted,
}

/// Outcome of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PartitionStatus {
    /// Processed and written.
    Succeeded,
    /// An existing output was reused.
    Resumed,
    /// A stage failed; nothing was written.
    Failed,
}

/// Report for one `(dataset, year)` partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionReport {
    /// Which dataset the partition belongs to.
    pub dataset: Dataset,
    /// Calendar year.
    pub year: i32,
    /// Outcome.
    pub status: PartitionStatus,
    /// Stage that failed, if any.
    pub failed_stage: Option<Stage>,
    /// Error message, if any.
    pub error: Option<String>,
    /// Rows read for this partition.
    pub rows_read: usize,
    /// Rows written to the partition output.
    pub rows_written: usize,
    /// Issues attributed to this partition.
    pub exclusions: ExclusionCounts,
    /// Rows flagged for same-region, same-day wildfire.
    pub wildfire_in_region: usize,
    /// Rows flagged for wildfire within the radius.
    pub wildfire_within_distance: usize,
    /// Output file name, relative to the output directory.
    pub output: Option<String>,
}

impl PartitionReport {
    /// A report with zero counts.
    #[must_use]
    pub fn new(dataset: Dataset, year: i32) -> Self {
        Self {
            dataset,
            year,
            status: PartitionStatus::Succeeded,
            failed_stage: None,
            error: None,
            rows_read: 0,
            rows_written: 0,
            exclusions: ExclusionCounts::default(),
            wildfire_in_region: 0,
            wildfire_within_distance: 0,
            output: None,
        }
    }

    /// Marks the partition failed at `stage`.
    pub fn fail(&mut self, stage: Stage, error: impl std::fmt::Display) {
        self.status = PartitionStatus::Failed;
        self.failed_stage = Some(stage);
        self.error = Some(error.to_string());
    }

    /// Returns `true` unless the partition failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status != PartitionStatus::Failed
    }
}

/// One file of a `path` or `paths` source, with the issues that could not
/// be attributed to a year (rows whose date or entire record could not be
/// read).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    /// Which dataset the file holds.
    pub dataset: Dataset,
    /// Path of the file.
    pub path: String,
    /// Data rows in the file.
    pub rows_read: usize,
    /// Issues not attributable to any partition.
    pub unattributed: ExclusionCounts,
}

/// Final report of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// First year processed.
    pub start_year: i32,
    /// Last year processed.
    pub end_year: i32,
    /// Reports on the files of multi-year sources, in reading order.
    pub sources: Vec<SourceReport>,
    /// Partition reports, wildfire partitions first, each in year order.
    pub partitions: Vec<PartitionReport>,
    /// Combined and per-pollutant output file names.
    pub combined_outputs: Vec<String>,
}

impl RunSummary {
    /// An empty summary for a year range.
    #[must_use]
    pub const fn new(start_year: i32, end_year: i32) -> Self {
        Self {
            start_year,
            end_year,
            sources: Vec::new(),
            partitions: Vec::new(),
            combined_outputs: Vec::new(),
        }
    }

    /// Number of partitions that succeeded or were resumed.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.partitions.iter().filter(|p| p.is_success()).count()
    }

    /// Number of failed partitions.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.partitions.len() - self.succeeded()
    }

    /// Total issues across partitions and sources.
    #[must_use]
    pub fn total_exclusions(&self) -> ExclusionCounts {
        let mut total = ExclusionCounts::default();
        for partition in &self.partitions {
            total.merge(&partition.exclusions);
        }
        for source in &self.sources {
            total.merge(&source.unattributed);
        }
        total
    }
}
