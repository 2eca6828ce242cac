#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Year-partitioned enrichment of air-quality readings with region,
//! severity, wildfire and rolling-average columns.
//!
//! A run processes the wildfire dataset first, one calendar year at a
//! time, then the air-quality dataset. Every partition walks its stages in
//! order and is written independently with an atomic replace; a failing
//! partition is recorded in the [`RunSummary`] and the run moves on.
//! Successful partitions are then concatenated into the combined outputs.

pub mod output;
pub mod tables;

use std::{collections::BTreeSet, fmt::Display, num::NonZeroUsize, path::Path};

use thiserror::Error;
use wildfire_aqi_analytics::{
    AnalyticsError, SeriesPoint, WildfireCorrelator, rolling_average,
};
use wildfire_aqi_observation_models::{
    Dataset, Diagnostics, EnrichedObservation, PointObservation, ProcessedWildfire,
    WildfireEvent, classify,
};
use wildfire_aqi_pipeline_models::{
    ConfigError, PartitionReport, PartitionStatus, PipelineConfig, RegionsConfig, RollingGroup,
    RunSummary, Stage,
};
use wildfire_aqi_source::{
    ProgressCallback, ReadOptions, SourceError, read_air_quality, read_wildfires,
};
use wildfire_aqi_spatial::{Crs, RegionIndex, RegionOptions, SpatialError};

use crate::{
    output::{
        aqi_combined_file, aqi_partition_file, pollutant_file, read_csv, sort_enriched,
        sort_wildfires, wildfire_combined_file, wildfire_partition_file, write_csv_atomic,
        write_summary,
    },
    tables::{PartitionRows, TableLoader},
};

/// Errors that abort a whole run. Per-partition failures are reported in
/// the [`RunSummary`] instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The region polygons could not be loaded.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// A source table could not be read.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A derived index could not be built.
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    /// File system error.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path involved.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV read or write error.
    #[error("CSV error on {path}: {source}")]
    Csv {
        /// Path involved.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a partition stopped.
#[derive(Debug)]
struct StageFailure {
    stage: Stage,
    error: String,
}

impl StageFailure {
    fn new(stage: Stage, error: impl Display) -> Self {
        Self {
            stage,
            error: error.to_string(),
        }
    }
}

/// Read-only state shared by every partition of a run.
struct RunContext<'a> {
    config: &'a PipelineConfig,
    regions: &'a RegionIndex,
    diagnostics: &'a dyn Diagnostics,
    output_dir: &'a Path,
}

impl RunContext<'_> {
    /// Existing output of a partition, when resuming and it reads back
    /// cleanly.
    fn resumable<T: serde::de::DeserializeOwned>(&self, file_name: &str) -> Option<Vec<T>> {
        if !self.config.resume {
            return None;
        }
        let path = self.output_dir.join(file_name);
        if !path.exists() {
            return None;
        }
        match read_csv(&path) {
            Ok(rows) => {
                log::info!("Resuming from existing {}", path.display());
                Some(rows)
            }
            Err(e) => {
                log::warn!("Cannot resume from {}, reprocessing: {e}", path.display());
                None
            }
        }
    }
}

fn enter(dataset: Dataset, year: i32, stage: Stage) {
    log::debug!("{dataset} {year}: {stage}");
}

/// Loads the region polygons named by the `[regions]` section.
///
/// # Errors
///
/// * [`SpatialError::UnsupportedCrs`] if an EPSG code is not supported
/// * any error of [`RegionIndex::load`]
pub fn load_regions(config: &RegionsConfig) -> Result<RegionIndex, SpatialError> {
    let options = RegionOptions {
        name_field: config.name_field.clone(),
        default_crs: Crs::from_epsg(config.default_crs)?,
        point_crs: Crs::from_epsg(config.point_crs)?,
    };
    RegionIndex::load(&config.path, &options)
}

/// Runs the enrichment pipeline over every year of `config`.
///
/// # Errors
///
/// Fails only when the configuration is invalid, the region polygons
/// cannot be loaded, or the combined outputs and summary cannot be
/// written. Source and stage failures are confined to their partition.
pub fn run(
    config: &PipelineConfig,
    diagnostics: &dyn Diagnostics,
    progress: &dyn ProgressCallback,
) -> Result<RunSummary, PipelineError> {
    config.validate()?;

    let output_dir = config.output_dir.as_path();
    std::fs::create_dir_all(output_dir).map_err(|e| PipelineError::Io {
        path: output_dir.display().to_string(),
        source: e,
    })?;

    let regions = load_regions(&config.regions)?;
    let ctx = RunContext {
        config,
        regions: &regions,
        diagnostics,
        output_dir,
    };

    let years: Vec<i32> = config.years().collect();
    progress.set_total(u64::try_from(years.len() * 2).unwrap_or(u64::MAX));

    let options = ReadOptions {
        invalid_sentinel: config.invalid_sentinel,
    };
    let mut summary = RunSummary::new(config.start_year, config.end_year);

    let mut wildfire_loader: TableLoader<'_, WildfireEvent> = TableLoader::new(
        Dataset::Wildfire,
        &config.wildfire.source,
        options,
        read_wildfires,
        diagnostics,
    );
    let mut wildfires: Vec<ProcessedWildfire> = Vec::new();
    let mut missing_wildfire_years: BTreeSet<i32> = BTreeSet::new();
    for &year in &years {
        progress.set_message(format!("Wildfire {year}"));
        let mut report = PartitionReport::new(Dataset::Wildfire, year);
        match wildfire_partition(&ctx, year, &mut wildfire_loader, &mut report) {
            Ok(rows) => wildfires.extend(rows),
            Err(failure) => {
                fail_partition(&mut report, failure);
                missing_wildfire_years.insert(year);
            }
        }
        summary.partitions.push(report);
        progress.inc(1);
    }

    if any_succeeded(&summary, Dataset::Wildfire) {
        sort_wildfires(&mut wildfires);
        let name = wildfire_combined_file(config.start_year, config.end_year);
        write_csv_atomic(&output_dir.join(&name), &wildfires)?;
        log::info!("Wrote {} wildfire detections to {name}", wildfires.len());
        summary.combined_outputs.push(name);
    }

    let correlator = WildfireCorrelator::new(&wildfires, config.distance_km).map_err(|e| {
        log::error!("Wildfire correlation unavailable: {e}");
        e.to_string()
    });

    let mut aqi_loader: TableLoader<'_, PointObservation> = TableLoader::new(
        Dataset::AirQuality,
        &config.air_quality.source,
        options,
        read_air_quality,
        diagnostics,
    );
    let mut enriched: Vec<EnrichedObservation> = Vec::new();
    for &year in &years {
        progress.set_message(format!("Air quality {year}"));
        let mut report = PartitionReport::new(Dataset::AirQuality, year);
        let year_correlator = if missing_wildfire_years.contains(&year) {
            Err(format!(
                "wildfire partition {year} failed, wildfire flags cannot be computed"
            ))
        } else {
            correlator.as_ref().map_err(Clone::clone)
        };
        match air_quality_partition(&ctx, year, &mut aqi_loader, year_correlator, &mut report) {
            Ok(rows) => enriched.extend(rows),
            Err(failure) => fail_partition(&mut report, failure),
        }
        summary.partitions.push(report);
        progress.inc(1);
    }

    if any_succeeded(&summary, Dataset::AirQuality) {
        sort_enriched(&mut enriched);
        let name = aqi_combined_file(config.start_year, config.end_year);
        write_csv_atomic(&output_dir.join(&name), &enriched)?;
        log::info!("Wrote {} enriched rows to {name}", enriched.len());
        summary.combined_outputs.push(name);

        for parameter in &config.split_parameters {
            let rows: Vec<&EnrichedObservation> = enriched
                .iter()
                .filter(|r| r.parameter.eq_ignore_ascii_case(parameter))
                .collect();
            if rows.is_empty() {
                log::info!("No {parameter} rows, skipping extract");
                continue;
            }
            let name = pollutant_file(parameter, config.start_year, config.end_year);
            write_csv_atomic(&output_dir.join(&name), &rows)?;
            summary.combined_outputs.push(name);
        }
    }

    summary
        .sources
        .extend_from_slice(wildfire_loader.source_reports());
    summary.sources.extend_from_slice(aqi_loader.source_reports());

    write_summary(output_dir, &summary)?;

    let message = format!(
        "{} partitions succeeded, {} failed",
        summary.succeeded(),
        summary.failed()
    );
    log::info!("{message}");
    progress.finish(message);

    Ok(summary)
}

fn any_succeeded(summary: &RunSummary, dataset: Dataset) -> bool {
    summary
        .partitions
        .iter()
        .any(|p| p.dataset == dataset && p.is_success())
}

fn fail_partition(report: &mut PartitionReport, failure: StageFailure) {
    log::error!(
        "{} {} failed at {}: {}",
        report.dataset,
        report.year,
        failure.stage,
        failure.error
    );
    report.fail(failure.stage, failure.error);
}

/// Loads a partition's rows, folding their counts into `report`.
fn load_partition<T: tables::SourceRecord>(
    loader: &mut TableLoader<'_, T>,
    year: i32,
    report: &mut PartitionReport,
) -> Result<Vec<T>, StageFailure> {
    let PartitionRows {
        records,
        rows_read,
        exclusions,
    } = loader
        .load(year)
        .map_err(|e| StageFailure::new(Stage::Loaded, e))?;
    report.rows_read = rows_read;
    report.exclusions = exclusions;
    Ok(records)
}

fn wildfire_partition(
    ctx: &RunContext<'_>,
    year: i32,
    loader: &mut TableLoader<'_, WildfireEvent>,
    report: &mut PartitionReport,
) -> Result<Vec<ProcessedWildfire>, StageFailure> {
    let file_name = wildfire_partition_file(year);

    if let Some(mut rows) = ctx.resumable::<ProcessedWildfire>(&file_name) {
        restore_rows(&mut rows, |r, row| r.row = row);
        report.status = PartitionStatus::Resumed;
        report.rows_written = rows.len();
        report.output = Some(file_name);
        return Ok(rows);
    }

    enter(Dataset::Wildfire, year, Stage::Loaded);
    let mut events = load_partition(loader, year, report)?;

    enter(Dataset::Wildfire, year, Stage::Cleaned);
    if let Some(level) = ctx.config.wildfire.confidence_filter {
        let before = events.len();
        events.retain(|e| e.confidence == level);
        log::debug!(
            "wildfire {year}: kept {} of {before} detections with {level} confidence",
            events.len()
        );
    }
    let mut rows: Vec<ProcessedWildfire> =
        events.into_iter().map(ProcessedWildfire::from_event).collect();

    enter(Dataset::Wildfire, year, Stage::RegionAssigned);
    for row in &mut rows {
        row.region = row
            .coordinate()
            .and_then(|c| ctx.regions.lookup(c))
            .map(str::to_string);
    }
    if ctx.config.wildfire.clip_to_regions {
        let before = rows.len();
        rows.retain(|r| r.region.is_some());
        log::info!(
            "wildfire {year}: dropped {} detections outside every region",
            before - rows.len()
        );
    }

    enter(Dataset::Wildfire, year, Stage::Persisted);
    sort_wildfires(&mut rows);
    write_csv_atomic(&ctx.output_dir.join(&file_name), &rows)
        .map_err(|e| StageFailure::new(Stage::Persisted, e))?;

    log::info!("wildfire {year}: wrote {} detections", rows.len());
    report.rows_written = rows.len();
    report.output = Some(file_name);
    Ok(rows)
}

fn air_quality_partition(
    ctx: &RunContext<'_>,
    year: i32,
    loader: &mut TableLoader<'_, PointObservation>,
    correlator: Result<&WildfireCorrelator, String>,
    report: &mut PartitionReport,
) -> Result<Vec<EnrichedObservation>, StageFailure> {
    let file_name = aqi_partition_file(year);

    if let Some(mut rows) = ctx.resumable::<EnrichedObservation>(&file_name) {
        restore_rows(&mut rows, |r, row| r.row = row);
        report.status = PartitionStatus::Resumed;
        report.rows_written = rows.len();
        report.wildfire_in_region = rows.iter().filter(|r| r.wildfire_in_region).count();
        report.wildfire_within_distance =
            rows.iter().filter(|r| r.wildfire_within_distance).count();
        report.output = Some(file_name);
        return Ok(rows);
    }

    enter(Dataset::AirQuality, year, Stage::Loaded);
    let observations = load_partition(loader, year, report)?;

    enter(Dataset::AirQuality, year, Stage::Cleaned);
    let mut rows: Vec<EnrichedObservation> = observations
        .into_iter()
        .map(EnrichedObservation::from_observation)
        .collect();

    enter(Dataset::AirQuality, year, Stage::RegionAssigned);
    let points: Vec<_> = rows.iter().map(EnrichedObservation::coordinate).collect();
    let assigned: Vec<Option<String>> = ctx
        .regions
        .assign_regions(&points)
        .into_iter()
        .map(|region| region.map(str::to_string))
        .collect();
    for (row, region) in rows.iter_mut().zip(assigned) {
        row.region = region;
    }

    enter(Dataset::AirQuality, year, Stage::Categorized);
    for row in &mut rows {
        row.aqi_category = classify(row.aqi);
    }

    enter(Dataset::AirQuality, year, Stage::Correlated);
    let correlator = correlator.map_err(|e| StageFailure::new(Stage::Correlated, e))?;
    let counts = correlator.apply(&mut rows);
    report.wildfire_in_region = counts.in_region;
    report.wildfire_within_distance = counts.within_distance;

    enter(Dataset::AirQuality, year, Stage::Aggregated);
    let window = NonZeroUsize::new(ctx.config.window_days)
        .ok_or_else(|| StageFailure::new(Stage::Aggregated, "window_days must be at least 1"))?;
    let rolling = {
        let series: Vec<SeriesPoint<(&str, &str)>> = rows
            .iter()
            .map(|r| SeriesPoint {
                row: r.row,
                group: rolling_key(ctx.config.rolling_group, r),
                date: Ok(r.date),
                value: r.aqi,
            })
            .collect();
        rolling_average(&series, window, Dataset::AirQuality, ctx.diagnostics)
    };
    for value in rolling {
        rows[value.index].rolling_aqi = value.value;
    }

    enter(Dataset::AirQuality, year, Stage::Persisted);
    sort_enriched(&mut rows);
    write_csv_atomic(&ctx.output_dir.join(&file_name), &rows)
        .map_err(|e| StageFailure::new(Stage::Persisted, e))?;

    log::info!(
        "air_quality {year}: wrote {} rows ({} in-region, {} within {} km)",
        rows.len(),
        counts.in_region,
        counts.within_distance,
        ctx.config.distance_km
    );
    report.rows_written = rows.len();
    report.output = Some(file_name);
    Ok(rows)
}

/// Rolling-window series a row belongs to. Rows without a station id (or
/// region, when grouping by region) belong to none.
fn rolling_key(group: RollingGroup, row: &EnrichedObservation) -> Option<(&str, &str)> {
    match group {
        RollingGroup::Station => {
            (!row.station_id.is_empty()).then_some((row.station_id.as_str(), ""))
        }
        RollingGroup::StationParameter => (!row.station_id.is_empty())
            .then_some((row.station_id.as_str(), row.parameter.as_str())),
        RollingGroup::Region => row.region.as_deref().map(|region| (region, "")),
    }
}

/// Written files do not carry source rows; file order stands in for them
/// so the sort tie-breaker stays stable.
fn restore_rows<T>(rows: &mut [T], mut set: impl FnMut(&mut T, usize)) {
    for (i, row) in rows.iter_mut().enumerate() {
        set(row, i + 1);
    }
}
