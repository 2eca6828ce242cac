#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the wildfire-aqi enrichment pipeline.
//!
//! Uses `indicatif-log-bridge` (via [`wildfire_aqi_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and the partition progress bar never fight for the terminal.

use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use wildfire_aqi_cli_utils::IndicatifProgress;
use wildfire_aqi_observation_models::{AqiCategory, LogDiagnostics, classify};
use wildfire_aqi_pipeline::load_regions;
use wildfire_aqi_pipeline_models::{PipelineConfig, RunSummary};

#[derive(Parser)]
#[command(name = "wildfire_aqi", about = "Air quality and wildfire enrichment pipeline")]
struct Cli {
    /// Pipeline configuration file
    #[arg(
        long,
        global = true,
        env = "WILDFIRE_AQI_CONFIG",
        default_value = "wildfire_aqi.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the enrichment pipeline over the configured years
    Run(RunArgs),
    /// Print the severity label of each AQI value, or every label when
    /// no value is given
    Classify {
        /// AQI values; anything non-numeric is reported as Unknown
        values: Vec<String>,
    },
    /// List the region names of the configured polygon source
    Regions,
}

/// Overrides for values in the configuration file.
#[derive(Args)]
struct RunArgs {
    /// First year to process
    #[arg(long)]
    start_year: Option<i32>,
    /// Last year to process
    #[arg(long)]
    end_year: Option<i32>,
    /// Rolling window length
    #[arg(long)]
    window_days: Option<usize>,
    /// Wildfire proximity radius in kilometres
    #[arg(long)]
    distance_km: Option<f64>,
    /// Directory receiving the outputs
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Reuse partition outputs that already exist
    #[arg(long)]
    resume: bool,
}

impl RunArgs {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(year) = self.start_year {
            config.start_year = year;
        }
        if let Some(year) = self.end_year {
            config.end_year = year;
        }
        if let Some(days) = self.window_days {
            config.window_days = days;
        }
        if let Some(km) = self.distance_km {
            config.distance_km = km;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        config.resume |= self.resume;
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let multi = wildfire_aqi_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let mut config = PipelineConfig::load(&cli.config)?;
            args.apply(&mut config);

            let progress = IndicatifProgress::partitions_bar(&multi, "Enriching partitions");
            let summary = wildfire_aqi_pipeline::run(&config, &LogDiagnostics, &progress)?;
            print_summary(&summary);

            if summary.failed() > 0 {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::Classify { values } => {
            if values.is_empty() {
                for category in AqiCategory::all() {
                    println!("{category}");
                }
            }
            for value in values {
                let label = classify(value.trim().parse::<f64>().ok());
                println!("{value}\t{label}");
            }
        }
        Commands::Regions => {
            let config = PipelineConfig::load(&cli.config)?;
            let regions = load_regions(&config.regions)?;
            for name in regions.names() {
                println!("{name}");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!(
        "Years {}-{}: {} partitions succeeded, {} failed",
        summary.start_year,
        summary.end_year,
        summary.succeeded(),
        summary.failed()
    );

    let excluded = summary.total_exclusions();
    if excluded.total() > 0 {
        println!(
            "Excluded records: {} bad dates, {} bad coordinates, {} bad values, {} malformed rows",
            excluded.invalid_date,
            excluded.invalid_coordinate,
            excluded.invalid_value,
            excluded.malformed_row
        );
    }

    for partition in &summary.partitions {
        let excluded = partition.exclusions.total();
        match (&partition.failed_stage, &partition.error) {
            (Some(stage), Some(error)) => println!(
                "  {:<12} {}  failed at {stage}: {error}",
                partition.dataset.as_ref(),
                partition.year
            ),
            _ => println!(
                "  {:<12} {}  {:<9} read {:>7}  written {:>7}  excluded {excluded:>5}",
                partition.dataset.as_ref(),
                partition.year,
                partition.status.as_ref(),
                partition.rows_read,
                partition.rows_written
            ),
        }
    }

    for source in &summary.sources {
        let unattributed = source.unattributed.total();
        if unattributed > 0 {
            println!(
                "  {}: {unattributed} issues not attributable to a year",
                source.path
            );
        }
    }

    for output in &summary.combined_outputs {
        println!("  wrote {output}");
    }
}
