//! Pipeline configuration loaded from TOML.
//!
//! ```toml
//! start_year = 2020
//! end_year = 2023
//! window_days = 7
//! distance_km = 50.0
//!
//! [air_quality]
//! source = { per_year = "data/raw/aqi_{year}.csv" }
//!
//! [wildfire]
//! source = { paths = ["data/raw/fire_archive.csv", "data/raw/fire_nrt.csv"] }
//! confidence_filter = "nominal"
//!
//! [regions]
//! path = "data/geo/colorado_counties.shp"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use wildfire_aqi_observation_models::FireConfidence;

/// Placeholder substituted by the partition year in `per_year` sources.
pub const YEAR_PLACEHOLDER: &str = "{year}";

/// Errors from loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Path of the file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration is not valid TOML for [`PipelineConfig`].
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Where a table's rows come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSource {
    /// One file holding every year.
    Path(PathBuf),
    /// Several files holding every year between them (an archive export
    /// followed by a near-real-time one), concatenated in order.
    Paths(Vec<PathBuf>),
    /// One file per year; the template contains `{year}`.
    PerYear(String),
}

impl TableSource {
    /// Files holding the rows of `year`, in reading order.
    #[must_use]
    pub fn files(&self, year: i32) -> Vec<PathBuf> {
        match self {
            Self::Path(path) => vec![path.clone()],
            Self::Paths(paths) => paths.clone(),
            Self::PerYear(template) => vec![PathBuf::from(
                template.replace(YEAR_PLACEHOLDER, &year.to_string()),
            )],
        }
    }
}

/// Which records share a rolling window.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RollingGroup {
    /// One series per station.
    #[default]
    Station,
    /// One series per station and pollutant.
    StationParameter,
    /// One series per region; rows without a region are ungrouped.
    Region,
}

/// `[air_quality]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirQualityConfig {
    /// Station readings.
    pub source: TableSource,
}

/// `[wildfire]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WildfireConfig {
    /// Satellite detections.
    pub source: TableSource,
    /// Keep only detections of this confidence.
    #[serde(default)]
    pub confidence_filter: Option<FireConfidence>,
    /// Drop detections outside every region.
    #[serde(default)]
    pub clip_to_regions: bool,
}

/// `[regions]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionsConfig {
    /// Polygon dataset (`.shp`, `.geojson` or `.json`).
    pub path: PathBuf,
    /// Preferred region name attribute.
    #[serde(default = "default_name_field")]
    pub name_field: String,
    /// EPSG code assumed when the dataset declares none.
    #[serde(default = "default_polygon_crs")]
    pub default_crs: u32,
    /// EPSG code of the input latitude/longitude columns.
    #[serde(default = "default_point_crs")]
    pub point_crs: u32,
}

fn default_name_field() -> String {
    "NAME".to_string()
}

const fn default_polygon_crs() -> u32 {
    4269
}

const fn default_point_crs() -> u32 {
    4326
}

const fn default_window_days() -> usize {
    7
}

const fn default_distance_km() -> f64 {
    50.0
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/processed")
}

const fn default_invalid_sentinel() -> f64 {
    -999.0
}

fn default_split_parameters() -> Vec<String> {
    vec!["PM2.5".to_string(), "OZONE".to_string()]
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// First partition year (inclusive).
    pub start_year: i32,
    /// Last partition year (inclusive).
    pub end_year: i32,
    /// Rolling window length, in observations.
    #[serde(default = "default_window_days")]
    pub window_days: usize,
    /// Proximity radius in kilometres.
    #[serde(default = "default_distance_km")]
    pub distance_km: f64,
    /// Directory receiving every output file.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Numeric marker for invalid values in the raw exports.
    #[serde(default = "default_invalid_sentinel")]
    pub invalid_sentinel: f64,
    /// Rolling window grouping.
    #[serde(default)]
    pub rolling_group: RollingGroup,
    /// Pollutants extracted into their own combined files.
    #[serde(default = "default_split_parameters")]
    pub split_parameters: Vec<String>,
    /// Reuse existing partition outputs instead of reprocessing.
    #[serde(default)]
    pub resume: bool,
    /// Station readings.
    pub air_quality: AirQualityConfig,
    /// Satellite detections.
    pub wildfire: WildfireConfig,
    /// Region polygons.
    pub regions: RegionsConfig,
}

impl PipelineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::Toml`] if the document does not parse
    /// * [`ConfigError::Invalid`] if a value is out of range
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::Io`] if the file cannot be read
    /// * see [`Self::from_toml_str`]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = Self::from_toml_str(&contents)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_year > self.end_year {
            return Err(ConfigError::Invalid(format!(
                "start_year {} is after end_year {}",
                self.start_year, self.end_year
            )));
        }
        if self.window_days == 0 {
            return Err(ConfigError::Invalid(
                "window_days must be at least 1".to_string(),
            ));
        }
        if !self.distance_km.is_finite() || self.distance_km <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "distance_km must be a positive number, got {}",
                self.distance_km
            )));
        }
        for (section, source) in [
            ("air_quality", &self.air_quality.source),
            ("wildfire", &self.wildfire.source),
        ] {
            match source {
                TableSource::PerYear(template) if !template.contains(YEAR_PLACEHOLDER) => {
                    return Err(ConfigError::Invalid(format!(
                        "[{section}] per_year source {template:?} has no {YEAR_PLACEHOLDER} placeholder"
                    )));
                }
                TableSource::Paths(paths) if paths.is_empty() => {
                    return Err(ConfigError::Invalid(format!(
                        "[{section}] paths source lists no files"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Partition years, ascending.
    #[must_use]
    pub const fn years(&self) -> std::ops::RangeInclusive<i32> {
        self.start_year..=self.end_year
    }
}
