#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Air-quality and wildfire record types.
//!
//! Raw rows parsed from the upstream CSV exports become
//! [`PointObservation`] and [`WildfireEvent`] values. The enrichment
//! pipeline turns them into [`EnrichedObservation`] and
//! [`ProcessedWildfire`] rows, which are the on-disk output contract.

pub mod category;
pub mod confidence;
pub mod date;
pub mod quality;
pub mod season;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub use category::{AqiCategory, classify};
pub use confidence::FireConfidence;
pub use date::parse_date;
pub use quality::{
    CollectingDiagnostics, Dataset, Diagnostics, ExclusionCounts, LogDiagnostics,
    RecordQualityError,
};
pub use season::Season;

/// A validated longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, within `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in degrees, within `[-180, 180]`.
    pub longitude: f64,
}

impl Coordinate {
    /// Builds a coordinate, rejecting non-finite or out-of-range values.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }
        Some(Self {
            latitude,
            longitude,
        })
    }

    /// Builds a coordinate from optional parts.
    #[must_use]
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        Self::new(latitude?, longitude?)
    }
}

/// A single air-quality reading from a monitoring station.
#[derive(Debug, Clone, PartialEq)]
pub struct PointObservation {
    /// 1-based data row in the source file.
    pub row: usize,
    /// Station identifier (site name or AQS code).
    pub station_id: String,
    /// Latitude, `None` once found invalid.
    pub latitude: Option<f64>,
    /// Longitude, `None` once found invalid.
    pub longitude: Option<f64>,
    /// Observation date.
    pub date: NaiveDate,
    /// Pollutant parameter (e.g. `PM2.5`, `OZONE`).
    pub parameter: String,
    /// Air quality index value, `None` when missing or the invalid sentinel.
    pub value: Option<f64>,
}

impl PointObservation {
    /// Returns the validated coordinate, if both parts are present.
    #[must_use]
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::from_parts(self.latitude, self.longitude)
    }
}

/// A single satellite fire detection.
#[derive(Debug, Clone, PartialEq)]
pub struct WildfireEvent {
    /// 1-based data row in the source file.
    pub row: usize,
    /// Latitude, `None` once found invalid.
    pub latitude: Option<f64>,
    /// Longitude, `None` once found invalid.
    pub longitude: Option<f64>,
    /// Acquisition date.
    pub date: NaiveDate,
    /// Fire radiative power in MW, used as an intensity weight.
    pub radiative_power: Option<f64>,
    /// Detection confidence, normalized at ingestion.
    pub confidence: FireConfidence,
    /// Detection type code (0 = presumed vegetation fire).
    pub detection_type: Option<u8>,
}

impl WildfireEvent {
    /// Returns the validated coordinate, if both parts are present.
    #[must_use]
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::from_parts(self.latitude, self.longitude)
    }
}

/// An air-quality row after enrichment, as written to the partition
/// outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedObservation {
    /// Station identifier.
    pub station_id: String,
    /// Latitude.
    pub latitude: Option<f64>,
    /// Longitude.
    pub longitude: Option<f64>,
    /// Observation date.
    pub date: NaiveDate,
    /// Calendar year of `date`.
    pub year: i32,
    /// Calendar month of `date` (1-12).
    pub month: u32,
    /// Meteorological season of `date`.
    pub season: Season,
    /// Pollutant parameter.
    pub parameter: String,
    /// Air quality index value.
    pub aqi: Option<f64>,
    /// Severity band of `aqi`.
    pub aqi_category: AqiCategory,
    /// Enclosing region name.
    pub region: Option<String>,
    /// Trailing rolling mean of `aqi` within the rolling group.
    pub rolling_aqi: Option<f64>,
    /// A wildfire was detected in the same region on the same date.
    pub wildfire_in_region: bool,
    /// A wildfire was detected within the configured radius (any date).
    pub wildfire_within_distance: bool,
    /// Source row, used only as a sort tie-breaker.
    #[serde(skip)]
    pub row: usize,
}

impl EnrichedObservation {
    /// Seeds an output row from a cleaned observation. Derived fields
    /// start empty and are filled by the enrichment stages.
    #[must_use]
    pub fn from_observation(observation: PointObservation) -> Self {
        let date = observation.date;
        Self {
            station_id: observation.station_id,
            latitude: observation.latitude,
            longitude: observation.longitude,
            date,
            year: date.year(),
            month: date.month(),
            season: Season::from_date(date),
            parameter: observation.parameter,
            aqi: observation.value,
            aqi_category: AqiCategory::Unknown,
            region: None,
            rolling_aqi: None,
            wildfire_in_region: false,
            wildfire_within_distance: false,
            row: observation.row,
        }
    }

    /// Returns the validated coordinate, if both parts are present.
    #[must_use]
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::from_parts(self.latitude, self.longitude)
    }
}

/// A wildfire detection after preprocessing, as written to the wildfire
/// partition outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedWildfire {
    /// Latitude.
    pub latitude: Option<f64>,
    /// Longitude.
    pub longitude: Option<f64>,
    /// Acquisition date.
    pub date: NaiveDate,
    /// Calendar year of `date`.
    pub year: i32,
    /// Calendar month of `date` (1-12).
    pub month: u32,
    /// Meteorological season of `date`.
    pub season: Season,
    /// Fire radiative power in MW.
    pub frp: Option<f64>,
    /// Normalized detection confidence.
    pub confidence: FireConfidence,
    /// Detection type code.
    pub detection_type: Option<u8>,
    /// Enclosing region name.
    pub region: Option<String>,
    /// Source row, used only as a sort tie-breaker.
    #[serde(skip)]
    pub row: usize,
}

impl ProcessedWildfire {
    /// Seeds an output row from a cleaned wildfire event.
    #[must_use]
    pub fn from_event(event: WildfireEvent) -> Self {
        let date = event.date;
        Self {
            latitude: event.latitude,
            longitude: event.longitude,
            date,
            year: date.year(),
            month: date.month(),
            season: Season::from_date(date),
            frp: event.radiative_power,
            confidence: event.confidence,
            detection_type: event.detection_type,
            region: None,
            row: event.row,
        }
    }

    /// Returns the validated coordinate, if both parts are present.
    #[must_use]
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::from_parts(self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(Coordinate::new(91.0, 0.0).is_none());
        assert!(Coordinate::new(0.0, -180.5).is_none());
        assert!(Coordinate::new(f64::NAN, 0.0).is_none());
        assert!(Coordinate::new(40.0, -105.2).is_some());
    }

    #[test]
    fn from_parts_requires_both_halves() {
        assert!(Coordinate::from_parts(Some(40.0), None).is_none());
        assert!(Coordinate::from_parts(None, Some(-105.0)).is_none());
    }

    #[test]
    fn seeds_enriched_row_with_calendar_fields() {
        let observation = PointObservation {
            row: 3,
            station_id: "Boulder".to_string(),
            latitude: Some(40.0),
            longitude: Some(-105.2),
            date: NaiveDate::from_ymd_opt(2023, 7, 15).unwrap(),
            parameter: "PM2.5".to_string(),
            value: Some(120.0),
        };

        let enriched = EnrichedObservation::from_observation(observation);
        assert_eq!(enriched.year, 2023);
        assert_eq!(enriched.month, 7);
        assert_eq!(enriched.season, Season::Summer);
        assert_eq!(enriched.row, 3);
        assert!(enriched.region.is_none());
        assert!(!enriched.wildfire_in_region);
    }
}
