//! Output files: naming, ordering, and atomic CSV/JSON writes.

use std::{
    cmp::Ordering,
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use wildfire_aqi_observation_models::{EnrichedObservation, ProcessedWildfire};
use wildfire_aqi_pipeline_models::RunSummary;

use crate::PipelineError;

/// File name of the run summary.
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

/// A row type with a fixed CSV header.
pub trait CsvColumns {
    /// Header fields, in serialization order.
    const COLUMNS: &'static [&'static str];
}

impl CsvColumns for EnrichedObservation {
    const COLUMNS: &'static [&'static str] = &[
        "station_id",
        "latitude",
        "longitude",
        "date",
        "year",
        "month",
        "season",
        "parameter",
        "aqi",
        "aqi_category",
        "region",
        "rolling_aqi",
        "wildfire_in_region",
        "wildfire_within_distance",
    ];
}

impl CsvColumns for ProcessedWildfire {
    const COLUMNS: &'static [&'static str] = &[
        "latitude",
        "longitude",
        "date",
        "year",
        "month",
        "season",
        "frp",
        "confidence",
        "detection_type",
        "region",
    ];
}

impl<T: CsvColumns> CsvColumns for &T {
    const COLUMNS: &'static [&'static str] = T::COLUMNS;
}

/// Enriched air-quality output of one year.
#[must_use]
pub fn aqi_partition_file(year: i32) -> String {
    format!("aqi_enriched_{year}.csv")
}

/// Processed wildfire output of one year.
#[must_use]
pub fn wildfire_partition_file(year: i32) -> String {
    format!("wildfire_processed_{year}.csv")
}

/// Combined enriched air-quality output.
#[must_use]
pub fn aqi_combined_file(start_year: i32, end_year: i32) -> String {
    format!("aqi_enriched_{start_year}_{end_year}.csv")
}

/// Combined processed wildfire output.
#[must_use]
pub fn wildfire_combined_file(start_year: i32, end_year: i32) -> String {
    format!("wildfire_processed_{start_year}_{end_year}.csv")
}

/// Per-pollutant extract of the combined air-quality output.
#[must_use]
pub fn pollutant_file(parameter: &str, start_year: i32, end_year: i32) -> String {
    format!("{}_aqi_{start_year}_{end_year}.csv", parameter_slug(parameter))
}

/// Lowercase alphanumeric form of a parameter name (`PM2.5` -> `pm25`).
#[must_use]
pub fn parameter_slug(parameter: &str) -> String {
    parameter
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Orders enriched rows by `(date, station_id, parameter, source row)`.
pub fn sort_enriched(rows: &mut [EnrichedObservation]) {
    rows.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.station_id.cmp(&b.station_id))
            .then_with(|| a.parameter.cmp(&b.parameter))
            .then_with(|| a.row.cmp(&b.row))
    });
}

/// Orders wildfire rows by `(date, latitude, longitude, source row)`.
pub fn sort_wildfires(rows: &mut [ProcessedWildfire]) {
    rows.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| cmp_coordinate(a.latitude, b.latitude))
            .then_with(|| cmp_coordinate(a.longitude, b.longitude))
            .then_with(|| a.row.cmp(&b.row))
    });
}

/// Missing values sort first.
fn cmp_coordinate(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> PipelineError {
    PipelineError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn csv_error(path: &Path, source: csv::Error) -> PipelineError {
    PipelineError::Csv {
        path: path.display().to_string(),
        source,
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes `rows` as CSV to `path` with a header, via a `.tmp` sibling and
/// a rename so readers never see a partial file. An empty `rows` still
/// gets the header line.
///
/// # Errors
///
/// Returns [`PipelineError::Csv`] or [`PipelineError::Io`] if the file
/// cannot be written or renamed.
pub fn write_csv_atomic<T: Serialize + CsvColumns>(
    path: &Path,
    rows: &[T],
) -> Result<(), PipelineError> {
    let tmp = tmp_path(path);

    {
        let mut writer = csv::Writer::from_path(&tmp).map_err(|e| csv_error(&tmp, e))?;
        if rows.is_empty() {
            writer
                .write_record(T::COLUMNS)
                .map_err(|e| csv_error(&tmp, e))?;
        }
        for row in rows {
            writer.serialize(row).map_err(|e| csv_error(&tmp, e))?;
        }
        writer.flush().map_err(|e| io_error(&tmp, e))?;
    }

    std::fs::rename(&tmp, path).map_err(|e| io_error(path, e))?;
    log::debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Reads a CSV written by [`write_csv_atomic`].
///
/// # Errors
///
/// Returns [`PipelineError::Csv`] if the file cannot be read or a row
/// does not deserialize.
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PipelineError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| csv_error(path, e))
}

/// Writes the run summary as pretty JSON, atomically.
///
/// # Errors
///
/// Returns [`PipelineError::Json`] or [`PipelineError::Io`] on failure.
pub fn write_summary(dir: &Path, summary: &RunSummary) -> Result<PathBuf, PipelineError> {
    let path = dir.join(RUN_SUMMARY_FILE);
    let tmp = tmp_path(&path);
    let mut contents = serde_json::to_string_pretty(summary)?;
    contents.push('\n');
    std::fs::write(&tmp, contents).map_err(|e| io_error(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))?;
    log::info!("Saved run summary to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use wildfire_aqi_observation_models::{FireConfidence, PointObservation, WildfireEvent};

    use super::*;

    #[test]
    fn slugs_parameter_names() {
        assert_eq!(parameter_slug("PM2.5"), "pm25");
        assert_eq!(parameter_slug("OZONE"), "ozone");
        assert_eq!(pollutant_file("PM2.5", 2020, 2023), "pm25_aqi_2020_2023.csv");
    }

    #[test]
    fn tmp_path_is_a_sibling() {
        assert_eq!(
            tmp_path(Path::new("out/aqi_enriched_2023.csv")),
            PathBuf::from("out/aqi_enriched_2023.csv.tmp")
        );
    }

    fn fire(row: usize, lat: Option<f64>, day: u32) -> ProcessedWildfire {
        ProcessedWildfire::from_event(WildfireEvent {
            row,
            latitude: lat,
            longitude: lat.map(|_| -105.0),
            date: NaiveDate::from_ymd_opt(2023, 7, day).unwrap(),
            radiative_power: Some(1.5),
            confidence: FireConfidence::High,
            detection_type: None,
        })
    }

    #[test]
    fn wildfire_order_is_date_then_position() {
        let mut rows = vec![
            fire(1, Some(40.5), 16),
            fire(2, Some(40.5), 15),
            fire(3, None, 15),
            fire(4, Some(39.0), 15),
        ];
        sort_wildfires(&mut rows);
        assert_eq!(rows.iter().map(|r| r.row).collect::<Vec<_>>(), vec![3, 4, 2, 1]);
    }

    #[test]
    fn csv_round_trip_keeps_missing_fields_empty() {
        let dir = std::env::temp_dir().join("wildfire_aqi_pipeline_output_csv");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(wildfire_partition_file(2023));

        let rows = vec![fire(1, Some(40.5), 15), fire(2, None, 15)];
        write_csv_atomic(&path, &rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("latitude,longitude,date,year,month,season,frp,confidence,detection_type,region")
        );
        assert_eq!(
            lines.next(),
            Some("40.5,-105.0,2023-07-15,2023,7,Summer,1.5,high,,")
        );
        assert_eq!(lines.next(), Some(",,2023-07-15,2023,7,Summer,1.5,high,,"));
        assert!(!tmp_path(&path).exists());

        let back: Vec<ProcessedWildfire> = read_csv(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].latitude, Some(40.5));
        assert_eq!(back[1].latitude, None);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn declared_columns_match_serialized_header() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(fire(1, Some(40.5), 15)).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(
            text.lines().next(),
            Some(ProcessedWildfire::COLUMNS.join(",").as_str())
        );

        let observation = EnrichedObservation::from_observation(PointObservation {
            row: 1,
            station_id: "Boulder".to_string(),
            latitude: Some(40.0),
            longitude: Some(-105.2),
            date: NaiveDate::from_ymd_opt(2023, 7, 15).unwrap(),
            parameter: "PM2.5".to_string(),
            value: Some(120.0),
        });
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&observation).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(
            text.lines().next(),
            Some(EnrichedObservation::COLUMNS.join(",").as_str())
        );
    }

    #[test]
    fn empty_tables_still_get_a_header() {
        let dir = std::env::temp_dir().join("wildfire_aqi_pipeline_output_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(aqi_partition_file(2023));

        let rows: Vec<&EnrichedObservation> = Vec::new();
        write_csv_atomic(&path, &rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, format!("{}\n", EnrichedObservation::COLUMNS.join(",")));

        let back: Vec<EnrichedObservation> = read_csv(&path).unwrap();
        assert!(back.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }
}
