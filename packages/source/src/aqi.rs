//! Air-quality station readings.

use std::path::Path;

use wildfire_aqi_observation_models::{
    Dataset, Diagnostics, PointObservation, RecordQualityError, parse_date,
};

use crate::{
    IssueReporter, LoadedTable, ReadOptions, SourceError, open_table,
    parsing::{NumberField, parse_lat_lng, parse_number},
    schema::AIR_QUALITY_COLUMNS,
};

/// Reads an air-quality CSV.
///
/// Rows with an unparseable date are dropped. Rows with an invalid
/// coordinate are kept with both coordinate halves cleared. Unparseable
/// index values are cleared. Each case is reported to `diagnostics`.
///
/// # Errors
///
/// * [`SourceError::DataSource`] if the file cannot be opened
/// * [`SourceError::Csv`] if the header cannot be read
/// * [`SourceError::Schema`] if required columns are missing
pub fn read_air_quality(
    path: &Path,
    options: &ReadOptions,
    diagnostics: &dyn Diagnostics,
) -> Result<LoadedTable<PointObservation>, SourceError> {
    let (mut reader, columns) = open_table(path, AIR_QUALITY_COLUMNS)?;
    let mut reporter = IssueReporter::new(Dataset::AirQuality, diagnostics);
    let mut records = Vec::new();
    let mut rows_read = 0;

    for (i, result) in reader.records().enumerate() {
        let row = i + 1;
        rows_read += 1;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                reporter.report(&RecordQualityError::MalformedRow {
                    row,
                    message: e.to_string(),
                });
                continue;
            }
        };

        let raw_date = columns.field(&record, "date");
        let Some(date) = parse_date(raw_date) else {
            reporter.report(&RecordQualityError::InvalidDate {
                row,
                raw: raw_date.to_string(),
            });
            continue;
        };

        let raw_lat = columns.field(&record, "latitude");
        let raw_lng = columns.field(&record, "longitude");
        let coordinate = parse_lat_lng(raw_lat, raw_lng, options.invalid_sentinel);
        if coordinate.is_none() {
            reporter.report(&RecordQualityError::InvalidCoordinate {
                row,
                latitude: raw_lat.to_string(),
                longitude: raw_lng.to_string(),
            });
        }

        let raw_value = columns.field(&record, "value");
        let value = match parse_number(raw_value, options.invalid_sentinel) {
            NumberField::Value(v) => Some(v),
            NumberField::Missing => None,
            NumberField::Invalid => {
                reporter.report(&RecordQualityError::InvalidValue {
                    row,
                    column: "value".to_string(),
                    raw: raw_value.to_string(),
                });
                None
            }
        };

        records.push(PointObservation {
            row,
            station_id: columns.field(&record, "station_id").to_string(),
            latitude: coordinate.map(|(lat, _)| lat),
            longitude: coordinate.map(|(_, lng)| lng),
            date,
            parameter: columns.field(&record, "parameter").to_string(),
            value,
        });
    }

    log::debug!(
        "Read {} of {rows_read} air-quality rows from {}",
        records.len(),
        path.display()
    );

    Ok(LoadedTable {
        records,
        rows_read,
        exclusions: reporter.counts,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::NaiveDate;
    use wildfire_aqi_observation_models::CollectingDiagnostics;

    use super::*;

    fn fixture(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("wildfire_aqi_source_aqi");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reads_airnow_export() {
        let path = fixture(
            "airnow.csv",
            "Latitude,Longitude,UTC,Parameter,Unit,AQI,SiteName\n\
             40.0,-105.2,2023-07-15T10:00,PM2.5,UG/M3,120,Boulder\n\
             39.75,-104.99,2023-07-15T11:00,OZONE,PPB,-999,Denver\n",
        );

        let diagnostics = CollectingDiagnostics::new();
        let table = read_air_quality(&path, &ReadOptions::default(), &diagnostics).unwrap();

        assert_eq!(table.rows_read, 2);
        assert_eq!(table.records.len(), 2);
        assert!(diagnostics.is_empty());

        let first = &table.records[0];
        assert_eq!(first.row, 1);
        assert_eq!(first.station_id, "Boulder");
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2023, 7, 15).unwrap());
        assert_eq!(first.parameter, "PM2.5");
        assert_eq!(first.value, Some(120.0));

        // sentinel becomes missing without a report
        assert_eq!(table.records[1].value, None);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn drops_bad_dates_and_keeps_bad_coordinates() {
        let path = fixture(
            "dirty.csv",
            "station_id,latitude,longitude,date,parameter,value\n\
             A,40.0,-105.2,someday,PM2.5,10\n\
             B,-999,-105.2,2023-07-15,PM2.5,20\n\
             C,40.0,-105.2,2023-07-15,PM2.5,lots\n",
        );

        let diagnostics = CollectingDiagnostics::new();
        let table = read_air_quality(&path, &ReadOptions::default(), &diagnostics).unwrap();

        assert_eq!(table.rows_read, 3);
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.exclusions.invalid_date, 1);
        assert_eq!(table.exclusions.invalid_coordinate, 1);
        assert_eq!(table.exclusions.invalid_value, 1);

        let b = &table.records[0];
        assert_eq!(b.station_id, "B");
        assert_eq!(b.latitude, None);
        assert_eq!(b.longitude, None);
        assert_eq!(b.value, Some(20.0));

        assert_eq!(table.records[1].value, None);
        assert_eq!(diagnostics.len(), 3);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_columns_fail_the_table() {
        let path = fixture("narrow.csv", "station_id,date,value\nA,2023-07-15,10\n");
        let err = read_air_quality(&path, &ReadOptions::default(), &CollectingDiagnostics::new())
            .unwrap_err();
        match err {
            SourceError::Schema(crate::SchemaError::MissingColumns { missing, .. }) => {
                assert_eq!(missing, vec!["latitude", "longitude", "parameter"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_a_data_source_error() {
        let path = std::env::temp_dir().join("wildfire_aqi_source_aqi/does_not_exist.csv");
        assert!(matches!(
            read_air_quality(&path, &ReadOptions::default(), &CollectingDiagnostics::new()),
            Err(SourceError::DataSource { .. })
        ));
    }
}
