//! Satellite wildfire detections (FIRMS MODIS/VIIRS exports).

use std::path::Path;

use wildfire_aqi_observation_models::{
    Dataset, Diagnostics, FireConfidence, RecordQualityError, WildfireEvent, parse_date,
};

use crate::{
    IssueReporter, LoadedTable, ReadOptions, SourceError, open_table,
    parsing::{NumberField, parse_lat_lng, parse_number},
    schema::WILDFIRE_COLUMNS,
};

/// Reads a wildfire detection CSV.
///
/// Confidence is normalized to [`FireConfidence`] here, whichever sensor
/// family produced the file. Rows with an unparseable date are dropped;
/// invalid coordinates, negative or unparseable radiative power, and
/// unrecognized confidence or type values are cleared and reported.
///
/// # Errors
///
/// * [`SourceError::DataSource`] if the file cannot be opened
/// * [`SourceError::Csv`] if the header cannot be read
/// * [`SourceError::Schema`] if required columns are missing
pub fn read_wildfires(
    path: &Path,
    options: &ReadOptions,
    diagnostics: &dyn Diagnostics,
) -> Result<LoadedTable<WildfireEvent>, SourceError> {
    let (mut reader, columns) = open_table(path, WILDFIRE_COLUMNS)?;
    let mut reporter = IssueReporter::new(Dataset::Wildfire, diagnostics);
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

        let raw_frp = columns.field(&record, "frp");
        let radiative_power = match parse_number(raw_frp, options.invalid_sentinel) {
            NumberField::Value(v) if v >= 0.0 => Some(v),
            NumberField::Missing => None,
            NumberField::Value(_) | NumberField::Invalid => {
                reporter.report(&invalid_value(row, "frp", raw_frp));
                None
            }
        };

        let raw_confidence = columns.field(&record, "confidence");
        let confidence = FireConfidence::normalize(raw_confidence);
        if confidence == FireConfidence::Unknown
            && parse_number(raw_confidence, options.invalid_sentinel) != NumberField::Missing
        {
            reporter.report(&invalid_value(row, "confidence", raw_confidence));
        }

        let raw_type = columns.field(&record, "type");
        let detection_type = if raw_type.is_empty() {
            None
        } else if let Ok(t) = raw_type.parse::<u8>() {
            Some(t)
        } else {
            reporter.report(&invalid_value(row, "type", raw_type));
            None
        };

        records.push(WildfireEvent {
            row,
            latitude: coordinate.map(|(lat, _)| lat),
            longitude: coordinate.map(|(_, lng)| lng),
            date,
            radiative_power,
            confidence,
            detection_type,
        });
    }

    log::debug!(
        "Read {} of {rows_read} wildfire rows from {}",
        records.len(),
        path.display()
    );

    Ok(LoadedTable {
        records,
        rows_read,
        exclusions: reporter.counts,
    })
}

fn invalid_value(row: usize, column: &str, raw: &str) -> RecordQualityError {
    RecordQualityError::InvalidValue {
        row,
        column: column.to_string(),
        raw: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use wildfire_aqi_observation_models::CollectingDiagnostics;

    use super::*;

    fn fixture(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("wildfire_aqi_source_wildfire");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reads_viirs_export() {
        let path = fixture(
            "viirs.csv",
            "latitude,longitude,bright_ti4,scan,track,acq_date,acq_time,satellite,\
             instrument,confidence,version,bright_ti5,frp,daynight,type\n\
             40.01,-105.21,330.5,0.4,0.4,2023-07-15,1942,N,VIIRS,n,2.0NRT,290.1,10.0,D,0\n\
             39.50,-106.10,340.2,0.4,0.4,2023-07-16,0912,N,VIIRS,h,2.0NRT,295.0,22.5,N,2\n",
        );

        let diagnostics = CollectingDiagnostics::new();
        let table = read_wildfires(&path, &ReadOptions::default(), &diagnostics).unwrap();

        assert!(diagnostics.is_empty());
        assert_eq!(table.records.len(), 2);

        let first = &table.records[0];
        assert_eq!(first.latitude, Some(40.01));
        assert_eq!(first.radiative_power, Some(10.0));
        assert_eq!(first.confidence, FireConfidence::Nominal);
        assert_eq!(first.detection_type, Some(0));
        assert_eq!(table.records[1].confidence, FireConfidence::High);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn normalizes_modis_percentages_without_type_column() {
        let path = fixture(
            "modis.csv",
            "latitude,longitude,acq_date,confidence,frp\n\
             40.0,-105.0,2023-07-15,25,3.1\n\
             40.0,-105.0,2023-07-15,95,3.1\n",
        );

        let table =
            read_wildfires(&path, &ReadOptions::default(), &CollectingDiagnostics::new()).unwrap();
        assert_eq!(table.records[0].confidence, FireConfidence::Low);
        assert_eq!(table.records[1].confidence, FireConfidence::High);
        assert_eq!(table.records[0].detection_type, None);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn clears_and_reports_bad_fields() {
        let path = fixture(
            "dirty.csv",
            "latitude,longitude,acq_date,confidence,frp,type\n\
             40.0,-105.0,2023-07-15,maybe,-4,x\n\
             40.0,-105.0,,n,1.0,0\n",
        );

        let diagnostics = CollectingDiagnostics::new();
        let table = read_wildfires(&path, &ReadOptions::default(), &diagnostics).unwrap();

        assert_eq!(table.rows_read, 2);
        assert_eq!(table.records.len(), 1);
        let fire = &table.records[0];
        assert_eq!(fire.radiative_power, None);
        assert_eq!(fire.confidence, FireConfidence::Unknown);
        assert_eq!(fire.detection_type, None);

        assert_eq!(table.exclusions.invalid_value, 3);
        assert_eq!(table.exclusions.invalid_date, 1);
        assert_eq!(diagnostics.len(), 4);

        std::fs::remove_file(&path).ok();
    }
}
