//! Column contracts and header validation.
//!
//! Headers are matched case-insensitively after trimming whitespace (and a
//! leading byte-order mark). Each canonical column accepts the spellings
//! used by the upstream collectors.

use std::fmt::Write as _;

use csv::StringRecord;

/// One canonical column of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Canonical name.
    pub name: &'static str,
    /// Accepted header spellings, canonical name first.
    pub aliases: &'static [&'static str],
    /// Whether the table is unusable without this column.
    pub required: bool,
}

/// Air-quality station readings.
pub const AIR_QUALITY_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        name: "station_id",
        aliases: &["station_id", "sitename", "site_name", "fullaqscode", "stationid"],
        required: true,
    },
    ColumnSpec {
        name: "latitude",
        aliases: &["latitude", "lat"],
        required: true,
    },
    ColumnSpec {
        name: "longitude",
        aliases: &["longitude", "lon", "lng"],
        required: true,
    },
    ColumnSpec {
        name: "date",
        aliases: &["date", "utc", "date_local"],
        required: true,
    },
    ColumnSpec {
        name: "parameter",
        aliases: &["parameter", "parameter_name"],
        required: true,
    },
    ColumnSpec {
        name: "value",
        aliases: &["value", "aqi"],
        required: true,
    },
];

/// Satellite wildfire detections.
pub const WILDFIRE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        name: "latitude",
        aliases: &["latitude", "lat"],
        required: true,
    },
    ColumnSpec {
        name: "longitude",
        aliases: &["longitude", "lon", "lng"],
        required: true,
    },
    ColumnSpec {
        name: "date",
        aliases: &["date", "acq_date"],
        required: true,
    },
    ColumnSpec {
        name: "frp",
        aliases: &["frp"],
        required: true,
    },
    ColumnSpec {
        name: "confidence",
        aliases: &["confidence"],
        required: true,
    },
    ColumnSpec {
        name: "type",
        aliases: &["type", "detection_type"],
        required: false,
    },
];

/// A required column is absent from a table header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Every missing required column, in contract order.
    #[error("{table} is missing required columns: {}", .missing.join(", "))]
    MissingColumns {
        /// Table description (usually its path).
        table: String,
        /// Canonical names of the missing columns.
        missing: Vec<String>,
    },
}

/// Header positions of each canonical column, resolved once per table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    positions: Vec<(&'static str, usize)>,
}

impl ColumnMap {
    /// Position of a canonical column, if present.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, i)| *i)
    }

    /// The trimmed field of `record` for a canonical column, or `""` when
    /// the column or field is absent.
    #[must_use]
    pub fn field<'r>(&self, record: &'r StringRecord, name: &str) -> &'r str {
        self.position(name)
            .and_then(|i| record.get(i))
            .map_or("", str::trim)
    }
}

fn normalize_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_ascii_lowercase()
}

/// Validates a header against a column contract.
///
/// # Errors
///
/// Returns [`SchemaError::MissingColumns`] listing every required column
/// that has no matching header.
pub fn validate_header(
    table: &str,
    header: &StringRecord,
    contract: &[ColumnSpec],
) -> Result<ColumnMap, SchemaError> {
    let normalized: Vec<String> = header.iter().map(normalize_header).collect();

    let mut positions = Vec::with_capacity(contract.len());
    let mut missing = Vec::new();

    for spec in contract {
        let found = spec
            .aliases
            .iter()
            .find_map(|alias| normalized.iter().position(|h| h == alias));

        match found {
            Some(i) => positions.push((spec.name, i)),
            None if spec.required => missing.push(spec.name.to_string()),
            None => {}
        }
    }

    if !missing.is_empty() {
        return Err(SchemaError::MissingColumns {
            table: table.to_string(),
            missing,
        });
    }

    let mut described = String::new();
    for (name, i) in &positions {
        let _ = write!(described, " {name}={}", header.get(*i).unwrap_or_default());
    }
    log::debug!("{table}: resolved columns{described}");

    Ok(ColumnMap { positions })
}
