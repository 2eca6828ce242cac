//! Wildfire co-occurrence and proximity flags for air-quality rows.
//!
//! Co-occurrence is an exact `(region, date)` match. Proximity is purely
//! spatial: a row is flagged when any detection lies within the radius,
//! whatever its date. Callers wanting a spatio-temporal radius test
//! combine the two flags themselves.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use wildfire_aqi_observation_models::{EnrichedObservation, ProcessedWildfire};
use wildfire_aqi_spatial::ProximityIndex;

use crate::AnalyticsError;

/// How many rows received each flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelationCounts {
    /// Rows with a wildfire in the same region on the same date.
    pub in_region: usize,
    /// Rows with a wildfire within the radius.
    pub within_distance: usize,
}

/// Pre-indexed wildfire detections, reusable across many air-quality
/// partitions.
pub struct WildfireCorrelator {
    region_days: HashMap<String, HashSet<NaiveDate>>,
    proximity: ProximityIndex,
}

impl WildfireCorrelator {
    /// Indexes detections by `(region, date)` and by projected location.
    /// Detections without a region or a valid coordinate only take part in
    /// the test they have data for.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Spatial`] if `distance_km` is not a
    /// positive finite number or the detections cannot be projected.
    pub fn new(wildfires: &[ProcessedWildfire], distance_km: f64) -> Result<Self, AnalyticsError> {
        let mut region_days: HashMap<String, HashSet<NaiveDate>> = HashMap::new();
        for fire in wildfires {
            if let Some(region) = &fire.region {
                region_days
                    .entry(region.clone())
                    .or_default()
                    .insert(fire.date);
            }
        }

        let coordinates: Vec<_> = wildfires
            .iter()
            .filter_map(ProcessedWildfire::coordinate)
            .collect();
        let proximity = ProximityIndex::new(&coordinates, distance_km)?;

        Ok(Self {
            region_days,
            proximity,
        })
    }

    /// Sets both wildfire flags on every row.
    ///
    /// Rows with an invalid coordinate get `false` for both flags; rows
    /// without a region get `false` for co-occurrence.
    pub fn apply(&self, records: &mut [EnrichedObservation]) -> CorrelationCounts {
        let mut counts = CorrelationCounts::default();

        for record in records.iter_mut() {
            let coordinate = record.coordinate();

            record.wildfire_in_region = coordinate.is_some()
                && record
                    .region
                    .as_deref()
                    .and_then(|region| self.region_days.get(region))
                    .is_some_and(|days| days.contains(&record.date));

            record.wildfire_within_distance = coordinate.is_some_and(|c| {
                self.proximity.is_within(c).unwrap_or_else(|e| {
                    log::warn!("Station {} excluded from proximity test: {e}", record.station_id);
                    false
                })
            });

            counts.in_region += usize::from(record.wildfire_in_region);
            counts.within_distance += usize::from(record.wildfire_within_distance);
        }

        counts
    }
}

/// Adds the co-occurrence and proximity flags to `records` in place.
///
/// # Errors
///
/// Returns [`AnalyticsError::Spatial`] if the proximity index cannot be
/// built.
pub fn correlate(
    records: &mut [EnrichedObservation],
    wildfires: &[ProcessedWildfire],
    distance_km: f64,
) -> Result<CorrelationCounts, AnalyticsError> {
    Ok(WildfireCorrelator::new(wildfires, distance_km)?.apply(records))
}
