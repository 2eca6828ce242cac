//! Trailing rolling means over per-group time series.
//!
//! The window counts observations, not days: with a window of 7 the value
//! at a record is the mean of that record and the six records before it in
//! the same group, whatever dates they fall on.

use std::{collections::HashMap, hash::Hash, num::NonZeroUsize};

use chrono::NaiveDate;
use wildfire_aqi_observation_models::{Dataset, Diagnostics, RecordQualityError};

/// One input point of a grouped time series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint<K> {
    /// 1-based source row, used when reporting quality issues.
    pub row: usize,
    /// Group key; `None` means the record belongs to no group.
    pub group: Option<K>,
    /// Observation date, or the raw text that could not be parsed.
    pub date: Result<NaiveDate, String>,
    /// Observed value; `None` when missing.
    pub value: Option<f64>,
}

/// The rolling mean computed for one input point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingValue {
    /// Position of the point in the input slice.
    pub index: usize,
    /// Mean of the present values in the trailing window, `None` when the
    /// window holds no present value or the point has no group.
    pub value: Option<f64>,
}

/// Computes the trailing rolling mean of each point within its group.
///
/// Points are ordered by date within each group with a stable sort, so
/// same-day points keep their input order. Every point with a date
/// produces exactly one [`RollingValue`], returned in input order. Points
/// without a date are left out and reported against `dataset` as
/// [`RecordQualityError::InvalidDate`].
#[must_use]
pub fn rolling_average<K: Eq + Hash>(
    series: &[SeriesPoint<K>],
    window: NonZeroUsize,
    dataset: Dataset,
    diagnostics: &dyn Diagnostics,
) -> Vec<RollingValue> {
    let mut results: Vec<Option<RollingValue>> = vec![None; series.len()];
    let mut groups: HashMap<&K, Vec<(NaiveDate, usize)>> = HashMap::new();

    for (index, point) in series.iter().enumerate() {
        let date = match &point.date {
            Ok(date) => *date,
            Err(raw) => {
                diagnostics.record_issue(
                    dataset,
                    &RecordQualityError::InvalidDate {
                        row: point.row,
                        raw: raw.clone(),
                    },
                );
                continue;
            }
        };

        match &point.group {
            Some(key) => groups.entry(key).or_default().push((date, index)),
            None => results[index] = Some(RollingValue { index, value: None }),
        }
    }

    for members in groups.values_mut() {
        members.sort_by_key(|(date, _)| *date);

        for end in 0..members.len() {
            let start = (end + 1).saturating_sub(window.get());
            let (sum, count) = members[start..=end]
                .iter()
                .filter_map(|(_, index)| series[*index].value)
                .fold((0.0, 0_u32), |(sum, count), v| (sum + v, count + 1));

            let index = members[end].1;
            results[index] = Some(RollingValue {
                index,
                value: (count > 0).then(|| sum / f64::from(count)),
            });
        }
    }

    results.into_iter().flatten().collect()
}
