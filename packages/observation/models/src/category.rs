//! EPA air quality index severity bands.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Severity band for an air quality index value, ordered from cleanest to
/// most hazardous. [`AqiCategory::Unknown`] covers missing values and
/// anything above the top of the scale.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum AqiCategory {
    /// 0-50
    #[serde(rename = "Good")]
    #[strum(serialize = "Good")]
    Good,
    /// 51-100
    #[serde(rename = "Moderate")]
    #[strum(serialize = "Moderate")]
    Moderate,
    /// 101-150
    #[serde(rename = "Unhealthy for Sensitive Groups")]
    #[strum(serialize = "Unhealthy for Sensitive Groups")]
    UnhealthyForSensitiveGroups,
    /// 151-200
    #[serde(rename = "Unhealthy")]
    #[strum(serialize = "Unhealthy")]
    Unhealthy,
    /// 201-300
    #[serde(rename = "Very Unhealthy")]
    #[strum(serialize = "Very Unhealthy")]
    VeryUnhealthy,
    /// 301-500
    #[serde(rename = "Hazardous")]
    #[strum(serialize = "Hazardous")]
    Hazardous,
    /// Missing, NaN, or above 500.
    #[serde(rename = "Unknown")]
    #[strum(serialize = "Unknown")]
    Unknown,
}

/// Inclusive upper bound of each known band, in ascending order.
const BREAKPOINTS: &[(f64, AqiCategory)] = &[
    (50.0, AqiCategory::Good),
    (100.0, AqiCategory::Moderate),
    (150.0, AqiCategory::UnhealthyForSensitiveGroups),
    (200.0, AqiCategory::Unhealthy),
    (300.0, AqiCategory::VeryUnhealthy),
    (500.0, AqiCategory::Hazardous),
];

impl AqiCategory {
    /// Returns all variants of this enum, in severity order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Good,
            Self::Moderate,
            Self::UnhealthyForSensitiveGroups,
            Self::Unhealthy,
            Self::VeryUnhealthy,
            Self::Hazardous,
            Self::Unknown,
        ]
    }
}

/// Maps an index value to its severity band.
///
/// Total over every `f64` plus the missing marker: `None`, NaN, and values
/// above 500 are [`AqiCategory::Unknown`]. Negative values fall in
/// [`AqiCategory::Good`].
#[must_use]
pub fn classify(value: Option<f64>) -> AqiCategory {
    let Some(value) = value.filter(|v| !v.is_nan()) else {
        return AqiCategory::Unknown;
    };

    BREAKPOINTS
        .iter()
        .find(|(bound, _)| value <= *bound)
        .map_or(AqiCategory::Unknown, |(_, category)| *category)
}
