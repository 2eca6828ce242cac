//! Wildfire detection confidence.
//!
//! VIIRS exports report confidence as a letter (`l`, `n`, `h`) while MODIS
//! exports report a 0-100 percentage. Both are folded into
//! [`FireConfidence`] at ingestion so downstream stages only ever see one
//! representation.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// MODIS percentages at or below this are [`FireConfidence::Low`].
pub const MODIS_LOW_MAX: f64 = 30.0;

/// MODIS percentages at or below this (and above [`MODIS_LOW_MAX`]) are
/// [`FireConfidence::Nominal`].
pub const MODIS_NOMINAL_MAX: f64 = 80.0;

/// Normalized detection confidence.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FireConfidence {
    /// Low confidence detection.
    Low,
    /// Nominal confidence (MODIS "medium").
    Nominal,
    /// High confidence detection.
    High,
    /// Missing or unrecognized confidence value.
    Unknown,
}

impl FireConfidence {
    /// Normalizes a raw confidence field from either sensor family.
    ///
    /// Letters and words are matched case-insensitively; numbers are
    /// bucketed with the MODIS thresholds.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "l" | "low" => return Self::Low,
            "n" | "nominal" | "m" | "medium" => return Self::Nominal,
            "h" | "high" => return Self::High,
            _ => {}
        }

        trimmed
            .parse::<f64>()
            .ok()
            .map_or(Self::Unknown, Self::from_percentage)
    }

    /// Buckets a MODIS percentage.
    #[must_use]
    pub fn from_percentage(value: f64) -> Self {
        if value.is_nan() || !(0.0..=100.0).contains(&value) {
            Self::Unknown
        } else if value <= MODIS_LOW_MAX {
            Self::Low
        } else if value <= MODIS_NOMINAL_MAX {
            Self::Nominal
        } else {
            Self::High
        }
    }
}
