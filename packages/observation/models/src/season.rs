//! Meteorological seasons.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Northern-hemisphere meteorological season.
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
pub enum Season {
    /// December, January, February
    Winter,
    /// March, April, May
    Spring,
    /// June, July, August
    Summer,
    /// September, October, November
    Fall,
}

impl Season {
    /// Maps a calendar month (1-12) to its season. Out-of-range months
    /// return `None`.
    #[must_use]
    pub const fn from_month(month: u32) -> Option<Self> {
        match month {
            12 | 1 | 2 => Some(Self::Winter),
            3..=5 => Some(Self::Spring),
            6..=8 => Some(Self::Summer),
            9..=11 => Some(Self::Fall),
            _ => None,
        }
    }

    /// Season of a calendar date.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        // NaiveDate months are always 1-12
        Self::from_month(date.month()).unwrap_or(Self::Winter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn december_belongs_to_winter() {
        assert_eq!(Season::from_month(12), Some(Season::Winter));
        assert_eq!(Season::from_month(2), Some(Season::Winter));
        assert_eq!(Season::from_month(3), Some(Season::Spring));
        assert_eq!(Season::from_month(8), Some(Season::Summer));
        assert_eq!(Season::from_month(11), Some(Season::Fall));
    }

    #[test]
    fn rejects_invalid_months() {
        assert_eq!(Season::from_month(0), None);
        assert_eq!(Season::from_month(13), None);
    }

    #[test]
    fn season_of_date() {
        let date = NaiveDate::from_ymd_opt(2023, 7, 15).unwrap();
        assert_eq!(Season::from_date(date), Season::Summer);
        assert_eq!(Season::from_date(date).to_string(), "Summer");
    }
}
