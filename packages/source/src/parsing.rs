//! Shared field parsing for the source readers.

/// Outcome of parsing a numeric field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberField {
    /// Empty, `NaN`, or the invalid sentinel.
    Missing,
    /// A usable number.
    Value(f64),
    /// Present but not a number.
    Invalid,
}

impl NumberField {
    /// The value, if usable.
    #[must_use]
    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Missing | Self::Invalid => None,
        }
    }
}

/// Parses a numeric field, treating the sentinel and blank/`NaN`
/// placeholders as missing.
#[must_use]
pub fn parse_number(raw: &str, sentinel: f64) -> NumberField {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("na") {
        return NumberField::Missing;
    }
    match s.parse::<f64>() {
        #[allow(clippy::float_cmp)]
        Ok(v) if v.is_nan() || v == sentinel => NumberField::Missing,
        Ok(v) if v.is_finite() => NumberField::Value(v),
        Ok(_) | Err(_) => NumberField::Invalid,
    }
}

/// Parses a latitude/longitude pair. Returns `None` unless both are
/// present, finite, and within ±90/±180.
#[must_use]
pub fn parse_lat_lng(lat: &str, lng: &str, sentinel: f64) -> Option<(f64, f64)> {
    let latitude = parse_number(lat, sentinel).value()?;
    let longitude = parse_number(lng, sentinel).value()?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }
    Some((latitude, longitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_and_blanks_are_missing() {
        assert_eq!(parse_number("-999", -999.0), NumberField::Missing);
        assert_eq!(parse_number("-999.0", -999.0), NumberField::Missing);
        assert_eq!(parse_number(" ", -999.0), NumberField::Missing);
        assert_eq!(parse_number("NaN", -999.0), NumberField::Missing);
    }

    #[test]
    fn numbers_parse_and_garbage_is_invalid() {
        assert_eq!(parse_number(" 42.5 ", -999.0), NumberField::Value(42.5));
        assert_eq!(parse_number("-12", -999.0), NumberField::Value(-12.0));
        assert_eq!(parse_number("high", -999.0), NumberField::Invalid);
        assert_eq!(parse_number("inf", -999.0), NumberField::Invalid);
    }

    #[test]
    fn parses_lat_lng_strings() {
        let (la, lo) = parse_lat_lng("39.7392", "-104.9903", -999.0).unwrap();
        assert!((la - 39.7392).abs() < f64::EPSILON);
        assert!((lo - -104.9903).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_out_of_range_and_sentinel_lat_lng() {
        assert!(parse_lat_lng("139.7", "-104.9", -999.0).is_none());
        assert!(parse_lat_lng("39.7", "-999", -999.0).is_none());
        assert!(parse_lat_lng("", "-104.9", -999.0).is_none());
    }
}
