//! Coordinate reference systems and reprojection.
//!
//! Only the handful of systems that show up in county boundary releases
//! and satellite/station exports are supported. Everything is resolved to
//! a PROJ.4 definition and transformed with `proj4rs`.

use std::sync::LazyLock;

use geo::{Coord, MapCoords, MultiPolygon};
use proj4rs::{proj::Proj, transform::transform};
use regex::Regex;

use crate::SpatialError;

/// `AUTHORITY["EPSG","4269"]` (WKT1) or `ID["EPSG",4269]` (WKT2).
static EPSG_AUTHORITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:AUTHORITY|ID)\["EPSG", *"?([0-9]+)"?\]"#).expect("valid regex")
});

/// A supported coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Crs {
    /// EPSG:4326, WGS84 longitude/latitude.
    Wgs84,
    /// EPSG:4269, NAD83 longitude/latitude (TIGER/Line default).
    Nad83,
    /// EPSG:3857, spherical web mercator.
    WebMercator,
    /// EPSG:269zz, NAD83 UTM zone `zz` north.
    Nad83Utm(u8),
    /// EPSG:326zz, WGS84 UTM zone `zz` north.
    Wgs84Utm(u8),
}

impl Crs {
    /// Resolves an EPSG code.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::UnsupportedCrs`] for codes outside the
    /// supported set.
    pub fn from_epsg(code: u32) -> Result<Self, SpatialError> {
        match code {
            4326 => Ok(Self::Wgs84),
            4269 => Ok(Self::Nad83),
            3857 | 900_913 => Ok(Self::WebMercator),
            26901..=26923 => Ok(Self::Nad83Utm(utm_zone(code - 26900))),
            32601..=32660 => Ok(Self::Wgs84Utm(utm_zone(code - 32600))),
            _ => Err(SpatialError::UnsupportedCrs(format!("EPSG:{code}"))),
        }
    }

    /// EPSG code of this system.
    #[must_use]
    pub fn epsg(self) -> u32 {
        match self {
            Self::Wgs84 => 4326,
            Self::Nad83 => 4269,
            Self::WebMercator => 3857,
            Self::Nad83Utm(zone) => 26900 + u32::from(zone),
            Self::Wgs84Utm(zone) => 32600 + u32::from(zone),
        }
    }

    /// Returns `true` for longitude/latitude systems.
    #[must_use]
    pub const fn is_geographic(self) -> bool {
        matches!(self, Self::Wgs84 | Self::Nad83)
    }

    /// PROJ.4 definition of this system.
    #[must_use]
    pub fn proj_string(self) -> String {
        match self {
            Self::Wgs84 => "+proj=longlat +datum=WGS84 +no_defs +type=crs".to_string(),
            Self::Nad83 => "+proj=longlat +datum=NAD83 +no_defs +type=crs".to_string(),
            Self::WebMercator => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 \
                                  +x_0=0 +y_0=0 +k=1 +units=m +no_defs +type=crs"
                .to_string(),
            Self::Nad83Utm(zone) => {
                format!("+proj=utm +zone={zone} +datum=NAD83 +units=m +no_defs +type=crs")
            }
            Self::Wgs84Utm(zone) => {
                format!("+proj=utm +zone={zone} +datum=WGS84 +units=m +no_defs +type=crs")
            }
        }
    }

    /// Detects the system declared by a WKT string (a Shapefile `.prj`
    /// sidecar or a WKT2 definition).
    ///
    /// The outermost `AUTHORITY`/`ID` EPSG code wins when present; ESRI
    /// flavoured WKT without authority codes is matched by datum and
    /// projection names. Returns `Ok(None)` when nothing recognizable is
    /// declared.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::UnsupportedCrs`] when the WKT names an EPSG
    /// code or projection outside the supported set.
    pub fn from_wkt(wkt: &str) -> Result<Option<Self>, SpatialError> {
        // In WKT the outer node's authority is written last.
        if let Some(code) = EPSG_AUTHORITY_RE
            .captures_iter(wkt)
            .last()
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        {
            return Self::from_epsg(code).map(Some);
        }

        let upper = wkt.to_ascii_uppercase();
        let nad83 = upper.contains("NORTH_AMERICAN_1983")
            || upper.contains("NORTH AMERICAN DATUM 1983")
            || upper.contains("NAD83")
            || upper.contains("NAD_1983");

        if upper.starts_with("PROJCS") || upper.starts_with("PROJCRS") {
            if upper.contains("AUXILIARY_SPHERE")
                || upper.contains("PSEUDO-MERCATOR")
                || upper.contains("POPULAR VISUALISATION")
            {
                return Ok(Some(Self::WebMercator));
            }
            if let Some(zone) = parse_utm_zone(&upper) {
                return Ok(Some(if nad83 {
                    Self::Nad83Utm(zone)
                } else {
                    Self::Wgs84Utm(zone)
                }));
            }
            let name = upper.lines().next().unwrap_or_default().to_string();
            return Err(SpatialError::UnsupportedCrs(name));
        }

        if nad83 {
            return Ok(Some(Self::Nad83));
        }
        if upper.contains("WGS_1984") || upper.contains("WGS 84") || upper.contains("WGS84") {
            return Ok(Some(Self::Wgs84));
        }

        Ok(None)
    }

    /// Resolves a GeoJSON `crs` name such as
    /// `urn:ogc:def:crs:EPSG::4269`, `EPSG:4326`, or
    /// `urn:ogc:def:crs:OGC:1.3:CRS84`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::UnsupportedCrs`] for unrecognized names.
    pub fn from_urn(name: &str) -> Result<Self, SpatialError> {
        if name.trim_end().ends_with("CRS84") {
            return Ok(Self::Wgs84);
        }
        name.rsplit(':')
            .next()
            .and_then(|code| code.trim().parse::<u32>().ok())
            .ok_or_else(|| SpatialError::UnsupportedCrs(name.to_string()))
            .and_then(Self::from_epsg)
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn utm_zone(zone: u32) -> u8 {
    zone as u8
}

/// Finds `UTM_Zone_13N` / `UTM zone 13N` and returns the zone number.
fn parse_utm_zone(upper_wkt: &str) -> Option<u8> {
    let start = upper_wkt
        .find("UTM_ZONE_")
        .map(|i| i + "UTM_ZONE_".len())
        .or_else(|| upper_wkt.find("UTM ZONE ").map(|i| i + "UTM ZONE ".len()))?;

    let digits: String = upper_wkt[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    let zone = digits.parse::<u8>().ok()?;
    let hemisphere = upper_wkt[start + digits.len()..].chars().next();

    ((1..=60).contains(&zone) && hemisphere == Some('N')).then_some(zone)
}

/// Transforms coordinates between two systems.
///
/// Geographic systems take and return degrees (`x` = longitude,
/// `y` = latitude); projected systems take and return metres.
pub struct Reprojector {
    from: Proj,
    to: Proj,
    from_geographic: bool,
    to_geographic: bool,
    identity: bool,
}

impl Reprojector {
    /// Builds a transform between two supported systems.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Projection`] if either definition is
    /// rejected by `proj4rs`.
    pub fn new(from: Crs, to: Crs) -> Result<Self, SpatialError> {
        let mut reprojector = Self::from_definitions(
            &from.proj_string(),
            &to.proj_string(),
            from.is_geographic(),
            to.is_geographic(),
        )?;
        reprojector.identity = from == to;
        Ok(reprojector)
    }

    /// Builds a transform from WGS84 longitude/latitude into a transverse
    /// mercator frame (metres) whose central meridian and origin sit on
    /// `center_lon`/`center_lat`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Projection`] if the frame is rejected by
    /// `proj4rs`.
    pub fn to_local_frame(center_lon: f64, center_lat: f64) -> Result<Self, SpatialError> {
        let frame = format!(
            "+proj=tmerc +lat_0={center_lat} +lon_0={center_lon} +k=1 +x_0=0 +y_0=0 \
             +datum=WGS84 +units=m +no_defs +type=crs"
        );
        Self::from_definitions(&Crs::Wgs84.proj_string(), &frame, true, false)
    }

    fn from_definitions(
        from: &str,
        to: &str,
        from_geographic: bool,
        to_geographic: bool,
    ) -> Result<Self, SpatialError> {
        let from_proj = Proj::from_proj_string(from)
            .map_err(|e| SpatialError::Projection(format!("invalid definition {from}: {e}")))?;
        let to_proj = Proj::from_proj_string(to)
            .map_err(|e| SpatialError::Projection(format!("invalid definition {to}: {e}")))?;

        Ok(Self {
            from: from_proj,
            to: to_proj,
            from_geographic,
            to_geographic,
            identity: false,
        })
    }

    /// Transforms a single `(x, y)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Projection`] if the point cannot be
    /// transformed.
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), SpatialError> {
        if self.identity {
            return Ok((x, y));
        }

        let mut point = if self.from_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        transform(&self.from, &self.to, &mut point)
            .map_err(|e| SpatialError::Projection(format!("({x}, {y}): {e}")))?;

        if self.to_geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }

    /// Transforms every vertex of a multipolygon.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Projection`] on the first vertex that
    /// cannot be transformed.
    pub fn transform_multipolygon(
        &self,
        geometry: &MultiPolygon<f64>,
    ) -> Result<MultiPolygon<f64>, SpatialError> {
        if self.identity {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|coord: Coord<f64>| {
            self.transform(coord.x, coord.y)
                .map(|(x, y)| Coord { x, y })
        })
    }
}
