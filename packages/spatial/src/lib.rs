#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial indexes for region attribution and wildfire
//! proximity.
//!
//! [`RegionIndex`] loads the region polygon dataset once, reprojects it to
//! WGS84, and answers point-in-polygon lookups through an R-tree of
//! polygon envelopes. [`ProximityIndex`] answers "is there a wildfire
//! within N km" in a metric frame.

pub mod crs;
pub mod polygons;
pub mod proximity;

use std::path::Path;

use geo::{BoundingRect, Contains, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;
use wildfire_aqi_observation_models::Coordinate;

pub use crs::{Crs, Reprojector};
pub use polygons::{RegionPolygon, read_polygons};
pub use proximity::ProximityIndex;

/// Errors from loading polygon data or building spatial indexes.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// The polygon dataset is missing or unreadable.
    #[error("Failed to read polygon source {path}: {message}")]
    DataSource {
        /// Path of the dataset.
        path: String,
        /// What went wrong.
        message: String,
    },

    /// A coordinate reference system outside the supported set.
    #[error("Unsupported coordinate reference system: {0}")]
    UnsupportedCrs(String),

    /// Reprojection failed.
    #[error("Projection error: {0}")]
    Projection(String),

    /// A polygon has none of the recognized name attributes.
    #[error("Polygon source {path} has a feature without a region name (tried {tried})")]
    MissingNameField {
        /// Path of the dataset.
        path: String,
        /// Attribute names that were tried.
        tried: String,
    },

    /// The proximity radius is not a positive finite number.
    #[error("Invalid proximity radius: {0} km")]
    InvalidRadius(f64),
}

/// How to interpret the polygon dataset and the points looked up in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionOptions {
    /// Preferred region name attribute.
    pub name_field: String,
    /// System assumed when the dataset declares none.
    pub default_crs: Crs,
    /// System of the looked-up latitude/longitude pairs.
    pub point_crs: Crs,
}

impl Default for RegionOptions {
    fn default() -> Self {
        Self {
            name_field: "NAME".to_string(),
            default_crs: Crs::Nad83,
            point_crs: Crs::Wgs84,
        }
    }
}

/// A region polygon stored in the R-tree.
struct RegionEntry {
    /// Position in the source dataset; the lowest wins on overlap.
    order: usize,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for RegionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Point-in-polygon index over the region dataset, in WGS84.
///
/// A point is inside a region only if it is strictly inside the polygon;
/// points on a shared boundary match neither neighbour. Overlapping
/// regions resolve to the one listed first in the dataset.
pub struct RegionIndex {
    tree: RTree<RegionEntry>,
    names: Vec<String>,
    point_projection: Option<Reprojector>,
}

impl RegionIndex {
    /// Loads and indexes a polygon dataset.
    ///
    /// Polygons are reprojected from their declared system (or
    /// `options.default_crs` when none is declared) to WGS84.
    ///
    /// # Errors
    ///
    /// * [`SpatialError::DataSource`] if the dataset is missing or malformed
    /// * [`SpatialError::MissingNameField`] if a polygon has no name
    /// * [`SpatialError::UnsupportedCrs`] / [`SpatialError::Projection`]
    ///   if the dataset cannot be brought into WGS84
    pub fn load(path: &Path, options: &RegionOptions) -> Result<Self, SpatialError> {
        if !path.exists() {
            return Err(SpatialError::DataSource {
                path: path.display().to_string(),
                message: "file not found".to_string(),
            });
        }

        let source = read_polygons(path, &options.name_field)?;
        let source_crs = source.declared_crs.unwrap_or_else(|| {
            log::info!(
                "{} declares no coordinate system, assuming {}",
                path.display(),
                options.default_crs
            );
            options.default_crs
        });

        let reprojector = Reprojector::new(source_crs, Crs::Wgs84)?;
        let polygons = source
            .polygons
            .into_iter()
            .map(|polygon| {
                Ok(RegionPolygon {
                    geometry: reprojector.transform_multipolygon(&polygon.geometry)?,
                    name: polygon.name,
                })
            })
            .collect::<Result<Vec<_>, SpatialError>>()?;

        let index = Self::from_polygons(polygons).with_point_crs(options.point_crs)?;
        log::info!(
            "Loaded {} region polygons from {} ({source_crs})",
            index.len(),
            path.display()
        );
        Ok(index)
    }

    /// Indexes polygons that are already in WGS84.
    #[must_use]
    pub fn from_polygons(polygons: Vec<RegionPolygon>) -> Self {
        let mut names = Vec::with_capacity(polygons.len());
        let mut entries = Vec::with_capacity(polygons.len());

        for (order, polygon) in polygons.into_iter().enumerate() {
            let Some(envelope) = compute_envelope(&polygon.geometry) else {
                log::warn!("Region {} has empty geometry", polygon.name);
                names.push(polygon.name);
                continue;
            };
            names.push(polygon.name);
            entries.push(RegionEntry {
                order,
                envelope,
                polygon: polygon.geometry,
            });
        }

        Self {
            tree: RTree::bulk_load(entries),
            names,
            point_projection: None,
        }
    }

    /// Sets the system of looked-up points. Only geographic systems are
    /// accepted; WGS84 needs no transform.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::UnsupportedCrs`] for projected systems.
    pub fn with_point_crs(mut self, crs: Crs) -> Result<Self, SpatialError> {
        if !crs.is_geographic() {
            return Err(SpatialError::UnsupportedCrs(format!(
                "{crs} is not a latitude/longitude system"
            )));
        }
        self.point_projection = if crs == Crs::Wgs84 {
            None
        } else {
            Some(Reprojector::new(crs, Crs::Wgs84)?)
        };
        Ok(self)
    }

    /// Number of regions in the dataset.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if the dataset has no regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Region names in dataset order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Name of the region containing `coordinate`, if any.
    #[must_use]
    pub fn lookup(&self, coordinate: Coordinate) -> Option<&str> {
        let (lng, lat) = match &self.point_projection {
            None => (coordinate.longitude, coordinate.latitude),
            Some(reprojector) => match reprojector
                .transform(coordinate.longitude, coordinate.latitude)
            {
                Ok(point) => point,
                Err(e) => {
                    log::debug!("Skipping region lookup: {e}");
                    return None;
                }
            },
        };

        let point = geo::Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.contains(&point))
            .map(|entry| entry.order)
            .min()
            .map(|order| self.names[order].as_str())
    }

    /// Assigns a region to each point, in input order. Invalid points
    /// (`None`) are unassigned.
    #[must_use]
    pub fn assign_regions(&self, points: &[Option<Coordinate>]) -> Vec<Option<&str>> {
        points
            .iter()
            .map(|point| point.and_then(|c| self.lookup(c)))
            .collect()
    }
}

/// Bounding box envelope of a [`MultiPolygon`], `None` when it is empty.
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect().map(|rect| {
        AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
    })
}

#[cfg(test)]
mod tests {
    use geo::{LineString, Polygon};

    use super::*;

    fn square(name: &str, min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> RegionPolygon {
        RegionPolygon {
            name: name.to_string(),
            geometry: MultiPolygon(vec![Polygon::new(
                LineString::from(vec![
                    (min_lon, min_lat),
                    (max_lon, min_lat),
                    (max_lon, max_lat),
                    (min_lon, max_lat),
                    (min_lon, min_lat),
                ]),
                vec![],
            )]),
        }
    }

    fn region_at(index: &RegionIndex, latitude: f64, longitude: f64) -> Option<&str> {
        Coordinate::new(latitude, longitude).and_then(|c| index.lookup(c))
    }

    fn colorado_pair() -> RegionIndex {
        RegionIndex::from_polygons(vec![
            square("Boulder", -105.7, 39.9, -105.0, 40.3),
            square("Denver", -105.0, 39.6, -104.6, 39.9),
        ])
    }

    #[test]
    fn finds_enclosing_region() {
        let index = colorado_pair();
        assert_eq!(region_at(&index, 40.0, -105.2), Some("Boulder"));
        assert_eq!(region_at(&index, 39.75, -104.8), Some("Denver"));
    }

    #[test]
    fn outside_every_region_is_unassigned() {
        let index = colorado_pair();
        assert_eq!(region_at(&index, 37.0, -108.0), None);
        assert_eq!(region_at(&index, f64::NAN, -105.2), None);
        assert_eq!(region_at(&index, 95.0, -105.2), None);
    }

    #[test]
    fn boundary_points_are_not_contained() {
        let index = colorado_pair();
        // shared corner and edge between the two squares
        assert_eq!(region_at(&index, 39.9, -105.0), None);
        assert_eq!(region_at(&index, 40.3, -105.2), None);
    }

    #[test]
    fn overlap_resolves_to_first_listed() {
        let index = RegionIndex::from_polygons(vec![
            square("First", -106.0, 39.0, -104.0, 41.0),
            square("Second", -105.5, 39.5, -104.5, 40.5),
        ]);
        assert_eq!(region_at(&index, 40.0, -105.0), Some("First"));

        let reversed = RegionIndex::from_polygons(vec![
            square("Second", -105.5, 39.5, -104.5, 40.5),
            square("First", -106.0, 39.0, -104.0, 41.0),
        ]);
        assert_eq!(region_at(&reversed, 40.0, -105.0), Some("Second"));
    }

    #[test]
    fn assigns_in_input_order() {
        let index = colorado_pair();
        let points = vec![
            Coordinate::new(39.75, -104.8),
            None,
            Coordinate::new(40.1, -105.3),
        ];
        assert_eq!(
            index.assign_regions(&points),
            vec![Some("Denver"), None, Some("Boulder")]
        );
    }

    #[test]
    fn rejects_projected_point_crs() {
        assert!(matches!(
            colorado_pair().with_point_crs(Crs::WebMercator),
            Err(SpatialError::UnsupportedCrs(_))
        ));
    }

    #[test]
    fn loads_geojson_and_reports_missing_file() {
        let dir = std::env::temp_dir().join("wildfire_aqi_spatial_region_index");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("regions.geojson");
        std::fs::write(
            &path,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"NAME": "Boulder"},
                 "geometry": {"type": "Polygon", "coordinates": [[[-105.7,39.9],[-105.0,39.9],[-105.0,40.3],[-105.7,40.3],[-105.7,39.9]]]}}
            ]}"#,
        )
        .unwrap();

        let options = RegionOptions {
            default_crs: Crs::Wgs84,
            ..RegionOptions::default()
        };
        let index = RegionIndex::load(&path, &options).unwrap();
        assert_eq!(index.names(), ["Boulder".to_string()]);
        assert_eq!(region_at(&index, 40.0, -105.2), Some("Boulder"));

        assert!(matches!(
            RegionIndex::load(&dir.join("missing.shp"), &options),
            Err(SpatialError::DataSource { .. })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }
}
