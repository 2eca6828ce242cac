//! Region polygon readers for Shapefile and `GeoJSON` sources.

use std::path::Path;

use geo::{Coord, LineString, MultiPolygon, Polygon};
use geojson::{FeatureCollection, GeoJson, JsonValue};
use shapefile::{
    Reader, Shape,
    dbase::{FieldValue, Record},
};

use crate::{SpatialError, crs::Crs};

/// Attribute names tried, in order, after the configured name field.
pub const NAME_FIELD_FALLBACKS: &[&str] = &["NAME", "NAMELSAD", "COUNTY", "name"];

/// A named region boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionPolygon {
    /// Region name, unique per polygon dataset.
    pub name: String,
    /// Boundary geometry.
    pub geometry: MultiPolygon<f64>,
}

/// Polygons as read from disk, before reprojection.
#[derive(Debug, Clone)]
pub struct PolygonSource {
    /// Polygons in file order.
    pub polygons: Vec<RegionPolygon>,
    /// The system declared by the file, if any.
    pub declared_crs: Option<Crs>,
}

/// Reads named polygons from a `.shp` (with optional `.prj` sidecar) or a
/// `.geojson`/`.json` feature collection.
///
/// Features without geometry are skipped with a warning.
///
/// # Errors
///
/// * [`SpatialError::DataSource`] if the file cannot be read or contains
///   non-polygon geometry
/// * [`SpatialError::MissingNameField`] if a feature has none of the name
///   attributes
/// * [`SpatialError::UnsupportedCrs`] if the declared system is not
///   supported
pub fn read_polygons(path: &Path, name_field: &str) -> Result<PolygonSource, SpatialError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let candidates = name_candidates(name_field);

    match extension.as_deref() {
        Some("shp") => read_shapefile(path, &candidates),
        Some("geojson" | "json") => read_geojson(path, &candidates),
        _ => Err(data_source_error(
            path,
            "unsupported polygon format (expected .shp, .geojson or .json)",
        )),
    }
}

fn name_candidates(name_field: &str) -> Vec<String> {
    let mut candidates = vec![name_field.to_string()];
    for fallback in NAME_FIELD_FALLBACKS {
        if !candidates.iter().any(|c| c == fallback) {
            candidates.push((*fallback).to_string());
        }
    }
    candidates
}

fn data_source_error(path: &Path, message: impl Into<String>) -> SpatialError {
    SpatialError::DataSource {
        path: path.display().to_string(),
        message: message.into(),
    }
}

fn missing_name_error(path: &Path, candidates: &[String]) -> SpatialError {
    SpatialError::MissingNameField {
        path: path.display().to_string(),
        tried: candidates.join(", "),
    }
}

fn read_shapefile(path: &Path, candidates: &[String]) -> Result<PolygonSource, SpatialError> {
    let mut reader =
        Reader::from_path(path).map_err(|e| data_source_error(path, e.to_string()))?;

    let mut polygons = Vec::new();
    for (index, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result.map_err(|e| data_source_error(path, e.to_string()))?;

        let name =
            record_name(&record, candidates).ok_or_else(|| missing_name_error(path, candidates))?;

        let rings: Vec<Vec<Coord<f64>>> = match shape {
            Shape::Polygon(polygon) => polygon
                .rings()
                .iter()
                .map(|ring| ring.points().iter().map(|p| Coord { x: p.x, y: p.y }).collect())
                .collect(),
            Shape::PolygonM(polygon) => polygon
                .rings()
                .iter()
                .map(|ring| ring.points().iter().map(|p| Coord { x: p.x, y: p.y }).collect())
                .collect(),
            Shape::PolygonZ(polygon) => polygon
                .rings()
                .iter()
                .map(|ring| ring.points().iter().map(|p| Coord { x: p.x, y: p.y }).collect())
                .collect(),
            Shape::NullShape => {
                log::warn!("Skipping record {index} ({name}) in {}: null shape", path.display());
                continue;
            }
            _ => {
                return Err(data_source_error(
                    path,
                    format!("record {index} ({name}) is not a polygon"),
                ));
            }
        };

        polygons.push(RegionPolygon {
            name,
            geometry: rings_to_multipolygon(rings),
        });
    }

    let declared_crs = read_prj(&path.with_extension("prj"))?;

    Ok(PolygonSource {
        polygons,
        declared_crs,
    })
}

fn record_name(record: &Record, candidates: &[String]) -> Option<String> {
    candidates.iter().find_map(|field| match record.get(field) {
        Some(FieldValue::Character(Some(s))) if !s.trim().is_empty() => {
            Some(s.trim().to_string())
        }
        _ => None,
    })
}

fn read_prj(path: &Path) -> Result<Option<Crs>, SpatialError> {
    if !path.exists() {
        return Ok(None);
    }
    let wkt = std::fs::read_to_string(path).map_err(|e| data_source_error(path, e.to_string()))?;
    Crs::from_wkt(&wkt)
}

fn read_geojson(path: &Path, candidates: &[String]) -> Result<PolygonSource, SpatialError> {
    let text = std::fs::read_to_string(path).map_err(|e| data_source_error(path, e.to_string()))?;
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| data_source_error(path, e.to_string()))?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(data_source_error(path, "expected a FeatureCollection"));
    };

    let declared_crs = geojson_crs(&collection)?;

    let mut polygons = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.into_iter().enumerate() {
        let name = candidates
            .iter()
            .find_map(|field| {
                match feature.properties.as_ref().and_then(|props| props.get(field)) {
                    Some(JsonValue::String(s)) if !s.trim().is_empty() => {
                        Some(s.trim().to_string())
                    }
                    _ => None,
                }
            })
            .ok_or_else(|| missing_name_error(path, candidates))?;

        let Some(geometry) = feature.geometry else {
            log::warn!("Skipping feature {index} ({name}) in {}: no geometry", path.display());
            continue;
        };

        let geometry: geo::Geometry<f64> = geometry
            .try_into()
            .map_err(|e: geojson::Error| data_source_error(path, e.to_string()))?;

        let geometry = match geometry {
            geo::Geometry::MultiPolygon(mp) => mp,
            geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
            _ => {
                return Err(data_source_error(
                    path,
                    format!("feature {index} ({name}) is not a polygon"),
                ));
            }
        };

        polygons.push(RegionPolygon { name, geometry });
    }

    Ok(PolygonSource {
        polygons,
        declared_crs,
    })
}

/// Reads the legacy `crs` member (`{"type": "name", "properties":
/// {"name": "urn:ogc:def:crs:EPSG::4269"}}`).
fn geojson_crs(collection: &FeatureCollection) -> Result<Option<Crs>, SpatialError> {
    let name = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|props| props.get("name"))
        .and_then(JsonValue::as_str);

    name.map(Crs::from_urn).transpose()
}

/// Twice the signed area of a ring; negative for clockwise rings.
fn signed_area(ring: &[Coord<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    ring.iter()
        .zip(ring.iter().cycle().skip(1))
        .map(|(a, b)| a.x.mul_add(b.y, -(b.x * a.y)))
        .sum()
}

/// Groups shapefile rings into polygons.
///
/// Shapefile exteriors are clockwise and each is followed by its holes. A
/// counter-clockwise ring with no open exterior is promoted to an exterior
/// so mis-wound files still produce geometry.
pub fn rings_to_multipolygon(rings: Vec<Vec<Coord<f64>>>) -> MultiPolygon<f64> {
    let mut polygons = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    for ring in rings {
        if ring.len() < 3 {
            continue;
        }
        let is_exterior = signed_area(&ring) < 0.0;
        let ring = LineString(ring);

        if is_exterior || exterior.is_none() {
            if let Some(previous) = exterior.take() {
                polygons.push(Polygon::new(previous, std::mem::take(&mut holes)));
            }
            exterior = Some(ring);
        } else {
            holes.push(ring);
        }
    }

    if let Some(previous) = exterior {
        polygons.push(Polygon::new(previous, holes));
    }

    MultiPolygon(polygons)
}

#[cfg(test)]
mod tests {
    use geo::{Contains, Point};

    use super::*;

    fn ring(points: &[(f64, f64)]) -> Vec<Coord<f64>> {
        points.iter().map(|&(x, y)| Coord { x, y }).collect()
    }

    #[test]
    fn groups_exterior_with_following_holes() {
        // clockwise exterior, counter-clockwise hole, clockwise island
        let rings = vec![
            ring(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 0.0)]),
            ring(&[(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0), (4.0, 4.0)]),
            ring(&[(20.0, 0.0), (20.0, 5.0), (25.0, 5.0), (25.0, 0.0), (20.0, 0.0)]),
        ];

        let multi = rings_to_multipolygon(rings);
        assert_eq!(multi.0.len(), 2);
        assert_eq!(multi.0[0].interiors().len(), 1);
        assert!(multi.contains(&Point::new(1.0, 1.0)));
        assert!(!multi.contains(&Point::new(5.0, 5.0)));
        assert!(multi.contains(&Point::new(22.0, 2.0)));
    }

    #[test]
    fn promotes_leading_counter_clockwise_ring() {
        let rings = vec![ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])];
        let multi = rings_to_multipolygon(rings);
        assert_eq!(multi.0.len(), 1);
        assert!(multi.contains(&Point::new(0.5, 0.5)));
    }

    #[test]
    fn name_candidates_start_with_configured_field() {
        assert_eq!(
            name_candidates("COUNTY_NM"),
            vec!["COUNTY_NM", "NAME", "NAMELSAD", "COUNTY", "name"]
        );
        assert_eq!(name_candidates("NAME").len(), 4);
    }

    #[test]
    fn reads_geojson_feature_collection() {
        let dir = std::env::temp_dir().join("wildfire_aqi_spatial_polygons_geojson");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("counties.geojson");
        std::fs::write(
            &path,
            r#"{
              "type": "FeatureCollection",
              "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::4269"}},
              "features": [
                {"type": "Feature", "properties": {"NAMELSAD": "Boulder County"},
                 "geometry": {"type": "Polygon", "coordinates": [[[-105.7,39.9],[-105.0,39.9],[-105.0,40.3],[-105.7,40.3],[-105.7,39.9]]]}},
                {"type": "Feature", "properties": {"NAMELSAD": "Nowhere"}, "geometry": null}
              ]
            }"#,
        )
        .unwrap();

        let source = read_polygons(&path, "NAME").unwrap();
        assert_eq!(source.declared_crs, Some(Crs::Nad83));
        assert_eq!(source.polygons.len(), 1);
        assert_eq!(source.polygons[0].name, "Boulder County");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_name_attribute_is_an_error() {
        let dir = std::env::temp_dir().join("wildfire_aqi_spatial_polygons_unnamed");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("unnamed.geojson");
        std::fs::write(
            &path,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"GEOID": "08013"},
                 "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}}
            ]}"#,
        )
        .unwrap();

        assert!(matches!(
            read_polygons(&path, "NAME"),
            Err(SpatialError::MissingNameField { .. })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn rejects_unknown_extension() {
        assert!(matches!(
            read_polygons(Path::new("regions.kml"), "NAME"),
            Err(SpatialError::DataSource { .. })
        ));
    }
}
