//! Distance buffers around wildfire detections.
//!
//! Detections are projected once into a transverse mercator frame centred
//! on their bounding box, so Euclidean distance in the frame is a metric
//! approximation of ground distance across a state-sized area. Queries are
//! inclusive: a point exactly on the buffer edge is within range.

use rstar::RTree;
use wildfire_aqi_observation_models::Coordinate;

use crate::{SpatialError, crs::Reprojector};

/// Answers "is any wildfire within the configured distance of this point".
pub struct ProximityIndex {
    tree: RTree<[f64; 2]>,
    frame: Option<Reprojector>,
    radius_m: f64,
}

impl ProximityIndex {
    /// Projects `sources` and indexes them.
    ///
    /// An empty source set yields an index that never matches.
    ///
    /// # Errors
    ///
    /// * [`SpatialError::InvalidRadius`] if `distance_km` is not a positive
    ///   finite number
    /// * [`SpatialError::Projection`] if the frame cannot be built or a
    ///   source cannot be projected
    pub fn new(sources: &[Coordinate], distance_km: f64) -> Result<Self, SpatialError> {
        if !distance_km.is_finite() || distance_km <= 0.0 {
            return Err(SpatialError::InvalidRadius(distance_km));
        }
        let radius_m = distance_km * 1000.0;

        let Some((center_lon, center_lat)) = bounding_center(sources) else {
            return Ok(Self {
                tree: RTree::new(),
                frame: None,
                radius_m,
            });
        };

        let frame = Reprojector::to_local_frame(center_lon, center_lat)?;
        let points = sources
            .iter()
            .map(|c| frame.transform(c.longitude, c.latitude).map(|(x, y)| [x, y]))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "Indexed {} wildfire detections for a {distance_km} km buffer",
            points.len()
        );

        Ok(Self {
            tree: RTree::bulk_load(points),
            frame: Some(frame),
            radius_m,
        })
    }

    /// Returns `true` if no detections are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Returns `true` if any detection lies within the radius of
    /// `coordinate`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Projection`] if the point cannot be
    /// projected into the frame.
    pub fn is_within(&self, coordinate: Coordinate) -> Result<bool, SpatialError> {
        let Some(frame) = &self.frame else {
            return Ok(false);
        };

        let (x, y) = frame.transform(coordinate.longitude, coordinate.latitude)?;
        Ok(self
            .tree
            .locate_within_distance([x, y], self.radius_m * self.radius_m)
            .next()
            .is_some())
    }
}

fn bounding_center(sources: &[Coordinate]) -> Option<(f64, f64)> {
    let first = sources.first()?;
    let (mut min_lon, mut max_lon) = (first.longitude, first.longitude);
    let (mut min_lat, mut max_lat) = (first.latitude, first.latitude);

    for c in &sources[1..] {
        min_lon = min_lon.min(c.longitude);
        max_lon = max_lon.max(c.longitude);
        min_lat = min_lat.min(c.latitude);
        max_lat = max_lat.max(c.latitude);
    }

    Some((f64::midpoint(min_lon, max_lon), f64::midpoint(min_lat, max_lat)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn nearby_station_is_within_buffer() {
        // about 1.4 km apart
        let index = ProximityIndex::new(&[coord(40.01, -105.21)], 50.0).unwrap();
        assert!(index.is_within(coord(40.0, -105.2)).unwrap());

        let tight = ProximityIndex::new(&[coord(40.01, -105.21)], 1.0).unwrap();
        assert!(!tight.is_within(coord(40.0, -105.2)).unwrap());
    }

    #[test]
    fn one_degree_of_longitude_at_forty_north() {
        // roughly 85.4 km
        let fires = [coord(40.0, -105.0)];
        let station = coord(40.0, -104.0);

        assert!(!ProximityIndex::new(&fires, 80.0).unwrap().is_within(station).unwrap());
        assert!(ProximityIndex::new(&fires, 90.0).unwrap().is_within(station).unwrap());
    }

    #[test]
    fn widening_the_radius_never_loses_matches() {
        let fires = [coord(39.5, -106.5), coord(40.8, -104.2), coord(37.3, -107.9)];
        let stations = [
            coord(40.0, -105.2),
            coord(38.8, -104.8),
            coord(37.2, -108.1),
            coord(40.5, -103.0),
        ];

        let mut previous = vec![false; stations.len()];
        for km in [1.0, 10.0, 25.0, 50.0, 100.0, 250.0] {
            let index = ProximityIndex::new(&fires, km).unwrap();
            let current: Vec<bool> = stations
                .iter()
                .map(|s| index.is_within(*s).unwrap())
                .collect();
            for (before, now) in previous.iter().zip(&current) {
                assert!(!before || *now, "lost a match when widening to {km} km");
            }
            previous = current;
        }
        assert!(previous.iter().all(|within| *within));
    }

    #[test]
    fn empty_source_set_never_matches() {
        let index = ProximityIndex::new(&[], 50.0).unwrap();
        assert!(index.is_empty());
        assert!(!index.is_within(coord(40.0, -105.2)).unwrap());
    }

    #[test]
    fn rejects_non_positive_radius() {
        assert!(matches!(
            ProximityIndex::new(&[], 0.0),
            Err(SpatialError::InvalidRadius(_))
        ));
        assert!(matches!(
            ProximityIndex::new(&[], f64::NAN),
            Err(SpatialError::InvalidRadius(_))
        ));
    }
}
