use crate::error::GpxError;
use crate::geom::distance_2d;
use crate::model::{Gpx, Point};

/// The closest track point to a query location, with its address in the
/// track hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestLocation {
    pub point: Point,
    pub track_idx: usize,
    pub segment_idx: usize,
    pub point_idx: usize,
}

impl Gpx {
    /// Find the track point closest to `query`. See [`nearest_location`].
    pub fn nearest_location(&self, query: &Point) -> Result<NearestLocation, GpxError> {
        nearest_location(self, query)
    }
}

/// Linear scan over every track point for the one closest to `query` by
/// flat 2-D distance. Scans in (track, segment, point) stored order and
/// keeps the first of any tied points. Fails with `EmptyDataSet` when
/// the document holds no track points.
pub fn nearest_location(gpx: &Gpx, query: &Point) -> Result<NearestLocation, GpxError> {
    let mut best: Option<(f64, NearestLocation)> = None;

    for (track_idx, track) in gpx.tracks.iter().enumerate() {
        for (segment_idx, segment) in track.segments.iter().enumerate() {
            for (point_idx, point) in segment.points.iter().enumerate() {
                let distance = distance_2d(query.lat, query.lon, point.lat, point.lon);
                // Strict comparison: ties keep the earlier point.
                if best.as_ref().is_none_or(|(d, _)| distance < *d) {
                    best = Some((
                        distance,
                        NearestLocation {
                            point: point.clone(),
                            track_idx,
                            segment_idx,
                            point_idx,
                        },
                    ));
                }
            }
        }
    }

    best.map(|(_, hit)| hit).ok_or(GpxError::EmptyDataSet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Track, TrackSegment};

    fn gpx_with_segments(segments: Vec<Vec<(f64, f64)>>) -> Gpx {
        let mut gpx = Gpx::default();
        gpx.tracks.push(Track {
            segments: segments
                .into_iter()
                .map(|pts| TrackSegment {
                    points: pts.into_iter().map(|(lat, lon)| Point::new(lat, lon)).collect(),
                })
                .collect(),
            ..Default::default()
        });
        gpx
    }

    #[test]
    fn test_exact_match() {
        let gpx = gpx_with_segments(vec![
            vec![(45.0, 14.0), (45.1, 14.1)],
            vec![(45.2, 14.2), (45.3, 14.3)],
        ]);
        let hit = nearest_location(&gpx, &Point::new(45.2, 14.2)).unwrap();
        assert_eq!((hit.track_idx, hit.segment_idx, hit.point_idx), (0, 1, 0));
        assert!(hit.point.distance_2d(&Point::new(45.2, 14.2)) < 0.001);
    }

    #[test]
    fn test_far_query_finds_minimum() {
        let gpx = gpx_with_segments(vec![vec![(45.0, 14.0), (45.1, 14.1), (45.2, 14.2)]]);
        // Far to the north-east: the last point is nearest.
        let hit = nearest_location(&gpx, &Point::new(50.0, 50.0)).unwrap();
        assert_eq!(hit.point_idx, 2);
    }

    #[test]
    fn test_tie_keeps_first() {
        // Two identical points: the scan must report the first one.
        let gpx = gpx_with_segments(vec![vec![(45.0, 14.0)], vec![(45.0, 14.0)]]);
        let hit = nearest_location(&gpx, &Point::new(45.0, 14.0)).unwrap();
        assert_eq!((hit.segment_idx, hit.point_idx), (0, 0));
    }

    #[test]
    fn test_empty_data_set() {
        let gpx = gpx_with_segments(vec![vec![]]);
        let err = nearest_location(&gpx, &Point::new(0.0, 0.0)).unwrap_err();
        assert!(matches!(err, GpxError::EmptyDataSet));
    }

    #[test]
    fn test_waypoints_not_searched() {
        let mut gpx = Gpx::default();
        gpx.waypoints.push(Point::new(45.0, 14.0));
        assert!(matches!(
            nearest_location(&gpx, &Point::new(45.0, 14.0)),
            Err(GpxError::EmptyDataSet)
        ));
    }
}
