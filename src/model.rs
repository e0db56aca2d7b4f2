use chrono::{DateTime, Utc};

/// A parsed GPX document: waypoints, routes, and tracks plus header metadata.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Gpx {
    pub version: Option<String>,
    pub creator: Option<String>,
    pub metadata: Metadata,
    pub waypoints: Vec<Point>,
    pub routes: Vec<Route>,
    pub tracks: Vec<Track>,
}

impl Gpx {
    /// Total number of track points across every track and segment.
    /// Waypoints and route points are not counted.
    pub fn total_points(&self) -> usize {
        self.tracks
            .iter()
            .flat_map(|t| &t.segments)
            .map(|s| s.points.len())
            .sum()
    }

    /// Minimal bounding rectangle over all waypoint, route and track
    /// coordinates, or `None` for a document with no points at all.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        let waypoints = self.waypoints.iter();
        let route_points = self.routes.iter().flat_map(|r| &r.points);
        let track_points = self
            .tracks
            .iter()
            .flat_map(|t| &t.segments)
            .flat_map(|s| &s.points);
        for pt in waypoints.chain(route_points).chain(track_points) {
            bounds = Some(match bounds {
                None => Bounds {
                    min_lat: pt.lat,
                    max_lat: pt.lat,
                    min_lon: pt.lon,
                    max_lon: pt.lon,
                },
                Some(b) => Bounds {
                    min_lat: b.min_lat.min(pt.lat),
                    max_lat: b.max_lat.max(pt.lat),
                    min_lon: b.min_lon.min(pt.lon),
                    max_lon: b.max_lon.max(pt.lon),
                },
            });
        }
        bounds
    }
}

/// GPX header metadata (the `<metadata>` block in 1.1, bare header
/// children in 1.0).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Metadata {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub author: Option<String>,
    pub keywords: Option<String>,
    pub time: Option<DateTime<Utc>>,
    pub bounds: Option<Bounds>,
}

/// A bounding rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// A single GPX point, used for `wpt`, `rtept` and `trkpt` alike.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
    pub ele: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub cmt: Option<String>,
    pub desc: Option<String>,
    pub src: Option<String>,
    pub sym: Option<String>,
    pub point_type: Option<String>,
    pub link: Option<Link>,
}

impl Point {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            ele: None,
            time: None,
            name: None,
            cmt: None,
            desc: None,
            src: None,
            sym: None,
            point_type: None,
            link: None,
        }
    }

    /// Flat 2-D distance in meters to another point. Ignores elevation.
    pub fn distance_2d(&self, other: &Point) -> f64 {
        crate::geom::distance_2d(self.lat, self.lon, other.lat, other.lon)
    }
}

/// A GPX link element.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub href: String,
    pub text: Option<String>,
    pub link_type: Option<String>,
}

/// A GPX route (`<rte>`): a planned, non-timestamped path.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Route {
    pub name: Option<String>,
    pub cmt: Option<String>,
    pub desc: Option<String>,
    pub src: Option<String>,
    pub link: Option<Link>,
    pub number: Option<u32>,
    pub route_type: Option<String>,
    pub points: Vec<Point>,
}

/// A GPX track (`<trk>`): a recorded path made of segments.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Track {
    pub name: Option<String>,
    pub cmt: Option<String>,
    pub desc: Option<String>,
    pub src: Option<String>,
    pub link: Option<Link>,
    pub number: Option<u32>,
    pub track_type: Option<String>,
    pub segments: Vec<TrackSegment>,
}

impl Track {
    /// Whether every point in this track carries a timestamp. A segment
    /// with no points counts as vacuously timestamped.
    pub fn has_times(&self) -> bool {
        self.segments.iter().all(TrackSegment::has_times)
    }
}

/// A GPX track segment (`<trkseg>`): a contiguous run of track points.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrackSegment {
    pub points: Vec<Point>,
}

impl TrackSegment {
    pub fn has_times(&self) -> bool {
        self.points.iter().all(|p| p.time.is_some())
    }
}
