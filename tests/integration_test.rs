use chrono::{TimeZone, Utc};
use gpxcore::{GpxError, ParseOptions, Point, parse, parse_bytes, to_xml};

fn load_fixture(path: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{path}")).unwrap()
}

// ---- round-trip ----

#[test]
fn test_equality_after_reparse() {
    let gpx = parse(&load_fixture("lake_loop.gpx")).unwrap();
    let gpx2 = parse(&to_xml(&gpx).unwrap()).unwrap();

    assert_eq!(gpx.waypoints, gpx2.waypoints);
    assert_eq!(gpx.routes, gpx2.routes);
    assert_eq!(gpx.tracks, gpx2.tracks);
    assert_eq!(gpx, gpx2);
}

#[test]
fn test_reparse_preserves_escaped_text() {
    let gpx = parse(&load_fixture("lake_loop.gpx")).unwrap();
    assert_eq!(
        gpx.metadata.desc.as_deref(),
        Some("Survey walk & picnic around the lake")
    );
    assert_eq!(
        gpx.waypoints[0].desc.as_deref(),
        Some("Camping spot <north shore>")
    );

    let gpx2 = parse(&to_xml(&gpx).unwrap()).unwrap();
    assert_eq!(gpx2.metadata.desc, gpx.metadata.desc);
    assert_eq!(gpx2.waypoints[0].desc, gpx.waypoints[0].desc);
}

#[test]
fn test_reparse_preserves_fractional_times() {
    let gpx = parse(&load_fixture("long_timestamps.gpx")).unwrap();
    let gpx2 = parse(&to_xml(&gpx).unwrap()).unwrap();
    assert_eq!(gpx, gpx2);

    let time = gpx.tracks[0].segments[0].points[0].time.unwrap();
    assert_eq!(time.timestamp_subsec_nanos(), 207_343_700);
}

// ---- has_times ----

#[test]
fn test_has_times_false() {
    let gpx = parse(&load_fixture("mixed_times.gpx")).unwrap();
    assert!(!gpx.tracks[1].has_times());
}

#[test]
fn test_has_times() {
    let gpx = parse(&load_fixture("mixed_times.gpx")).unwrap();
    assert_eq!(gpx.tracks.len(), 4);
    // Empty -- true
    assert!(gpx.tracks[0].has_times());
    // No times ...
    assert!(!gpx.tracks[1].has_times());
    // Times OK
    assert!(gpx.tracks[2].has_times());
    assert!(gpx.tracks[3].has_times());
}

// ---- encoding ----

#[test]
fn test_unicode() {
    let gpx = parse(&load_fixture("lake_loop.gpx")).unwrap();
    assert_eq!(gpx.waypoints[0].name.as_deref(), Some("Jezersko šotorišče"));

    let gpx2 = parse(&to_xml(&gpx).unwrap()).unwrap();
    assert_eq!(gpx2.waypoints[0].name.as_deref(), Some("Jezersko šotorišče"));
}

#[test]
fn test_declared_latin1_bytes() {
    // "Café" with é as a single 0xE9 byte, as ISO-8859-1 encodes it.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>");
    bytes.extend_from_slice(b"<gpx version=\"1.1\"><wpt lat=\"45.0\" lon=\"14.0\"><name>Caf");
    bytes.push(0xE9);
    bytes.extend_from_slice(b"</name></wpt></gpx>");

    let gpx = parse_bytes(&bytes, &ParseOptions::default()).unwrap();
    assert_eq!(gpx.waypoints[0].name.as_deref(), Some("Café"));
}

// ---- nearest location ----

#[test]
fn test_nearest_location() {
    let gpx = parse(&load_fixture("mixed_times.gpx")).unwrap();

    let query = Point::new(45.451058791, 14.027903696);
    let hit = gpx.nearest_location(&query).unwrap();
    let point = &gpx.tracks[hit.track_idx].segments[hit.segment_idx].points[hit.point_idx];
    assert!(point.distance_2d(&query) < 0.001);
    assert!(point.distance_2d(&hit.point) < 0.001);
    assert_eq!((hit.track_idx, hit.segment_idx, hit.point_idx), (2, 0, 1));

    // Far queries still return the exhaustive minimum.
    for query in [Point::new(1.0, 1.0), Point::new(50.0, 50.0)] {
        let hit = gpx.nearest_location(&query).unwrap();
        let point = &gpx.tracks[hit.track_idx].segments[hit.segment_idx].points[hit.point_idx];
        assert!(point.distance_2d(&hit.point) < 0.001);

        let exhaustive = gpx
            .tracks
            .iter()
            .flat_map(|t| &t.segments)
            .flat_map(|s| &s.points)
            .map(|p| p.distance_2d(&query))
            .fold(f64::INFINITY, f64::min);
        assert!((hit.point.distance_2d(&query) - exhaustive).abs() < 0.001);
    }
}

#[test]
fn test_nearest_location_empty() {
    let gpx = parse(r#"<?xml version="1.0"?><gpx version="1.1"></gpx>"#).unwrap();
    assert!(matches!(
        gpx.nearest_location(&Point::new(0.0, 0.0)),
        Err(GpxError::EmptyDataSet)
    ));
}

// ---- errors ----

#[test]
fn test_malformed_markup_reports_description() {
    let err = parse("<gpx version=\"1.1\"><trk><trkseg></trk></gpx>").unwrap_err();
    let description = err.to_string();
    assert!(description.contains("XML parse error"));
}

#[test]
fn test_metadata_time_parsed() {
    let gpx = parse(&load_fixture("lake_loop.gpx")).unwrap();
    assert_eq!(
        gpx.metadata.time,
        Some(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap())
    );
    let bounds = gpx.metadata.bounds.unwrap();
    assert_eq!(bounds.min_lat, 45.43);
    assert_eq!(bounds.max_lon, 14.06);
}
