use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::GpxError;
use crate::model::*;

type Result<T> = std::result::Result<T, GpxError>;

const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";

/// Serialize a `Gpx` model to canonical GPX XML.
///
/// Re-parsing the output yields a model equal to the input: free text is
/// escaped on the way out and unescaped on the way in, and timestamps are
/// emitted in one canonical UTC form no matter which accepted variant they
/// were parsed from.
pub fn to_xml(gpx: &Gpx) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(into_xml_err)?;

    let mut root = BytesStart::new("gpx");
    if let Some(version) = &gpx.version {
        root.push_attribute(("version", version.as_str()));
    }
    if let Some(creator) = &gpx.creator {
        root.push_attribute(("creator", creator.as_str()));
    }
    root.push_attribute(("xmlns", GPX_NAMESPACE));
    writer.write_event(Event::Start(root)).map_err(into_xml_err)?;

    write_metadata(&mut writer, &gpx.metadata)?;
    for waypoint in &gpx.waypoints {
        write_point(&mut writer, "wpt", waypoint)?;
    }
    for route in &gpx.routes {
        write_route(&mut writer, route)?;
    }
    for track in &gpx.tracks {
        write_track(&mut writer, track)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("gpx")))
        .map_err(into_xml_err)?;

    // The writer only ever receives &str content, so the buffer is UTF-8.
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

/// Canonical timestamp form: RFC 3339, UTC `Z`, shortest fractional width
/// that loses nothing.
fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn into_xml_err<E: Into<quick_xml::Error>>(e: E) -> GpxError {
    GpxError::Xml(e.into())
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(into_xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(into_xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(into_xml_err)?;
    Ok(())
}

fn write_opt<W: Write>(writer: &mut Writer<W>, name: &str, text: &Option<String>) -> Result<()> {
    if let Some(text) = text {
        write_text_element(writer, name, text)?;
    }
    Ok(())
}

fn write_metadata<W: Write>(writer: &mut Writer<W>, metadata: &Metadata) -> Result<()> {
    if *metadata == Metadata::default() {
        return Ok(());
    }

    writer
        .write_event(Event::Start(BytesStart::new("metadata")))
        .map_err(into_xml_err)?;
    write_opt(writer, "name", &metadata.name)?;
    write_opt(writer, "desc", &metadata.desc)?;
    if let Some(author) = &metadata.author {
        writer
            .write_event(Event::Start(BytesStart::new("author")))
            .map_err(into_xml_err)?;
        write_text_element(writer, "name", author)?;
        writer
            .write_event(Event::End(BytesEnd::new("author")))
            .map_err(into_xml_err)?;
    }
    write_opt(writer, "keywords", &metadata.keywords)?;
    if let Some(time) = &metadata.time {
        write_text_element(writer, "time", &format_timestamp(time))?;
    }
    if let Some(bounds) = &metadata.bounds {
        write_bounds(writer, bounds)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("metadata")))
        .map_err(into_xml_err)?;
    Ok(())
}

fn write_bounds<W: Write>(writer: &mut Writer<W>, bounds: &Bounds) -> Result<()> {
    let mut e = BytesStart::new("bounds");
    e.push_attribute(("minlat", bounds.min_lat.to_string().as_str()));
    e.push_attribute(("minlon", bounds.min_lon.to_string().as_str()));
    e.push_attribute(("maxlat", bounds.max_lat.to_string().as_str()));
    e.push_attribute(("maxlon", bounds.max_lon.to_string().as_str()));
    writer.write_event(Event::Empty(e)).map_err(into_xml_err)?;
    Ok(())
}

fn write_link<W: Write>(writer: &mut Writer<W>, link: &Link) -> Result<()> {
    let mut start = BytesStart::new("link");
    start.push_attribute(("href", link.href.as_str()));
    if link.text.is_none() && link.link_type.is_none() {
        writer.write_event(Event::Empty(start)).map_err(into_xml_err)?;
        return Ok(());
    }
    writer.write_event(Event::Start(start)).map_err(into_xml_err)?;
    write_opt(writer, "text", &link.text)?;
    write_opt(writer, "type", &link.link_type)?;
    writer
        .write_event(Event::End(BytesEnd::new("link")))
        .map_err(into_xml_err)?;
    Ok(())
}

/// Emit a point as `wpt`, `rtept` or `trkpt`. Points with no children
/// collapse to an empty element.
fn write_point<W: Write>(writer: &mut Writer<W>, tag: &str, point: &Point) -> Result<()> {
    let mut start = BytesStart::new(tag);
    start.push_attribute(("lat", point.lat.to_string().as_str()));
    start.push_attribute(("lon", point.lon.to_string().as_str()));

    let bare = point.ele.is_none()
        && point.time.is_none()
        && point.name.is_none()
        && point.cmt.is_none()
        && point.desc.is_none()
        && point.src.is_none()
        && point.sym.is_none()
        && point.point_type.is_none()
        && point.link.is_none();
    if bare {
        writer.write_event(Event::Empty(start)).map_err(into_xml_err)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(into_xml_err)?;
    if let Some(ele) = point.ele {
        write_text_element(writer, "ele", &ele.to_string())?;
    }
    if let Some(time) = &point.time {
        write_text_element(writer, "time", &format_timestamp(time))?;
    }
    write_opt(writer, "name", &point.name)?;
    write_opt(writer, "cmt", &point.cmt)?;
    write_opt(writer, "desc", &point.desc)?;
    write_opt(writer, "src", &point.src)?;
    if let Some(link) = &point.link {
        write_link(writer, link)?;
    }
    write_opt(writer, "sym", &point.sym)?;
    write_opt(writer, "type", &point.point_type)?;
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(into_xml_err)?;
    Ok(())
}

fn write_route<W: Write>(writer: &mut Writer<W>, route: &Route) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("rte")))
        .map_err(into_xml_err)?;
    write_opt(writer, "name", &route.name)?;
    write_opt(writer, "cmt", &route.cmt)?;
    write_opt(writer, "desc", &route.desc)?;
    write_opt(writer, "src", &route.src)?;
    if let Some(link) = &route.link {
        write_link(writer, link)?;
    }
    if let Some(number) = route.number {
        write_text_element(writer, "number", &number.to_string())?;
    }
    write_opt(writer, "type", &route.route_type)?;
    for point in &route.points {
        write_point(writer, "rtept", point)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("rte")))
        .map_err(into_xml_err)?;
    Ok(())
}

fn write_track<W: Write>(writer: &mut Writer<W>, track: &Track) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("trk")))
        .map_err(into_xml_err)?;
    write_opt(writer, "name", &track.name)?;
    write_opt(writer, "cmt", &track.cmt)?;
    write_opt(writer, "desc", &track.desc)?;
    write_opt(writer, "src", &track.src)?;
    if let Some(link) = &track.link {
        write_link(writer, link)?;
    }
    if let Some(number) = track.number {
        write_text_element(writer, "number", &number.to_string())?;
    }
    write_opt(writer, "type", &track.track_type)?;
    for segment in &track.segments {
        if segment.points.is_empty() {
            writer
                .write_event(Event::Empty(BytesStart::new("trkseg")))
                .map_err(into_xml_err)?;
            continue;
        }
        writer
            .write_event(Event::Start(BytesStart::new("trkseg")))
            .map_err(into_xml_err)?;
        for point in &segment.points {
            write_point(writer, "trkpt", point)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("trkseg")))
            .map_err(into_xml_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("trk")))
        .map_err(into_xml_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use chrono::TimeZone;

    #[test]
    fn test_escapes_markup_in_free_text() {
        let mut gpx = Gpx::default();
        let mut pt = Point::new(45.0, 14.0);
        pt.name = Some("Café <& Bar>".to_string());
        gpx.waypoints.push(pt);

        let xml = to_xml(&gpx).unwrap();
        assert!(xml.contains("Café &lt;&amp; Bar&gt;"));

        let reparsed = parse(&xml).unwrap();
        assert_eq!(reparsed.waypoints[0].name.as_deref(), Some("Café <& Bar>"));
    }

    #[test]
    fn test_canonical_timestamp_format() {
        let mut gpx = Gpx::default();
        let mut pt = Point::new(45.0, 14.0);
        pt.time = Some(Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap());
        gpx.tracks.push(Track {
            segments: vec![TrackSegment { points: vec![pt] }],
            ..Default::default()
        });

        let xml = to_xml(&gpx).unwrap();
        assert!(xml.contains("<time>2024-06-01T10:00:00Z</time>"));
    }

    #[test]
    fn test_bare_point_is_empty_element() {
        let mut gpx = Gpx::default();
        gpx.waypoints.push(Point::new(45.5, 14.25));
        let xml = to_xml(&gpx).unwrap();
        assert!(xml.contains(r#"<wpt lat="45.5" lon="14.25"/>"#));
    }

    #[test]
    fn test_empty_segment_emitted() {
        let mut gpx = Gpx::default();
        gpx.tracks.push(Track {
            segments: vec![TrackSegment::default()],
            ..Default::default()
        });
        let xml = to_xml(&gpx).unwrap();
        assert!(xml.contains("<trkseg/>"));

        let reparsed = parse(&xml).unwrap();
        assert_eq!(reparsed.tracks[0].segments.len(), 1);
    }

    #[test]
    fn test_bare_link_roundtrip() {
        // A link with neither text nor type collapses to a self-closing
        // element; route and track links must survive the reparse just
        // like point links do.
        let bare = Link {
            href: "https://example.com/activity".to_string(),
            text: None,
            link_type: None,
        };
        let mut gpx = Gpx::default();
        gpx.routes.push(Route {
            link: Some(bare.clone()),
            points: vec![Point::new(45.0, 14.0)],
            ..Default::default()
        });
        gpx.tracks.push(Track {
            link: Some(bare.clone()),
            segments: vec![TrackSegment {
                points: vec![Point::new(45.0, 14.0)],
            }],
            ..Default::default()
        });
        let mut pt = Point::new(45.1, 14.1);
        pt.link = Some(bare);
        gpx.waypoints.push(pt);

        let gpx2 = parse(&to_xml(&gpx).unwrap()).unwrap();
        assert_eq!(gpx2, gpx);
    }

    #[test]
    fn test_metadata_roundtrip() {
        let mut gpx = Gpx::default();
        gpx.version = Some("1.1".to_string());
        gpx.creator = Some("gpxcore".to_string());
        gpx.metadata = Metadata {
            name: Some("A name".to_string()),
            desc: Some("A description".to_string()),
            author: Some("Jane Hiker".to_string()),
            keywords: Some("lake, hike".to_string()),
            time: Some(Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()),
            bounds: Some(Bounds {
                min_lat: 45.0,
                max_lat: 45.5,
                min_lon: 13.9,
                max_lon: 14.2,
            }),
        };

        let reparsed = parse(&to_xml(&gpx).unwrap()).unwrap();
        assert_eq!(reparsed, gpx);
    }
}
