use chrono::{DateTime, NaiveDateTime, Utc};
use log::warn;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::GpxError;
use crate::model::*;
use crate::options::ParseOptions;

type Result<T> = std::result::Result<T, GpxError>;

/// Accepted timestamp formats without a numeric offset, tried in order.
/// `%.f` accepts one to nine fractional-second digits, so irregular
/// precision (e.g. `.2073437`) parses; a trailing `Z` marks UTC.
const TIME_FORMATS_UTC: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Accepted timestamp formats carrying a numeric offset.
const TIME_FORMATS_OFFSET: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%:z"];

/// Parse a GPX XML string with default (permissive) options.
pub fn parse(xml: &str) -> Result<Gpx> {
    parse_with_options(xml, &ParseOptions::default())
}

/// Parse raw bytes, honoring the encoding declared in the XML declaration
/// (or a byte-order mark), defaulting to UTF-8.
pub fn parse_bytes(input: &[u8], options: &ParseOptions) -> Result<Gpx> {
    let mut sniff = Reader::from_reader(input);
    let mut buf = Vec::new();
    // Reading one event is enough for the reader to pick up the declared
    // encoding; then decode the whole document with it.
    let _ = sniff.read_event_into(&mut buf);
    let text = sniff.decoder().decode(input)?;
    parse_with_options(&text, options)
}

/// Parse a GPX XML string into a `Gpx` model.
///
/// Unknown elements (including `<extensions>`) are skipped; recognized
/// elements with missing optional children simply leave those fields unset.
/// Only markup that is not well-formed fails the parse.
pub fn parse_with_options(xml: &str, options: &ParseOptions) -> Result<Gpx> {
    let mut reader = Reader::from_str(xml);
    let mut gpx = Gpx::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"gpx" => parse_gpx_attributes(&e, &mut gpx)?,
                b"metadata" => parse_metadata(&mut reader, options, &mut gpx.metadata)?,
                // GPX 1.0 keeps these directly under <gpx>.
                b"name" => gpx.metadata.name = Some(read_text_owned(&mut reader, &e)?),
                b"desc" => gpx.metadata.desc = Some(read_text_owned(&mut reader, &e)?),
                b"author" => {
                    gpx.metadata.author = Some(read_text_owned(&mut reader, &e)?.trim().to_string())
                }
                b"keywords" => gpx.metadata.keywords = Some(read_text_owned(&mut reader, &e)?),
                b"time" => {
                    let text = read_text_owned(&mut reader, &e)?;
                    gpx.metadata.time = parse_timestamp(&text, options)?;
                }
                b"bounds" => gpx.metadata.bounds = parse_bounds(&e)?,
                b"wpt" => {
                    if let Some(pt) = parse_point(&e, &mut reader, options)? {
                        gpx.waypoints.push(pt);
                    }
                }
                b"rte" => gpx.routes.push(parse_route(&mut reader, options)?),
                b"trk" => gpx.tracks.push(parse_track(&mut reader, options)?),
                _ => {
                    reader.read_to_end(e.name()).map_err(GpxError::Xml)?;
                }
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"wpt" => {
                    if let Some((lat, lon)) = parse_lat_lon(&e)? {
                        gpx.waypoints.push(Point::new(lat, lon));
                    }
                }
                b"bounds" => gpx.metadata.bounds = parse_bounds(&e)?,
                b"gpx" => parse_gpx_attributes(&e, &mut gpx)?,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(GpxError::Xml(e)),
            _ => {}
        }
    }

    Ok(gpx)
}

/// Try every accepted timestamp format in order. In permissive mode an
/// unrecognized string is logged and dropped; in strict mode it fails
/// the parse.
fn parse_timestamp(text: &str, options: &ParseOptions) -> Result<Option<DateTime<Utc>>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    for format in TIME_FORMATS_UTC {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Some(naive.and_utc()));
        }
    }
    for format in TIME_FORMATS_OFFSET {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Ok(Some(dt.with_timezone(&Utc)));
        }
    }
    if options.strict_timestamps {
        Err(GpxError::Timestamp(text.to_string()))
    } else {
        warn!("dropping timestamp '{text}': matches no accepted format");
        Ok(None)
    }
}

/// Read version/creator off the root element.
fn parse_gpx_attributes(e: &BytesStart<'_>, gpx: &mut Gpx) -> Result<()> {
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| GpxError::Xml(e.into()))?;
        let val = std::str::from_utf8(&attr.value).unwrap_or_default();
        match attr.key.local_name().as_ref() {
            b"version" => gpx.version = Some(val.to_string()),
            b"creator" => gpx.creator = Some(val.to_string()),
            _ => {}
        }
    }
    Ok(())
}

/// Parse a GPX 1.1 <metadata> block.
fn parse_metadata<'a>(
    reader: &mut Reader<&'a [u8]>,
    options: &ParseOptions,
    metadata: &mut Metadata,
) -> Result<()> {
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"name" => metadata.name = Some(read_text_owned(reader, &e)?),
                b"desc" => metadata.desc = Some(read_text_owned(reader, &e)?),
                // 1.1 nests <author><name>..</name></author>; accumulating
                // the text events flattens either shape to the author name.
                // Trimmed, since nested form may carry layout whitespace.
                b"author" => {
                    metadata.author = Some(read_text_owned(reader, &e)?.trim().to_string())
                }
                b"keywords" => metadata.keywords = Some(read_text_owned(reader, &e)?),
                b"time" => {
                    let text = read_text_owned(reader, &e)?;
                    metadata.time = parse_timestamp(&text, options)?;
                }
                b"bounds" => metadata.bounds = parse_bounds(&e)?,
                _ => {
                    reader.read_to_end(e.name()).map_err(GpxError::Xml)?;
                }
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"bounds" {
                    metadata.bounds = parse_bounds(&e)?;
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"metadata" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(GpxError::Xml(e)),
            _ => {}
        }
    }
    Ok(())
}

/// Parse a <bounds> element's four corner attributes. Returns `None`
/// unless all four parse.
fn parse_bounds(e: &BytesStart<'_>) -> Result<Option<Bounds>> {
    let mut min_lat = None;
    let mut max_lat = None;
    let mut min_lon = None;
    let mut max_lon = None;

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| GpxError::Xml(e.into()))?;
        let val = std::str::from_utf8(&attr.value).unwrap_or_default();
        match attr.key.local_name().as_ref() {
            b"minlat" => min_lat = val.parse::<f64>().ok(),
            b"maxlat" => max_lat = val.parse::<f64>().ok(),
            b"minlon" => min_lon = val.parse::<f64>().ok(),
            b"maxlon" => max_lon = val.parse::<f64>().ok(),
            _ => {}
        }
    }

    Ok(match (min_lat, max_lat, min_lon, max_lon) {
        (Some(min_lat), Some(max_lat), Some(min_lon), Some(max_lon)) => Some(Bounds {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }),
        _ => None,
    })
}

/// Parse lat/lon attributes from a point element's start tag. Returns
/// `None` when either is missing, unparseable, non-finite, or out of
/// range; the caller skips such points.
fn parse_lat_lon(e: &BytesStart<'_>) -> Result<Option<(f64, f64)>> {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| GpxError::Xml(e.into()))?;
        let val = std::str::from_utf8(&attr.value).unwrap_or_default();
        match attr.key.local_name().as_ref() {
            b"lat" => lat = val.parse::<f64>().ok(),
            b"lon" => lon = val.parse::<f64>().ok(),
            _ => {}
        }
    }

    Ok(match (lat, lon) {
        (Some(lat), Some(lon)) if valid_coordinates(lat, lon) => Some((lat, lon)),
        _ => None,
    })
}

fn valid_coordinates(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Parse a point element (wpt, rtept, trkpt) and its children.
/// Called after receiving Event::Start for the point element.
fn parse_point<'a>(
    start: &BytesStart<'a>,
    reader: &mut Reader<&'a [u8]>,
    options: &ParseOptions,
) -> Result<Option<Point>> {
    let Some((lat, lon)) = parse_lat_lon(start)? else {
        // Skip this point if lat/lon are missing or invalid
        reader.read_to_end(start.name()).map_err(GpxError::Xml)?;
        return Ok(None);
    };

    let mut point = Point::new(lat, lon);
    let end_name = start.name().0.to_vec(); // own the end tag name for comparison

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"ele" => {
                    let text = reader.read_text(e.name()).map_err(GpxError::Xml)?;
                    point.ele = text.parse::<f64>().ok();
                }
                b"time" => {
                    let text = read_text_owned(reader, &e)?;
                    point.time = parse_timestamp(&text, options)?;
                }
                b"name" => point.name = Some(read_text_owned(reader, &e)?),
                b"cmt" => point.cmt = Some(read_text_owned(reader, &e)?),
                b"desc" => point.desc = Some(read_text_owned(reader, &e)?),
                b"src" => point.src = Some(read_text_owned(reader, &e)?),
                b"sym" => point.sym = Some(read_text_owned(reader, &e)?),
                b"type" => point.point_type = Some(read_text_owned(reader, &e)?),
                b"link" => point.link = Some(parse_link(&e, reader)?),
                _ => {
                    // Skip unknown/extensions elements
                    reader.read_to_end(e.name()).map_err(GpxError::Xml)?;
                }
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"link" => {
                point.link = Some(link_from_attributes(&e)?);
            }
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(GpxError::Xml(e)),
            _ => {}
        }
    }

    Ok(Some(point))
}

fn link_from_attributes(e: &BytesStart<'_>) -> Result<Link> {
    let mut href = String::new();
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| GpxError::Xml(e.into()))?;
        if attr.key.local_name().as_ref() == b"href" {
            href = std::str::from_utf8(&attr.value).unwrap_or_default().to_string();
        }
    }
    Ok(Link {
        href,
        text: None,
        link_type: None,
    })
}

/// Parse a <link> element.
fn parse_link<'a>(start: &BytesStart<'a>, reader: &mut Reader<&'a [u8]>) -> Result<Link> {
    let mut link = link_from_attributes(start)?;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"text" => link.text = Some(read_text_owned(reader, &e)?),
                b"type" => link.link_type = Some(read_text_owned(reader, &e)?),
                _ => {
                    reader.read_to_end(e.name()).map_err(GpxError::Xml)?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"link" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(GpxError::Xml(e)),
            _ => {}
        }
    }

    Ok(link)
}

/// Parse a <rte> element.
fn parse_route<'a>(reader: &mut Reader<&'a [u8]>, options: &ParseOptions) -> Result<Route> {
    let mut route = Route::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"name" => route.name = Some(read_text_owned(reader, &e)?),
                b"cmt" => route.cmt = Some(read_text_owned(reader, &e)?),
                b"desc" => route.desc = Some(read_text_owned(reader, &e)?),
                b"src" => route.src = Some(read_text_owned(reader, &e)?),
                b"type" => route.route_type = Some(read_text_owned(reader, &e)?),
                b"number" => {
                    let text = read_text_owned(reader, &e)?;
                    route.number = text.trim().parse::<u32>().ok();
                }
                b"link" => route.link = Some(parse_link(&e, reader)?),
                b"rtept" => {
                    if let Some(pt) = parse_point(&e, reader, options)? {
                        route.points.push(pt);
                    }
                }
                _ => {
                    reader.read_to_end(e.name()).map_err(GpxError::Xml)?;
                }
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"rtept" => {
                    if let Some((lat, lon)) = parse_lat_lon(&e)? {
                        route.points.push(Point::new(lat, lon));
                    }
                }
                b"link" => route.link = Some(link_from_attributes(&e)?),
                _ => {}
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"rte" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(GpxError::Xml(e)),
            _ => {}
        }
    }

    Ok(route)
}

/// Parse a <trk> element.
fn parse_track<'a>(reader: &mut Reader<&'a [u8]>, options: &ParseOptions) -> Result<Track> {
    let mut track = Track::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"name" => track.name = Some(read_text_owned(reader, &e)?),
                b"cmt" => track.cmt = Some(read_text_owned(reader, &e)?),
                b"desc" => track.desc = Some(read_text_owned(reader, &e)?),
                b"src" => track.src = Some(read_text_owned(reader, &e)?),
                b"type" => track.track_type = Some(read_text_owned(reader, &e)?),
                b"number" => {
                    let text = read_text_owned(reader, &e)?;
                    track.number = text.trim().parse::<u32>().ok();
                }
                b"link" => track.link = Some(parse_link(&e, reader)?),
                // Empty segments are kept: a segment with no points is
                // still part of the track's structure (and counts as
                // trivially timestamped for has_times).
                b"trkseg" => track.segments.push(parse_segment(reader, options)?),
                _ => {
                    reader.read_to_end(e.name()).map_err(GpxError::Xml)?;
                }
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"trkseg" => track.segments.push(TrackSegment::default()),
                b"link" => track.link = Some(link_from_attributes(&e)?),
                _ => {}
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trk" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(GpxError::Xml(e)),
            _ => {}
        }
    }

    Ok(track)
}

/// Parse a <trkseg> element.
fn parse_segment<'a>(reader: &mut Reader<&'a [u8]>, options: &ParseOptions) -> Result<TrackSegment> {
    let mut segment = TrackSegment::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trkpt" => {
                    if let Some(pt) = parse_point(&e, reader, options)? {
                        segment.points.push(pt);
                    }
                }
                _ => {
                    reader.read_to_end(e.name()).map_err(GpxError::Xml)?;
                }
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"trkpt" {
                    if let Some((lat, lon)) = parse_lat_lon(&e)? {
                        segment.points.push(Point::new(lat, lon));
                    }
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trkseg" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(GpxError::Xml(e)),
            _ => {}
        }
    }

    Ok(segment)
}

/// Read text content of an element as an owned String.
/// Handles regular text, CDATA sections, and entity references (Event::GeneralRef).
fn read_text_owned<'a>(reader: &mut Reader<&'a [u8]>, start: &BytesStart<'_>) -> Result<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                let raw = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                text.push_str(raw);
            }
            Ok(Event::CData(e)) => {
                let s = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                text.push_str(s);
            }
            Ok(Event::GeneralRef(e)) => {
                // Handle character references (&#60; &#x3C;) and predefined entities
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    text.push(ch);
                } else {
                    let name = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                    match name {
                        "amp" => text.push('&'),
                        "lt" => text.push('<'),
                        "gt" => text.push('>'),
                        "quot" => text.push('"'),
                        "apos" => text.push('\''),
                        _ => {} // Unknown entity, skip
                    }
                }
            }
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(GpxError::Xml(e)),
            _ => {}
        }
    }

    Ok(text)
}
