//! GPX track data: a streaming parser, a canonical writer that round-trips
//! the model losslessly, nearest-point search over the track hierarchy, and
//! point-budget simplification.
//!
//! File and network I/O stay with the caller; the parser consumes text or
//! bytes already in memory and the writer returns a string.

mod error;
mod geom;
mod model;
mod options;
mod parser;
mod query;
mod simplify;
mod writer;

pub use error::GpxError;
pub use geom::{bearing, distance_2d};
pub use model::{Bounds, Gpx, Link, Metadata, Point, Route, Track, TrackSegment};
pub use options::ParseOptions;
pub use parser::{parse, parse_bytes, parse_with_options};
pub use query::{NearestLocation, nearest_location};
pub use simplify::reduce_points;
pub use writer::to_xml;
