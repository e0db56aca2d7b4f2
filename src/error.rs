use thiserror::Error;

/// Errors surfaced by parsing, writing and querying GPX data.
///
/// The `Display` text of a returned error is the full description of what
/// went wrong; callers that want to inspect a failed parse after the fact
/// keep the error value around instead of querying a global accessor.
#[derive(Debug, Error)]
pub enum GpxError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("could not decode input bytes: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    #[error("unparseable timestamp '{0}'")]
    Timestamp(String),

    #[error("no track points to search")]
    EmptyDataSet,
}
