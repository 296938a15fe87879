//! Content-type resolution and the default dispatch tables.

use http::HeaderMap;
use http::header::CONTENT_TYPE;

/// Content types parsed as JSON unless overridden.
pub const JSON_TYPES: &[&str] = &["application/json"];

/// Content types parsed as `application/x-www-form-urlencoded` unless overridden.
pub const FORM_TYPES: &[&str] = &["application/x-www-form-urlencoded"];

/// Content types returned as plain text unless overridden.
pub const TEXT_TYPES: &[&str] = &["text/plain", "text/html"];

/// Returns the `content-type` of `headers` without its parameters.
///
/// Only the first value is considered when the header is repeated. The type is
/// returned verbatim: no case folding and no trimming, so it must be compared
/// against type lists written the way senders write them.
///
/// Empty values and values that are not visible ASCII are treated as absent.
pub fn get_type(headers: &HeaderMap) -> Option<&str> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    if content_type.is_empty() {
        return None;
    }

    match content_type.find(';') {
        Some(index) => Some(&content_type[..index]),
        None => Some(content_type),
    }
}

/// The format a content type dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    Json,
    Form,
    Text,
}

/// Checks json, form then text types in that order, the first list containing
/// `content_type` wins.
pub(crate) fn select_format(
    content_type: &str,
    json_types: &[&str],
    form_types: &[&str],
    text_types: &[&str],
) -> Option<Format> {
    if json_types.contains(&content_type) {
        Some(Format::Json)
    } else if form_types.contains(&content_type) {
        Some(Format::Form)
    } else if text_types.contains(&content_type) {
        Some(Format::Text)
    } else {
        None
    }
}
