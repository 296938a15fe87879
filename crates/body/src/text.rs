//! Buffering a body into a string.

use crate::decode::{BoxBody, Inflated, inflate};
use crate::error::{BodyError, BoxError};
use crate::options::Options;
use bytes::{Bytes, BytesMut};
use encoding_rs::Encoding;
use http::HeaderMap;
use http_body::Body;
use http_body_util::BodyExt;
use tracing::{trace, warn};

/// Reads the whole body as text.
///
/// The body is decoded according to its `content-encoding` first, then at most
/// `limit` bytes are buffered and turned into a string with the configured
/// character encoding. Identity encoded bodies must match their
/// `content-length` exactly.
pub async fn text<B>(body: B, headers: &HeaderMap, options: &Options) -> Result<String, BodyError>
where
    B: Body + Send + 'static,
    B::Error: Into<BoxError>,
{
    let Inflated { body, length } = inflate(body, headers, options.get_decoders())?;

    let limit = options.get_limit();
    if let Some(length) = length.filter(|length| *length > limit as u64) {
        warn!(length, limit, "declared content-length exceeds the limit");
        return Err(BodyError::payload_too_large(limit));
    }

    let charset = options.get_encoding();
    let encoding = Encoding::for_label(charset.as_bytes()).ok_or_else(|| BodyError::unsupported_charset(charset))?;

    let bytes = read_limited(body, length, limit).await?;
    let (text, had_errors) = encoding.decode_with_bom_removal(&bytes);
    if had_errors {
        trace!(encoding = encoding.name(), "malformed sequences replaced while decoding body");
    }
    Ok(text.into_owned())
}

/// Collects the data frames of `body`, failing as soon as more than `limit`
/// bytes arrive.
async fn read_limited(mut body: BoxBody, length: Option<u64>, limit: usize) -> Result<Bytes, BodyError> {
    let capacity = length.and_then(|length| usize::try_from(length).ok()).unwrap_or(0);
    let mut buf = BytesMut::with_capacity(capacity);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(BodyError::stream)?;
        let Ok(data) = frame.into_data() else {
            // trailers carry no payload
            continue;
        };

        if buf.len() + data.len() > limit {
            warn!(limit, received = buf.len() + data.len(), "body exceeds the limit");
            return Err(BodyError::payload_too_large(limit));
        }
        buf.extend_from_slice(&data);
        trace!(chunk = data.len(), received = buf.len(), "buffered body chunk");
    }

    let received = buf.len() as u64;
    match length {
        Some(expected) if expected != received => {
            warn!(expected, received, "body length does not match content-length");
            Err(BodyError::length_mismatch(expected, received))
        }
        _ => Ok(buf.freeze()),
    }
}
