//! The content-encoding stage.
//!
//! [`inflate`] looks at the `content-encoding` header of a message and either
//! hands the body back untouched (together with the length announced by
//! `content-length`) or wraps it in a decompressing body taken from a
//! [`Decoders`] registry.

use crate::error::{BodyError, BoxError};
use bytes::{Buf, Bytes, BytesMut};
use http::HeaderMap;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH};
use http_body::Body;
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use tracing::debug;

mod decoder;

pub use decoder::Codec;

/// A type erased body stream.
pub type BoxBody = UnsyncBoxBody<Bytes, BoxError>;

/// The registry used when a call does not bring its own: `gzip` and `deflate`.
pub static DECODERS: Lazy<Decoders> = Lazy::new(Decoders::default);

/// Turns an encoded body into a decoded one.
///
/// Implemented by [`Codec`] and by any `Fn(BoxBody) -> BoxBody`.
pub trait ContentDecoder: Send + Sync {
    fn decode(&self, body: BoxBody) -> BoxBody;
}

impl<F> ContentDecoder for F
where
    F: Fn(BoxBody) -> BoxBody + Send + Sync,
{
    fn decode(&self, body: BoxBody) -> BoxBody {
        self(body)
    }
}

/// Maps content-encoding tokens to the decoder handling them.
///
/// Tokens are stored lowercased, lookups are expected to be lowercased too.
#[derive(Clone)]
pub struct Decoders {
    inner: HashMap<String, Arc<dyn ContentDecoder>>,
}

impl Decoders {
    /// An empty registry, every encoding except `identity` will be rejected.
    pub fn new() -> Self {
        Self { inner: HashMap::new() }
    }

    /// Every built in [`Codec`] under its own name.
    pub fn all() -> Self {
        [Codec::Gzip, Codec::Deflate, Codec::Br, Codec::Zstd]
            .into_iter()
            .fold(Self::new(), |decoders, codec| decoders.with(codec.name(), codec))
    }

    pub fn with<D: ContentDecoder + 'static>(mut self, token: impl Into<String>, decoder: D) -> Self {
        self.insert(token, decoder);
        self
    }

    pub fn insert<D: ContentDecoder + 'static>(&mut self, token: impl Into<String>, decoder: D) {
        self.inner.insert(token.into().to_ascii_lowercase(), Arc::new(decoder));
    }

    pub fn get(&self, token: &str) -> Option<&dyn ContentDecoder> {
        self.inner.get(token).map(|decoder| decoder.as_ref())
    }

    pub fn contains(&self, token: &str) -> bool {
        self.inner.contains_key(token)
    }
}

impl Default for Decoders {
    fn default() -> Self {
        Self::new().with(Codec::Gzip.name(), Codec::Gzip).with(Codec::Deflate.name(), Codec::Deflate)
    }
}

impl fmt::Debug for Decoders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tokens = self.inner.keys().collect::<Vec<_>>();
        tokens.sort();
        f.debug_struct("Decoders").field("tokens", &tokens).finish()
    }
}

/// A body ready to be buffered.
pub struct Inflated {
    /// The body, decoded when a content-encoding was applied.
    pub body: BoxBody,
    /// The length the body must have, only known for `identity` bodies.
    pub length: Option<u64>,
}

impl fmt::Debug for Inflated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inflated").field("length", &self.length).finish_non_exhaustive()
    }
}

/// Returned by [`inflate`] when no decoder matches the content-encoding.
///
/// The untouched body travels along with the error.
pub struct InflateError {
    error: BodyError,
    body: BoxBody,
}

impl InflateError {
    pub fn error(&self) -> &BodyError {
        &self.error
    }

    pub fn into_error(self) -> BodyError {
        self.error
    }

    pub fn into_body(self) -> BoxBody {
        self.body
    }

    pub fn into_parts(self) -> (BodyError, BoxBody) {
        (self.error, self.body)
    }
}

impl fmt::Debug for InflateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InflateError").field("error", &self.error).finish_non_exhaustive()
    }
}

impl fmt::Display for InflateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for InflateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<InflateError> for BodyError {
    fn from(e: InflateError) -> Self {
        e.error
    }
}

/// Applies the decoder matching the `content-encoding` header of `headers`.
///
/// Without the header the body is `identity` encoded and is returned as is,
/// with `length` taken from `content-length` (missing or malformed lengths
/// count as `0`). Encoded bodies have an unknown length.
///
/// `decoders` defaults to [`DECODERS`].
pub fn inflate<B>(body: B, headers: &HeaderMap, decoders: Option<&Decoders>) -> Result<Inflated, InflateError>
where
    B: Body + Send + 'static,
    B::Error: Into<BoxError>,
{
    let decoders = decoders.unwrap_or(Lazy::force(&DECODERS));
    let body = boxed(body);
    let encoding = content_encoding(headers);

    if encoding == "identity" {
        let length = content_length(headers);
        debug!(length, "identity content-encoding");
        return Ok(Inflated { body, length: Some(length) });
    }

    match decoders.get(&encoding) {
        Some(decoder) => {
            debug!(encoding = %encoding, "decoding body");
            Ok(Inflated { body: decoder.decode(body), length: None })
        }
        None => {
            debug!(encoding = %encoding, "unsupported content-encoding");
            Err(InflateError { error: BodyError::unsupported_content_encoding(encoding), body })
        }
    }
}

/// Erases the body type, copying each data frame into [`Bytes`].
pub(crate) fn boxed<B>(body: B) -> BoxBody
where
    B: Body + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_frame(|frame| frame.map_data(|mut data| data.copy_to_bytes(data.remaining())))
        .map_err(Into::into)
        .boxed_unsync()
}

/// The lowercased content-encoding, repeated headers are joined with `,`.
/// A missing or empty header means `identity`.
fn content_encoding(headers: &HeaderMap) -> String {
    let values = headers
        .get_all(CONTENT_ENCODING)
        .iter()
        .map(|value| String::from_utf8_lossy(value.as_bytes()))
        .collect::<Vec<_>>();

    let encoding = values.join(",").to_lowercase();
    if encoding.is_empty() { "identity".to_string() } else { encoding }
}

fn content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

// inspired by from actix-http
pub(crate) struct Writer {
    buf: BytesMut,
}

impl Writer {
    fn new() -> Self {
        Self { buf: BytesMut::with_capacity(4096) }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Splits off at most `max` of the buffered bytes.
    fn take(&mut self, max: usize) -> Bytes {
        let at = self.buf.len().min(max);
        self.buf.split_to(at).freeze()
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
