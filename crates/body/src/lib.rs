//! Content-type negotiated body parsing.
//!
//! This crate turns an [`http_body::Body`] into a value the application can use,
//! choosing how to read it from the message headers:
//!
//! 1. the `content-type` (without parameters) selects the format, see [`get_type`]
//!    and the [`JSON_TYPES`], [`FORM_TYPES`] and [`TEXT_TYPES`] tables
//! 2. the `content-encoding` selects a decompressor, see [`inflate`] and [`Decoders`]
//! 3. the decoded body is buffered up to a limit and decoded into text, see [`text`]
//! 4. the text is parsed as JSON ([`json`]) or as a url encoded form ([`form`])
//!
//! Every step can fail with a [`BodyError`], which carries the HTTP status the
//! failure should be answered with.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use http::HeaderMap;
//! use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
//! use http_body_util::Full;
//! use micro_body::{parse, Options, ParsedBody};
//!
//! # async fn run() -> Result<(), micro_body::BodyError> {
//! let mut headers = HeaderMap::new();
//! headers.insert(CONTENT_TYPE, "application/json; charset=utf-8".parse().unwrap());
//! headers.insert(CONTENT_LENGTH, 17.into());
//!
//! let body = Full::new(Bytes::from_static(br#"{"hello":"world"}"#));
//! let parsed = parse(body, &headers, &Options::new()).await?;
//! assert_eq!(parsed, ParsedBody::Json(serde_json::json!({"hello": "world"})));
//! # Ok(())
//! # }
//! ```

mod content_type;
mod decode;
mod error;
mod form;
mod json;
mod options;
mod parse;
mod text;

pub use content_type::FORM_TYPES;
pub use content_type::JSON_TYPES;
pub use content_type::TEXT_TYPES;
pub use content_type::get_type;

pub use decode::BoxBody;
pub use decode::Codec;
pub use decode::ContentDecoder;
pub use decode::DECODERS;
pub use decode::Decoders;
pub use decode::InflateError;
pub use decode::Inflated;
pub use decode::inflate;

pub use error::BodyError;
pub use error::BoxError;

pub use form::FormData;
pub use form::FormValue;
pub use form::MAX_FORM_KEYS;
pub use form::form;
pub use form::form_as;
pub use form::parse_form;

pub use json::json;
pub use json::json_as;
pub use json::parse_json;

pub use options::DEFAULT_ENCODING;
pub use options::DEFAULT_LIMIT;
pub use options::FormParser;
pub use options::JsonParser;
pub use options::Options;

pub use parse::ParsedBody;
pub use parse::parse;

pub use text::text;
