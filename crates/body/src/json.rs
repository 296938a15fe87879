use crate::error::{BodyError, BoxError};
use crate::options::Options;
use crate::text::text;
use http::HeaderMap;
use http_body::Body;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Reads the body as text and parses it with the configured JSON parser,
/// [`parse_json`] unless overridden.
pub async fn json<B>(body: B, headers: &HeaderMap, options: &Options) -> Result<Value, BodyError>
where
    B: Body + Send + 'static,
    B::Error: Into<BoxError>,
{
    let text = text(body, headers, options).await?;
    match options.get_json_parse() {
        Some(parse) => parse(&text),
        None => parse_json(&text),
    }
}

/// Like [`json`], then deserializes the value into `T`.
///
/// # Example
/// ```
/// # use serde::Deserialize;
/// # use micro_body::{json_as, BodyError, Options};
/// # use bytes::Bytes;
/// # use http::HeaderMap;
/// # use http_body_util::Full;
/// # #[allow(dead_code)]
/// #[derive(Deserialize, Debug)]
/// struct Params {
///     name: String,
///     zip: String,
/// }
///
/// pub async fn handle(body: Full<Bytes>, headers: &HeaderMap) -> Result<Params, BodyError> {
///     json_as::<Params, _>(body, headers, &Options::new()).await
/// }
/// ```
pub async fn json_as<T, B>(body: B, headers: &HeaderMap, options: &Options) -> Result<T, BodyError>
where
    T: DeserializeOwned,
    B: Body + Send + 'static,
    B::Error: Into<BoxError>,
{
    let value = json(body, headers, options).await?;
    Ok(serde_json::from_value(value)?)
}

/// The default JSON parser.
///
/// An empty string is an empty object. Anything else must be an object or an
/// array, top level primitives are refused even when they are valid JSON.
pub fn parse_json(text: &str) -> Result<Value, BodyError> {
    if text.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    // allowed whitespace is defined in RFC 7159
    let start = text.trim_start_matches([' ', '\t', '\n', '\r']);
    if !start.starts_with(['{', '[']) {
        return Err(BodyError::InvalidJson);
    }

    Ok(serde_json::from_str(text)?)
}
