use crate::error::{BodyError, BoxError};
use crate::options::Options;
use crate::text::text;
use http::HeaderMap;
use http_body::Body;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::mem;

/// Pairs past this count are ignored by [`parse_form`].
pub const MAX_FORM_KEYS: usize = 1000;

/// Decoded `application/x-www-form-urlencoded` data.
pub type FormData = HashMap<String, FormValue>;

/// The value of a form key, repeated keys collect every value in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormValue {
    Single(String),
    Multiple(Vec<String>),
}

impl FormValue {
    /// The first value sent for the key.
    pub fn first(&self) -> &str {
        match self {
            FormValue::Single(value) => value,
            FormValue::Multiple(values) => values.first().map_or("", String::as_str),
        }
    }

    pub fn values(&self) -> &[String] {
        match self {
            FormValue::Single(value) => std::slice::from_ref(value),
            FormValue::Multiple(values) => values,
        }
    }

    fn push(&mut self, value: String) {
        match self {
            FormValue::Single(first) => {
                let first = mem::take(first);
                *self = FormValue::Multiple(vec![first, value]);
            }
            FormValue::Multiple(values) => values.push(value),
        }
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        FormValue::Single(value.to_string())
    }
}

impl From<Vec<&str>> for FormValue {
    fn from(values: Vec<&str>) -> Self {
        FormValue::Multiple(values.into_iter().map(str::to_string).collect())
    }
}

/// Reads the body as text and decodes it with the configured form parser,
/// [`parse_form`] unless overridden.
pub async fn form<B>(body: B, headers: &HeaderMap, options: &Options) -> Result<FormData, BodyError>
where
    B: Body + Send + 'static,
    B::Error: Into<BoxError>,
{
    let text = text(body, headers, options).await?;
    match options.get_form_parse() {
        Some(parse) => parse(&text),
        None => parse_form(&text),
    }
}

/// Reads the body as text and deserializes it into `T` with `serde_urlencoded`.
///
/// # Example
/// ```
/// # use serde::Deserialize;
/// # use micro_body::{form_as, BodyError, Options};
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
///     form_as::<Params, _>(body, headers, &Options::new()).await
/// }
/// ```
pub async fn form_as<T, B>(body: B, headers: &HeaderMap, options: &Options) -> Result<T, BodyError>
where
    T: DeserializeOwned,
    B: Body + Send + 'static,
    B::Error: Into<BoxError>,
{
    let text = text(body, headers, options).await?;
    Ok(serde_urlencoded::from_str(&text)?)
}

/// The default form parser.
///
/// Keys and values are percent decoded with `+` read as a space, a key without
/// `=` gets an empty value. Only the first [`MAX_FORM_KEYS`] pairs are kept.
pub fn parse_form(text: &str) -> Result<FormData, BodyError> {
    let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(text)?;

    let mut form = FormData::new();
    for (key, value) in pairs.into_iter().take(MAX_FORM_KEYS) {
        match form.entry(key) {
            Entry::Occupied(mut entry) => entry.get_mut().push(value),
            Entry::Vacant(entry) => {
                entry.insert(FormValue::Single(value));
            }
        }
    }
    Ok(form)
}
