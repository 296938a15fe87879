use crate::decode::Decoders;
use crate::error::BodyError;
use crate::form::FormData;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// 100kb.
pub const DEFAULT_LIMIT: usize = 100 * 1024;

pub const DEFAULT_ENCODING: &str = "utf8";

/// Replaces [`parse_json`](crate::parse_json) for a call.
pub type JsonParser = Arc<dyn Fn(&str) -> Result<Value, BodyError> + Send + Sync>;

/// Replaces [`parse_form`](crate::parse_form) for a call.
pub type FormParser = Arc<dyn Fn(&str) -> Result<FormData, BodyError> + Send + Sync>;

/// Per call settings, anything left unset falls back to the crate defaults.
///
/// # Example
/// ```
/// use micro_body::{Decoders, Options};
///
/// let options = Options::new()
///     .limit(1024 * 1024)
///     .encoding("latin1")
///     .decoders(Decoders::all())
///     .json_types(["application/json", "application/vnd.api+json"]);
/// # let _ = options;
/// ```
#[derive(Clone, Default)]
pub struct Options {
    limit: Option<usize>,
    encoding: Option<String>,
    decoders: Option<Decoders>,
    json_types: Option<Vec<String>>,
    form_types: Option<Vec<String>>,
    text_types: Option<Vec<String>>,
    json_parse: Option<JsonParser>,
    form_parse: Option<FormParser>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of decoded bytes buffered before failing, `0` keeps
    /// [`DEFAULT_LIMIT`].
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Character encoding label used to turn the body into text, e.g. `utf8`
    /// or `latin1`.
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Replaces the whole decoder registry.
    pub fn decoders(mut self, decoders: Decoders) -> Self {
        self.decoders = Some(decoders);
        self
    }

    pub fn json_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.json_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn form_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.form_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn text_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.text_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn json_parse<F>(mut self, parse: F) -> Self
    where
        F: Fn(&str) -> Result<Value, BodyError> + Send + Sync + 'static,
    {
        self.json_parse = Some(Arc::new(parse));
        self
    }

    pub fn form_parse<F>(mut self, parse: F) -> Self
    where
        F: Fn(&str) -> Result<FormData, BodyError> + Send + Sync + 'static,
    {
        self.form_parse = Some(Arc::new(parse));
        self
    }

    pub(crate) fn get_limit(&self) -> usize {
        self.limit.filter(|limit| *limit != 0).unwrap_or(DEFAULT_LIMIT)
    }

    pub(crate) fn get_encoding(&self) -> &str {
        self.encoding.as_deref().unwrap_or(DEFAULT_ENCODING)
    }

    pub(crate) fn get_decoders(&self) -> Option<&Decoders> {
        self.decoders.as_ref()
    }

    pub(crate) fn get_json_types(&self) -> Option<&[String]> {
        self.json_types.as_deref()
    }

    pub(crate) fn get_form_types(&self) -> Option<&[String]> {
        self.form_types.as_deref()
    }

    pub(crate) fn get_text_types(&self) -> Option<&[String]> {
        self.text_types.as_deref()
    }

    pub(crate) fn get_json_parse(&self) -> Option<&JsonParser> {
        self.json_parse.as_ref()
    }

    pub(crate) fn get_form_parse(&self) -> Option<&FormParser> {
        self.form_parse.as_ref()
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("limit", &self.limit)
            .field("encoding", &self.encoding)
            .field("decoders", &self.decoders)
            .field("json_types", &self.json_types)
            .field("form_types", &self.form_types)
            .field("text_types", &self.text_types)
            .field("json_parse", &self.json_parse.is_some())
            .field("form_parse", &self.form_parse.is_some())
            .finish()
    }
}
