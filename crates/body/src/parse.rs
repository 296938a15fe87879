use crate::content_type::{FORM_TYPES, Format, JSON_TYPES, TEXT_TYPES, get_type, select_format};
use crate::error::{BodyError, BoxError};
use crate::form::{FormData, form};
use crate::json::json;
use crate::options::Options;
use crate::text::text;
use http::HeaderMap;
use http_body::Body;
use serde_json::Value;
use tracing::debug;

/// A body parsed according to its content-type.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Text(String),
    Json(Value),
    Form(FormData),
}

impl ParsedBody {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParsedBody::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ParsedBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_form(&self) -> Option<&FormData> {
        match self {
            ParsedBody::Form(form) => Some(form),
            _ => None,
        }
    }
}

/// Parses the body according to its `content-type`.
///
/// The type, stripped of its parameters, is looked up in the json types, then
/// the form types, then the text types; the first list containing it decides
/// how the body is read.
///
/// # Errors
/// Fails with a `415` when the content-type is missing or in none of the lists,
/// otherwise with whatever [`json`], [`form`] or [`text`] fails with.
pub async fn parse<B>(body: B, headers: &HeaderMap, options: &Options) -> Result<ParsedBody, BodyError>
where
    B: Body + Send + 'static,
    B::Error: Into<BoxError>,
{
    let Some(content_type) = get_type(headers) else {
        debug!("request has no content-type");
        return Err(BodyError::MissingContentType);
    };

    let json_types = types(options.get_json_types(), JSON_TYPES);
    let form_types = types(options.get_form_types(), FORM_TYPES);
    let text_types = types(options.get_text_types(), TEXT_TYPES);

    let Some(format) = select_format(content_type, &json_types, &form_types, &text_types) else {
        debug!(content_type, "unsupported content-type");
        return Err(BodyError::unsupported_content_type(content_type));
    };

    debug!(content_type, ?format, "parsing body");
    match format {
        Format::Json => json(body, headers, options).await.map(ParsedBody::Json),
        Format::Form => form(body, headers, options).await.map(ParsedBody::Form),
        Format::Text => text(body, headers, options).await.map(ParsedBody::Text),
    }
}

fn types<'a>(configured: Option<&'a [String]>, defaults: &'a [&'a str]) -> Vec<&'a str> {
    match configured {
        Some(types) => types.iter().map(String::as_str).collect(),
        None => defaults.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Decoders;
    use crate::form::FormValue;
    use bytes::Bytes;
    use flate2::Compression;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
    use http::{HeaderValue, StatusCode};
    use http_body_util::Full;
    use serde_json::json;
    use std::io::Write;

    struct TestRequest {
        body: Bytes,
        headers: HeaderMap,
    }

    impl TestRequest {
        fn new(body: impl Into<Bytes>) -> Self {
            let body = body.into();
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
            Self { body, headers }
        }

        fn header(mut self, name: http::header::HeaderName, value: &'static str) -> Self {
            self.headers.insert(name, HeaderValue::from_static(value));
            self
        }

        fn content_type(self, value: &'static str) -> Self {
            self.header(CONTENT_TYPE, value)
        }

        /// Compresses the body, the length is unknown afterwards.
        fn encoded(mut self, encoding: &'static str) -> Self {
            let compressed = match encoding {
                "gzip" => {
                    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                    encoder.write_all(&self.body).unwrap();
                    encoder.finish().unwrap()
                }
                "deflate" => {
                    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                    encoder.write_all(&self.body).unwrap();
                    encoder.finish().unwrap()
                }
                "br" => {
                    let mut encoder = brotli::CompressorWriter::new(Vec::new(), 4096, 5, 22);
                    encoder.write_all(&self.body).unwrap();
                    encoder.into_inner()
                }
                "zstd" => zstd::stream::encode_all(&self.body[..], 3).unwrap(),
                other => panic!("unknown encoding {other}"),
            };
            self.body = Bytes::from(compressed);
            self.headers.remove(CONTENT_LENGTH);
            self.header(CONTENT_ENCODING, encoding)
        }

        async fn parse(self, options: &Options) -> Result<ParsedBody, BodyError> {
            parse(Full::new(self.body), &self.headers, options).await
        }
    }

    #[tokio::test]
    async fn test_text() {
        let body = TestRequest::new("hello world").content_type("text/plain").parse(&Options::new()).await.unwrap();
        assert_eq!(body, ParsedBody::Text("hello world".into()));
        assert_eq!(body.as_text(), Some("hello world"));
        assert_eq!(body.as_json(), None);
    }

    #[tokio::test]
    async fn test_html() {
        let body = TestRequest::new("<p>hi</p>")
            .content_type("text/html; charset=utf-8")
            .parse(&Options::new())
            .await
            .unwrap();
        assert_eq!(body.as_text(), Some("<p>hi</p>"));
    }

    #[tokio::test]
    async fn test_gzip() {
        let body = TestRequest::new("hello world")
            .content_type("text/plain")
            .encoded("gzip")
            .parse(&Options::new())
            .await
            .unwrap();
        assert_eq!(body.as_text(), Some("hello world"));
    }

    #[tokio::test]
    async fn test_deflate() {
        let body = TestRequest::new("hello world")
            .content_type("text/plain")
            .encoded("deflate")
            .parse(&Options::new())
            .await
            .unwrap();
        assert_eq!(body.as_text(), Some("hello world"));
    }

    #[tokio::test]
    async fn test_brotli_and_zstd_when_registered() {
        let options = Options::new().decoders(Decoders::all());
        for encoding in ["br", "zstd", "gzip", "deflate"] {
            let body = TestRequest::new(r#"{"hello":"world"}"#)
                .content_type("application/json")
                .encoded(encoding)
                .parse(&options)
                .await
                .unwrap();
            assert_eq!(body.as_json(), Some(&json!({"hello": "world"})), "encoding: {encoding}");
        }
    }

    #[tokio::test]
    async fn test_json() {
        let body = TestRequest::new(r#"{"hello":"world"}"#)
            .content_type("application/json")
            .parse(&Options::new())
            .await
            .unwrap();
        assert_eq!(body, ParsedBody::Json(json!({"hello": "world"})));
    }

    #[tokio::test]
    async fn test_json_empty() {
        let body = TestRequest::new("").content_type("application/json").parse(&Options::new()).await.unwrap();
        assert_eq!(body, ParsedBody::Json(json!({})));
    }

    #[tokio::test]
    async fn test_json_primitive() {
        let err = TestRequest::new(r#""test""#)
            .content_type("application/json; charset=utf-8")
            .parse(&Options::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid JSON, only supports object and array");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_form() {
        let body = TestRequest::new("hello=world")
            .content_type("application/x-www-form-urlencoded")
            .parse(&Options::new())
            .await
            .unwrap();
        assert_eq!(body.as_form().unwrap()["hello"], FormValue::from("world"));
        assert_eq!(body.as_form().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_content_type() {
        let err = TestRequest::new("").content_type("foo/bar").parse(&Options::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Unsupported content-type: foo/bar");
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_content_type_is_not_case_folded() {
        let err = TestRequest::new("{}").content_type("Application/JSON").parse(&Options::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Unsupported content-type: Application/JSON");
    }

    #[tokio::test]
    async fn test_missing_content_type() {
        let err = TestRequest::new("").parse(&Options::new()).await.unwrap_err();
        assert!(matches!(err, BodyError::MissingContentType));
        assert_eq!(err.to_string(), "Missing content-type");
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_unknown_content_encoding() {
        let err = TestRequest::new("")
            .content_type("application/json")
            .header(CONTENT_ENCODING, "foobar")
            .parse(&Options::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported content-encoding: foobar");
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_custom_types() {
        let options = Options::new()
            .json_types(["application/vnd.api+json"])
            .form_types(Vec::<String>::new())
            .text_types(["application/x-www-form-urlencoded"]);

        let body = TestRequest::new(r#"{"a":1}"#)
            .content_type("application/vnd.api+json")
            .parse(&options)
            .await
            .unwrap();
        assert_eq!(body, ParsedBody::Json(json!({"a": 1})));

        let body = TestRequest::new("a=1")
            .content_type("application/x-www-form-urlencoded")
            .parse(&options)
            .await
            .unwrap();
        assert_eq!(body, ParsedBody::Text("a=1".into()));

        // overriding json types drops the default ones for this call only
        let err = TestRequest::new("{}").content_type("application/json").parse(&options).await.unwrap_err();
        assert_eq!(err.to_string(), "Unsupported content-type: application/json");
        let body = TestRequest::new("{}").content_type("application/json").parse(&Options::new()).await.unwrap();
        assert_eq!(body, ParsedBody::Json(json!({})));
    }

    #[tokio::test]
    async fn test_earliest_list_wins() {
        let options = Options::new().json_types(["text/plain"]);
        let body = TestRequest::new("[1]").content_type("text/plain").parse(&options).await.unwrap();
        assert_eq!(body, ParsedBody::Json(json!([1])));
    }

    #[tokio::test]
    async fn test_limit() {
        let err = TestRequest::new("hello world")
            .content_type("text/plain")
            .parse(&Options::new().limit(5))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_future_is_send() {
        fn check_send<T: Send>(_: &T) {}

        let headers = HeaderMap::new();
        let options = Options::new();
        let future = parse(Full::new(Bytes::new()), &headers, &options);
        check_send(&future);
    }
}
