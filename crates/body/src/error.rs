use http::StatusCode;
use thiserror::Error;

/// The boxed error carried by body streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Every way reading a body can fail.
///
/// Each variant maps to an HTTP status through [`BodyError::status`], and its
/// `Display` output is the message meant to be sent back to the client.
#[derive(Error, Debug)]
pub enum BodyError {
    #[error("Missing content-type")]
    MissingContentType,

    #[error("Unsupported content-type: {content_type}")]
    UnsupportedContentType { content_type: String },

    #[error("Unsupported content-encoding: {encoding}")]
    UnsupportedContentEncoding { encoding: String },

    #[error("Unsupported charset: {charset}")]
    UnsupportedCharset { charset: String },

    #[error("Invalid JSON, only supports object and array")]
    InvalidJson,

    #[error("invalid json body: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid form body: {source}")]
    Form {
        #[from]
        source: serde_urlencoded::de::Error,
    },

    #[error("request entity too large")]
    PayloadTooLarge { limit: usize },

    #[error("request size did not match content length")]
    LengthMismatch { expected: u64, received: u64 },

    #[error("stream error: {source}")]
    Stream { source: BoxError },

    #[error("{message}")]
    Custom { status: StatusCode, message: String },
}

impl BodyError {
    pub fn unsupported_content_type<S: ToString>(content_type: S) -> Self {
        Self::UnsupportedContentType { content_type: content_type.to_string() }
    }

    pub fn unsupported_content_encoding<S: ToString>(encoding: S) -> Self {
        Self::UnsupportedContentEncoding { encoding: encoding.to_string() }
    }

    pub fn unsupported_charset<S: ToString>(charset: S) -> Self {
        Self::UnsupportedCharset { charset: charset.to_string() }
    }

    pub fn payload_too_large(limit: usize) -> Self {
        Self::PayloadTooLarge { limit }
    }

    pub fn length_mismatch(expected: u64, received: u64) -> Self {
        Self::LengthMismatch { expected, received }
    }

    pub fn stream<E: Into<BoxError>>(e: E) -> Self {
        Self::Stream { source: e.into() }
    }

    /// Builds an error with an arbitrary status, used by custom parsers.
    pub fn new<S: ToString>(status: StatusCode, message: S) -> Self {
        Self::Custom { status, message: message.to_string() }
    }

    /// The HTTP status this error should be answered with.
    pub fn status(&self) -> StatusCode {
        match self {
            BodyError::MissingContentType
            | BodyError::UnsupportedContentType { .. }
            | BodyError::UnsupportedContentEncoding { .. }
            | BodyError::UnsupportedCharset { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            BodyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            BodyError::InvalidJson
            | BodyError::Json { .. }
            | BodyError::Form { .. }
            | BodyError::LengthMismatch { .. }
            | BodyError::Stream { .. } => StatusCode::BAD_REQUEST,
            BodyError::Custom { status, .. } => *status,
        }
    }
}
