//! Unified error type.
//!
//! Components never build an HTTP response for a failure. They return an
//! [`Error`] (or any other error through `anyhow`) and the
//! [`ErrorStrategy`](crate::ErrorStrategy) renders it once, at the dispatch
//! boundary, into the JSON envelope.
//!
//! The set of kinds is closed: rendering switches on [`ErrorKind`], never on
//! the concrete type of whatever failed underneath.

use std::fmt;

/// Result alias used by handlers and middleware.
///
/// The error side is `anyhow::Error` so any `std::error::Error` propagates
/// with `?`. Typed [`Error`] values survive the conversion and are recovered
/// by the strategy with a single downcast.
pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;

/// The closed set of failure kinds understood by the error strategy.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    InvalidArgument,
    MissingRequiredFields,
    Unauthorized,
    PermissionDenied,
    MethodNotAllowed,
    NotFound,
    SessionExpired,
    RateLimitExceeded,
    GeneralFailure,
    /// Malformed URI, out-of-range port, invalid status code.
    Parse,
    /// A stream operation outside the stream's capabilities.
    StreamState,
    /// A route or middleware target that cannot be resolved.
    InvalidHandler,
}

impl ErrorKind {
    /// HTTP status used when the error carries no explicit code.
    pub fn default_code(self) -> u16 {
        match self {
            Self::InvalidArgument       => 400,
            Self::MissingRequiredFields => 400,
            Self::Unauthorized          => 401,
            Self::PermissionDenied      => 403,
            Self::MethodNotAllowed      => 405,
            Self::NotFound              => 404,
            Self::SessionExpired        => 400,
            Self::RateLimitExceeded     => 429,
            Self::GeneralFailure        => 500,
            Self::Parse                 => 400,
            Self::StreamState           => 500,
            Self::InvalidHandler        => 500,
        }
    }

    /// Stable name rendered as `error.type` in the envelope.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument       => "InvalidArgument",
            Self::MissingRequiredFields => "MissingRequiredFields",
            Self::Unauthorized          => "Unauthorized",
            Self::PermissionDenied      => "PermissionDenied",
            Self::MethodNotAllowed      => "MethodNotAllowed",
            Self::NotFound              => "NotFound",
            Self::SessionExpired        => "SessionExpired",
            Self::RateLimitExceeded     => "RateLimitExceeded",
            Self::GeneralFailure        => "GeneralFailure",
            Self::Parse                 => "ParseError",
            Self::StreamState           => "StreamStateError",
            Self::InvalidHandler        => "InvalidHandlerError",
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            Self::InvalidArgument       => "Invalid argument provided.",
            Self::MissingRequiredFields => "Missing required fields, please check your request and try again.",
            Self::Unauthorized          => "The request requires user authentication, please authenticate and try again.",
            Self::PermissionDenied      => "You do not have permission to access this resource.",
            Self::MethodNotAllowed      => "The requested resource does not support the HTTP method used.",
            Self::NotFound              => "The requested resource could not be found.",
            Self::SessionExpired        => "Sorry the session has expired, please authenticate again.",
            Self::RateLimitExceeded     => "Too many requests. Please try again later.",
            Self::GeneralFailure        => GENERIC_MESSAGE,
            Self::Parse                 => "The value could not be parsed.",
            Self::StreamState           => "The stream does not support this operation.",
            Self::InvalidHandler        => "Invalid route callback.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message shown for every non-typed failure when debug mode is off.
pub const GENERIC_MESSAGE: &str = "An error occurred while processing your request.";

/// A typed framework error: message, numeric code and optional cause.
///
/// The code is kept as given. It is only validated (and forced to 500 when
/// outside 100..=599) by the strategy at render time.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    code: i64,
    headers: Vec<(String, String)>,
    #[source]
    source: Option<anyhow::Error>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: i64::from(kind.default_code()),
            headers: Vec::new(),
            source: None,
        }
    }

    /// An error of `kind` with its default message.
    pub fn of(kind: ErrorKind) -> Self {
        Self::new(kind, kind.default_message())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn missing_required_fields() -> Self {
        Self::of(ErrorKind::MissingRequiredFields)
    }

    pub fn unauthorized() -> Self {
        Self::of(ErrorKind::Unauthorized)
    }

    pub fn permission_denied() -> Self {
        Self::of(ErrorKind::PermissionDenied)
    }

    pub fn not_found() -> Self {
        Self::of(ErrorKind::NotFound)
    }

    /// `405`, advertising the methods the path does support.
    pub fn method_not_allowed(allow: &[crate::Method]) -> Self {
        let allow = allow.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
        Self::of(ErrorKind::MethodNotAllowed).with_header("Allow", allow)
    }

    pub fn session_expired() -> Self {
        Self::of(ErrorKind::SessionExpired)
    }

    pub fn rate_limit_exceeded() -> Self {
        Self::of(ErrorKind::RateLimitExceeded)
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralFailure, message)
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub(crate) fn stream_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StreamState, message)
    }

    pub(crate) fn invalid_handler(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidHandler, message)
    }

    /// Overrides the numeric code. Any integer is accepted here.
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    /// Adds a header that the rendered error response must carry.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Chains the failure that caused this one.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind { self.kind }
    pub fn message(&self) -> &str { &self.message }
    pub fn code(&self) -> i64 { self.code }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn cause(&self) -> Option<&anyhow::Error> { self.source.as_ref() }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::general(format!("io: {e}")).with_source(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_carry_default_codes() {
        assert_eq!(Error::not_found().code(), 404);
        assert_eq!(Error::rate_limit_exceeded().code(), 429);
        assert_eq!(Error::session_expired().code(), 400);
        assert_eq!(Error::general("x").code(), 500);
    }

    #[test]
    fn method_not_allowed_lists_methods() {
        let err = Error::method_not_allowed(&[crate::Method::Get, crate::Method::Put]);
        assert_eq!(err.headers(), &[("Allow".to_owned(), "GET, PUT".to_owned())]);
    }

    #[test]
    fn survives_anyhow_round_trip() {
        let err: anyhow::Error = Error::permission_denied().with_code(999).into();
        let typed = err.downcast_ref::<Error>().unwrap();
        assert_eq!(typed.kind(), ErrorKind::PermissionDenied);
        assert_eq!(typed.code(), 999);
    }

    #[test]
    fn source_is_chained() {
        let io = std::io::Error::other("disk gone");
        let err = Error::general("write failed").with_source(io);
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "disk gone");
    }
}
