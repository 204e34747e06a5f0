//! Outgoing HTTP response value and the [`IntoResponse`] conversion trait.
//!
//! Build a [`Response`] in your handler and return it. Like [`Request`](crate::Request),
//! a response is never modified in place: `with_*` returns the changed value.

use bytes::Bytes;
use http_body_util::Full;
use hyper::ext::ReasonPhrase;
use serde::Serialize;

use crate::error::Error;
use crate::headers::{HeaderValues, Headers};
use crate::status::{Status, reason_phrase};
use crate::stream::Stream;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Body types the constructors know about. Anything else goes through
/// `with_header("Content-Type", ..)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Json,
    Text,
    Html,
    OctetStream,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Text => "text/plain; charset=utf-8",
            Self::Html => "text/html; charset=utf-8",
            Self::OctetStream => "application/octet-stream",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts
///
/// ```rust
/// use tsu::{Response, Status};
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::empty(Status::NO_CONTENT);
/// ```
///
/// # Custom status or headers
///
/// ```rust
/// use tsu::{Response, ContentType, Status};
///
/// Response::json(br#"{"id":42}"#.to_vec())
///     .with_status(Status::CREATED)
///     .with_header("location", "/users/42");
///
/// Response::bytes(ContentType::OctetStream, vec![0xde, 0xad]);
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    status: u16,
    reason: String,
    headers: Headers,
    body: Stream,
    version: String,
}

impl Default for Response {
    fn default() -> Self {
        Self::empty(Status::OK)
    }
}

impl Response {
    /// Response with no body.
    pub fn empty(status: Status) -> Self {
        Self {
            status: status.code(),
            reason: status.reason().to_owned(),
            headers: Headers::new(),
            body: Stream::empty(),
            version: "1.1".to_owned(),
        }
    }

    /// `200 OK` with `application/json`.
    ///
    /// Pass bytes from your serialiser directly.
    pub fn json(body: Vec<u8>) -> Self {
        Self::bytes(ContentType::Json, body)
    }

    /// `200 OK` with `value` serialized as JSON.
    pub fn json_value<T: Serialize>(value: &T) -> Result<Self, Error> {
        let body = serde_json::to_vec(value)
            .map_err(|e| Error::general(format!("Unable to encode data to JSON: {e}")).with_source(e))?;
        Ok(Self::json(body))
    }

    /// `200 OK` with `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::bytes(ContentType::Text, body.into().into_bytes())
    }

    /// `200 OK` with `text/html; charset=utf-8`.
    pub fn html(body: impl Into<String>) -> Self {
        Self::bytes(ContentType::Html, body.into().into_bytes())
    }

    /// `200 OK` with the given content type.
    pub fn bytes(content_type: ContentType, body: Vec<u8>) -> Self {
        Self::empty(Status::OK)
            .with_header("Content-Type", content_type.as_str())
            .with_body(Stream::writable(body))
    }

    /// Redirect to `location` (usually 301, 302, 303, 307 or 308).
    pub fn redirect(location: &str, status: Status) -> Self {
        Self::empty(status).with_header("Location", location)
    }

    pub fn status_code(&self) -> u16 { self.status }
    pub fn reason_phrase(&self) -> &str { &self.reason }
    pub fn protocol_version(&self) -> &str { &self.version }
    pub fn headers(&self) -> &Headers { &self.headers }
    pub fn body(&self) -> &Stream { &self.body }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.first(name)
    }

    pub fn header_values(&self, name: &str) -> &[String] {
        self.headers.get(name)
    }

    pub fn header_line(&self, name: &str) -> String {
        self.headers.line(name)
    }

    // ── Copy-on-write modifiers ───────────────────────────────────────────────

    /// Sets the status with its canonical reason phrase.
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status.code();
        self.reason = status.reason().to_owned();
        self
    }

    /// Sets a raw status code. An empty `reason` falls back to the canonical
    /// phrase. Codes outside `100..=599` are a `Parse` error.
    pub fn with_status_code(mut self, code: u16, reason: &str) -> Result<Self, Error> {
        if Status::from_code(code).is_none() {
            return Err(Error::parse(format!("Invalid HTTP status code: {code}")));
        }
        self.status = code;
        self.reason = if reason.is_empty() { reason_phrase(code).to_owned() } else { reason.to_owned() };
        Ok(self)
    }

    pub(crate) fn with_reason_phrase(mut self, reason: &str) -> Self {
        if !reason.is_empty() {
            self.reason = reason.to_owned();
        }
        self
    }

    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: impl HeaderValues) -> Self {
        self.headers.set(name, value.into_values());
        self
    }

    pub fn with_added_header(mut self, name: &str, value: impl HeaderValues) -> Self {
        self.headers.append(name, value.into_values());
        self
    }

    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    pub fn with_body(mut self, body: Stream) -> Self {
        self.body = body;
        self
    }

    /// Converts into the transport representation.
    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut out = http::Response::new(Full::new(self.body.to_bytes()));
        *out.status_mut() = http::StatusCode::from_u16(self.status)
            .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
        // HTTP/1 writes this phrase instead of the canonical one.
        if !self.reason.is_empty() && self.reason != reason_phrase(self.status) {
            match ReasonPhrase::try_from(self.reason.as_bytes()) {
                Ok(phrase) => { out.extensions_mut().insert(phrase); }
                Err(_) => tracing::warn!(reason = %self.reason, "dropping invalid reason phrase"),
            }
        }
        let headers = out.headers_mut();
        for (name, values) in self.headers.iter() {
            let Ok(name) = http::HeaderName::from_bytes(name.as_bytes()) else {
                tracing::warn!(header = name, "dropping response header with invalid name");
                continue;
            };
            for value in values {
                match http::HeaderValue::from_str(value) {
                    Ok(value) => { headers.append(name.clone(), value); }
                    Err(_) => tracing::warn!(header = %name, "dropping invalid response header value"),
                }
            }
        }
        out
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Values a handler can return in place of a [`Response`].
///
/// ```rust
/// use tsu::{IntoResponse, Response, Status};
///
/// struct Created(&'static str);
///
/// impl IntoResponse for Created {
///     fn into_response(self) -> Response {
///         Response::empty(Status::CREATED).with_header("Location", self.0)
///     }
/// }
/// ```
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a [`Status`] directly from a handler: `return Status::NO_CONTENT`
impl IntoResponse for Status {
    fn into_response(self) -> Response { Response::empty(self) }
}

impl IntoResponse for serde_json::Value {
    fn into_response(self) -> Response {
        Response::json(self.to_string().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_phrase_follows_status() {
        let res = Response::text("x").with_status(Status::NOT_FOUND);
        assert_eq!(res.status_code(), 404);
        assert_eq!(res.reason_phrase(), "Not Found");

        let custom = Response::default().with_status_code(418, "").unwrap();
        assert_eq!(custom.reason_phrase(), "I'm a Teapot");
        let explicit = Response::default().with_status_code(299, "Odd").unwrap();
        assert_eq!(explicit.reason_phrase(), "Odd");
    }

    #[test]
    fn status_code_range_is_checked() {
        assert!(Response::default().with_status_code(99, "").is_err());
        assert!(Response::default().with_status_code(600, "").is_err());
    }

    #[test]
    fn constructors_set_content_type() {
        assert_eq!(Response::json(b"{}".to_vec()).header("content-type"), Some("application/json"));
        assert_eq!(Response::html("<p/>").header("Content-Type"), Some("text/html; charset=utf-8"));
        let redirect = Response::redirect("/login", Status::FOUND);
        assert_eq!(redirect.status_code(), 302);
        assert_eq!(redirect.header("location"), Some("/login"));
    }

    #[test]
    fn json_value_serializes() {
        let res = Response::json_value(&serde_json::json!({"id": 7})).unwrap();
        assert_eq!(res.body().to_string_lossy(), r#"{"id":7}"#);
    }

    #[test]
    fn converts_to_http() {
        let res = Response::text("hi")
            .with_status(Status::CREATED)
            .with_added_header("Set-Cookie", ["a=1", "b=2"])
            .into_http();
        assert_eq!(res.status(), http::StatusCode::CREATED);
        assert_eq!(res.headers().get_all("set-cookie").iter().count(), 2);
    }

    #[test]
    fn custom_reason_phrase_reaches_http() {
        let phrase = |res: Response| {
            res.into_http().extensions().get::<ReasonPhrase>().map(|p| p.as_bytes().to_vec())
        };
        let custom = Response::default().with_status_code(404, "Gone Fishing").unwrap();
        assert_eq!(phrase(custom).as_deref(), Some(&b"Gone Fishing"[..]));

        assert_eq!(phrase(Response::text("x").with_status(Status::NOT_FOUND)), None);
        let broken = Response::default().with_status_code(400, "bad\r\nX-Injected: 1").unwrap();
        assert_eq!(phrase(broken), None);
    }
}
