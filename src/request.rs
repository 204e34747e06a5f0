//! Incoming HTTP request value.

use std::any::Any;

use serde::de::DeserializeOwned;

use crate::attributes::Attributes;
use crate::error::Error;
use crate::headers::{HeaderValues, Headers};
use crate::method::Method;
use crate::stream::Stream;
use crate::uri::Uri;

/// An HTTP request.
///
/// Values are immutable: every `with_*` consumes the request and returns the
/// modified one, so a snapshot kept by an earlier stage (via `clone`) never
/// changes underneath it.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    request_target: Option<String>,
    headers: Headers,
    body: Stream,
    version: String,
    attributes: Attributes,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        let mut headers = Headers::new();
        if !uri.host().is_empty() {
            headers.set("Host", host_header(&uri).into_values());
        }
        Self {
            method,
            uri,
            request_target: None,
            headers,
            body: Stream::empty(),
            version: "1.1".to_owned(),
            attributes: Attributes::new(),
        }
    }

    /// Parses `target` and builds a request for it.
    pub fn try_new(method: Method, target: &str) -> Result<Self, Error> {
        Ok(Self::new(method, target.parse()?))
    }

    pub fn method(&self) -> Method { self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn protocol_version(&self) -> &str { &self.version }
    pub fn headers(&self) -> &Headers { &self.headers }
    pub fn body(&self) -> &Stream { &self.body }
    pub fn attributes(&self) -> &Attributes { &self.attributes }

    /// The origin-form target: path plus `?query`, `/` when both are empty.
    pub fn request_target(&self) -> String {
        if let Some(target) = &self.request_target {
            return target.clone();
        }
        let mut target = self.uri.path().to_owned();
        if target.is_empty() {
            target.push('/');
        }
        if !self.uri.query().is_empty() {
            target.push('?');
            target.push_str(self.uri.query());
        }
        target
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    /// First value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.first(name)
    }

    /// All values of a header.
    pub fn header_values(&self, name: &str) -> &[String] {
        self.headers.get(name)
    }

    /// All values of a header joined with `", "`.
    pub fn header_line(&self, name: &str) -> String {
        self.headers.line(name)
    }

    /// A typed attribute.
    pub fn attribute<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.attributes.get(key)
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.attributes.get::<String>(key).map(String::as_str)
    }

    /// Decoded `key=value` pairs of the query string, in order. Repeated
    /// keys are all kept; bytes that are not UTF-8 decode to U+FFFD.
    pub fn query_params(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.uri.query().as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// First decoded query value for `key`.
    pub fn query(&self, key: &str) -> Option<String> {
        self.query_params().into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Cookies from every `Cookie` header, in order.
    pub fn cookie_params(&self) -> Vec<(String, String)> {
        self.headers
            .get("cookie")
            .iter()
            .flat_map(|line| parse_cookies(line))
            .collect()
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookie_params().into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Deserializes the body as JSON. Malformed input is an `InvalidArgument`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body.to_bytes())
            .map_err(|e| Error::invalid_argument(format!("Invalid JSON body: {e}")).with_source(e))
    }

    // ── Copy-on-write modifiers ───────────────────────────────────────────────

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Replaces the URI. Unless `preserve_host` is set (and the request
    /// already has a `Host`), the `Host` header follows the new URI.
    pub fn with_uri(mut self, uri: Uri, preserve_host: bool) -> Self {
        let update = !uri.host().is_empty() && (!preserve_host || !self.headers.contains("host"));
        if update {
            self.headers.set("Host", host_header(&uri).into_values());
        }
        self.uri = uri;
        self
    }

    pub fn with_request_target(mut self, target: impl Into<String>) -> Self {
        self.request_target = Some(target.into());
        self
    }

    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Replaces every value of `name`.
    pub fn with_header(mut self, name: &str, value: impl HeaderValues) -> Self {
        self.headers.set(name, value.into_values());
        self
    }

    /// Appends to the values of `name`.
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

    pub fn with_attribute<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.attributes.insert(key, value);
        self
    }

    pub fn without_attribute(mut self, key: &str) -> Self {
        self.attributes.remove(key);
        self
    }
}

fn host_header(uri: &Uri) -> String {
    match uri.port() {
        Some(port) => format!("{}:{port}", uri.host()),
        None => uri.host().to_owned(),
    }
}

/// `a=1; b=2`. Values are percent-decoded; `+` stays a plus.
fn parse_cookies(line: &str) -> Vec<(String, String)> {
    line.split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = urlencoding::decode_binary(value.as_bytes());
            (name.to_owned(), String::from_utf8_lossy(&value).into_owned())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(target: &str) -> Request {
        Request::try_new(Method::Get, target).unwrap()
    }

    #[test]
    fn headers_are_case_insensitive() {
        let req = get("/").with_header("X-Trace", "a").with_added_header("x-trace", ["b", "c"]);
        assert!(req.has_header("x-TRACE"));
        assert_eq!(req.header_values("X-Trace"), &["a", "b", "c"]);
        assert_eq!(req.header_line("x-trace"), "a, b, c");
    }

    #[test]
    fn with_header_leaves_snapshot_untouched() {
        let original = get("/").with_header("A", "1");
        let snapshot = original.clone();
        let changed = original.with_header("a", "2").with_attribute("k", 1_u8);
        assert_eq!(snapshot.header("A"), Some("1"));
        assert!(snapshot.attribute::<u8>("k").is_none());
        assert_eq!(changed.header("A"), Some("2"));
    }

    #[test]
    fn request_target_defaults() {
        assert_eq!(get("").request_target(), "/");
        assert_eq!(get("/a?b=1").request_target(), "/a?b=1");
        assert_eq!(get("/a").with_request_target("*").request_target(), "*");
    }

    #[test]
    fn host_header_tracks_uri() {
        let req = get("http://a.com:8080/x");
        assert_eq!(req.header("host"), Some("a.com:8080"));

        let moved = req.clone().with_uri("http://b.com/".parse().unwrap(), false);
        assert_eq!(moved.header("Host"), Some("b.com"));

        let kept = req.with_uri("http://b.com/".parse().unwrap(), true);
        assert_eq!(kept.header("Host"), Some("a.com:8080"));
    }

    #[test]
    fn query_and_cookies() {
        let req = get("/s?q=caf%C3%A9+bar&page=2&flag")
            .with_header("Cookie", "access_token=abc; theme=dark");
        assert_eq!(req.query("q").as_deref(), Some("café bar"));
        assert_eq!(req.query("flag").as_deref(), Some(""));
        assert_eq!(req.cookie("access_token").as_deref(), Some("abc"));
        assert_eq!(req.cookie("theme").as_deref(), Some("dark"));
    }

    #[test]
    fn query_keeps_repeats_and_bad_escapes() {
        let req = get("/s?tag=a&tag=b&raw=%zz&latin=%E9&sum=1%2B1")
            .with_header("Cookie", "note=a%20b+c; bad=%zz");
        let tags: Vec<_> = req.query_params().into_iter().filter(|(k, _)| k == "tag").map(|(_, v)| v).collect();
        assert_eq!(tags, ["a", "b"]);
        assert_eq!(req.query("tag").as_deref(), Some("a"));
        assert_eq!(req.query("raw").as_deref(), Some("%zz"));
        assert_eq!(req.query("latin").as_deref(), Some("\u{FFFD}"));
        assert_eq!(req.query("sum").as_deref(), Some("1+1"));
        assert_eq!(req.cookie("note").as_deref(), Some("a b+c"));
        assert_eq!(req.cookie("bad").as_deref(), Some("%zz"));
    }

    #[test]
    fn json_body() {
        #[derive(Debug, serde::Deserialize)]
        struct Input { name: String }

        let req = get("/").with_body(Stream::read_only(r#"{"name":"alice"}"#));
        assert_eq!(req.json::<Input>().unwrap().name, "alice");

        let bad = get("/").with_body(Stream::read_only("{"));
        assert_eq!(bad.json::<Input>().unwrap_err().kind(), crate::ErrorKind::InvalidArgument);
    }
}
