//! Immutable, normalized URI value.
//!
//! Normalization happens on every way in (parsing and each `with_*`):
//!
//! - scheme and host are lower-cased
//! - the standard port of the scheme (`http` 80, `https` 443) is dropped
//! - path, query and fragment percent-encode every byte outside their
//!   allowed character class; a `%` that does not start a valid `%XX`
//!   escape is itself encoded as `%25`
//!
//! Existing valid escapes are left untouched, so normalizing twice is the
//! same as normalizing once.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A parsed URI. Every `with_*` consumes the value and returns a new one.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Uri {
    scheme: String,
    user_info: String,
    host: String,
    port: Option<u16>,
    path: String,
    query: String,
    fragment: String,
}

impl Uri {
    /// Parses `input`, failing with a `Parse` error when it is malformed.
    pub fn parse(input: &str) -> Result<Self, Error> {
        if input.is_empty() {
            return Ok(Self::default());
        }
        if input.bytes().any(|b| b.is_ascii_control()) {
            return Err(Error::parse(format!("Unable to parse URI: {input}")));
        }

        let (rest, fragment) = split_once_or(input, '#');
        let (rest, query) = split_once_or(rest, '?');

        let mut uri = Uri::default();
        let mut rest = rest;

        if let Some(colon) = rest.find(':') {
            let candidate = &rest[..colon];
            if !candidate.contains('/') {
                if !is_scheme(candidate) {
                    return Err(Error::parse(format!("Unable to parse URI: {input}")));
                }
                uri.scheme = candidate.to_ascii_lowercase();
                rest = &rest[colon + 1..];
            }
        }

        if let Some(after) = rest.strip_prefix("//") {
            let end = after.find('/').unwrap_or(after.len());
            let authority = &after[..end];
            rest = &after[end..];

            let (user_info, host_port) = match authority.rfind('@') {
                Some(at) => (&authority[..at], &authority[at + 1..]),
                None => ("", authority),
            };
            let (host, port) = split_host_port(host_port)
                .ok_or_else(|| Error::parse(format!("Unable to parse URI: {input}")))?;
            if host.is_empty() && !uri.scheme.is_empty() {
                return Err(Error::parse(format!("Unable to parse URI: {input}")));
            }
            uri.user_info = user_info.to_owned();
            uri.host = host.to_ascii_lowercase();
            uri.port = match port {
                Some(p) => uri.filter_port(Some(p))?,
                None => None,
            };
        }

        uri.path = filter_path(rest);
        uri.query = filter_query(query);
        uri.fragment = filter_query(fragment);
        Ok(uri)
    }

    pub fn scheme(&self) -> &str { &self.scheme }
    pub fn user_info(&self) -> &str { &self.user_info }
    pub fn host(&self) -> &str { &self.host }
    /// `None` when absent or equal to the scheme's standard port.
    pub fn port(&self) -> Option<u16> { self.port }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> &str { &self.query }
    pub fn fragment(&self) -> &str { &self.fragment }

    /// `[user-info@]host[:port]`, or `""` without a host.
    pub fn authority(&self) -> String {
        if self.host.is_empty() {
            return String::new();
        }
        let mut authority = String::new();
        if !self.user_info.is_empty() {
            authority.push_str(&self.user_info);
            authority.push('@');
        }
        authority.push_str(&self.host);
        if let Some(port) = self.port {
            authority.push(':');
            authority.push_str(&port.to_string());
        }
        authority
    }

    pub fn with_scheme(mut self, scheme: &str) -> Self {
        let scheme = scheme.to_ascii_lowercase();
        self.scheme = scheme
            .strip_suffix("://")
            .or_else(|| scheme.strip_suffix(':'))
            .unwrap_or(&scheme)
            .to_owned();
        if self.port.is_some_and(|p| Some(p) == standard_port(&self.scheme)) {
            self.port = None;
        }
        self
    }

    pub fn with_user_info(mut self, user: &str, password: Option<&str>) -> Self {
        self.user_info = match password {
            Some(pass) if !pass.is_empty() => format!("{user}:{pass}"),
            _ => user.to_owned(),
        };
        self
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_ascii_lowercase();
        self
    }

    /// Fails with a `Parse` error outside `1..=65535`.
    pub fn with_port(mut self, port: Option<u32>) -> Result<Self, Error> {
        self.port = self.filter_port(port)?;
        Ok(self)
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = filter_path(path);
        self
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query = filter_query(query.strip_prefix('?').unwrap_or(query));
        self
    }

    pub fn with_fragment(mut self, fragment: &str) -> Self {
        self.fragment = filter_query(fragment.strip_prefix('#').unwrap_or(fragment));
        self
    }

    fn filter_port(&self, port: Option<u32>) -> Result<Option<u16>, Error> {
        let Some(port) = port else { return Ok(None) };
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| Error::parse(format!("Invalid port: {port}. Must be between 1 and 65535")))?;
        if standard_port(&self.scheme) == Some(port) {
            return Ok(None);
        }
        Ok(Some(port))
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scheme.is_empty() {
            write!(f, "{}:", self.scheme)?;
        }
        let authority = self.authority();
        if !authority.is_empty() {
            write!(f, "//{authority}")?;
        }
        if !self.path.is_empty() {
            if !authority.is_empty() && !self.path.starts_with('/') {
                f.write_str("/")?;
            }
            if authority.is_empty() && self.path.starts_with("//") {
                write!(f, "/{}", self.path.trim_start_matches('/'))?;
            } else {
                f.write_str(&self.path)?;
            }
        }
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

// ── Parsing helpers ───────────────────────────────────────────────────────────

fn split_once_or(s: &str, delim: char) -> (&str, &str) {
    s.split_once(delim).unwrap_or((s, ""))
}

fn is_scheme(s: &str) -> bool {
    let mut bytes = s.bytes();
    matches!(bytes.next(), Some(b) if b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
}

/// Splits `host[:port]`, handling bracketed IPv6 literals. `None` when the
/// port is not numeric or the brackets are unbalanced.
fn split_host_port(s: &str) -> Option<(&str, Option<u32>)> {
    let (host, port) = if s.starts_with('[') {
        let close = s.find(']')?;
        let rest = &s[close + 1..];
        match rest.strip_prefix(':') {
            Some(port) => (&s[..=close], port),
            None if rest.is_empty() => (&s[..=close], ""),
            None => return None,
        }
    } else {
        match s.rsplit_once(':') {
            Some((host, port)) => (host, port),
            None => (s, ""),
        }
    };
    if host.bytes().any(|b| b == b' ' || (b == b'[' && !host.starts_with('['))) {
        return None;
    }
    if port.is_empty() {
        return Some((host, None));
    }
    if !port.bytes().all(|b| b.is_ascii_digit()) || port.len() > 5 {
        return None;
    }
    port.parse().ok().map(|p| (host, Some(p)))
}

fn standard_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

// ── Percent-encoding ──────────────────────────────────────────────────────────

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

fn path_allowed(b: u8) -> bool {
    is_unreserved(b) || matches!(b, b':' | b'@' | b'&' | b'=' | b'+' | b'$' | b',' | b'/' | b';')
}

fn query_allowed(b: u8) -> bool {
    is_unreserved(b)
        || matches!(
            b,
            b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b';' | b'=' | b':' | b'@' | b'/' | b'?'
        )
}

pub(crate) fn filter_path(s: &str) -> String {
    encode_outside(s, path_allowed)
}

pub(crate) fn filter_query(s: &str) -> String {
    encode_outside(s, query_allowed)
}

fn encode_outside(s: &str, allowed: fn(u8) -> bool) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' && is_escape(&bytes[i..]) {
            out.push_str(&s[i..i + 3]);
            i += 3;
            continue;
        }
        if b != b'%' && allowed(b) {
            out.push(b as char);
        } else {
            push_escaped(&mut out, b);
        }
        i += 1;
    }
    out
}

fn is_escape(bytes: &[u8]) -> bool {
    bytes.len() >= 3 && bytes[1].is_ascii_hexdigit() && bytes[2].is_ascii_hexdigit()
}

fn push_escaped(out: &mut String, b: u8) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    out.push('%');
    out.push(HEX[usize::from(b >> 4)] as char);
    out.push(HEX[usize::from(b & 0x0f)] as char);
}
