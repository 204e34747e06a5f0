//! Failure → response translation.
//!
//! Every failure raised while matching, in middleware, or in a handler ends
//! up here exactly once. The output is always `application/json`:
//!
//! ```json
//! {"error": {"message": "…", "type": "NotFound", "code": 404}}
//! ```
//!
//! In debug mode the envelope gains a `debug` object:
//!
//! ```json
//! {"error": {"message": "boom", "type": "GeneralFailure", "code": 500,
//!            "debug": {"trace": ["boom"], "previous": {"message": "boom", "type": "Error", "trace": ["boom"]}}}}
//! ```
//!
//! In production, failures that are not a typed [`Error`] are replaced by
//! [`GENERIC_MESSAGE`] with code 500. Their details only reach the log.

use std::backtrace::BacktraceStatus;

use serde::Serialize;
use tracing::{debug, error};

use crate::error::{Error, ErrorKind, GENERIC_MESSAGE};
use crate::response::Response;
use crate::status::Status;

#[derive(Serialize)]
struct Envelope<'a> {
    error: Body<'a>,
}

#[derive(Serialize)]
struct Body<'a> {
    message: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug: Option<DebugInfo>,
}

#[derive(Serialize)]
struct DebugInfo {
    trace: Vec<String>,
    previous: Option<Previous>,
}

#[derive(Serialize)]
struct Previous {
    message: String,
    #[serde(rename = "type")]
    kind: String,
    trace: Vec<String>,
}

/// Renders failures into the JSON error envelope.
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorStrategy {
    debug: bool,
}

impl ErrorStrategy {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Clamps a code to a valid HTTP status: anything outside `100..=599`
    /// becomes 500.
    pub fn validate_code(code: i64) -> u16 {
        match u16::try_from(code) {
            Ok(code) if (100..=599).contains(&code) => code,
            _ => 500,
        }
    }

    /// Builds the error response for `err`.
    pub fn render(&self, err: &anyhow::Error) -> Response {
        let typed = err.downcast_ref::<Error>();

        let (message, kind, code) = match typed {
            Some(e) => (e.message().to_owned(), e.kind(), Self::validate_code(e.code())),
            None if self.debug => (err.to_string(), ErrorKind::GeneralFailure, 500),
            None => (GENERIC_MESSAGE.to_owned(), ErrorKind::GeneralFailure, 500),
        };

        if code >= 500 {
            error!(kind = %kind, code, error = %format_args!("{err:#}"), "request failed");
        } else {
            debug!(kind = %kind, code, error = %err, "request rejected");
        }

        let debug = self.debug.then(|| DebugInfo {
            trace: trace(err),
            previous: match typed {
                Some(e) => e.cause().map(previous),
                None => Some(previous(err)),
            },
        });

        let envelope = Envelope { error: Body { message: &message, kind: kind.as_str(), code, debug } };
        let body = serde_json::to_vec(&envelope).unwrap_or_else(|e| {
            error!(error = %e, "unable to encode error envelope");
            br#"{"error":{"message":"An error occurred while processing your request.","type":"GeneralFailure","code":500}}"#.to_vec()
        });

        let status = Status::from_code(code).unwrap_or(Status::INTERNAL_SERVER_ERROR);
        let reason = message.lines().next().unwrap_or_default();
        let mut response = Response::json(body).with_status(status).with_reason_phrase(reason);
        for (name, value) in typed.map(Error::headers).unwrap_or_default() {
            response = response.with_added_header(name, value.as_str());
        }
        response
    }
}

fn previous(cause: &anyhow::Error) -> Previous {
    let kind = cause
        .downcast_ref::<Error>()
        .map_or("Error", |e| e.kind().as_str());
    Previous { message: cause.to_string(), kind: kind.to_owned(), trace: trace(cause) }
}

/// The error chain, outermost first, followed by the captured backtrace.
fn trace(err: &anyhow::Error) -> Vec<String> {
    let mut lines: Vec<String> = err.chain().map(ToString::to_string).collect();
    let backtrace = err.backtrace();
    if backtrace.status() == BacktraceStatus::Captured {
        lines.extend(
            backtrace
                .to_string()
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_owned),
        );
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;
    use serde_json::Value;

    fn body(res: &Response) -> Value {
        serde_json::from_slice(&res.body().to_bytes()).unwrap()
    }

    #[test]
    fn codes_are_validated() {
        assert_eq!(ErrorStrategy::validate_code(404), 404);
        assert_eq!(ErrorStrategy::validate_code(0), 500);
        assert_eq!(ErrorStrategy::validate_code(99), 500);
        assert_eq!(ErrorStrategy::validate_code(600), 500);
        assert_eq!(ErrorStrategy::validate_code(-404), 500);
        assert_eq!(ErrorStrategy::validate_code(i64::MAX), 500);
    }

    #[test]
    fn typed_error_keeps_message_in_production() {
        let err = Error::method_not_allowed(&[Method::Get]).into();
        let res = ErrorStrategy::new(false).render(&err);
        assert_eq!(res.status_code(), 405);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.header("allow"), Some("GET"));
        let json = body(&res);
        assert_eq!(json["error"]["type"], "MethodNotAllowed");
        assert_eq!(json["error"]["code"], 405);
        assert!(json["error"].get("debug").is_none());
    }

    #[test]
    fn untyped_error_is_sanitized_in_production() {
        let err = anyhow::anyhow!("boom");
        let res = ErrorStrategy::new(false).render(&err);
        assert_eq!(res.status_code(), 500);
        let json = body(&res);
        assert_eq!(json["error"]["message"], GENERIC_MESSAGE);
        assert_eq!(json["error"]["type"], "GeneralFailure");
        assert_eq!(json["error"]["code"], 500);
    }

    #[test]
    fn untyped_error_is_wrapped_in_debug() {
        let err = anyhow::anyhow!("boom");
        let res = ErrorStrategy::new(true).render(&err);
        let json = body(&res);
        assert_eq!(json["error"]["message"], "boom");
        assert_eq!(json["error"]["type"], "GeneralFailure");
        assert!(!json["error"]["debug"]["trace"].as_array().unwrap().is_empty());
        assert_eq!(json["error"]["debug"]["previous"]["message"], "boom");
        assert_eq!(json["error"]["debug"]["previous"]["type"], "Error");
    }

    #[test]
    fn typed_cause_is_reported_in_debug() {
        let err = Error::general("save failed")
            .with_source(std::io::Error::other("disk full"))
            .into();
        let json = body(&ErrorStrategy::new(true).render(&err));
        assert_eq!(json["error"]["debug"]["trace"][0], "save failed");
        assert_eq!(json["error"]["debug"]["previous"]["message"], "disk full");

        let bare = Error::not_found().into();
        let json = body(&ErrorStrategy::new(true).render(&bare));
        assert!(json["error"]["debug"]["previous"].is_null());
    }

    #[test]
    fn invalid_code_becomes_500_and_reason_is_first_line() {
        let err = Error::invalid_argument("bad input\nsecond line").with_code(42).into();
        let res = ErrorStrategy::new(false).render(&err);
        assert_eq!(res.status_code(), 500);
        assert_eq!(res.reason_phrase(), "bad input");
        assert_eq!(body(&res)["error"]["code"], 500);
    }
}
