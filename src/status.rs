//! HTTP status codes.
//!
//! [`Status`] is a validated code in `100..=599`. The named constants cover
//! every IANA-registered code; the reason-phrase table is the same list.
//!
//! ```rust
//! use tsu::{Response, Status};
//!
//! Response::empty(Status::NO_CONTENT);
//! assert_eq!(Status::NOT_FOUND.reason(), "Not Found");
//! assert!(Status::from_code(600).is_none());
//! ```

use std::fmt;

/// An HTTP status code in `100..=599`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Status(u16);

macro_rules! statuses {
    ($( ($code:literal, $name:ident, $phrase:literal), )+) => {
        impl Status {
            $( pub const $name: Status = Status($code); )+
        }

        /// Canonical reason phrase for `code`, or `""` when unregistered.
        pub fn reason_phrase(code: u16) -> &'static str {
            match code {
                $( $code => $phrase, )+
                _ => "",
            }
        }
    };
}

statuses! {
    // ── 1xx Informational ─────────────────────────────────────────────────────
    (100, CONTINUE,                        "Continue"),
    (101, SWITCHING_PROTOCOLS,             "Switching Protocols"),
    (102, PROCESSING,                      "Processing"),
    (103, EARLY_HINTS,                     "Early Hints"),
    // ── 2xx Success ───────────────────────────────────────────────────────────
    (200, OK,                              "OK"),
    (201, CREATED,                         "Created"),
    (202, ACCEPTED,                        "Accepted"),
    (203, NON_AUTHORITATIVE_INFORMATION,   "Non-Authoritative Information"),
    (204, NO_CONTENT,                      "No Content"),
    (205, RESET_CONTENT,                   "Reset Content"),
    (206, PARTIAL_CONTENT,                 "Partial Content"),
    (207, MULTI_STATUS,                    "Multi-Status"),
    (208, ALREADY_REPORTED,                "Already Reported"),
    (226, IM_USED,                         "IM Used"),
    // ── 3xx Redirection ───────────────────────────────────────────────────────
    (300, MULTIPLE_CHOICES,                "Multiple Choices"),
    (301, MOVED_PERMANENTLY,               "Moved Permanently"),
    (302, FOUND,                           "Found"),
    (303, SEE_OTHER,                       "See Other"),
    (304, NOT_MODIFIED,                    "Not Modified"),
    (307, TEMPORARY_REDIRECT,              "Temporary Redirect"),
    (308, PERMANENT_REDIRECT,              "Permanent Redirect"),
    // ── 4xx Client errors ─────────────────────────────────────────────────────
    (400, BAD_REQUEST,                     "Bad Request"),
    (401, UNAUTHORIZED,                    "Unauthorized"),
    (402, PAYMENT_REQUIRED,                "Payment Required"),
    (403, FORBIDDEN,                       "Forbidden"),
    (404, NOT_FOUND,                       "Not Found"),
    (405, METHOD_NOT_ALLOWED,              "Method Not Allowed"),
    (406, NOT_ACCEPTABLE,                  "Not Acceptable"),
    (407, PROXY_AUTHENTICATION_REQUIRED,   "Proxy Authentication Required"),
    (408, REQUEST_TIMEOUT,                 "Request Timeout"),
    (409, CONFLICT,                        "Conflict"),
    (410, GONE,                            "Gone"),
    (411, LENGTH_REQUIRED,                 "Length Required"),
    (412, PRECONDITION_FAILED,             "Precondition Failed"),
    (413, CONTENT_TOO_LARGE,               "Content Too Large"),
    (414, URI_TOO_LONG,                    "URI Too Long"),
    (415, UNSUPPORTED_MEDIA_TYPE,          "Unsupported Media Type"),
    (416, RANGE_NOT_SATISFIABLE,           "Range Not Satisfiable"),
    (417, EXPECTATION_FAILED,              "Expectation Failed"),
    (418, IM_A_TEAPOT,                     "I'm a Teapot"),
    (421, MISDIRECTED_REQUEST,             "Misdirected Request"),
    (422, UNPROCESSABLE_CONTENT,           "Unprocessable Content"),
    (423, LOCKED,                          "Locked"),
    (424, FAILED_DEPENDENCY,               "Failed Dependency"),
    (425, TOO_EARLY,                       "Too Early"),
    (426, UPGRADE_REQUIRED,                "Upgrade Required"),
    (428, PRECONDITION_REQUIRED,           "Precondition Required"),
    (429, TOO_MANY_REQUESTS,               "Too Many Requests"),
    (431, REQUEST_HEADER_FIELDS_TOO_LARGE, "Request Header Fields Too Large"),
    (451, UNAVAILABLE_FOR_LEGAL_REASONS,   "Unavailable For Legal Reasons"),
    // ── 5xx Server errors ─────────────────────────────────────────────────────
    (500, INTERNAL_SERVER_ERROR,           "Internal Server Error"),
    (501, NOT_IMPLEMENTED,                 "Not Implemented"),
    (502, BAD_GATEWAY,                     "Bad Gateway"),
    (503, SERVICE_UNAVAILABLE,             "Service Unavailable"),
    (504, GATEWAY_TIMEOUT,                 "Gateway Timeout"),
    (505, HTTP_VERSION_NOT_SUPPORTED,      "HTTP Version Not Supported"),
    (506, VARIANT_ALSO_NEGOTIATES,         "Variant Also Negotiates"),
    (507, INSUFFICIENT_STORAGE,            "Insufficient Storage"),
    (508, LOOP_DETECTED,                   "Loop Detected"),
    (510, NOT_EXTENDED,                    "Not Extended"),
    (511, NETWORK_AUTHENTICATION_REQUIRED, "Network Authentication Required"),
}

impl Status {
    /// Returns `None` outside `100..=599`.
    pub fn from_code(code: u16) -> Option<Self> {
        (100..=599).contains(&code).then_some(Self(code))
    }

    pub fn code(self) -> u16 { self.0 }

    pub fn reason(self) -> &'static str { reason_phrase(self.0) }

    pub fn is_success(self) -> bool { (200..300).contains(&self.0) }

    pub fn is_server_error(self) -> bool { self.0 >= 500 }
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 { s.0 }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason())
    }
}
