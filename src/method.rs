//! Request methods.
//!
//! The RFC 9110 method set. Tokens parse case-insensitively, so `"get"` and
//! `"GET"` are the same method. Anything else is a `Parse` error, which the
//! server renders as `405` before routing.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

macro_rules! methods {
    ($($variant:ident => $token:literal),+ $(,)?) => {
        /// A request method.
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        pub enum Method {
            $($variant),+
        }

        impl Method {
            /// Every method, in declaration order.
            pub const ALL: &'static [Method] = &[$(Method::$variant),+];

            /// The upper-case token, e.g. `"GET"`.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $token),+
                }
            }
        }

        impl FromStr for Method {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($token) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(Error::parse(format!("Unsupported HTTP method `{s}`.")))
            }
        }
    };
}

methods! {
    Get     => "GET",
    Head    => "HEAD",
    Post    => "POST",
    Put     => "PUT",
    Patch   => "PATCH",
    Delete  => "DELETE",
    Options => "OPTIONS",
    Connect => "CONNECT",
    Trace   => "TRACE",
}

impl Method {
    /// Safe methods do not change server state.
    pub fn is_safe(self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Options | Self::Trace)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
