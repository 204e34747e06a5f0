//! Cross-origin header decoration.
//!
//! Applied to every final response, success or error, when a
//! [`CorsConfig`] is present. A response is only decorated when the
//! request's `Origin` is on the allow-list or the list contains `*`.

use serde::Deserialize;

use crate::response::Response;

pub const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
pub const ALLOW_METHODS: &str = "Access-Control-Allow-Methods";
pub const ALLOW_HEADERS: &str = "Access-Control-Allow-Headers";
pub const MAX_AGE: &str = "Access-Control-Max-Age";
pub const EXPOSE_HEADERS: &str = "Access-Control-Expose-Headers";
pub const ALLOW_CREDENTIALS: &str = "Access-Control-Allow-Credentials";

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    /// Seconds.
    pub max_age: u64,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_owned()],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"].map(str::to_owned).to_vec(),
            allowed_headers: ["Content-Type", "Authorization", "Accept"].map(str::to_owned).to_vec(),
            exposed_headers: Vec::new(),
            max_age: 86_400,
            allow_credentials: false,
        }
    }
}

impl CorsConfig {
    /// Only `origins` allowed, everything else at its default.
    pub fn for_origins<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { allowed_origins: origins.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    /// The `Access-Control-Allow-Origin` value for a request from `origin`,
    /// or `None` when the origin is not allowed.
    pub fn allow_origin(&self, origin: Option<&str>) -> Option<String> {
        if self.allowed_origins.iter().any(|o| o == "*") {
            return Some("*".to_owned());
        }
        let origin = origin?;
        self.allowed_origins.iter().any(|o| o == origin).then(|| origin.to_owned())
    }

    /// Adds the CORS headers to `response` when `origin` is allowed.
    pub fn apply(&self, origin: Option<&str>, response: Response) -> Response {
        let Some(allow_origin) = self.allow_origin(origin) else {
            return response;
        };

        let mut response = response.with_header(ALLOW_ORIGIN, allow_origin);
        if !self.allowed_methods.is_empty() {
            response = response.with_header(ALLOW_METHODS, self.allowed_methods.join(", "));
        }
        if !self.allowed_headers.is_empty() {
            response = response.with_header(ALLOW_HEADERS, self.allowed_headers.join(", "));
        }
        response = response.with_header(MAX_AGE, self.max_age.to_string());
        if !self.exposed_headers.is_empty() {
            response = response.with_header(EXPOSE_HEADERS, self.exposed_headers.join(", "));
        }
        if self.allow_credentials {
            response = response.with_header(ALLOW_CREDENTIALS, "true");
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_origin_is_echoed() {
        let cors = CorsConfig::for_origins(["https://a.com"]);
        let res = cors.apply(Some("https://a.com"), Response::text("ok"));
        assert_eq!(res.header(ALLOW_ORIGIN), Some("https://a.com"));
        assert_eq!(res.header(ALLOW_METHODS), Some("GET, POST, PUT, DELETE, OPTIONS"));
        assert_eq!(res.header(MAX_AGE), Some("86400"));
        assert!(!res.has_header(EXPOSE_HEADERS));
        assert!(!res.has_header(ALLOW_CREDENTIALS));
    }

    #[test]
    fn unlisted_or_missing_origin_is_untouched() {
        let cors = CorsConfig::for_origins(["https://a.com"]);
        let res = cors.apply(Some("https://b.com"), Response::text("ok"));
        assert!(res.headers().iter().all(|(name, _)| !name.starts_with("Access-Control")));
        assert!(!cors.apply(None, Response::text("ok")).has_header(ALLOW_ORIGIN));
    }

    #[test]
    fn wildcard_allows_everyone() {
        let cors = CorsConfig { allow_credentials: true, ..CorsConfig::default() };
        let res = cors.apply(None, Response::text("ok"));
        assert_eq!(res.header(ALLOW_ORIGIN), Some("*"));
        assert_eq!(res.header(ALLOW_CREDENTIALS), Some("true"));
    }

    #[test]
    fn empty_allow_list_disables() {
        let cors = CorsConfig::for_origins(Vec::<String>::new());
        assert!(cors.allow_origin(Some("https://a.com")).is_none());
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let cors: CorsConfig =
            serde_json::from_str(r#"{"allowedOrigins":["https://a.com"],"maxAge":60}"#).unwrap();
        assert_eq!(cors.allowed_origins, ["https://a.com"]);
        assert_eq!(cors.max_age, 60);
        assert_eq!(cors.allowed_headers, ["Content-Type", "Authorization", "Accept"]);
    }
}
