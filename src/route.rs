//! A single method + pattern + handler binding.
//!
//! Patterns are literal segments with `{name}` placeholders. Each placeholder
//! matches one or more non-slash characters, and the whole path must match:
//!
//! ```text
//! /users/{id}/posts/{post}   →   ^/users/(?P<id>[^/]+)/posts/(?P<post>[^/]+)$
//! ```

use std::fmt;

use regex::Regex;

use crate::error::{Error, Result};
use crate::handler::BoxedHandler;
use crate::method::Method;
use crate::middleware::MiddlewareRegistry;
use crate::request::Request;
use crate::response::Response;

/// A registered route. Immutable once the router is built.
pub struct Route {
    methods: Vec<Method>,
    pattern: String,
    regex: Regex,
    params: Vec<String>,
    handler: BoxedHandler,
    middleware: Vec<String>,
    name: Option<String>,
}

impl Route {
    /// Compiles `pattern`. Fails on unbalanced braces, empty or invalid
    /// placeholder names, and names used twice.
    pub(crate) fn new(methods: Vec<Method>, pattern: &str, handler: BoxedHandler) -> Result<Self, Error> {
        let (regex, params) = compile(pattern)?;
        Ok(Self {
            methods,
            pattern: pattern.to_owned(),
            regex,
            params,
            handler,
            middleware: Vec::new(),
            name: None,
        })
    }

    pub fn methods(&self) -> &[Method] { &self.methods }
    pub fn pattern(&self) -> &str { &self.pattern }
    pub fn params(&self) -> &[String] { &self.params }
    pub fn middleware(&self) -> &[String] { &self.middleware }
    pub fn name(&self) -> Option<&str> { self.name.as_deref() }

    /// True when `method` is accepted and the whole `path` matches.
    pub fn matches(&self, method: Method, path: &str) -> bool {
        self.methods.contains(&method) && self.matches_path(path)
    }

    pub fn matches_path(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Placeholder values captured from `path`, in pattern order.
    pub fn extract(&self, path: &str) -> Option<Vec<(String, String)>> {
        let caps = self.regex.captures(path)?;
        let values = self
            .params
            .iter()
            .filter_map(|name| caps.name(name).map(|m| (name.clone(), m.as_str().to_owned())))
            .collect();
        Some(values)
    }

    /// Builds a URL by substituting `{name}` placeholders. Values are inserted
    /// as given and placeholders without a value stay in place.
    pub fn url(&self, params: &[(&str, &str)]) -> String {
        params.iter().fold(self.pattern.clone(), |url, (name, value)| {
            url.replace(&format!("{{{name}}}"), value)
        })
    }

    /// Binds captured parameters onto the request and runs the route.
    ///
    /// With neither global nor route middleware the handler is called
    /// directly. Otherwise the global names, then the route's own, are
    /// resolved against `registry` and folded around the handler.
    pub(crate) async fn execute(
        &self,
        mut request: Request,
        params: Vec<(String, String)>,
        registry: &MiddlewareRegistry,
    ) -> Result<Response> {
        for (name, value) in params {
            request = request.with_attribute(name, value);
        }

        let names: Vec<&str> = registry
            .globals()
            .iter()
            .chain(&self.middleware)
            .map(String::as_str)
            .collect();
        if names.is_empty() {
            return self.handler.call(request).await;
        }

        let chain = registry.pipeline(&names, self.handler.clone())?;
        chain.run(request).await
    }

    pub(crate) fn push_middleware(&mut self, names: Vec<String>) {
        self.middleware.extend(names);
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("methods", &self.methods)
            .field("pattern", &self.pattern)
            .field("middleware", &self.middleware)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// `/api` + `/users` → `/api/users`, without doubling or dropping the slash.
pub(crate) fn join_prefix(prefix: &str, pattern: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    match pattern {
        "" | "/" if !prefix.is_empty() => prefix.to_owned(),
        p if p.starts_with('/') => format!("{prefix}{p}"),
        p => format!("{prefix}/{p}"),
    }
}

fn compile(pattern: &str) -> Result<(Regex, Vec<String>), Error> {
    let mut source = String::from("^");
    let mut params: Vec<String> = Vec::new();
    let mut rest = pattern;

    while let Some(open) = rest.find(['{', '}']) {
        if rest.as_bytes()[open] == b'}' {
            return Err(Error::invalid_argument(format!("unbalanced `}}` in route `{pattern}`")));
        }
        source.push_str(&regex::escape(&rest[..open]));
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| Error::invalid_argument(format!("unclosed `{{` in route `{pattern}`")))?;
        let name = &after[..close];
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid_argument(format!(
                "invalid placeholder `{{{name}}}` in route `{pattern}`"
            )));
        }
        if params.iter().any(|p| p == name) {
            return Err(Error::invalid_argument(format!(
                "duplicate placeholder `{{{name}}}` in route `{pattern}`"
            )));
        }
        source.push_str(&format!("(?P<{name}>[^/]+)"));
        params.push(name.to_owned());
        rest = &after[close + 1..];
    }
    source.push_str(&regex::escape(rest));
    source.push('$');

    let regex = Regex::new(&source)
        .map_err(|e| Error::invalid_argument(format!("invalid route `{pattern}`: {e}")).with_source(e))?;
    Ok((regex, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;

    async fn ok(_: Request) -> &'static str {
        "ok"
    }

    fn route(pattern: &str) -> Route {
        Route::new(vec![Method::Get], pattern, ok.into_boxed_handler()).unwrap()
    }

    #[test]
    fn matches_whole_path_only() {
        let r = route("/users/{id}");
        assert!(r.matches(Method::Get, "/users/42"));
        assert!(!r.matches(Method::Post, "/users/42"));
        assert!(!r.matches_path("/users/42/posts"));
        assert!(!r.matches_path("/users/"));
        assert!(!r.matches_path("/api/users/42"));
    }

    #[test]
    fn literals_are_escaped() {
        let r = route("/files/{name}.json");
        assert!(r.matches_path("/files/a.json"));
        assert!(!r.matches_path("/files/aXjson"));
    }

    #[test]
    fn extracts_params_in_order() {
        let r = route("/users/{id}/posts/{post}");
        let params = r.extract("/users/7/posts/hello").unwrap();
        assert_eq!(
            params,
            vec![("id".to_owned(), "7".to_owned()), ("post".to_owned(), "hello".to_owned())]
        );
    }

    #[test]
    fn rejects_bad_patterns() {
        let h = || ok.into_boxed_handler();
        assert!(Route::new(vec![Method::Get], "/a/{id}/{id}", h()).is_err());
        assert!(Route::new(vec![Method::Get], "/a/{id", h()).is_err());
        assert!(Route::new(vec![Method::Get], "/a/id}", h()).is_err());
        assert!(Route::new(vec![Method::Get], "/a/{}", h()).is_err());
        assert!(Route::new(vec![Method::Get], "/a/{x-y}", h()).is_err());
    }

    #[test]
    fn url_substitutes_placeholders() {
        let r = route("/users/{id}/posts/{post}");
        assert_eq!(r.url(&[("id", "7"), ("post", "p")]), "/users/7/posts/p");
        assert_eq!(r.url(&[("id", "7")]), "/users/7/posts/{post}");
    }

    #[test]
    fn prefix_joins_cleanly() {
        assert_eq!(join_prefix("/api", "/users"), "/api/users");
        assert_eq!(join_prefix("/api/", "users"), "/api/users");
        assert_eq!(join_prefix("/api", "/"), "/api");
        assert_eq!(join_prefix("", "/users"), "/users");
    }
}
