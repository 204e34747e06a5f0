//! Ordered route table.
//!
//! Routes are tried in registration order. The first route whose pattern
//! matches the path *and* accepts the method wins. Routes whose pattern
//! matches but whose methods do not are remembered, so a miss can be told
//! apart as `405` (with `Allow`) or `404`.
//!
//! Build the table once at startup. It is only read while serving.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Error, ErrorKind};
use crate::handler::{BoxedHandler, Controller, Handler, UnresolvedAction};
use crate::method::Method;
use crate::middleware::MiddlewareNames;
use crate::route::{Route, join_prefix};

/// Result of matching a method and path against the table.
#[derive(Debug)]
pub enum Match<'r> {
    /// A route accepts the method. Carries the captured parameters.
    Found(&'r Route, Vec<(String, String)>),
    /// The path is known but not for this method. Carries every method the
    /// path accepts, first seen first, without repeats.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// The application router.
///
/// ```rust
/// use tsu::{Method, Request, Router};
///
/// async fn show(req: Request) -> String {
///     format!("user {}", req.param("id").unwrap_or("?"))
/// }
///
/// let mut router = Router::new();
/// router.get("/users/{id}", show).name("users.show").middleware("auth");
/// router.group("/admin", |admin| {
///     admin.map(&[Method::Get, Method::Post], "/stats", show);
/// })
/// .middleware(["auth", "admin"]);
///
/// assert_eq!(router.url("users.show", &[("id", "7")]).unwrap(), "/users/7");
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    names: HashMap<String, usize>,
    controllers: HashMap<String, Arc<dyn Controller>>,
    prefixes: Vec<String>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a single-method route and returns a handle to decorate it.
    ///
    /// Path parameters use `{name}` syntax and `req.param("name")` reads
    /// them back.
    ///
    /// # Panics
    ///
    /// Panics when the pattern has unbalanced braces, an invalid placeholder
    /// name, or the same placeholder twice.
    pub fn add(&mut self, method: Method, pattern: &str, handler: impl Handler) -> RouteHandle<'_> {
        self.push(vec![method], pattern, handler.into_boxed_handler())
    }

    /// Registers one route answering several methods.
    pub fn map(&mut self, methods: &[Method], pattern: &str, handler: impl Handler) -> RouteHandle<'_> {
        self.push(methods.to_vec(), pattern, handler.into_boxed_handler())
    }

    pub fn get(&mut self, pattern: &str, handler: impl Handler) -> RouteHandle<'_> {
        self.add(Method::Get, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: impl Handler) -> RouteHandle<'_> {
        self.add(Method::Post, pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: impl Handler) -> RouteHandle<'_> {
        self.add(Method::Put, pattern, handler)
    }

    pub fn patch(&mut self, pattern: &str, handler: impl Handler) -> RouteHandle<'_> {
        self.add(Method::Patch, pattern, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: impl Handler) -> RouteHandle<'_> {
        self.add(Method::Delete, pattern, handler)
    }

    pub fn options(&mut self, pattern: &str, handler: impl Handler) -> RouteHandle<'_> {
        self.add(Method::Options, pattern, handler)
    }

    /// Builder-style registration. Returns `self` for chaining.
    ///
    /// ```rust
    /// # use tsu::{Method, Request, Router};
    /// # async fn list(_: Request) -> &'static str { "" }
    /// # async fn create(_: Request) -> &'static str { "" }
    /// let router = Router::new()
    ///     .on(Method::Get,  "/users", list)
    ///     .on(Method::Post, "/users", create);
    /// ```
    pub fn on(mut self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        self.add(method, pattern, handler);
        self
    }

    /// Registers a controller under `name` for use with [`add_action`](Self::add_action).
    pub fn controller<C: Controller>(&mut self, name: impl Into<String>, controller: C) -> &mut Self {
        let name = name.into();
        debug!(controller = %name, "controller registered");
        self.controllers.insert(name, Arc::new(controller));
        self
    }

    /// Registers a route whose handler is `action` on the controller named
    /// `controller`. The action is resolved now. When it cannot be resolved
    /// the route still registers, and every request to it fails with an
    /// `InvalidHandler` error.
    pub fn add_action(
        &mut self,
        methods: &[Method],
        pattern: &str,
        controller: &str,
        action: &str,
    ) -> RouteHandle<'_> {
        let resolved = self
            .controllers
            .get(controller)
            .and_then(|c| Arc::clone(c).action(action));
        let handler: BoxedHandler = match resolved {
            Some(handler) => handler,
            None => {
                warn!(controller, action, pattern, "route action could not be resolved");
                Arc::new(UnresolvedAction { controller: controller.to_owned(), action: action.to_owned() })
            }
        };
        self.push(methods.to_vec(), pattern, handler)
    }

    /// Registers every route defined in `define` under `prefix`.
    ///
    /// Groups nest; prefixes accumulate. The returned handle decorates every
    /// route the group registered.
    pub fn group<F>(&mut self, prefix: &str, define: F) -> GroupHandle<'_>
    where
        F: FnOnce(&mut Router),
    {
        let start = self.routes.len();
        self.prefixes.push(prefix.to_owned());
        define(self);
        self.prefixes.pop();
        let range = start..self.routes.len();
        GroupHandle { router: self, range }
    }

    /// Matches `method` and `path` against the table.
    pub fn find(&self, method: Method, path: &str) -> Match<'_> {
        let mut allow: Vec<Method> = Vec::new();
        for route in &self.routes {
            let Some(params) = route.extract(path) else { continue };
            if route.methods().contains(&method) {
                return Match::Found(route, params);
            }
            for m in route.methods() {
                if !allow.contains(m) {
                    allow.push(*m);
                }
            }
        }
        if allow.is_empty() { Match::NotFound } else { Match::MethodNotAllowed(allow) }
    }

    /// Builds the path of the route called `name`.
    ///
    /// Values are inserted as given. Placeholders with no value stay in the
    /// output. An unknown name is a `NotFound` error.
    pub fn url(&self, name: &str, params: &[(&str, &str)]) -> Result<String, Error> {
        let index = self
            .names
            .get(name)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("Route `{name}` is not defined.")))?;
        Ok(self.routes[*index].url(params))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn push(&mut self, methods: Vec<Method>, pattern: &str, handler: BoxedHandler) -> RouteHandle<'_> {
        let pattern = self.prefixes.iter().rev().fold(pattern.to_owned(), |p, prefix| join_prefix(prefix, &p));
        let route = Route::new(methods, &pattern, handler)
            .unwrap_or_else(|e| panic!("invalid route `{pattern}`: {e}"));
        debug!(methods = ?route.methods(), pattern = %pattern, "route registered");
        self.routes.push(route);
        let index = self.routes.len() - 1;
        RouteHandle { router: self, index }
    }

    fn name_route(&mut self, index: usize, name: String) {
        if let Some(previous) = self.names.insert(name.clone(), index) {
            warn!(name = %name, previous = self.routes[previous].pattern(), "route name reassigned");
        }
        self.routes[index].set_name(name);
    }
}

/// Returned by every registration. Attaches middleware and a name.
pub struct RouteHandle<'r> {
    router: &'r mut Router,
    index: usize,
}

impl RouteHandle<'_> {
    /// Appends middleware names to this route.
    pub fn middleware(mut self, names: impl MiddlewareNames) -> Self {
        self.router.routes[self.index].push_middleware(names.into_names());
        self
    }

    /// Names the route for [`Router::url`].
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.router.name_route(self.index, name.into());
        self
    }
}

/// Returned by [`Router::group`].
pub struct GroupHandle<'r> {
    router: &'r mut Router,
    range: Range<usize>,
}

impl GroupHandle<'_> {
    /// Appends middleware names to every route of the group.
    pub fn middleware(mut self, names: impl MiddlewareNames) -> Self {
        let names = names.into_names();
        for route in &mut self.router.routes[self.range.clone()] {
            route.push_middleware(names.clone());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}
