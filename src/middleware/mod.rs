//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: tracing, rate limiting, authentication,
//! permission checks.
//!
//! A middleware receives the [`Request`] and a [`Next`] continuation. It may
//! run the continuation once and post-process the response, return its own
//! response without running it (short-circuit), or fail with an error that
//! the strategy renders.
//!
//! # Shapes
//!
//! - an object implementing [`Middleware`], registered with
//!   [`MiddlewareRegistry::register`]
//! - a function `(Request, Response, Next)` wrapped by [`from_fn`]; the
//!   response argument is a `200` empty seed
//! - a factory registered with [`MiddlewareRegistry::register_factory`],
//!   called on every dispatch to build a fresh instance
//!
//! # Ordering
//!
//! Global names run first, in registration order, then the route's own.
//! The list is folded right to left around the handler, so with global
//! `[a]` and route `[b]` the request flows `a → b → handler` and the
//! response unwinds `handler → b → a`.
//!
//! # Calling `next` twice
//!
//! [`Next::run`] takes `self`, so a middleware cannot run the continuation
//! a second time. The compiler rejects it.
//!
//! Built-in middleware:
//! - [`trace::Trace`]: per-request span with method, path, status and latency
//! - [`rate_limit::RateLimit`]: rolling-window request limiting

pub mod rate_limit;
pub mod trace;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::Response;

/// A unit of request/response processing.
///
/// ```rust
/// use tsu::{BoxFuture, Middleware, Next, Request, Response, Result};
///
/// struct PoweredBy;
///
/// impl Middleware for PoweredBy {
///     fn process<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Result<Response>> {
///         Box::pin(async move {
///             let res = next.run(req).await?;
///             Ok(res.with_header("X-Powered-By", "tsu"))
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn process<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, Result<Response>>;
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn process<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, Result<Response>> {
        (**self).process(request, next)
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The rest of the chain: the remaining middleware, then the handler.
pub struct Next {
    inner: NextInner,
}

enum NextInner {
    Chain { middleware: Arc<dyn Middleware>, next: Box<Next> },
    Handler(BoxedHandler),
}

impl Next {
    pub(crate) fn handler(handler: BoxedHandler) -> Self {
        Self { inner: NextInner::Handler(handler) }
    }

    pub(crate) fn chain(middleware: Arc<dyn Middleware>, next: Next) -> Self {
        Self { inner: NextInner::Chain { middleware, next: Box::new(next) } }
    }

    /// Runs the rest of the chain. Consumes the continuation.
    pub fn run(self, request: Request) -> BoxFuture<'static, Result<Response>> {
        match self.inner {
            NextInner::Chain { middleware, next } => {
                Box::pin(async move { middleware.process(request, *next).await })
            }
            NextInner::Handler(handler) => handler.call(request),
        }
    }
}

/// Folds `layers` right to left around `terminal`.
pub(crate) fn fold(layers: Vec<Arc<dyn Middleware>>, terminal: BoxedHandler) -> Next {
    layers
        .into_iter()
        .rev()
        .fold(Next::handler(terminal), |next, layer| Next::chain(layer, next))
}

// ── Function middleware ───────────────────────────────────────────────────────

/// Wraps a function `(request, response, next)` as middleware.
///
/// The response argument is a fresh `200` with an empty body. A function
/// that short-circuits can decorate and return it instead of building one.
///
/// ```rust
/// use tsu::{Status, middleware::from_fn};
///
/// let deny = from_fn(|req, res, next| async move {
///     if req.header("authorization").is_none() {
///         return Ok(res.with_status(Status::UNAUTHORIZED));
///     }
///     next.run(req).await
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    FnMiddleware(f)
}

/// Middleware built by [`from_fn`].
pub struct FnMiddleware<F>(F);

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    fn process<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, Result<Response>> {
        Box::pin((self.0)(request, Response::default(), next))
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

type Factory = Arc<dyn Fn() -> Arc<dyn Middleware> + Send + Sync>;

#[derive(Clone)]
enum Entry {
    Instance(Arc<dyn Middleware>),
    Factory(Factory),
}

impl Entry {
    fn instantiate(&self) -> Arc<dyn Middleware> {
        match self {
            Self::Instance(mw) => Arc::clone(mw),
            Self::Factory(make) => make(),
        }
    }
}

/// Named middleware plus the global list applied to every matched route.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Entry>,
    globals: Vec<String>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a shared instance under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, middleware: impl Middleware) -> &mut Self {
        let name = name.into();
        debug!(middleware = %name, "middleware registered");
        self.entries.insert(name, Entry::Instance(Arc::new(middleware)));
        self
    }

    /// Registers a factory under `name`. It is called once per dispatch that
    /// uses the name, so instances never outlive a request.
    pub fn register_factory<F, M>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: Middleware,
    {
        let name = name.into();
        debug!(middleware = %name, "middleware factory registered");
        let make: Factory = Arc::new(move || Arc::new(factory()) as Arc<dyn Middleware>);
        self.entries.insert(name, Entry::Factory(make));
        self
    }

    /// Appends names to the global list. Accepts one name or several.
    pub fn add_global(&mut self, names: impl MiddlewareNames) -> &mut Self {
        self.globals.extend(names.into_names());
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn globals(&self) -> &[String] {
        &self.globals
    }

    /// Resolves `names` in order and folds them around `terminal`.
    /// An unregistered name is an `InvalidHandler` error.
    pub(crate) fn pipeline(&self, names: &[&str], terminal: BoxedHandler) -> Result<Next, Error> {
        let layers = names
            .iter()
            .map(|name| {
                self.entries
                    .get(*name)
                    .map(Entry::instantiate)
                    .ok_or_else(|| Error::invalid_handler(format!("Middleware `{name}` is not registered.")))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(fold(layers, terminal))
    }
}

/// One middleware name or a list of them.
pub trait MiddlewareNames {
    fn into_names(self) -> Vec<String>;
}

impl MiddlewareNames for &str {
    fn into_names(self) -> Vec<String> { vec![self.to_owned()] }
}

impl MiddlewareNames for String {
    fn into_names(self) -> Vec<String> { vec![self] }
}

impl MiddlewareNames for &[&str] {
    fn into_names(self) -> Vec<String> { self.iter().map(|s| (*s).to_owned()).collect() }
}

impl<const N: usize> MiddlewareNames for [&str; N] {
    fn into_names(self) -> Vec<String> { self.iter().map(|s| (*s).to_owned()).collect() }
}

impl MiddlewareNames for Vec<String> {
    fn into_names(self) -> Vec<String> { self }
}

impl MiddlewareNames for Vec<&str> {
    fn into_names(self) -> Vec<String> { self.into_iter().map(str::to_owned).collect() }
}
