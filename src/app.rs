//! Application context and the dispatch entry point.
//!
//! An [`App`] owns everything a request needs: the route table, the
//! middleware registry, the error strategy and the CORS settings. It is
//! built once at startup and then only read, so one instance can serve
//! any number of concurrent requests. There is no process-wide state;
//! tests build a fresh `App` each.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::method::Method;
use crate::middleware::{Middleware, MiddlewareNames, MiddlewareRegistry};
use crate::request::Request;
use crate::response::Response;
use crate::router::{Match, Router};
use crate::status::Status;
use crate::strategy::ErrorStrategy;

/// ```rust
/// use tsu::{App, Config, Request, Response};
///
/// # async fn run() {
/// async fn hello(_: Request) -> &'static str { "hello" }
///
/// let mut app = App::new(Config::default());
/// app.router_mut().get("/", hello);
///
/// let res = app.dispatch(Request::try_new(tsu::Method::Get, "/").unwrap()).await;
/// assert_eq!(res.status_code(), 200);
/// # }
/// ```
pub struct App {
    config: Config,
    router: Router,
    middleware: MiddlewareRegistry,
    strategy: ErrorStrategy,
}

impl App {
    pub fn new(config: Config) -> Self {
        let strategy = ErrorStrategy::new(config.debug);
        Self { config, router: Router::new(), middleware: MiddlewareRegistry::new(), strategy }
    }

    /// Replaces the route table.
    pub fn with_router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    pub fn config(&self) -> &Config { &self.config }
    pub fn router(&self) -> &Router { &self.router }
    pub fn router_mut(&mut self) -> &mut Router { &mut self.router }
    pub fn middleware(&self) -> &MiddlewareRegistry { &self.middleware }
    pub fn middleware_mut(&mut self) -> &mut MiddlewareRegistry { &mut self.middleware }
    pub fn strategy(&self) -> &ErrorStrategy { &self.strategy }

    /// Shortcut for `middleware_mut().register(..)`.
    pub fn register(&mut self, name: impl Into<String>, middleware: impl Middleware) -> &mut MiddlewareRegistry {
        self.middleware.register(name, middleware)
    }

    /// Shortcut for `middleware_mut().register_factory(..)`.
    pub fn register_factory<F, M>(&mut self, name: impl Into<String>, factory: F) -> &mut MiddlewareRegistry
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: Middleware,
    {
        self.middleware.register_factory(name, factory)
    }

    /// Shortcut for `middleware_mut().add_global(..)`.
    pub fn add_global(&mut self, names: impl MiddlewareNames) -> &mut MiddlewareRegistry {
        self.middleware.add_global(names)
    }

    /// Runs one request through routing, middleware and the handler, and
    /// always produces a response.
    ///
    /// Failures, including panics, are rendered by the strategy. CORS
    /// headers are then added to whatever response came out.
    pub async fn dispatch(&self, request: Request) -> Response {
        let origin = request.header("origin").map(str::to_owned);

        let outcome = AssertUnwindSafe(self.route(request)).catch_unwind().await;
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => self.strategy.render(&err),
            Err(panic) => self.strategy.render(&panic_error(panic)),
        };

        self.decorate(origin.as_deref(), response)
    }

    /// Renders a failure raised before a [`Request`] could be built.
    pub(crate) fn reject(&self, err: &anyhow::Error, origin: Option<&str>) -> Response {
        self.decorate(origin, self.strategy.render(err))
    }

    fn decorate(&self, origin: Option<&str>, response: Response) -> Response {
        match &self.config.cors {
            Some(cors) => cors.apply(origin, response),
            None => response,
        }
    }

    async fn route(&self, request: Request) -> Result<Response> {
        let method = request.method();
        match self.router.find(method, request.path()) {
            Match::Found(route, params) => route.execute(request, params, &self.middleware).await,
            Match::MethodNotAllowed(allow) if method == Method::Options => {
                debug!(path = request.path(), "answering preflight");
                let allow = allow.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
                Ok(Response::empty(Status::NO_CONTENT).with_header("Allow", allow))
            }
            Match::MethodNotAllowed(allow) => Err(Error::method_not_allowed(&allow).into()),
            Match::NotFound => Err(Error::not_found().into()),
        }
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_owned());
    anyhow::anyhow!(message)
}
