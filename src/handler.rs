//! Route handlers.
//!
//! A handler is any `async fn(Request) -> R` where `R` converts into
//! `Result<Response>`. The router stores them as [`BoxedHandler`]
//! (`Arc<dyn ErasedHandler>`), so routes with different handler types live
//! in one table and the same handler can serve concurrent requests.
//!
//! Controller actions are handlers too. A [`Controller`] maps action names
//! to handlers bound to a shared instance, and
//! [`Router::add_action`](crate::Router::add_action) resolves the name once,
//! when the route is registered.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::status::Status;

/// A heap-allocated, type-erased future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe call interface behind [`BoxedHandler`].
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, Result<Response>>;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Handler results ───────────────────────────────────────────────────────────

/// What a handler may return: any [`IntoResponse`] value, or a `Result` of
/// one whose error converts into `anyhow::Error`.
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> Result<Response>;
}

macro_rules! infallible_results {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl IntoHandlerResult for $ty {
                fn into_handler_result(self) -> Result<Response> {
                    Ok(self.into_response())
                }
            }
        )+
    };
}

infallible_results!(Response, &'static str, String, Status, serde_json::Value);

impl<T, E> IntoHandlerResult for std::result::Result<T, E>
where
    T: IntoResponse,
    E: Into<anyhow::Error>,
{
    fn into_handler_result(self) -> Result<Response> {
        self.map(IntoResponse::into_response).map_err(Into::into)
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Anything that can be registered as a route handler: an
/// `async fn(Request) -> impl IntoHandlerResult` or an equivalent closure.
/// Sealed.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandlerResult + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandlerResult + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandlerResult + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Result<Response>> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_handler_result() })
    }
}

// ── Controllers ───────────────────────────────────────────────────────────────

/// A named group of actions.
///
/// ```rust
/// use std::sync::Arc;
/// use tsu::{BoxedHandler, Controller, Request, Response, Result, bind};
///
/// struct Users { greeting: String }
///
/// impl Users {
///     async fn show(self: Arc<Self>, req: Request) -> Result<Response> {
///         let id = req.param("id").unwrap_or("?");
///         Ok(Response::text(format!("{} {id}", self.greeting)))
///     }
/// }
///
/// impl Controller for Users {
///     fn action(self: Arc<Self>, name: &str) -> Option<BoxedHandler> {
///         match name {
///             "show" => Some(bind(self, Users::show)),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Controller: Send + Sync + 'static {
    /// Resolves `name` to a handler bound to this controller.
    fn action(self: Arc<Self>, name: &str) -> Option<BoxedHandler>;
}

/// Binds a method-like function to a shared controller instance.
pub fn bind<C, F, Fut, R>(controller: Arc<C>, method: F) -> BoxedHandler
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandlerResult + Send + 'static,
{
    let handler = move |req: Request| method(Arc::clone(&controller), req);
    handler.into_boxed_handler()
}

/// A controller action that could not be resolved at registration. Every
/// call fails with `InvalidHandler`, which renders as a 500.
pub(crate) struct UnresolvedAction {
    pub(crate) controller: String,
    pub(crate) action: String,
}

impl ErasedHandler for UnresolvedAction {
    fn call(&self, _req: Request) -> BoxFuture<'static, Result<Response>> {
        let err = Error::invalid_handler(format!(
            "Invalid route callback `{}@{}`.",
            self.controller, self.action
        ));
        Box::pin(async move { Err(err.into()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, Method};

    async fn plain(_req: Request) -> &'static str {
        "plain"
    }

    async fn fallible(req: Request) -> Result<Response> {
        match req.param("id") {
            Some(id) => Ok(Response::text(id.to_owned())),
            None => Err(Error::not_found().into()),
        }
    }

    fn request() -> Request {
        Request::try_new(Method::Get, "/").unwrap()
    }

    #[tokio::test]
    async fn plain_handler_is_ok() {
        let res = plain.into_boxed_handler().call(request()).await.unwrap();
        assert_eq!(res.body().to_string_lossy(), "plain");
    }

    #[tokio::test]
    async fn fallible_handler_propagates_error() {
        let err = fallible.into_boxed_handler().call(request()).await.unwrap_err();
        assert_eq!(err.downcast_ref::<Error>().map(Error::kind), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn unresolved_target_is_invalid_handler() {
        let target = UnresolvedAction { controller: "users".into(), action: "nope".into() };
        let err = target.call(request()).await.unwrap_err();
        assert_eq!(err.downcast_ref::<Error>().map(Error::kind), Some(ErrorKind::InvalidHandler));
    }
}
