//! # tsu
//!
//! The request-dispatch core of a JSON API service: an immutable HTTP message
//! model, an ordered path router, a composable middleware pipeline and a
//! single failure-to-response boundary.
//!
//! ## The contract
//!
//! - **Messages never change in place.** Every `with_*` returns a new value.
//!   A middleware that keeps an earlier request still sees it as it was.
//! - **Middleware order is fixed.** Global middleware runs first, then the
//!   route's own, then the handler. Responses unwind in reverse.
//! - **Failures are rendered once.** Handlers and middleware return errors;
//!   the [`ErrorStrategy`] turns them into one stable JSON envelope:
//!   `{"error": {"message", "type", "code", "debug"?}}`.
//! - **No global state.** Everything hangs off an [`App`] built at startup.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tsu::{App, Config, Error, Request, Response, Result, Server, Status};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut app = App::new(Config::from_env()?);
//!     app.router_mut().get("/users/{id}", get_user).name("users.show");
//!     app.router_mut().post("/users", create_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await?;
//!     Ok(())
//! }
//!
//! async fn get_user(req: Request) -> Result<Response> {
//!     match req.param("id") {
//!         Some("42") => Ok(Response::json(br#"{"id":42}"#.to_vec())),
//!         _ => Err(Error::not_found().into()),
//!     }
//! }
//!
//! async fn create_user(req: Request) -> Result<Response> {
//!     let input: serde_json::Value = req.json()?;
//!     Ok(Response::json_value(&input)?
//!         .with_status(Status::CREATED)
//!         .with_header("Location", "/users/99"))
//! }
//! ```

mod app;
mod config;
mod cors;
mod error;
mod handler;
mod headers;
mod method;
mod request;
mod response;
mod route;
mod router;
mod server;
mod status;
mod strategy;
mod stream;
mod uri;

pub mod attributes;
pub mod middleware;

pub use app::App;
pub use attributes::Attributes;
pub use config::Config;
pub use cors::CorsConfig;
pub use error::{Error, ErrorKind, GENERIC_MESSAGE, Result};
pub use handler::{BoxFuture, BoxedHandler, Controller, Handler, IntoHandlerResult, bind};
pub use headers::{HeaderValues, Headers};
pub use method::Method;
pub use middleware::{Middleware, MiddlewareRegistry, Next};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response};
pub use route::Route;
pub use router::{GroupHandle, Match, RouteHandle, Router};
pub use server::Server;
pub use status::Status;
pub use strategy::ErrorStrategy;
pub use stream::Stream;
pub use uri::Uri;
