//! Minimal tsu example: JSON endpoints, a controller, middleware and CORS.
//!
//! Run with:
//!   RUST_LOG=debug APP_DEBUG=true CORS_ALLOWED_ORIGINS=https://a.com cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl http://localhost:3000/users/7          → 404 envelope
//!   curl -X PATCH http://localhost:3000/users/42 → 405 with Allow
//!   curl -X POST http://localhost:3000/api/users \
//!        -H 'authorization: Bearer t' -d '{"name":"alice"}'
//!   curl -X OPTIONS -H 'origin: https://a.com' http://localhost:3000/users/42

use std::sync::Arc;
use std::time::Duration;

use tsu::middleware::{from_fn, rate_limit::RateLimit, trace::Trace};
use tsu::{
    App, BoxedHandler, Config, Controller, Error, Method, Request, Response, Result, Server,
    Status, attributes, bind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut app = App::new(Config::from_env()?);

    app.register("trace", Trace)
        .register("throttle", RateLimit::new(60, Duration::from_secs(60)))
        .register("auth", from_fn(|req: Request, _res, next| async move {
            let Some(token) = req.header("authorization").map(str::to_owned) else {
                return Err(Error::unauthorized().into());
            };
            next.run(req.with_attribute(attributes::TOKEN, token)).await
        }))
        .add_global(["trace", "throttle"]);

    let router = app.router_mut();
    router.controller("users", Users { greeting: "hello".to_owned() });
    router.add_action(&[Method::Get], "/users/{id}", "users", "show").name("users.show");
    router.delete("/users/{id}", delete_user);
    router
        .group("/api", |api| {
            api.post("/users", create_user);
        })
        .middleware("auth");

    Server::bind("0.0.0.0:3000").serve(app).await?;
    Ok(())
}

struct Users {
    greeting: String,
}

impl Users {
    async fn show(self: Arc<Self>, req: Request) -> Result<Response> {
        match req.param("id") {
            Some("42") => Ok(Response::json_value(&serde_json::json!({
                "id": 42,
                "greeting": self.greeting,
            }))?),
            _ => Err(Error::not_found().into()),
        }
    }
}

impl Controller for Users {
    fn action(self: Arc<Self>, name: &str) -> Option<BoxedHandler> {
        match name {
            "show" => Some(bind(self, Users::show)),
            _ => None,
        }
    }
}

// POST /api/users → 201 with Location
async fn create_user(req: Request) -> Result<Response> {
    let input: serde_json::Value = req.json()?;
    if input.get("name").is_none() {
        return Err(Error::missing_required_fields().into());
    }
    Ok(Response::json_value(&input)?
        .with_status(Status::CREATED)
        .with_header("Location", "/users/99"))
}

// DELETE /users/{id} → 204 No Content
async fn delete_user(_req: Request) -> Status {
    Status::NO_CONTENT
}
