//! End-to-end dispatch through `App`: routing, middleware order, error
//! envelopes, CORS, rate limiting and named routes.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tsu::middleware::{from_fn, rate_limit::RateLimit};
use tsu::{
    App, BoxFuture, BoxedHandler, Config, Controller, CorsConfig, Error, GENERIC_MESSAGE, Method,
    Middleware, Next, Request, Response, Result, bind,
};

fn request(method: Method, target: &str) -> Request {
    Request::try_new(method, target).unwrap()
}

fn json(res: &Response) -> Value {
    serde_json::from_slice(&res.body().to_bytes()).unwrap()
}

async fn show_user(req: Request) -> String {
    format!("user {}", req.param("id").unwrap_or("?"))
}

async fn boom(_: Request) -> Result<Response> {
    Err(anyhow::anyhow!("boom"))
}

/// Appends its tag to `x-in` on the way in and to `x-out` on the way out.
struct Marker(&'static str);

impl Middleware for Marker {
    fn process<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Result<Response>> {
        Box::pin(async move {
            let req = req.with_added_header("x-in", self.0);
            let res = next.run(req).await?;
            Ok(res.with_added_header("x-out", self.0))
        })
    }
}

async fn echo_markers(req: Request) -> Response {
    Response::text("handler").with_header("x-seen", req.header_line("x-in"))
}

// ── Router ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn route_parameter_is_bound() {
    let mut app = App::new(Config::default());
    app.router_mut().get("/users/{id}", show_user);

    let res = app.dispatch(request(Method::Get, "/users/42")).await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(res.body().to_string_lossy(), "user 42");
}

#[tokio::test]
async fn wrong_method_is_405_with_allow() {
    let mut app = App::new(Config::default());
    app.router_mut().get("/users/{id}", show_user);

    let res = app.dispatch(request(Method::Post, "/users/42")).await;
    assert_eq!(res.status_code(), 405);
    assert_eq!(res.header("Allow"), Some("GET"));
    let body = json(&res);
    assert_eq!(body["error"]["type"], "MethodNotAllowed");
    assert_eq!(body["error"]["code"], 405);
}

#[tokio::test]
async fn unknown_path_is_404() {
    let mut app = App::new(Config::default());
    app.router_mut().get("/users/{id}", show_user);

    let res = app.dispatch(request(Method::Get, "/nope")).await;
    assert_eq!(res.status_code(), 404);
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(json(&res)["error"]["type"], "NotFound");
}

#[tokio::test]
async fn named_route_builds_url() {
    let mut app = App::new(Config::default());
    app.router_mut().get("/users/{id}", show_user).name("users.show");

    let url = app.router().url("users.show", &[("id", "7")]).unwrap();
    assert!(url.contains("/7"));
    assert!(!url.contains("{id}"));
}

// ── Middleware ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn global_then_route_middleware_unwinds_in_reverse() {
    let mut app = App::new(Config::default());
    app.register("a", Marker("A")).register("b", Marker("B")).add_global("a");
    app.router_mut().get("/m", echo_markers).middleware("b");

    let res = app.dispatch(request(Method::Get, "/m")).await;
    assert_eq!(res.header("x-seen"), Some("A, B"));
    assert_eq!(res.header_line("x-out"), "B, A");
}

#[tokio::test]
async fn short_circuit_skips_the_rest() {
    let mut app = App::new(Config::default());
    app.register(
        "gate",
        from_fn(|_req, res: Response, _next| async move { Ok::<_, anyhow::Error>(res.with_header("x-gate", "closed")) }),
    )
    .register("b", Marker("B"));
    app.router_mut().get("/m", echo_markers).middleware(["gate", "b"]);

    let res = app.dispatch(request(Method::Get, "/m")).await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(res.header("x-gate"), Some("closed"));
    assert!(!res.has_header("x-seen"));
    assert!(!res.has_header("x-out"));
}

#[tokio::test]
async fn middleware_errors_are_rendered() {
    let mut app = App::new(Config::default());
    app.register(
        "auth",
        from_fn(|_req, _res, _next| async move { Err::<Response, anyhow::Error>(Error::unauthorized().into()) }),
    );
    app.router_mut().get("/private", show_user).middleware("auth");

    let res = app.dispatch(request(Method::Get, "/private")).await;
    assert_eq!(res.status_code(), 401);
    assert_eq!(json(&res)["error"]["type"], "Unauthorized");
}

#[tokio::test]
async fn unregistered_middleware_is_500() {
    let mut app = App::new(Config::default());
    app.router_mut().get("/x", show_user).middleware("ghost");

    let res = app.dispatch(request(Method::Get, "/x")).await;
    assert_eq!(res.status_code(), 500);
    assert_eq!(json(&res)["error"]["type"], "InvalidHandlerError");
}

#[tokio::test]
async fn group_middleware_applies_to_group_only() {
    let mut app = App::new(Config::default());
    app.register("a", Marker("A"));
    app.router_mut().get("/open", echo_markers);
    app.router_mut()
        .group("/admin", |admin| {
            admin.get("/stats", echo_markers);
        })
        .middleware("a");

    let open = app.dispatch(request(Method::Get, "/open")).await;
    assert!(!open.has_header("x-out"));
    let admin = app.dispatch(request(Method::Get, "/admin/stats")).await;
    assert_eq!(admin.header("x-out"), Some("A"));
}

#[tokio::test]
async fn rate_limit_denies_with_429() {
    let mut app = App::new(Config::default());
    app.register("throttle", RateLimit::new(2, Duration::from_secs(60))).add_global("throttle");
    app.router_mut().get("/users/{id}", show_user);

    let req = || request(Method::Get, "/users/1").with_header("X-Forwarded-For", "9.9.9.9");
    let first = app.dispatch(req()).await;
    assert_eq!(first.header("X-RateLimit-Remaining"), Some("1"));
    let second = app.dispatch(req()).await;
    assert_eq!(second.header("X-RateLimit-Remaining"), Some("0"));

    let third = app.dispatch(req()).await;
    assert_eq!(third.status_code(), 429);
    assert!(third.has_header("Retry-After"));
    assert_eq!(third.header("X-RateLimit-Limit"), Some("2"));
    assert_eq!(json(&third)["error"]["type"], "RateLimitExceeded");

    let other_client = app
        .dispatch(request(Method::Get, "/users/1").with_header("X-Forwarded-For", "8.8.8.8"))
        .await;
    assert_eq!(other_client.status_code(), 200);
}

// ── Controllers ───────────────────────────────────────────────────────────────

struct Posts;

impl Posts {
    async fn index(self: Arc<Self>, _req: Request) -> &'static str {
        "posts"
    }
}

impl Controller for Posts {
    fn action(self: Arc<Self>, name: &str) -> Option<BoxedHandler> {
        (name == "index").then(|| bind(self, Posts::index))
    }
}

#[tokio::test]
async fn controller_actions_dispatch() {
    let mut app = App::new(Config::default());
    let router = app.router_mut();
    router.controller("posts", Posts);
    router.add_action(&[Method::Get], "/posts", "posts", "index");
    router.add_action(&[Method::Get], "/drafts", "posts", "drafts");
    router.add_action(&[Method::Get], "/ghost", "nobody", "index");

    assert_eq!(app.dispatch(request(Method::Get, "/posts")).await.body().to_string_lossy(), "posts");
    for path in ["/drafts", "/ghost"] {
        let res = app.dispatch(request(Method::Get, path)).await;
        assert_eq!(res.status_code(), 500);
        assert_eq!(json(&res)["error"]["type"], "InvalidHandlerError");
    }
}

// ── Error strategy ────────────────────────────────────────────────────────────

#[tokio::test]
async fn production_hides_untyped_failures() {
    let mut app = App::new(Config { debug: false, cors: None });
    app.router_mut().get("/boom", boom);

    let res = app.dispatch(request(Method::Get, "/boom")).await;
    assert_eq!(res.status_code(), 500);
    let body = json(&res);
    assert_eq!(body["error"]["code"], 500);
    assert_eq!(body["error"]["message"], GENERIC_MESSAGE);
    assert_ne!(body["error"]["message"], "boom");
    assert!(body["error"].get("debug").is_none());
}

#[tokio::test]
async fn debug_exposes_message_and_trace() {
    let mut app = App::new(Config { debug: true, cors: None });
    app.router_mut().get("/boom", boom);

    let res = app.dispatch(request(Method::Get, "/boom")).await;
    assert_eq!(res.status_code(), 500);
    let body = json(&res);
    assert_eq!(body["error"]["message"], "boom");
    let trace = body["error"]["debug"]["trace"].as_array().unwrap();
    assert!(!trace.is_empty());
}

#[tokio::test]
async fn typed_error_code_is_validated() {
    async fn odd(_: Request) -> Result<Response> {
        Err(Error::permission_denied().with_code(7).into())
    }

    let mut app = App::new(Config::default());
    app.router_mut().get("/odd", odd);

    let res = app.dispatch(request(Method::Get, "/odd")).await;
    assert_eq!(res.status_code(), 500);
    let body = json(&res);
    assert_eq!(body["error"]["code"], 500);
    assert_eq!(body["error"]["type"], "PermissionDenied");
}

// ── CORS ──────────────────────────────────────────────────────────────────────

fn cors_app() -> App {
    let config = Config { debug: false, cors: Some(CorsConfig::for_origins(["https://a.com"])) };
    let mut app = App::new(config);
    app.router_mut().get("/users/{id}", show_user);
    app
}

#[tokio::test]
async fn cors_headers_for_allowed_origin_only() {
    let app = cors_app();

    let allowed = app
        .dispatch(request(Method::Get, "/users/1").with_header("Origin", "https://a.com"))
        .await;
    assert_eq!(allowed.header("Access-Control-Allow-Origin"), Some("https://a.com"));

    let denied = app
        .dispatch(request(Method::Get, "/users/1").with_header("Origin", "https://b.com"))
        .await;
    assert_eq!(denied.status_code(), 200);
    assert!(denied.headers().iter().all(|(name, _)| !name.starts_with("Access-Control-")));
}

#[tokio::test]
async fn preflight_gets_allow_and_cors() {
    let app = cors_app();

    let res = app
        .dispatch(request(Method::Options, "/users/1").with_header("Origin", "https://a.com"))
        .await;
    assert_eq!(res.status_code(), 204);
    assert_eq!(res.header("Allow"), Some("GET"));
    assert_eq!(res.header("Access-Control-Allow-Origin"), Some("https://a.com"));
    assert_eq!(res.header("Access-Control-Max-Age"), Some("86400"));

    let missing = app.dispatch(request(Method::Options, "/nope")).await;
    assert_eq!(missing.status_code(), 404);
}
