//! Per-request tracing span.

use std::time::Instant;

use tracing::{Instrument, field, info, info_span, warn};

use crate::error::Result;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

use super::{Middleware, Next};

/// Opens a `request` span with `method` and `path`, and records `status`
/// and `latency_ms` once the rest of the chain returns.
///
/// Register it first in the global list so the span covers every other
/// middleware:
///
/// ```rust
/// use tsu::{App, Config, middleware::trace::Trace};
///
/// let mut app = App::new(Config::default());
/// app.register("trace", Trace).add_global("trace");
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn process<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, Result<Response>> {
        let span = info_span!(
            "request",
            method = %request.method(),
            path = %request.path(),
            status = field::Empty,
            latency_ms = field::Empty,
        );
        Box::pin(async move {
            let start = Instant::now();
            let result = next.run(request).instrument(span.clone()).await;
            let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            span.record("latency_ms", latency_ms);

            match &result {
                Ok(res) => {
                    span.record("status", res.status_code());
                    info!(parent: &span, status = res.status_code(), latency_ms, "request completed");
                }
                Err(e) => warn!(parent: &span, error = %e, latency_ms, "request failed"),
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::handler::Handler;
    use crate::middleware::fold;
    use crate::{Error, Method};

    async fn ok(_: Request) -> &'static str {
        "ok"
    }

    async fn fail(_: Request) -> Result<Response> {
        Err(Error::not_found().into())
    }

    #[tokio::test]
    async fn passes_results_through() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let req = || Request::try_new(Method::Get, "/t").unwrap();
        let trace = || -> Arc<dyn Middleware> { Arc::new(Trace) };

        let res = fold(vec![trace()], ok.into_boxed_handler())
            .run(req())
            .await
            .unwrap();
        assert_eq!(res.body().to_string_lossy(), "ok");

        let err = fold(vec![trace()], fail.into_boxed_handler())
            .run(req())
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<Error>().is_some());
    }
}
