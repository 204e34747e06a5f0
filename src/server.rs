//! Transport adapter.
//!
//! Accepts TCP connections, speaks HTTP/1.1 or HTTP/2 through hyper, and
//! turns each request into a [`Request`] for [`App::dispatch`]. The
//! [`Response`] that comes back is written out with a `Content-Length`,
//! except on statuses that forbid a body.
//!
//! On SIGTERM or Ctrl-C the server stops accepting, lets in-flight
//! connections finish, then [`Server::serve`] returns. Give the process a
//! termination grace period longer than the slowest request.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::attributes;
use crate::error::{Error, ErrorKind};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::stream::Stream;
use crate::uri::Uri;

/// The HTTP server.
pub struct Server {
    addr: String,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use tsu::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Starts accepting connections and dispatching them through `app`.
    ///
    /// Fails when `addr` is not a valid `host:port` or cannot be bound.
    /// Otherwise returns only after a full graceful shutdown (SIGTERM or
    /// Ctrl-C, followed by all in-flight requests completing).
    pub async fn serve(self, app: App) -> Result<(), Error> {
        let addr: SocketAddr = self
            .addr
            .parse()
            .map_err(|e| Error::parse(format!("invalid socket address `{}`", self.addr)).with_source(e))?;
        let listener = TcpListener::bind(addr).await?;

        // Shared read-only across connection tasks.
        let app = Arc::new(app);

        info!(addr = %addr, routes = app.router().len(), "tsu listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM immediately stops
                // accepting new connections, even if more are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { handle(&app, req, remote_addr).await }
                        });

                        // `auto::Builder` serves HTTP/1.1 and HTTP/2,
                        // whatever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain: wait for every in-flight connection to finish before we return.
        while tasks.join_next().await.is_some() {}

        info!("tsu stopped");
        Ok(())
    }
}

// ── Request conversion ────────────────────────────────────────────────────────

/// One request in, one response out. Every failure is rendered, so hyper
/// never sees an error.
async fn handle(
    app: &App,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let origin = req
        .headers()
        .get(http::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let response = match into_request(req, remote_addr).await {
        Ok(request) => app.dispatch(request).await,
        Err(e) => {
            debug!(peer = %remote_addr, error = %e, "rejecting unreadable request");
            app.reject(&anyhow::Error::from(e), origin.as_deref())
        }
    };
    Ok(emit(response))
}

async fn into_request(req: hyper::Request<Incoming>, remote_addr: SocketAddr) -> Result<Request, Error> {
    let (parts, body) = req.into_parts();

    let method: Method = parts
        .method
        .as_str()
        .parse()
        .map_err(|_| Error::of(ErrorKind::MethodNotAllowed))?;

    let target = parts.uri.path_and_query().map_or("/", |pq| pq.as_str()).to_owned();
    let host = parts
        .uri
        .authority()
        .map(|a| a.as_str().to_owned())
        .or_else(|| parts.headers.get(http::header::HOST).and_then(|h| h.to_str().ok()).map(str::to_owned));
    let scheme = parts.uri.scheme_str().unwrap_or("http");
    let uri: Uri = match &host {
        Some(host) => format!("{scheme}://{host}{target}").parse()?,
        None => target.parse()?,
    };

    let body = body
        .collect()
        .await
        .map_err(|e| Error::invalid_argument("Unable to read request body.").with_source(e))?
        .to_bytes();

    let mut request = Request::new(method, uri)
        .with_request_target(target)
        .with_protocol_version(version_str(parts.version))
        .with_body(Stream::from_bytes(body))
        .with_attribute(attributes::CLIENT_IP, remote_addr.ip().to_string());

    for (name, value) in &parts.headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        // Host was derived from the URI; the wire value replaces it.
        request = if *name == http::header::HOST {
            request.with_header(name.as_str(), value)
        } else {
            request.with_added_header(name.as_str(), value)
        };
    }
    Ok(request)
}

fn version_str(version: http::Version) -> &'static str {
    match version {
        http::Version::HTTP_09 => "0.9",
        http::Version::HTTP_10 => "1.0",
        http::Version::HTTP_2 => "2",
        http::Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

fn emit(response: Response) -> http::Response<Full<Bytes>> {
    let response = response.without_header("Content-Length");
    if !allows_body(response.status_code()) {
        return response.with_body(Stream::empty()).into_http();
    }
    let length = response.body().size();
    response.with_header("Content-Length", length.to_string()).into_http()
}

/// 1xx, 204 and 304 responses never carry a body or a `Content-Length`.
fn allows_body(status: u16) -> bool {
    !matches!(status, 100..=199 | 204 | 304)
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by `kubectl` and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C, for local dev).
/// On Windows only Ctrl-C is available. A signal that cannot be installed
/// is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("unable to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("unable to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
