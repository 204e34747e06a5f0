//! Rolling-window rate limiting.
//!
//! Every key keeps the timestamps of its accepted requests inside the
//! current window. On each request:
//!
//! 1. timestamps older than `now - window` are dropped
//! 2. the request is allowed when fewer than `limit` remain, and its
//!    timestamp is recorded
//! 3. `remaining` is `limit` minus the recorded count
//! 4. `reset` is the oldest retained timestamp plus `window`, or
//!    `now + window` when nothing is retained
//!
//! Denied requests fail with `RateLimitExceeded` (429) carrying
//! `Retry-After` and the `X-RateLimit-*` headers. Allowed responses carry
//! `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`
//! (Unix seconds).
//!
//! The store is an in-process concurrent map. Register one shared instance
//! so every dispatch sees the same counters. Keys whose newest hit has left
//! the window are swept at most once per window, from inside `check`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tracing::debug;

use crate::attributes;
use crate::error::{Error, Result};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

use super::{Middleware, Next};

/// Builds the bucket key for a request.
pub type KeyFn = Arc<dyn Fn(&Request) -> String + Send + Sync>;

/// Outcome of one check against the window.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: usize,
    pub remaining: usize,
    /// Unix time, in seconds, at which the oldest counted request expires.
    pub reset: u64,
}

pub struct RateLimit {
    limit: usize,
    window: Duration,
    key: KeyFn,
    hits: DashMap<String, VecDeque<Duration>>,
    /// Milliseconds since the epoch of the last sweep.
    swept_at: AtomicU64,
}

impl RateLimit {
    /// `limit` requests per `window`, keyed by client identity and route.
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            key: Arc::new(default_key),
            hits: DashMap::new(),
            swept_at: AtomicU64::new(0),
        }
    }

    /// Replaces the key function.
    pub fn with_key<F>(mut self, key: F) -> Self
    where
        F: Fn(&Request) -> String + Send + Sync + 'static,
    {
        self.key = Arc::new(key);
        self
    }

    /// Records a hit for `key` at `now` (time since the Unix epoch).
    pub fn check(&self, key: &str, now: Duration) -> Decision {
        self.maybe_gc(now);

        let mut entry = self.hits.entry(key.to_owned()).or_default();
        let log = entry.value_mut();

        let floor = now.saturating_sub(self.window);
        while log.front().is_some_and(|&t| t <= floor) {
            log.pop_front();
        }

        let allowed = log.len() < self.limit;
        if allowed {
            log.push_back(now);
        }

        let reset = log.front().map_or(now + self.window, |&oldest| oldest + self.window);
        let decision = Decision {
            allowed,
            limit: self.limit,
            remaining: self.limit.saturating_sub(log.len()),
            reset: ceil_secs(reset),
        };

        let emptied = log.is_empty();
        drop(entry);
        if emptied {
            self.hits.remove_if(key, |_, log| log.is_empty());
        }
        decision
    }

    /// Drops every key whose newest hit is outside the window at `now`.
    pub fn gc(&self, now: Duration) {
        let floor = now.saturating_sub(self.window);
        let before = self.hits.len();
        self.hits.retain(|_, log| log.back().is_some_and(|&t| t > floor));
        let dropped = before.saturating_sub(self.hits.len());
        if dropped > 0 {
            debug!(dropped, kept = self.hits.len(), "rate limit keys swept");
        }
    }

    /// Number of keys currently held.
    pub fn tracked_keys(&self) -> usize {
        self.hits.len()
    }

    fn maybe_gc(&self, now: Duration) {
        let now_ms = u64::try_from(now.as_millis()).unwrap_or(u64::MAX);
        let window_ms = u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX);
        let last = self.swept_at.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) < window_ms {
            return;
        }
        // One caller per window does the sweep.
        if self.swept_at.compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Relaxed).is_ok() {
            self.gc(now);
        }
    }

    fn decorate(decision: &Decision, response: Response) -> Response {
        response
            .with_header("X-RateLimit-Limit", decision.limit.to_string())
            .with_header("X-RateLimit-Remaining", decision.remaining.to_string())
            .with_header("X-RateLimit-Reset", decision.reset.to_string())
    }
}

impl Middleware for RateLimit {
    fn process<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, Result<Response>> {
        Box::pin(async move {
            let key = (self.key)(&request);
            let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
            let decision = self.check(&key, now);

            if !decision.allowed {
                let retry_after = decision.reset.saturating_sub(now.as_secs()).max(1);
                debug!(key = %key, retry_after, "rate limit exceeded");
                return Err(Error::rate_limit_exceeded()
                    .with_header("Retry-After", retry_after.to_string())
                    .with_header("X-RateLimit-Limit", decision.limit.to_string())
                    .with_header("X-RateLimit-Remaining", "0")
                    .with_header("X-RateLimit-Reset", decision.reset.to_string())
                    .into());
            }

            let response = next.run(request).await?;
            Ok(Self::decorate(&decision, response))
        })
    }
}

/// `identity:METHOD path`, where identity is the authenticated user, the
/// first `X-Forwarded-For` hop, `X-Real-IP`, the peer address, or `unknown`.
pub fn default_key(request: &Request) -> String {
    let identity = user_id(request)
        .or_else(|| {
            request
                .header("x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        })
        .or_else(|| request.header("x-real-ip").map(str::to_owned))
        .or_else(|| request.attribute::<String>(attributes::CLIENT_IP).cloned())
        .unwrap_or_else(|| "unknown".to_owned());
    format!("{identity}:{} {}", request.method(), request.path())
}

fn user_id(request: &Request) -> Option<String> {
    let attrs = request.attributes();
    attrs
        .get::<String>(attributes::USER)
        .cloned()
        .or_else(|| attrs.get::<u64>(attributes::USER).map(|id| format!("user:{id}")))
        .or_else(|| attrs.get::<i64>(attributes::USER).map(|id| format!("user:{id}")))
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}
