//! Access logging — one structured record per request.

use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use super::{Middleware, Next};
use crate::context::Context;
use crate::http::StatusCode;
use crate::router::BoxFuture;

type LogFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Middleware that emits a JSON access record after the inner layers return.
///
/// The record carries the `Host` header, the matched route pattern (empty when nothing
/// matched), the raw path, the method, the final status and the elapsed time:
///
/// ```text
/// {"host":"localhost","route":"/users/:id","path":"/users/42","http_method":"GET","status":200,"elapsed_us":41}
/// ```
///
/// By default the record goes to `tracing::info!`; [`log_fn`](Self::log_fn) redirects it.
/// Register it as global middleware so the matched route is known when it logs.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use webtrie::middleware::{accesslog::AccessLog, from_middleware};
///
/// let access = from_middleware(Arc::new(AccessLog::new().log_fn(|line| eprintln!("{line}"))));
/// ```
pub struct AccessLog {
    log_fn: LogFn,
}

#[derive(Debug, Serialize)]
struct AccessRecord<'a> {
    host: &'a str,
    route: &'a str,
    path: &'a str,
    http_method: &'a str,
    status: u16,
    elapsed_us: u64,
}

impl Default for AccessLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessLog {
    pub fn new() -> Self {
        Self {
            log_fn: Arc::new(|line: &str| info!(target: "webtrie::access", "{line}")),
        }
    }

    /// Send each record to `f` instead of `tracing`.
    #[must_use]
    pub fn log_fn(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.log_fn = Arc::new(f);
        self
    }
}

impl Middleware for AccessLog {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<Context> {
        let log_fn = Arc::clone(&self.log_fn);
        Box::pin(async move {
            let start = Instant::now();
            let ctx = next.run(ctx).await;
            let elapsed_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);

            let request = ctx.request();
            let record = AccessRecord {
                host: request.headers().get("host").unwrap_or_default(),
                route: ctx.matched_route().unwrap_or_default(),
                path: request.path(),
                http_method: request.method().as_str(),
                status: ctx.status().unwrap_or(StatusCode::OK).as_u16(),
                elapsed_us,
            };

            match serde_json::to_string(&record) {
                Ok(line) => log_fn(&line),
                Err(e) => warn!(error = %e, "failed to encode access record"),
            }

            ctx
        })
    }
}
