//! Panic recovery.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use tracing::error;

use super::{Middleware, Next};
use crate::context::Context;
use crate::http::StatusCode;
use crate::router::BoxFuture;

type PanicLogFn = Arc<dyn Fn(&Context, &str) + Send + Sync>;

/// Catches a panic in any inner layer and answers with a fixed response instead.
///
/// The panicking layer's context is lost with the unwind, so the response is built on a
/// fresh context holding a copy of the request, the path parameters and the matched
/// route as they were when this middleware ran. Anything inner layers wrote is
/// discarded.
///
/// Register it as the first global middleware so it wraps every other layer.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use webtrie::http::StatusCode;
/// use webtrie::middleware::{from_middleware, recover::Recover};
///
/// let recover = Recover::new(StatusCode::INTERNAL_SERVER_ERROR, "something broke")
///     .log_fn(|ctx, message| eprintln!("panic on {}: {message}", ctx.request().path()));
/// let handler = from_middleware(Arc::new(recover));
/// ```
pub struct Recover {
    status: StatusCode,
    body: Bytes,
    log_fn: Option<PanicLogFn>,
}

impl Default for Recover {
    fn default() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    }
}

impl Recover {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
            log_fn: None,
        }
    }

    /// Called with the recovery context and the panic message after a panic is caught.
    #[must_use]
    pub fn log_fn(mut self, f: impl Fn(&Context, &str) + Send + Sync + 'static) -> Self {
        self.log_fn = Some(Arc::new(f));
        self
    }
}

impl Middleware for Recover {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<Context> {
        let status = self.status;
        let body = self.body.clone();
        let log_fn = self.log_fn.clone();

        let request = ctx.request().clone();
        let params = ctx.params().clone();
        let route = ctx.matched_route().map(str::to_owned);

        Box::pin(async move {
            let panic = match AssertUnwindSafe(next.run(ctx)).catch_unwind().await {
                Ok(ctx) => return ctx,
                Err(panic) => panic,
            };

            let message = panic_message(panic.as_ref());
            error!(
                method = %request.method(),
                path = %request.path(),
                panic = %message,
                "handler panicked"
            );

            let mut ctx = Context::new(request);
            ctx.set_params(params);
            if let Some(route) = route {
                ctx.set_matched_route(route);
            }
            ctx.set_status(status);
            ctx.set_body(&body);

            if let Some(log_fn) = log_fn {
                log_fn(&ctx, &message);
            }
            ctx
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::http::Request;
    use crate::middleware::{chain, from_middleware};
    use crate::router::{Handler, IntoHandler};

    fn make_ctx() -> Context {
        let (req, _) = Request::parse(b"GET /user HTTP/1.1\r\n\r\n").unwrap();
        Context::new(req)
    }

    fn panicking() -> Handler {
        (|ctx: Context| async move {
            if ctx.request().path() == "/user" {
                panic!("handler exploded");
            }
            ctx
        })
        .into_handler()
    }

    #[tokio::test]
    async fn panic_becomes_configured_response() {
        let seen = Arc::new(Mutex::new(None::<String>));
        let sink = Arc::clone(&seen);
        let recover = Recover::new(StatusCode::INTERNAL_SERVER_ERROR, "you panicked")
            .log_fn(move |ctx, message| {
                *sink.lock().unwrap() = Some(format!("{} {message}", ctx.request().path()));
            });

        let ctx = chain(&[from_middleware(Arc::new(recover))], panicking())(make_ctx()).await;

        assert_eq!(ctx.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(ctx.body(), b"you panicked");
        assert_eq!(seen.lock().unwrap().as_deref(), Some("/user handler exploded"));
    }

    #[tokio::test]
    async fn passes_through_without_panic() {
        let handler = (|mut ctx: Context| async move {
            ctx.write("ok");
            ctx
        })
        .into_handler();
        let recover = from_middleware(Arc::new(Recover::default()));

        let ctx = chain(&[recover], handler)(make_ctx()).await;
        assert_eq!(ctx.status(), None);
        assert_eq!(ctx.body(), b"ok");
    }

    #[test]
    fn panic_message_variants() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
