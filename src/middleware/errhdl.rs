//! Fixed error pages keyed by response status.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use super::{Middleware, Next};
use crate::context::Context;
use crate::http::StatusCode;
use crate::router::BoxFuture;

/// Replaces the response body when the final status has a registered page.
///
/// Pages are static bytes; they cannot depend on the request.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use webtrie::http::StatusCode;
/// use webtrie::middleware::{errhdl::ErrorPages, from_middleware};
///
/// let pages = ErrorPages::new()
///     .add_code(StatusCode::NOT_FOUND, "<h1>nothing here</h1>")
///     .add_code(StatusCode::INTERNAL_SERVER_ERROR, "<h1>oops</h1>");
/// let handler = from_middleware(Arc::new(pages));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ErrorPages {
    pages: Arc<HashMap<StatusCode, Bytes>>,
}

impl ErrorPages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` whenever the response status is `status`.
    #[must_use]
    pub fn add_code(mut self, status: StatusCode, body: impl Into<Bytes>) -> Self {
        Arc::make_mut(&mut self.pages).insert(status, body.into());
        self
    }
}

impl Middleware for ErrorPages {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<Context> {
        let pages = Arc::clone(&self.pages);
        Box::pin(async move {
            let mut ctx = next.run(ctx).await;
            if let Some(page) = ctx.status().and_then(|status| pages.get(&status)) {
                ctx.set_body(page);
            }
            ctx
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Request;
    use crate::middleware::{chain, from_middleware};
    use crate::router::IntoHandler;

    fn make_ctx() -> Context {
        let (req, _) = Request::parse(b"GET /missing HTTP/1.1\r\n\r\n").unwrap();
        Context::new(req)
    }

    #[tokio::test]
    async fn replaces_body_for_registered_status() {
        let pages = ErrorPages::new().add_code(StatusCode::NOT_FOUND, "custom 404");
        let handler = (|mut ctx: Context| async move {
            ctx.set_status(StatusCode::NOT_FOUND);
            ctx.write("Not Found");
            ctx
        })
        .into_handler();

        let ctx = chain(&[from_middleware(Arc::new(pages))], handler)(make_ctx()).await;
        assert_eq!(ctx.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(ctx.body(), b"custom 404");
    }

    #[tokio::test]
    async fn leaves_other_statuses_alone() {
        let pages = ErrorPages::new().add_code(StatusCode::NOT_FOUND, "custom 404");
        let handler = (|mut ctx: Context| async move {
            ctx.write("fine");
            ctx
        })
        .into_handler();

        let ctx = chain(&[from_middleware(Arc::new(pages))], handler)(make_ctx()).await;
        assert_eq!(ctx.body(), b"fine");
    }
}
