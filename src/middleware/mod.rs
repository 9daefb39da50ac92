//! Middleware pipeline — composable before/after request handler logic.
//!
//! Middleware wraps an inner callable. Given a list of middleware and a handler,
//! [`chain`] builds one nested callable ("onion"): the first middleware's pre-logic runs
//! first and its post-logic runs last, because it wraps everything after it.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — the wrapped inner layer; call [`Next::run`] to continue.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`] / [`from_fn`] — build a [`MiddlewareHandler`].
//!
//! ## Stock middleware
//!
//! - [`accesslog::AccessLog`] — one JSON access record per request.
//! - [`errhdl::ErrorPages`] — fixed bodies per response status.
//! - [`recover::Recover`] — turns a panic in an inner layer into a response.

pub mod accesslog;
pub mod errhdl;
pub mod recover;

use std::sync::Arc;

use crate::context::Context;
use crate::router::{BoxFuture, Handler};

/// The inner layer of a middleware: the rest of the chain down to the route handler.
///
/// `Next` is passed to each middleware's [`Middleware::handle`]. It is consumed by
/// [`run`](Self::run), so a middleware calls its inner layer at most once. Returning
/// without calling it short-circuits everything inside.
///
/// # Examples
///
/// ```rust,no_run
/// use webtrie::{context::Context, middleware::{Middleware, Next}, router::BoxFuture};
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(&self, ctx: Context, next: Next) -> BoxFuture<Context> {
///         Box::pin(async move { next.run(ctx).await })
///     }
/// }
/// ```
pub struct Next {
    inner: Handler,
}

/// A type-erased, reference-counted middleware function.
///
/// The [`Arc`] wrapper makes handlers cheap to clone, so the router can hand the same
/// middleware to every request it applies to.
pub type MiddlewareHandler =
    Arc<dyn Fn(Context, Next) -> BoxFuture<Context> + Send + Sync + 'static>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use webtrie::middleware::{accesslog::AccessLog, from_middleware};
///
/// let handler = from_middleware(Arc::new(AccessLog::new()));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// Build a [`MiddlewareHandler`] from an async closure.
///
/// # Examples
///
/// ```rust
/// use webtrie::{context::Context, middleware::{Next, from_fn}};
///
/// let tag = from_fn(|mut ctx: Context, next: Next| async move {
///     ctx.set_header("X-Served-By", "webtrie");
///     next.run(ctx).await
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> MiddlewareHandler
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Context> + Send + 'static,
{
    Arc::new(move |ctx: Context, next: Next| -> BoxFuture<Context> { Box::pin(f(ctx, next)) })
}

/// Fold `middleware` around `handler`, outermost first.
///
/// The last middleware wraps the handler, the one before it wraps that, and so on, so
/// calling the result runs `middleware[0]` first.
pub fn chain(middleware: &[MiddlewareHandler], handler: Handler) -> Handler {
    middleware.iter().rev().fold(handler, |inner, mdl| {
        let mdl = Arc::clone(mdl);
        let wrapped: Handler = Arc::new(move |ctx: Context| {
            mdl(
                ctx,
                Next {
                    inner: Arc::clone(&inner),
                },
            )
        });
        wrapped
    })
}

impl Next {
    /// Wrap `inner` so it can be handed to a middleware.
    pub fn new(inner: Handler) -> Self {
        Self { inner }
    }

    /// Invokes the inner layer and returns the context it hands back.
    pub async fn run(self, ctx: Context) -> Context {
        (self.inner)(ctx).await
    }
}

/// The core trait for all middleware.
///
/// Implementors receive a [`Context`] and a [`Next`]. They may:
///
/// - **Pass through** — call `next.run(ctx).await` without modification.
/// - **Short-circuit** — write a response into `ctx` and return it without calling `next`.
/// - **Decorate** — call `next.run(ctx).await`, inspect the buffered response, and
///   change it before returning.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync` because middleware is shared across
///   Tokio tasks.
/// - `handle` **must** return a `Send` future that owns everything it uses.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the inner layer.
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<Context>;
}
