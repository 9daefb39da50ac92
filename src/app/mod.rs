//! Application entry point — route registration, global middleware and dispatch.
//!
//! [`HttpServer`] is the setup-phase type: register routes and global middleware on it,
//! then either call [`HttpServer::start`] or freeze it with
//! [`HttpServer::into_dispatcher`]. The resulting [`Dispatcher`] is immutable and shared
//! by every connection task.
//!
//! Each request passes through these layers, outermost first:
//!
//! 1. response flush — the buffered status, headers and body become a [`Response`] only
//!    after everything below has returned;
//! 2. global middleware, in registration order;
//! 3. routing — lookup, then the route's resolved middleware around its handler, or a
//!    `404 Not Found` when nothing is bound.

use std::future;
use std::sync::Arc;

use tracing::{debug, info};

use crate::context::Context;
use crate::http::{Method, Request, Response, StatusCode};
use crate::middleware::{self, MiddlewareHandler};
use crate::router::{BoxFuture, Handler, IntoHandler, RouteError, Router};
use crate::server::{Server, ServerError};

/// Body written when no bound route matches.
pub const NOT_FOUND_BODY: &str = "Not Found";

/// Setup-phase application: a [`Router`] plus global middleware.
///
/// # Examples
///
/// ```rust,no_run
/// use webtrie::app::HttpServer;
/// use webtrie::context::Context;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut app = HttpServer::new();
///     app.get("/users/:id", |mut ctx: Context| async move {
///         let id = ctx.path_value("id").unwrap_or("unknown").to_owned();
///         ctx.write(format!("hello, {id}"));
///         ctx
///     })?;
///     app.start("127.0.0.1:8080").await?;
///     Ok(())
/// }
/// ```
#[derive(Default)]
pub struct HttpServer {
    router: Router,
    middleware: Vec<MiddlewareHandler>,
}

impl HttpServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append global middleware. It wraps every request, matched or not, in the order
    /// given.
    #[must_use]
    pub fn with_middleware(mut self, middleware: impl IntoIterator<Item = MiddlewareHandler>) -> Self {
        self.middleware.extend(middleware);
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Register `handler` for `method` + `path`, wrapped in `middleware`.
    ///
    /// # Errors
    ///
    /// Any [`RouteError`] from [`Router::add_route`].
    pub fn route(
        &mut self,
        method: Method,
        path: &str,
        handler: impl IntoHandler,
        middleware: Vec<MiddlewareHandler>,
    ) -> Result<(), RouteError> {
        self.router
            .add_route(method, path, Some(handler.into_handler()), middleware)
    }

    /// Attach middleware to `method` + `path` without binding a handler.
    ///
    /// # Errors
    ///
    /// Any [`RouteError`] from [`Router::add_route`].
    pub fn attach(
        &mut self,
        method: Method,
        path: &str,
        middleware: Vec<MiddlewareHandler>,
    ) -> Result<(), RouteError> {
        self.router.add_route(method, path, None, middleware)
    }

    /// Register a handler for `GET` requests matching `path`.
    ///
    /// # Errors
    ///
    /// Any [`RouteError`] from [`Router::add_route`].
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) -> Result<(), RouteError> {
        self.route(Method::Get, path, handler, Vec::new())
    }

    /// Register a handler for `POST` requests matching `path`.
    ///
    /// # Errors
    ///
    /// Any [`RouteError`] from [`Router::add_route`].
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) -> Result<(), RouteError> {
        self.route(Method::Post, path, handler, Vec::new())
    }

    /// Register a handler for `PUT` requests matching `path`.
    ///
    /// # Errors
    ///
    /// Any [`RouteError`] from [`Router::add_route`].
    pub fn put(&mut self, path: &str, handler: impl IntoHandler) -> Result<(), RouteError> {
        self.route(Method::Put, path, handler, Vec::new())
    }

    /// Register a handler for `DELETE` requests matching `path`.
    ///
    /// # Errors
    ///
    /// Any [`RouteError`] from [`Router::add_route`].
    pub fn delete(&mut self, path: &str, handler: impl IntoHandler) -> Result<(), RouteError> {
        self.route(Method::Delete, path, handler, Vec::new())
    }

    /// Register a handler for `PATCH` requests matching `path`.
    ///
    /// # Errors
    ///
    /// Any [`RouteError`] from [`Router::add_route`].
    pub fn patch(&mut self, path: &str, handler: impl IntoHandler) -> Result<(), RouteError> {
        self.route(Method::Patch, path, handler, Vec::new())
    }

    /// Register a handler for `OPTIONS` requests matching `path`.
    ///
    /// # Errors
    ///
    /// Any [`RouteError`] from [`Router::add_route`].
    pub fn options(&mut self, path: &str, handler: impl IntoHandler) -> Result<(), RouteError> {
        self.route(Method::Options, path, handler, Vec::new())
    }

    /// End the setup phase.
    pub fn into_dispatcher(self) -> Dispatcher {
        Dispatcher::new(self.router, self.middleware)
    }

    /// Bind `addr` and serve until the listener fails.
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] if the address cannot be bound, [`ServerError::Io`] if the
    /// listener fails.
    pub async fn start(self, addr: impl AsRef<str>) -> Result<(), ServerError> {
        let server = Server::bind(addr).await?;
        info!(routes = self.router.len(), "routes registered");
        let dispatcher = Arc::new(self.into_dispatcher());
        server
            .run(move |request| {
                let dispatcher = Arc::clone(&dispatcher);
                async move { dispatcher.dispatch(request).await }
            })
            .await
    }
}

/// The serving-phase pipeline: global middleware around routing, built once.
pub struct Dispatcher {
    pipeline: Handler,
}

impl Dispatcher {
    fn new(router: Router, global: Vec<MiddlewareHandler>) -> Self {
        let serve: Handler = Arc::new(move |mut ctx: Context| -> BoxFuture<Context> {
            match route_chain(&router, &mut ctx) {
                Some(chain) => chain(ctx),
                None => {
                    ctx.set_status(StatusCode::NOT_FOUND);
                    ctx.set_body(NOT_FOUND_BODY);
                    Box::pin(future::ready(ctx))
                }
            }
        });

        Self {
            pipeline: middleware::chain(&global, serve),
        }
    }

    /// Run `request` through every layer and flush the result.
    pub async fn dispatch(&self, request: Request) -> Response {
        let ctx = (self.pipeline)(Context::new(request)).await;
        ctx.into_response()
    }
}

// Looks up the route for `ctx`, records the parameters and matched route on it, and
// returns the route's middleware folded around its handler. `None` means not found.
fn route_chain(router: &Router, ctx: &mut Context) -> Option<Handler> {
    let request = ctx.request();
    let Some(matched) = router.find_route(request.method(), request.path()) else {
        debug!(method = %request.method(), path = %request.path(), "no route matched");
        return None;
    };
    let Some(handler) = matched.handler().cloned() else {
        debug!(method = %request.method(), path = %request.path(), "matched node has no handler");
        return None;
    };

    let route = matched.route().unwrap_or_default().to_owned();
    let (_, params, resolved) = matched.into_parts();
    ctx.set_params(params);
    ctx.set_matched_route(route);

    Some(middleware::chain(&resolved, handler))
}
