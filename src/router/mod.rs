//! Request routing — a per-method segment trie.
//!
//! [`Router`] keeps one trie of [`Node`]s per HTTP method. Registered paths are split
//! on `/` and every segment becomes one node:
//!
//! | Segment         | Example route         | Matches                        | Captured           |
//! |-----------------|-----------------------|--------------------------------|--------------------|
//! | literal         | `/users`              | `/users`                       | *(none)*           |
//! | `:name`         | `/users/:id`          | `/users/42`                    | `id → "42"`        |
//! | `:name(expr)`   | `/posts/:id([0-9]+)`  | `/posts/7`, not `/posts/new`   | `id → "7"`         |
//! | `*`             | `/files/*`            | `/files/a`, `/files/a/b/c`     | *(none)*           |
//!
//! A parent holds any number of literal children but only one dynamic child, so
//! `/a/:id` and `/a/*` cannot both be registered.
//!
//! Lookup walks the trie once, without backtracking. At each level a literal child
//! wins over the dynamic child. The last node on the way down that has a handler is
//! remembered; if a later segment matches nothing, that node is the result. This is
//! what lets a trailing `*` swallow any number of segments.
//!
//! Middleware is resolved by a separate breadth-first walk, see
//! [`Router::find_middleware`].

mod node;

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

pub use node::{Node, Segment};

use crate::context::{Context, PathParams};
use crate::http::Method;
use crate::middleware::MiddlewareHandler;

/// A boxed, `Send` future — the return type of handlers and middleware.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Type-erased, heap-allocated async handler.
///
/// A handler receives the request [`Context`] by value, writes its response into it,
/// and hands it back. Handlers are stored behind `Arc<dyn Fn(…)>` so they can be
/// shared across connection tasks without copying the closure. Build one from an async
/// closure with [`IntoHandler::into_handler`].
pub type Handler = Arc<dyn Fn(Context) -> BoxFuture<Context> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Context> + Send` that is also
/// `Send + Sync + 'static` implements this trait automatically via the blanket impl
/// below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> BoxFuture<Context>;

    /// Erase the concrete type into a shareable [`Handler`].
    fn into_handler(self) -> Handler
    where
        Self: Sized,
    {
        Arc::new(move |ctx: Context| self.call(ctx))
    }
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Context> + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture<Context> {
        Box::pin((self)(ctx))
    }
}

/// Errors raised while registering a route.
///
/// These are programming errors in the route table: fix the route definitions rather
/// than retrying.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route path is empty")]
    EmptyPath,

    #[error("route path `{path}` must start with `/`")]
    MissingLeadingSlash { path: String },

    #[error("route path `{path}` must not end with `/`")]
    TrailingSlash { path: String },

    #[error("route path `{path}` contains an empty segment")]
    EmptySegment { path: String },

    #[error("route {method} {path} is already registered")]
    DuplicateRoute { method: Method, path: String },

    #[error("dynamic segment `{attempted}` conflicts with existing `{existing}`")]
    ConflictingDynamicChild { existing: String, attempted: String },

    #[error("invalid pattern in segment `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// The result of a successful [`Router::find_route`].
///
/// The node may be unbound (an intermediate segment such as `/order` when only
/// `/order/create` is registered); callers treat that as not found.
pub struct RouteMatch<'a> {
    node: &'a Node,
    params: PathParams,
    middleware: Vec<MiddlewareHandler>,
}

impl<'a> RouteMatch<'a> {
    pub fn node(&self) -> &'a Node {
        self.node
    }

    pub fn handler(&self) -> Option<&'a Handler> {
        self.node.handler()
    }

    /// The registered path of the matched route, e.g. `/users/:id`.
    pub fn route(&self) -> Option<&'a str> {
        self.node.route()
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Middleware for this request, outermost first.
    pub fn middleware(&self) -> &[MiddlewareHandler] {
        &self.middleware
    }

    pub fn into_parts(self) -> (&'a Node, PathParams, Vec<MiddlewareHandler>) {
        (self.node, self.params, self.middleware)
    }
}

impl fmt::Debug for RouteMatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("node", &self.node.pattern())
            .field("route", &self.node.route())
            .field("params", &self.params)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// HTTP request router backed by one segment trie per method.
///
/// Build it completely before serving: lookups take `&self` and do no locking, so a
/// finished router can be shared freely, but it must not be mutated while requests
/// are in flight.
///
/// # Examples
///
/// ```rust
/// use webtrie::http::Method;
/// use webtrie::router::{IntoHandler, Router};
/// use webtrie::context::Context;
///
/// let mut router = Router::new();
/// let show = (|ctx: Context| async move { ctx }).into_handler();
/// router.add_route(Method::Get, "/users/:id", Some(show), Vec::new()).unwrap();
///
/// let matched = router.find_route(&Method::Get, "/users/42").unwrap();
/// assert_eq!(matched.route(), Some("/users/:id"));
/// assert_eq!(matched.params().get("id"), Some("42"));
/// ```
#[derive(Debug, Default)]
pub struct Router {
    trees: HashMap<Method, Node>,
    routes: usize,
}

impl Router {
    /// Create a new, empty `Router` with no registered routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number of bound routes across all methods.
    pub fn len(&self) -> usize {
        self.routes
    }

    /// Return `true` if no route has been bound.
    pub fn is_empty(&self) -> bool {
        self.routes == 0
    }

    /// Register `path` for `method`.
    ///
    /// With `handler = None` only the middleware is attached and the node stays unbound;
    /// a later call may bind it. Middleware from repeated calls on one path is appended
    /// in call order.
    ///
    /// # Errors
    ///
    /// - [`RouteError::EmptyPath`], [`RouteError::MissingLeadingSlash`],
    ///   [`RouteError::TrailingSlash`], [`RouteError::EmptySegment`] for malformed paths.
    /// - [`RouteError::DuplicateRoute`] when a handler is already bound to this path.
    /// - [`RouteError::ConflictingDynamicChild`] when a dynamic segment collides with a
    ///   different one registered at the same position.
    /// - [`RouteError::InvalidPattern`] when a `:name(expr)` expression does not compile.
    ///
    /// A failed registration may leave unbound intermediate nodes behind; they never
    /// match as routes.
    pub fn add_route(
        &mut self,
        method: Method,
        path: &str,
        handler: Option<Handler>,
        middleware: Vec<MiddlewareHandler>,
    ) -> Result<(), RouteError> {
        validate_path(path)?;

        let mut node = self.trees.entry(method.clone()).or_insert_with(Node::root);
        if path != "/" {
            for seg in path[1..].split('/') {
                node = node.child_or_create(seg)?;
            }
        }

        if let Some(handler) = handler {
            if node.is_bound() {
                return Err(RouteError::DuplicateRoute {
                    method,
                    path: path.to_owned(),
                });
            }
            node.bind(path, handler);
            self.routes += 1;
        }
        node.attach(middleware);

        debug!(method = %method, path, "route registered");
        Ok(())
    }

    /// Find the node serving `method` + `path`.
    ///
    /// `path` must already be percent-decoded, as [`Request::path`](crate::http::Request::path)
    /// is; the router matches it byte for byte. Surrounding slashes are ignored,
    /// so `/user/` looks up `/user`. Returns `None` when the method has no routes or
    /// the descent fails with no bound node seen on the way down.
    pub fn find_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        let root = self.trees.get(method)?;

        if path == "/" {
            return Some(RouteMatch {
                node: root,
                params: PathParams::new(),
                middleware: root.middleware().to_vec(),
            });
        }

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let mut params = PathParams::new();
        let mut last_bound: Option<&Node> = None;
        let mut node = root;

        for seg in &segments {
            let Some(child) = node.child_of(seg) else {
                node = last_bound?;
                break;
            };
            node = child;

            if let Some(name) = node.segment().param_name() {
                params.insert(name, *seg);
            }
            if node.is_bound() {
                last_bound = Some(node);
            }
        }

        Some(RouteMatch {
            node,
            params,
            middleware: collect_middleware(root, &segments),
        })
    }

    /// Every middleware that applies to `method` + `path`, outermost first.
    ///
    /// This is a breadth-first walk, one layer per path segment, independent of the
    /// node [`find_route`](Self::find_route) picks. The root's own middleware comes
    /// first. At each layer every frontier node is tested against the segment: `*` and
    /// `:name` nodes always pass, `:name(expr)` nodes pass when `expr` matches, literal
    /// nodes pass on equality. A passing node contributes its middleware and puts its
    /// children (dynamic first) on the next frontier.
    ///
    /// The walk does not check that a passing node lies on the path the matcher
    /// chose. With `/a/b` and `/a/*` both registered, a request for `/a/b` gets the
    /// middleware of `/a/*` followed by that of `/a/b`.
    pub fn find_middleware(&self, method: &Method, path: &str) -> Vec<MiddlewareHandler> {
        let Some(root) = self.trees.get(method) else {
            return Vec::new();
        };
        if path == "/" {
            return root.middleware().to_vec();
        }
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        collect_middleware(root, &segments)
    }
}

fn collect_middleware(root: &Node, segments: &[&str]) -> Vec<MiddlewareHandler> {
    let mut resolved = root.middleware().to_vec();
    let mut frontier: Vec<&Node> = root.successors().collect();
    let mut next: Vec<&Node> = Vec::new();

    for seg in segments {
        if frontier.is_empty() {
            break;
        }
        for node in frontier.drain(..) {
            if !node.segment().admits(seg) {
                continue;
            }
            resolved.extend_from_slice(node.middleware());
            next.extend(node.successors());
        }
        std::mem::swap(&mut frontier, &mut next);
    }

    resolved
}

fn validate_path(path: &str) -> Result<(), RouteError> {
    if path.is_empty() {
        return Err(RouteError::EmptyPath);
    }
    if !path.starts_with('/') {
        return Err(RouteError::MissingLeadingSlash {
            path: path.to_owned(),
        });
    }
    if path == "/" {
        return Ok(());
    }
    if path.ends_with('/') {
        return Err(RouteError::TrailingSlash {
            path: path.to_owned(),
        });
    }
    if path[1..].split('/').any(str::is_empty) {
        return Err(RouteError::EmptySegment {
            path: path.to_owned(),
        });
    }
    Ok(())
}
