//! # webtrie
//!
//! A small async HTTP/1.1 framework: a per-method segment trie router with static,
//! `:param`, `:param(regex)` and `*` segments, and onion-style middleware at the global
//! and per-route level.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use webtrie::app::HttpServer;
//! use webtrie::context::Context;
//! use webtrie::middleware::{accesslog::AccessLog, from_middleware, recover::Recover};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app = HttpServer::new().with_middleware([
//!         from_middleware(Arc::new(Recover::default())),
//!         from_middleware(Arc::new(AccessLog::new())),
//!     ]);
//!     app.get("/hello/:name", |mut ctx: Context| async move {
//!         let name = ctx.path_value("name").unwrap_or("world").to_owned();
//!         ctx.write(format!("Hello, {name}!"));
//!         ctx
//!     })?;
//!     app.start("127.0.0.1:8080").await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use app::{Dispatcher, HttpServer};
pub use context::{Context, ContextError, PathParams};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::{Handler, IntoHandler, RouteError, Router};
pub use server::{Server, ServerError};
