//! TCP transport.
//!
//! [`Server`] owns the listener and spawns one tokio task per connection. Each task
//! frames requests off its read buffer with [`Request::decode`], hands them to the
//! request function (in practice [`Dispatcher::dispatch`](crate::app::Dispatcher::dispatch))
//! one at a time, and writes the responses back in order. Connections stay open until
//! the peer closes, a request asks for `Connection: close`, or framing fails.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{Request, Response, StatusCode};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Largest partial request a connection buffers before answering `413` (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

const INITIAL_BUF_SIZE: usize = 4096;

/// A bound listener, ready to serve.
///
/// [`HttpServer::start`](crate::app::HttpServer::start) is the usual way in; use
/// `Server` directly to put a different request function behind the transport.
///
/// ```rust,no_run
/// use webtrie::server::Server;
/// use webtrie::http::{Response, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server
///         .run(|_req| async { Response::new(StatusCode::OK).with_body("Hello!") })
///         .await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// # Errors
    ///
    /// [`ServerError::Bind`] when the address does not resolve or cannot be bound.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// The bound address; useful after binding port `0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections forever, answering every request with `handler`.
    ///
    /// Failed accepts are logged and skipped.
    ///
    /// # Errors
    ///
    /// Reserved for listener failures; the accept loop currently only returns by being
    /// dropped.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, "webtrie listening");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    continue;
                }
            };
            debug!(%peer, "connection accepted");

            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, peer, &*handler).await {
                    warn!(%peer, error = %e, "connection ended with error");
                }
            });
        }
    }
}

async fn serve_connection<H, F>(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: &H,
) -> std::io::Result<()>
where
    H: Fn(Request) -> F,
    F: Future<Output = Response>,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        let request = match Request::decode(&mut buf) {
            Ok(Some(request)) => request,
            Ok(None) if buf.len() > MAX_REQUEST_SIZE => {
                warn!(%peer, buffered = buf.len(), "request too large");
                let reply = Response::new(StatusCode::PAYLOAD_TOO_LARGE)
                    .with_body("Request entity too large");
                return send_final(&mut stream, reply).await;
            }
            Ok(None) => {
                if stream.read_buf(&mut buf).await? == 0 {
                    debug!(%peer, "connection closed by peer");
                    return Ok(());
                }
                continue;
            }
            Err(e) => {
                warn!(%peer, error = %e, "bad request");
                let reply =
                    Response::new(StatusCode::BAD_REQUEST).with_body(format!("Bad Request: {e}"));
                return send_final(&mut stream, reply).await;
            }
        };

        let keep_alive = request.is_keep_alive();
        debug!(%peer, method = %request.method(), path = %request.path(), "dispatching");

        let response = handler(request).await.keep_alive(keep_alive);
        stream.write_all(&response.encode()).await?;

        if !keep_alive {
            debug!(%peer, "closing after Connection: close");
            return Ok(());
        }
    }
}

// Writes a response that ends the connection.
async fn send_final(stream: &mut TcpStream, response: Response) -> std::io::Result<()> {
    stream.write_all(&response.keep_alive(false).encode()).await?;
    stream.shutdown().await
}
