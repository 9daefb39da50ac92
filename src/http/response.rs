//! Outbound responses and their HTTP/1.1 wire form.

use bytes::{BufMut, Bytes, BytesMut};

use super::{Headers, StatusCode};

/// A finished response.
///
/// Handlers never build one directly: they write into a
/// [`Context`](crate::context::Context), and the dispatcher flushes it with
/// [`Context::into_response`](crate::context::Context::into_response). The transport
/// builds its own for framing errors (`400`, `413`).
///
/// ```
/// use webtrie::http::{Response, StatusCode};
///
/// let wire = Response::new(StatusCode::NOT_FOUND)
///     .with_body("gone")
///     .keep_alive(false)
///     .encode();
/// let text = std::str::from_utf8(&wire).unwrap();
/// assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
/// assert!(text.ends_with("Content-Length: 4\r\n\r\ngone"));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
    keep_alive: bool,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self::from_parts(status, Headers::new(), Bytes::new())
    }

    pub fn from_parts(status: StatusCode, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            keep_alive: true,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Chooses the `Connection` header written by [`encode`](Self::encode).
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Headers as set by the application; framing headers are added on encode.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Serialize to the HTTP/1.1 wire format.
    ///
    /// `Content-Type: text/plain; charset=utf-8` is added for a non-empty body without
    /// one. `Connection` and `Content-Length` are always written last and override any
    /// application value.
    pub fn encode(mut self) -> BytesMut {
        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers.append("Content-Type", "text/plain; charset=utf-8");
        }
        self.headers.remove("connection");
        self.headers.remove("content-length");

        let reason = self.status.canonical_reason().unwrap_or_default();
        let mut buf = BytesMut::with_capacity(96 + self.headers.len() * 48 + self.body.len());

        buf.put_slice(format!("HTTP/1.1 {} {reason}\r\n", self.status.as_u16()).as_bytes());
        self.headers.encode(&mut buf);
        buf.put_slice(if self.keep_alive {
            b"Connection: keep-alive\r\n".as_slice()
        } else {
            b"Connection: close\r\n".as_slice()
        });
        buf.put_slice(format!("Content-Length: {}\r\n\r\n", self.body.len()).as_bytes());
        buf.put_slice(&self.body);
        buf
    }
}
