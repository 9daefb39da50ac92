//! Inbound requests: head parsing with [`httparse`] and `Content-Length` framing.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use super::{Headers, Method};

/// Why a buffer could not be turned into a [`Request`].
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request head is incomplete")]
    Incomplete,

    #[error("malformed request: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("request path `{path}` does not percent-decode to UTF-8")]
    InvalidPath { path: String },

    #[error("invalid Content-Length `{value}`")]
    InvalidContentLength { value: String },
}

/// A parsed HTTP/1.x request.
///
/// The path is percent-decoded, so the router sees `/café` for `/caf%C3%A9`; the query
/// string is kept raw. Headers whose value is not UTF-8 are dropped.
///
/// ```
/// use webtrie::http::Request;
///
/// let raw = b"GET /hello/caf%C3%A9?name=a%20b HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _head_len) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.path(), "/hello/café");
/// assert_eq!(request.query_string(), Some("name=a%20b"));
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    minor_version: u8,
    headers: Headers,
    body: Bytes,
}

impl Request {
    const MAX_HEADERS: usize = 64;

    /// Parse a request from `buf`, returning it and the length of its head.
    ///
    /// The body is whatever follows the head, capped at `Content-Length`; it may be
    /// short if `buf` does not hold the whole request yet. Use [`decode`](Self::decode)
    /// to frame requests off a connection buffer.
    ///
    /// # Errors
    ///
    /// [`RequestError::Incomplete`] until the head is fully buffered, otherwise any
    /// other [`RequestError`] for a malformed head.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let (mut request, head_len) = Self::parse_head(buf)?;
        let rest = &buf[head_len..];
        let body_len = request.declared_body_len()?.min(rest.len());
        request.body = Bytes::copy_from_slice(&rest[..body_len]);
        Ok((request, head_len))
    }

    /// Split the next complete request off the front of `buf`.
    ///
    /// Returns `Ok(None)` while the head or the declared body is still partial; `buf`
    /// is left untouched in that case. Bytes after the body stay in `buf` for the next
    /// pipelined request.
    ///
    /// # Errors
    ///
    /// Any [`RequestError`] except `Incomplete`.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, RequestError> {
        let (mut request, head_len) = match Self::parse_head(buf) {
            Ok(parsed) => parsed,
            Err(RequestError::Incomplete) => return Ok(None),
            Err(e) => return Err(e),
        };
        let body_len = request.declared_body_len()?;
        let Some(frame_len) = head_len.checked_add(body_len) else {
            return Err(RequestError::InvalidContentLength {
                value: body_len.to_string(),
            });
        };
        if buf.len() < frame_len {
            return Ok(None);
        }

        let mut frame = buf.split_to(frame_len);
        request.body = frame.split_off(head_len).freeze();
        Ok(Some(request))
    }

    fn parse_head(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut slots = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut head = httparse::Request::new(&mut slots);
        let httparse::Status::Complete(head_len) = head.parse(buf)? else {
            return Err(RequestError::Incomplete);
        };

        let method = head
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .parse::<Method>()
            .unwrap_or_else(|never| match never {});
        let target = head.path.ok_or(RequestError::MissingField { field: "path" })?;
        let minor_version = head
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let (encoded, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_owned())),
            None => (target, None),
        };
        let path = urlencoding::decode(encoded)
            .map_err(|_| RequestError::InvalidPath {
                path: encoded.to_owned(),
            })?
            .into_owned();

        let headers = head
            .headers
            .iter()
            .filter_map(|h| Some((h.name, std::str::from_utf8(h.value).ok()?)))
            .collect();

        let request = Self {
            method,
            path,
            query,
            minor_version,
            headers,
            body: Bytes::new(),
        };
        Ok((request, head_len))
    }

    fn declared_body_len(&self) -> Result<usize, RequestError> {
        match self.headers.get("content-length") {
            None => Ok(0),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| RequestError::InvalidContentLength {
                    value: value.to_owned(),
                }),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The percent-decoded path, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string, without the `?`.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// `0` for HTTP/1.0, `1` for HTTP/1.1.
    pub fn version(&self) -> u8 {
        self.minor_version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Whether the connection stays open after this request. HTTP/1.1 defaults to
    /// yes, HTTP/1.0 to no; a `Connection` header overrides either.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(value) => value.eq_ignore_ascii_case("keep-alive"),
            None => self.minor_version == 1,
        }
    }
}
