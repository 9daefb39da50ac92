//! Per-request context — the state shared by handlers and middleware.
//!
//! A [`Context`] is created by the dispatcher for every request and handed by value
//! through the middleware chain to the route handler and back out again. Besides the
//! inbound [`Request`] it carries:
//!
//! - the [`PathParams`] captured by the router (`:id`, `:id(expr)` segments),
//! - the matched route pattern, e.g. `/users/:id` rather than `/users/42`, which is the
//!   label observability middleware should use,
//! - a buffered response: status, headers and body bytes. Nothing is written to the
//!   connection until every layer has returned; see [`Context::into_response`].

use std::collections::HashMap;
use std::str::FromStr;

use bytes::BytesMut;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::http::{Headers, Request, Response, StatusCode};

/// Errors produced by [`Context`] accessors and helpers.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("path parameter `{key}` not present")]
    MissingParam { key: String },

    #[error("path parameter `{key}` has invalid value `{value}`: {reason}")]
    InvalidParam {
        key: String,
        value: String,
        reason: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Path parameters extracted from the matched route.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    /// Create a new empty parameters map
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert a value, replacing any previous capture under the same name
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    /// Get a value from the parameters map
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over `(name, value)` pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for PathParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            map: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Per-request state threaded through the middleware chain.
///
/// # Examples
///
/// ```
/// use webtrie::context::Context;
/// use webtrie::http::{Request, StatusCode};
///
/// let (request, _) = Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
/// let mut ctx = Context::new(request);
/// ctx.set_status(StatusCode::CREATED);
/// ctx.write("made");
///
/// let response = ctx.into_response();
/// assert_eq!(response.status(), StatusCode::CREATED);
/// assert_eq!(response.body(), b"made");
/// ```
#[derive(Debug)]
pub struct Context {
    request: Request,
    params: PathParams,
    matched_route: Option<String>,
    status: Option<StatusCode>,
    headers: Headers,
    body: BytesMut,
}

impl Context {
    /// Create a new context from a request
    pub fn new(request: Request) -> Self {
        Self {
            request,
            params: PathParams::new(),
            matched_route: None,
            status: None,
            headers: Headers::new(),
            body: BytesMut::new(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }

    /// Look up a captured path parameter.
    ///
    /// # Errors
    ///
    /// [`ContextError::MissingParam`] when the matched route has no parameter named `key`.
    pub fn path_value(&self, key: &str) -> Result<&str, ContextError> {
        self.params.get(key).ok_or_else(|| ContextError::MissingParam {
            key: key.to_owned(),
        })
    }

    /// Look up a captured path parameter and parse it.
    ///
    /// # Errors
    ///
    /// [`ContextError::MissingParam`] when absent, [`ContextError::InvalidParam`] when the
    /// value does not parse as `T`.
    pub fn path_value_as<T>(&self, key: &str) -> Result<T, ContextError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let value = self.path_value(key)?;
        value.parse().map_err(|e: T::Err| ContextError::InvalidParam {
            key: key.to_owned(),
            value: value.to_owned(),
            reason: e.to_string(),
        })
    }

    /// The registered pattern of the route that matched, e.g. `/users/:id`.
    ///
    /// `None` until routing has happened, and for requests that matched nothing.
    pub fn matched_route(&self) -> Option<&str> {
        self.matched_route.as_deref()
    }

    pub(crate) fn set_matched_route(&mut self, route: impl Into<String>) {
        self.matched_route = Some(route.into());
    }

    /// The response status set so far. `None` flushes as `200 OK`.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// The buffered response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Append bytes to the buffered response body.
    pub fn write(&mut self, data: impl AsRef<[u8]>) {
        self.body.extend_from_slice(data.as_ref());
    }

    /// Replace the buffered response body.
    pub fn set_body(&mut self, data: impl AsRef<[u8]>) {
        self.body.clear();
        self.body.extend_from_slice(data.as_ref());
    }

    /// Add a response header. Repeated names are kept; see [`Headers::append`].
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.append(name, value);
    }

    /// Deserialize the request body as JSON.
    ///
    /// # Errors
    ///
    /// [`ContextError::Json`] when the body is not valid JSON for `T`.
    pub fn bind_json<T>(&self) -> Result<T, ContextError>
    where
        T: DeserializeOwned,
    {
        Ok(serde_json::from_slice(self.request.body())?)
    }

    /// Serialize `value` as the response body with the given status.
    ///
    /// # Errors
    ///
    /// [`ContextError::Json`] when `value` cannot be serialized; the buffered response
    /// is left untouched in that case.
    pub fn resp_json<T>(&mut self, status: StatusCode, value: &T) -> Result<(), ContextError>
    where
        T: Serialize + ?Sized,
    {
        let data = serde_json::to_vec(value)?;
        self.status = Some(status);
        self.headers.set("Content-Type", "application/json");
        self.set_body(data);
        Ok(())
    }

    /// [`resp_json`](Self::resp_json) with `200 OK`.
    ///
    /// # Errors
    ///
    /// See [`resp_json`](Self::resp_json).
    pub fn resp_json_ok<T>(&mut self, value: &T) -> Result<(), ContextError>
    where
        T: Serialize + ?Sized,
    {
        self.resp_json(StatusCode::OK, value)
    }

    /// Flush the buffered status, headers and body into a [`Response`].
    pub fn into_response(self) -> Response {
        Response::from_parts(
            self.status.unwrap_or_default(),
            self.headers,
            self.body.freeze(),
        )
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    fn make_ctx(raw: &str) -> Context {
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        Context::new(req)
    }

    #[test]
    fn path_value_present_and_missing() {
        let mut ctx = make_ctx("GET /users/42 HTTP/1.1\r\n\r\n");
        ctx.set_params([("id", "42")].into_iter().collect());

        assert_eq!(ctx.path_value("id").unwrap(), "42");
        assert!(matches!(
            ctx.path_value("name"),
            Err(ContextError::MissingParam { key }) if key == "name"
        ));
    }

    #[test]
    fn path_value_as_parses_numbers() {
        let mut ctx = make_ctx("GET /values/7 HTTP/1.1\r\n\r\n");
        ctx.set_params([("id", "7"), ("bad", "x7")].into_iter().collect());

        assert_eq!(ctx.path_value_as::<i64>("id").unwrap(), 7);
        assert!(matches!(
            ctx.path_value_as::<i64>("bad"),
            Err(ContextError::InvalidParam { value, .. }) if value == "x7"
        ));
    }

    #[test]
    fn write_appends_and_set_body_replaces() {
        let mut ctx = make_ctx("GET / HTTP/1.1\r\n\r\n");
        ctx.write("ab");
        ctx.write(b"c");
        assert_eq!(ctx.body(), b"abc");
        ctx.set_body("z");
        assert_eq!(ctx.body(), b"z");
    }

    #[test]
    fn into_response_defaults_to_ok() {
        let ctx = make_ctx("GET / HTTP/1.1\r\n\r\n");
        let response = ctx.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
    }

    #[test]
    fn into_response_carries_headers() {
        let mut ctx = make_ctx("GET / HTTP/1.1\r\n\r\n");
        ctx.set_header("X-Trace", "abc");
        let response = ctx.into_response();
        assert_eq!(response.headers().get("x-trace"), Some("abc"));
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct User {
        name: String,
    }

    #[test]
    fn bind_json_reads_body() {
        let mut ctx = make_ctx(
            "POST /user HTTP/1.1\r\nContent-Length: 14\r\n\r\n{\"name\":\"Tom\"}",
        );
        let user: User = ctx.bind_json().unwrap();
        assert_eq!(user.name, "Tom");

        ctx = make_ctx("POST /user HTTP/1.1\r\nContent-Length: 3\r\n\r\nnot");
        assert!(matches!(ctx.bind_json::<User>(), Err(ContextError::Json(_))));
    }

    #[test]
    fn resp_json_sets_status_type_and_body() {
        let mut ctx = make_ctx("GET /user/123 HTTP/1.1\r\n\r\n");
        ctx.resp_json_ok(&User {
            name: "Tom".to_owned(),
        })
        .unwrap();

        assert_eq!(ctx.status(), Some(StatusCode::OK));
        assert_eq!(ctx.body(), br#"{"name":"Tom"}"#);
        let response = ctx.into_response();
        assert_eq!(
            response.headers().get("content-type"),
            Some("application/json")
        );
    }
}
