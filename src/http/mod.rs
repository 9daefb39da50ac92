//! HTTP/1.1 primitives shared by the transport, the router and [`Context`](crate::context::Context).

pub mod headers;
pub mod method;
pub mod request;
pub mod response;
pub mod status;

pub use headers::Headers;
pub use method::Method;
pub use request::Request;
pub use response::Response;
pub use status::StatusCode;
