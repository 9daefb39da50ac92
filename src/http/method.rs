//! Request methods.

use std::fmt;
use std::str::FromStr;

/// An HTTP request method; the key of the router's per-method tries.
///
/// The methods [`HttpServer`](crate::app::HttpServer) has registration helpers for get
/// their own variant. Anything else the parser sees (`CONNECT`, `PURGE`, …) is kept
/// verbatim in [`Method::Other`], so extension methods can still be routed.
///
/// ```
/// use webtrie::http::Method;
///
/// let method: Method = "PATCH".parse().unwrap();
/// assert_eq!(method, Method::Patch);
/// assert_eq!("PURGE".parse::<Method>().unwrap().as_str(), "PURGE");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Options => "OPTIONS",
            Self::Other(token) => token,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsing never fails: method tokens are case-sensitive and unknown ones become
/// [`Method::Other`].
impl FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "PATCH" => Self::Patch,
            "OPTIONS" => Self::Options,
            other => Self::Other(other.to_owned()),
        };
        Ok(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_case_sensitive() {
        let lower: Method = "get".parse().unwrap();
        assert_eq!(lower, Method::Other("get".to_owned()));
        assert_ne!(lower, Method::Get);
    }

    #[test]
    fn display_matches_wire_token() {
        assert_eq!(Method::Options.to_string(), "OPTIONS");
        assert_eq!(Method::Other("CONNECT".to_owned()).to_string(), "CONNECT");
    }
}
