//! Ordered header list with case-insensitive names.

use bytes::{BufMut, BytesMut};

/// Request or response headers.
///
/// Entries keep their arrival order and a name may repeat. Lookups ignore ASCII case.
/// [`append`](Self::append) adds another entry; [`set`](Self::set) replaces every
/// entry of that name, which is what `Context` uses for headers it owns such as
/// `Content-Type`.
///
/// ```
/// use webtrie::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.append("Set-Cookie", "a=1");
/// headers.append("Set-Cookie", "b=2");
/// headers.set("content-type", "text/html");
/// headers.set("Content-Type", "application/json");
///
/// assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
/// assert_eq!(headers.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace all entries named `name` with a single one, placed last.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    /// The first value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Drop every entry named `name`; `true` if any existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Write every entry as a `Name: value\r\n` line.
    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        for (name, value) in &self.entries {
            buf.put_slice(name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_every_spelling() {
        let mut h: Headers = [("X-Tag", "a"), ("x-tag", "b"), ("Host", "h")]
            .into_iter()
            .collect();
        h.set("X-TAG", "c");
        assert_eq!(h.iter().collect::<Vec<_>>(), [("Host", "h"), ("X-TAG", "c")]);
    }

    #[test]
    fn remove_reports_whether_anything_went() {
        let mut h = Headers::new();
        h.append("Authorization", "Bearer token");
        assert!(h.contains("authorization"));
        assert!(h.remove("AUTHORIZATION"));
        assert!(!h.remove("authorization"));
        assert!(h.is_empty());
    }

    #[test]
    fn encodes_in_arrival_order() {
        let mut h = Headers::new();
        h.append("B", "2");
        h.append("A", "1");
        let mut buf = BytesMut::new();
        h.encode(&mut buf);
        assert_eq!(&buf[..], b"B: 2\r\nA: 1\r\n");
    }
}
