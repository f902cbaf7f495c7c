//! Ordered header list
//!
//! A fingerprint-accurate client must emit caller headers verbatim in the
//! order they were added, across distinct names. `http::HeaderMap` groups
//! entries by name, so the engine keeps its own insertion-ordered list and
//! interns the common names against a static set.

use std::borrow::Cow;
use std::fmt;

/// Header names every browser request carries; stored as `&'static str`
/// references instead of fresh allocations.
const COMMON_NAMES: &[&str] = &[
    "accept",
    "accept-encoding",
    "accept-language",
    "authorization",
    "cache-control",
    "connection",
    "content-encoding",
    "content-length",
    "content-type",
    "cookie",
    "host",
    "location",
    "referer",
    "set-cookie",
    "transfer-encoding",
    "user-agent",
];

/// Intern a header name against the common set; falls back to an owned
/// lowercase copy.
fn intern(name: &str) -> Cow<'static, str> {
    for candidate in COMMON_NAMES {
        if name.eq_ignore_ascii_case(candidate) {
            return Cow::Borrowed(candidate);
        }
    }
    Cow::Owned(name.to_ascii_lowercase())
}

/// One header entry. The name is interned when common.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: Cow<'static, str>,
    pub value: String,
}

/// Insertion-ordered header collection with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<Header>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, preserving position. Duplicate names are allowed
    /// and kept in order, as HTTP permits.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.entries.push(Header {
            name: intern(name),
            value: value.into(),
        });
    }

    /// First value for `name`, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// All values for `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove every entry with `name`; returns whether any was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|h| !h.name.eq_ignore_ascii_case(name));
        before != self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|h| (h.name.as_ref(), h.value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `Content-Length` parsed as u64, when present and well-formed.
    pub fn content_length(&self) -> Option<u64> {
        self.get("content-length").and_then(|v| v.trim().parse().ok())
    }

    /// True when `Transfer-Encoding` names `chunked`.
    pub fn is_chunked(&self) -> bool {
        self.get("transfer-encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false)
    }

    /// True when `Connection: close` was sent.
    pub fn connection_close(&self) -> bool {
        self.get("connection")
            .map(|v| v.eq_ignore_ascii_case("close"))
            .unwrap_or(false)
    }
}

impl fmt::Display for HeaderList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for h in &self.entries {
            writeln!(f, "{}: {}", h.name, h.value)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a HeaderList {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_preserved_across_names() {
        let mut headers = HeaderList::new();
        headers.append("X-B", "1");
        headers.append("Accept", "*/*");
        headers.append("X-A", "2");
        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["x-b", "accept", "x-a"]);
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let mut headers = HeaderList::new();
        headers.append("Content-Type", "text/plain");
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(headers.get("content-length"), None);
    }

    #[test]
    fn test_common_names_are_interned() {
        let mut headers = HeaderList::new();
        headers.append("Host", "example.test");
        let header = headers.into_iter().next().expect("one entry");
        assert!(matches!(header.name, Cow::Borrowed(_)));
    }

    #[test]
    fn test_duplicates_kept_in_order() {
        let mut headers = HeaderList::new();
        headers.append("set-cookie", "a=1");
        headers.append("set-cookie", "b=2");
        let values: Vec<&str> = headers.get_all("set-cookie").collect();
        assert_eq!(values, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_framing_accessors() {
        let mut headers = HeaderList::new();
        headers.append("Content-Length", "42");
        headers.append("Transfer-Encoding", "chunked");
        headers.append("Connection", "close");
        assert_eq!(headers.content_length(), Some(42));
        assert!(headers.is_chunked());
        assert!(headers.connection_close());
    }
}
