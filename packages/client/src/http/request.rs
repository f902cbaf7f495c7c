//! Request model
//!
//! A request is assembled mutably, then treated as immutable once handed to
//! the engine. The engine never alters a submitted request; retries resend
//! the same value.

use std::time::Duration;

use bytes::Bytes;
use http::Method;
use url::Url;

use super::headers::HeaderList;
use crate::error::{self, Error};
use crate::profiles::Browser;

/// HTTP/2 stream priority carried on the initial HEADERS frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPriority {
    /// Parent stream id (0 for the root).
    pub depends_on: u32,
    /// Weight, 1..=256.
    pub weight: u16,
    pub exclusive: bool,
}

impl Default for StreamPriority {
    fn default() -> Self {
        Self {
            depends_on: 0,
            weight: 16,
            exclusive: false,
        }
    }
}

impl StreamPriority {
    /// True when this priority differs from the protocol default and must
    /// be emitted on the wire.
    pub fn is_non_default(&self) -> bool {
        self.depends_on != 0 || self.weight != 16 || self.exclusive
    }
}

/// Proxy configuration for one request: an `http://` or `https://` proxy
/// URL plus optional Basic credentials.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub url: Url,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    pub fn new(url: &str, username: Option<&str>, password: Option<&str>) -> Result<Self, Error> {
        let url = Url::parse(url).map_err(error::invalid_param)?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(error::invalid_param(format!(
                    "unsupported proxy scheme: {other}"
                )))
            }
        }
        if url.host_str().is_none() {
            return Err(error::invalid_param("proxy URL has no host"));
        }
        Ok(Self {
            url,
            username: username.map(str::to_owned),
            password: password.map(str::to_owned),
        })
    }

    /// True when the hop to the proxy itself is TLS.
    pub fn is_tls(&self) -> bool {
        self.url.scheme() == "https"
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.url
            .port()
            .unwrap_or(if self.is_tls() { 443 } else { 8080 })
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some()
    }
}

/// One HTTP request. Immutable once submitted to the engine.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderList,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
    pub browser: Browser,
    pub http2: bool,
    pub priority: StreamPriority,
    pub proxy: Option<ProxyConfig>,
    pub verify_ssl: bool,
}

impl Request {
    /// Parse and validate the URL; only `http` and `https` are accepted.
    pub fn new(method: Method, url: &str) -> Result<Self, Error> {
        let url = Url::parse(url).map_err(error::invalid_param)?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(error::url_error(
                    url.clone(),
                    format!("unsupported scheme: {other}"),
                ))
            }
        }
        if url.host_str().is_none() {
            return Err(error::url_error(url.clone(), "URL has no host"));
        }
        Ok(Self {
            method,
            url,
            headers: HeaderList::new(),
            body: None,
            timeout: None,
            browser: Browser::default(),
            http2: true,
            priority: StreamPriority::default(),
            proxy: None,
            verify_ssl: true,
        })
    }

    pub fn is_https(&self) -> bool {
        self.url.scheme() == "https"
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Effective port, defaulting per scheme.
    pub fn port(&self) -> u16 {
        self.url
            .port()
            .unwrap_or(if self.is_https() { 443 } else { 80 })
    }

    /// The pool key: `host:port`.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host(), self.port())
    }

    /// `Host:` header value; the port is included only when non-default.
    pub fn host_header(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{}", self.host(), port),
            None => self.host().to_string(),
        }
    }

    /// Path plus query, origin-form.
    pub fn path_and_query(&self) -> String {
        let path = self.url.path();
        match self.url.query() {
            Some(q) => format!("{path}?{q}"),
            None => path.to_string(),
        }
    }

    /// Validate HTTP/2 priority bounds per RFC 7540 §5.3.
    pub fn set_priority(&mut self, depends_on: u32, weight: u16, exclusive: bool) -> Result<(), Error> {
        if !(1..=256).contains(&weight) {
            return Err(error::invalid_param(format!(
                "HTTP/2 weight out of range: {weight}"
            )));
        }
        self.priority = StreamPriority {
            depends_on,
            weight,
            exclusive,
        };
        Ok(())
    }

    /// Set the request deadline, measured from submission.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }
}
