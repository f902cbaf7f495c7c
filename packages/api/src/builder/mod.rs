//! Fluent request builder
//!
//! Chains request construction onto a terminal `send`. Construction
//! errors (bad URL, bad priority) are deferred: they surface as an
//! `InvalidParam` response from `send`, so the chain never panics.

use std::time::Duration;

use bytes::Bytes;
use http::Method;
use serde::Serialize;

use veneer_client::error::Error;
use veneer_client::{Browser, Client, Request, Response, Session};

/// Builder for one request. Created via [`crate::Veneer`] or
/// [`RequestBuilder::new`].
pub struct RequestBuilder {
    request: Result<Request, Error>,
}

impl RequestBuilder {
    pub fn new(method: Method, url: &str) -> Self {
        Self {
            request: Request::new(method, url),
        }
    }

    fn map(mut self, apply: impl FnOnce(&mut Request)) -> Self {
        if let Ok(ref mut request) = self.request {
            apply(request);
        }
        self
    }

    fn and_then(mut self, apply: impl FnOnce(&mut Request) -> Result<(), Error>) -> Self {
        if let Ok(ref mut request) = self.request {
            if let Err(e) = apply(request) {
                self.request = Err(e);
            }
        }
        self
    }

    /// Append a header; order across calls is preserved on the wire.
    pub fn header(self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        self.map(|r| r.headers.append(name, value))
    }

    /// Raw request body.
    pub fn body(self, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        self.map(|r| r.body = Some(bytes))
    }

    /// Serialize `value` as a JSON body with `Content-Type:
    /// application/json`.
    pub fn json<T: Serialize>(self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self
                .header("content-type", "application/json")
                .body(bytes),
            Err(e) => Self {
                request: Err(veneer_client::error::invalid(e)),
            },
        }
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        self.map(|r| r.set_timeout(timeout))
    }

    /// Select the browser profile this request impersonates.
    pub fn browser(self, browser: Browser) -> Self {
        self.map(|r| r.browser = browser)
    }

    /// Enable or disable HTTP/2 (`h2` is dropped from ALPN when off).
    pub fn http2(self, enabled: bool) -> Self {
        self.map(|r| r.http2 = enabled)
    }

    /// HTTP/2 stream priority: parent stream, weight 1..=256, exclusive.
    pub fn priority(self, depends_on: u32, weight: u16, exclusive: bool) -> Self {
        self.and_then(|r| r.set_priority(depends_on, weight, exclusive))
    }

    /// Route through an HTTP(S) proxy with optional Basic credentials.
    pub fn proxy(self, url: &str, username: Option<&str>, password: Option<&str>) -> Self {
        self.and_then(|r| {
            r.proxy = Some(veneer_client::ProxyConfig::new(url, username, password)?);
            Ok(())
        })
    }

    /// Toggle peer certificate verification.
    pub fn verify_ssl(self, verify: bool) -> Self {
        self.map(|r| r.verify_ssl = verify)
    }

    /// The built request, for embedders driving the state machine
    /// themselves.
    pub fn build(self) -> Result<Request, Error> {
        self.request
    }

    /// Execute on a client. Never panics; an invalid chain yields an
    /// `InvalidParam` response.
    pub fn send(self, client: &Client) -> Response {
        match self.request {
            Ok(request) => client.execute(request),
            Err(e) => Response::from_error(&e, Default::default()),
        }
    }

    /// Execute within a session (cookies + session profile).
    pub fn send_with_session(self, session: &Session) -> Response {
        match self.request {
            Ok(request) => session.execute(request),
            Err(e) => Response::from_error(&e, Default::default()),
        }
    }
}
