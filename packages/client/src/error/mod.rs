//! Error types for the client engine
//!
//! A single `Error` value travels with every failed request. The `Kind`
//! carries the coarse taxonomy the library exposes; the boxed source keeps
//! whatever the underlying layer reported.

use std::error::Error as StdError;
use std::fmt;

/// A `Result` alias where the `Err` case is `veneer_client::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents errors that can occur while driving a request.
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync>>,
    url: Option<url::Url>,
}

/// Coarse error classification surfaced on every failed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Malformed URL or API misuse.
    InvalidParam,
    /// DNS failure, connect failure, socket error, proxy refusal, EOF
    /// before headers.
    Network,
    /// Handshake failure or certificate rejection.
    Tls,
    /// Per-request deadline elapsed.
    Timeout,
    /// Malformed status line, bad chunk framing, truncated body with a
    /// known length.
    Parse,
    /// HTTP/2 session error, stream reset, GOAWAY.
    Protocol,
    /// Cooperative cancellation via the async manager.
    Cancelled,
    /// Manager shutdown forced the request out.
    ShuttingDown,
}

impl Kind {
    /// Short stable name, used in log lines and the C-style code mapping.
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::InvalidParam => "invalid_param",
            Kind::Network => "network",
            Kind::Tls => "tls",
            Kind::Timeout => "timeout",
            Kind::Parse => "parse",
            Kind::Protocol => "protocol",
            Kind::Cancelled => "cancelled",
            Kind::ShuttingDown => "shutting_down",
        }
    }
}

impl Error {
    pub(crate) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(Inner {
                kind,
                source: None,
                url: None,
            }),
        }
    }

    pub(crate) fn with<E: Into<Box<dyn StdError + Send + Sync>>>(mut self, source: E) -> Error {
        self.inner.source = Some(source.into());
        self
    }

    pub(crate) fn with_url(mut self, url: url::Url) -> Error {
        self.inner.url = Some(url);
        self
    }

    /// The coarse classification of this error.
    pub fn kind(&self) -> Kind {
        self.inner.kind
    }

    /// The URL associated with this error, if any.
    pub fn url(&self) -> Option<&url::Url> {
        self.inner.url.as_ref()
    }

    /// Returns true if the per-request deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        self.inner.kind == Kind::Timeout
    }

    /// Returns true for transport-level failures that the orchestrator may
    /// retry once when the connection came from the pool.
    pub fn is_transport(&self) -> bool {
        matches!(self.inner.kind, Kind::Network | Kind::Tls)
    }

    /// Short human-readable message, suitable for `error_message` surfaces.
    pub fn message(&self) -> String {
        match self.inner.source {
            Some(ref source) => format!("{}: {}", self, source),
            None => self.to_string(),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_struct("veneer::Error");

        f.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            f.field("source", source);
        }

        if let Some(ref url) = self.inner.url {
            f.field("url", url);
        }

        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::InvalidParam => f.write_str("invalid request parameter"),
            Kind::Network => f.write_str("network error"),
            Kind::Tls => f.write_str("TLS error"),
            Kind::Timeout => f.write_str("request deadline elapsed"),
            Kind::Parse => f.write_str("malformed response"),
            Kind::Protocol => f.write_str("HTTP/2 protocol error"),
            Kind::Cancelled => f.write_str("request cancelled"),
            Kind::ShuttingDown => f.write_str("manager shutting down"),
        }?;

        if let Some(ref url) = self.inner.url {
            write!(f, " for url ({url})")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|err| &**err as &(dyn StdError + 'static))
    }
}

// ===== constructors used across the crate =====

/// Public constructor for API-misuse errors, used by the builder facade.
pub fn invalid<E: Into<Box<dyn StdError + Send + Sync>>>(e: E) -> Error {
    Error::new(Kind::InvalidParam).with(e)
}

pub(crate) fn invalid_param<E: Into<Box<dyn StdError + Send + Sync>>>(e: E) -> Error {
    Error::new(Kind::InvalidParam).with(e)
}

pub(crate) fn network<E: Into<Box<dyn StdError + Send + Sync>>>(e: E) -> Error {
    Error::new(Kind::Network).with(e)
}

pub(crate) fn tls<E: Into<Box<dyn StdError + Send + Sync>>>(e: E) -> Error {
    Error::new(Kind::Tls).with(e)
}

pub(crate) fn timeout() -> Error {
    Error::new(Kind::Timeout)
}

pub(crate) fn parse<E: Into<Box<dyn StdError + Send + Sync>>>(e: E) -> Error {
    Error::new(Kind::Parse).with(e)
}

pub(crate) fn protocol<E: Into<Box<dyn StdError + Send + Sync>>>(e: E) -> Error {
    Error::new(Kind::Protocol).with(e)
}

pub(crate) fn cancelled() -> Error {
    Error::new(Kind::Cancelled)
}

pub(crate) fn shutting_down() -> Error {
    Error::new(Kind::ShuttingDown)
}

pub(crate) fn url_error<E: Into<Box<dyn StdError + Send + Sync>>>(url: url::Url, e: E) -> Error {
    Error::new(Kind::InvalidParam).with(e).with_url(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_accessors() {
        let err = timeout();
        assert!(err.is_timeout());
        assert_eq!(err.kind(), Kind::Timeout);
        assert!(!err.is_transport());

        let err = network(std::io::Error::other("connection refused"));
        assert!(err.is_transport());
        assert!(err.message().contains("connection refused"));
    }

    #[test]
    fn test_display_includes_url() {
        let url = url::Url::parse("https://example.test/x").expect("static url");
        let err = Error::new(Kind::Network).with_url(url);
        assert!(err.to_string().contains("example.test"));
    }
}
