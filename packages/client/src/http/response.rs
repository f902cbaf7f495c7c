//! Response model
//!
//! A response exclusively owns its body buffer. Timings are populated for
//! whatever stages actually ran, including on failure.

use http::{StatusCode, Version};

use super::headers::HeaderList;
use crate::error::Kind;

/// Stage timings in microseconds. Each stage is its own duration —
/// `connect_us` the TCP connect, `tls_us` the handshake, `first_byte_us`
/// the wait from request sent to first response byte — so their sum never
/// exceeds `total_us`. A pool hit leaves `connect_us` and `tls_us` zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timings {
    pub connect_us: u64,
    pub tls_us: u64,
    pub first_byte_us: u64,
    pub total_us: u64,
}

/// Identity of the TLS session a response travelled over.
#[derive(Debug, Clone, Default)]
pub struct TlsInfo {
    /// Negotiated protocol version, e.g. `"TLSv1.3"`.
    pub version: Option<String>,
    /// Negotiated cipher suite name.
    pub cipher: Option<String>,
    /// JA3 of the profile the ClientHello was shaped with.
    pub ja3: Option<String>,
}

/// One HTTP response.
#[derive(Debug, Default)]
pub struct Response {
    pub status: u16,
    pub version: Version,
    pub headers: HeaderList,
    pub body: Vec<u8>,
    pub timings: Timings,
    pub tls: TlsInfo,
    /// Set when the request failed; `None` means success.
    pub error: Option<Kind>,
    pub error_message: Option<String>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Typed status, when the code is in the valid range.
    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.status).ok()
    }

    /// First header value for `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Body as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Build a failed response carrying whatever timings accrued.
    pub fn from_error(err: &crate::error::Error, timings: Timings) -> Self {
        Response {
            error: Some(err.kind()),
            error_message: Some(err.message()),
            timings,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error;

    #[test]
    fn test_error_response_is_populated() {
        let err = error::timeout();
        let timings = Timings {
            connect_us: 10,
            ..Default::default()
        };
        let resp = Response::from_error(&err, timings);
        assert!(!resp.is_success());
        assert_eq!(resp.error, Some(Kind::Timeout));
        assert!(resp.error_message.is_some());
        assert_eq!(resp.timings.connect_us, 10);
    }

    #[test]
    fn test_status_code_range() {
        let resp = Response {
            status: 200,
            ..Default::default()
        };
        assert_eq!(resp.status_code(), Some(StatusCode::OK));
        let resp = Response {
            status: 20,
            ..Default::default()
        };
        assert!(resp.status_code().is_none());
    }
}
