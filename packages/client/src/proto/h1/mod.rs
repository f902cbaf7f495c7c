//! HTTP/1.1 codec
//!
//! Request building and response head parsing. The request buffer is built
//! once and drained by the state machine's partial-write loop; parsing
//! works on the accumulated receive buffer without copying the body tail.

pub mod chunked;

use http::Version;

use crate::error::{self, Error};
use crate::http::{HeaderList, Request};
use crate::proxy;

/// Build the full request buffer: request line, headers in caller order,
/// CRLF-CRLF, body.
///
/// The request target is origin-form (`/path?query`) on direct connections
/// and CONNECT tunnels; absolute-form through a plaintext HTTP proxy,
/// which also gets the `Proxy-Authorization` header.
pub fn encode_request(request: &Request, via_plain_proxy: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1024);

    buf.extend_from_slice(request.method.as_str().as_bytes());
    buf.push(b' ');
    if via_plain_proxy {
        buf.extend_from_slice(request.url.as_str().as_bytes());
    } else {
        buf.extend_from_slice(request.path_and_query().as_bytes());
    }
    buf.extend_from_slice(b" HTTP/1.1\r\n");

    if !request.headers.contains("host") {
        buf.extend_from_slice(b"Host: ");
        buf.extend_from_slice(request.host_header().as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    if via_plain_proxy {
        if let Some(ref proxy_config) = request.proxy {
            if let Some(value) = proxy::basic_authorization(proxy_config) {
                buf.extend_from_slice(b"Proxy-Authorization: ");
                buf.extend_from_slice(value.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
        }
    }

    for (name, value) in request.headers.iter() {
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    if let Some(ref body) = request.body {
        if !request.headers.contains("content-length") {
            buf.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
        }
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(body);
    } else {
        buf.extend_from_slice(b"\r\n");
    }

    buf
}

/// Offset of the first byte past the `\r\n\r\n` header terminator.
pub fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// Parse `HTTP/X.Y CODE REASON`.
pub fn parse_status_line(line: &str) -> Result<(Version, u16), Error> {
    let mut parts = line.splitn(3, ' ');
    let version = match parts.next() {
        Some("HTTP/1.1") => Version::HTTP_11,
        Some("HTTP/1.0") => Version::HTTP_10,
        Some(other) => {
            return Err(error::parse(format!("unknown HTTP version: {other}")));
        }
        None => return Err(error::parse("empty status line")),
    };
    let status: u16 = parts
        .next()
        .ok_or_else(|| error::parse("status line missing code"))?
        .parse()
        .map_err(|_| error::parse("non-numeric status code"))?;
    if !(100..1000).contains(&status) {
        return Err(error::parse(format!("status code out of range: {status}")));
    }
    Ok((version, status))
}

/// Parse the head of a response: status line plus headers, stopping at the
/// blank line. `buf` must contain the full head (`find_headers_end`
/// succeeded on it).
pub fn parse_response_head(head: &[u8]) -> Result<(Version, u16, HeaderList), Error> {
    let text = std::str::from_utf8(head).map_err(|_| error::parse("non-UTF-8 response head"))?;
    let mut lines = text.split("\r\n");

    let status_line = lines.next().ok_or_else(|| error::parse("empty head"))?;
    let (version, status) = parse_status_line(status_line)?;

    let mut headers = HeaderList::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| error::parse(format!("malformed header line: {line}")))?;
        headers.append(name.trim(), value.trim_start().trim_end());
    }
    Ok((version, status, headers))
}

/// How the response body is delimited, decided from the parsed head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// No body at all (HEAD, 1xx/204/304).
    None,
    /// Exactly this many bytes.
    Length(u64),
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// Read until the peer closes; the connection must not be pooled.
    ReadToEof,
}

/// Resolve framing per RFC 7230 §3.3.3, with the HEAD rule applied first.
pub fn body_framing(method_is_head: bool, status: u16, headers: &HeaderList) -> BodyFraming {
    if method_is_head || status / 100 == 1 || status == 204 || status == 304 {
        return BodyFraming::None;
    }
    if headers.is_chunked() {
        return BodyFraming::Chunked;
    }
    match headers.content_length() {
        Some(n) => BodyFraming::Length(n),
        None => BodyFraming::ReadToEof,
    }
}
