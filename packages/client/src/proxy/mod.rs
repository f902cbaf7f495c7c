//! HTTP CONNECT tunnelling and proxy credentials
//!
//! Only HTTP CONNECT with optional Basic auth is supported. Proxied
//! connections are never pooled.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{self, Error};
use crate::http::ProxyConfig;
use crate::proto::h1;

/// `Basic <b64(user:pass)>` for a proxy carrying credentials.
pub fn basic_authorization(proxy: &ProxyConfig) -> Option<String> {
    let username = proxy.username.as_deref()?;
    let password = proxy.password.as_deref().unwrap_or("");
    Some(format!(
        "Basic {}",
        BASE64.encode(format!("{username}:{password}"))
    ))
}

/// Build the CONNECT request for tunnelling to `host:port`.
pub fn encode_connect(host: &str, port: u16, proxy: &ProxyConfig) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    buf.extend_from_slice(format!("CONNECT {host}:{port} HTTP/1.1\r\n").as_bytes());
    buf.extend_from_slice(format!("Host: {host}:{port}\r\n").as_bytes());
    if let Some(value) = basic_authorization(proxy) {
        buf.extend_from_slice(b"Proxy-Authorization: ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"\r\n");
    buf
}

/// Validate the proxy's CONNECT reply. Only `HTTP/1.x 200` opens the
/// tunnel; anything else is a refusal.
pub fn check_connect_reply(head: &[u8]) -> Result<(), Error> {
    let (_, status, _) = h1::parse_response_head(head)?;
    if status != 200 {
        return Err(error::network(format!(
            "proxy refused CONNECT with status {status}"
        )));
    }
    Ok(())
}
