//! TLS fingerprint engine
//!
//! Shapes a BoringSSL context so the resulting ClientHello matches a
//! browser profile wherever the library allows: strict cipher order,
//! profile-ordered groups and signature algorithms, ALPN, ALPS,
//! certificate-compression advertisement, GREASE, OCSP stapling and SCT.
//! The handshake itself is driven non-blockingly through BoringSSL's
//! WANT_READ / WANT_WRITE signalling so the request state machine can
//! suspend on readiness.

pub mod ja3;

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Mutex;

use boring2::ssl::{
    CertCompressionAlgorithm, ConnectConfiguration, SslConnector, SslMethod, SslStream,
    SslVerifyMode, SslVersion,
};

use crate::error::{self, Error};
use crate::profiles::{is_grease, BrowserProfile, TlsVersion};

/// A transport the engine reads and writes: either a raw TCP stream or a
/// TLS session over another transport. The nesting covers TLS-in-TLS when
/// tunnelling through an HTTPS proxy.
pub enum Transport {
    Plain(TcpStream),
    Tls(Box<SslStream<Transport>>),
}

impl Transport {
    /// The raw fd readiness is armed on; the innermost socket.
    pub fn raw_fd(&self) -> RawFd {
        match self {
            Transport::Plain(stream) => stream.as_raw_fd(),
            Transport::Tls(stream) => stream.get_ref().raw_fd(),
        }
    }

    /// The innermost TCP stream.
    pub fn tcp(&self) -> &TcpStream {
        match self {
            Transport::Plain(stream) => stream,
            Transport::Tls(stream) => stream.get_ref().tcp(),
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }

    /// Negotiated ALPN protocol of the outermost TLS layer, if any.
    pub fn alpn_protocol(&self) -> Option<String> {
        match self {
            Transport::Plain(_) => None,
            Transport::Tls(stream) => stream
                .ssl()
                .selected_alpn_protocol()
                .map(|p| String::from_utf8_lossy(p).into_owned()),
        }
    }

    /// Negotiated TLS version string of the outermost TLS layer.
    pub fn tls_version(&self) -> Option<String> {
        match self {
            Transport::Plain(_) => None,
            Transport::Tls(stream) => Some(stream.ssl().version_str().to_string()),
        }
    }

    /// Negotiated cipher name of the outermost TLS layer.
    pub fn tls_cipher(&self) -> Option<String> {
        match self {
            Transport::Plain(_) => None,
            Transport::Tls(stream) => stream
                .ssl()
                .current_cipher()
                .map(|c| c.name().to_string()),
        }
    }

    /// True when the TLS layer has seen a close_notify in either
    /// direction; such a session must not be pooled.
    pub fn tls_shutdown_seen(&mut self) -> bool {
        match self {
            Transport::Plain(_) => false,
            Transport::Tls(stream) => !stream.get_shutdown().is_empty(),
        }
    }

    /// One-byte non-destructive liveness peek. `Ok(0)` means the peer
    /// closed; `WouldBlock` means alive and idle.
    pub fn peek(&mut self) -> io::Result<usize> {
        let mut byte = [0u8; 1];
        match self {
            Transport::Plain(stream) => stream.peek(&mut byte),
            Transport::Tls(stream) => stream
                .ssl_peek(&mut byte)
                .map_err(|e| io::Error::other(e.to_string())),
        }
    }

    /// Bytes of plaintext buffered inside the TLS layer.
    pub fn tls_pending(&self) -> usize {
        match self {
            Transport::Plain(_) => 0,
            Transport::Tls(stream) => stream.ssl().pending(),
        }
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(stream) => stream.read(buf),
            Transport::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(stream) => stream.write(buf),
            Transport::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::Plain(stream) => stream.flush(),
            Transport::Tls(stream) => stream.flush(),
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Plain(_) => f.write_str("Transport::Plain"),
            Transport::Tls(_) => f.write_str("Transport::Tls"),
        }
    }
}

fn map_tls_version(v: TlsVersion) -> SslVersion {
    match v {
        TlsVersion::Tls12 => SslVersion::TLS1_2,
        TlsVersion::Tls13 => SslVersion::TLS1_3,
    }
}

/// Group code to BoringSSL group name. FFDHE groups are not supported by
/// BoringSSL and are skipped from the wire offer.
fn group_name(code: u16) -> Option<&'static str> {
    match code {
        29 => Some("X25519"),
        23 => Some("P-256"),
        24 => Some("P-384"),
        25 => Some("P-521"),
        0x11ec => Some("X25519MLKEM768"),
        25497 => Some("X25519Kyber768Draft00"),
        _ => None,
    }
}

/// ALPN protocol list in the length-prefixed wire encoding BoringSSL takes.
pub(crate) fn alpn_wire_format(protocols: &[&str]) -> Vec<u8> {
    let mut wire = Vec::new();
    for proto in protocols {
        wire.push(proto.len() as u8);
        wire.extend_from_slice(proto.as_bytes());
    }
    wire
}

/// Process-wide TLS backend. Context configuration underneath is not
/// reentrant, so construction of per-profile connectors is serialized.
pub struct TlsBackend {
    config_lock: Mutex<()>,
}

impl TlsBackend {
    pub fn new() -> Self {
        Self {
            config_lock: Mutex::new(()),
        }
    }

    /// Build an `SslConnector` whose ClientHello matches `profile`.
    pub fn configure_context(&self, profile: &BrowserProfile) -> Result<SslConnector, Error> {
        let _guard = self
            .config_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut builder =
            SslConnector::builder(SslMethod::tls_client()).map_err(error::tls)?;

        builder
            .set_min_proto_version(Some(map_tls_version(profile.min_tls)))
            .map_err(error::tls)?;
        builder
            .set_max_proto_version(Some(map_tls_version(profile.max_tls)))
            .map_err(error::tls)?;

        // The profile's cipher order carries TLS 1.3 and 1.2 suites
        // intermixed; the mini-language list preserves order within each
        // bucket and strict mode stops the library re-sorting by policy.
        builder
            .set_cipher_list(profile.cipher_list)
            .map_err(error::tls)?;

        let curves = profile
            .groups
            .iter()
            .copied()
            .filter(|g| !is_grease(*g))
            .filter_map(group_name)
            .collect::<Vec<_>>()
            .join(":");
        builder.set_curves_list(&curves).map_err(error::tls)?;

        builder
            .set_sigalgs_list(profile.sigalgs_list)
            .map_err(error::tls)?;

        builder
            .set_alpn_protos(&alpn_wire_format(profile.alpn))
            .map_err(error::tls)?;

        // Advertising is what matters for the fingerprint; decompression
        // only has to be plausible for the rare server that compresses.
        builder
            .add_certificate_compression_algorithm(CertCompressionAlgorithm::Brotli)
            .map_err(error::tls)?;
        builder
            .add_certificate_compression_algorithm(CertCompressionAlgorithm::Zlib)
            .map_err(error::tls)?;

        builder.enable_signed_cert_timestamps();
        builder.enable_ocsp_stapling();
        builder.set_grease_enabled(profile.grease);

        // Without this, hosts lacking AES acceleration re-sort AES below
        // CHACHA and break the cipher-order fingerprint.
        builder.set_aes_hw_override(true);

        Ok(builder.build())
    }
}

impl Default for TlsBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one handshake drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    Done,
    WantRead,
    WantWrite,
}

enum HandshakeInner {
    /// Configured but not yet started.
    Pending(Option<(boring2::ssl::Ssl, Transport)>),
    /// Mid-handshake, resumable.
    InFlight(Option<boring2::ssl::MidHandshakeSslStream<Transport>>),
    /// Complete; holds the established stream until taken.
    Complete(Option<SslStream<Transport>>),
}

/// Drives one TLS handshake to completion over a non-blocking transport.
pub struct Handshaker {
    inner: HandshakeInner,
}

impl Handshaker {
    /// Prepare a per-connection session: ECH GREASE, verification mode,
    /// per-request ALPN (`h2` filtered out when HTTP/2 is disabled),
    /// empty ALPS settings per advertised protocol, SNI.
    pub fn new(
        connector: &SslConnector,
        transport: Transport,
        sni: &str,
        profile: &BrowserProfile,
        http2_enabled: bool,
        verify: bool,
    ) -> Result<Self, Error> {
        let mut conf: ConnectConfiguration = connector.configure().map_err(error::tls)?;

        conf.set_use_server_name_indication(true);
        conf.set_verify_hostname(verify);
        if !verify {
            conf.set_verify(SslVerifyMode::NONE);
        }
        conf.set_enable_ech_grease(true);

        let alpn: Vec<&str> = if http2_enabled {
            profile.alpn.to_vec()
        } else {
            profile.alpn_without_h2()
        };
        conf.set_alpn_protos(&alpn_wire_format(&alpn))
            .map_err(error::tls)?;

        if profile.enable_alps {
            // The modelled browsers send an empty settings blob for each
            // protocol they offer ALPS on.
            for proto in &alpn {
                conf.add_application_settings(proto.as_bytes())
                    .map_err(error::tls)?;
            }
        }

        let ssl = conf.into_ssl(sni).map_err(error::tls)?;
        Ok(Self {
            inner: HandshakeInner::Pending(Some((ssl, transport))),
        })
    }

    /// Advance the handshake. Returns `WantRead`/`WantWrite` when the
    /// transport would block; call again once the fd is ready.
    pub fn drive(&mut self) -> Result<HandshakeStatus, Error> {
        let step = match &mut self.inner {
            HandshakeInner::Pending(slot) => {
                let (ssl, transport) = slot.take().expect("handshake started twice");
                boring2::ssl::SslStreamBuilder::new(ssl, transport).connect()
            }
            HandshakeInner::InFlight(slot) => {
                let mid = slot.take().expect("handshake resumed twice");
                mid.handshake()
            }
            HandshakeInner::Complete(_) => return Ok(HandshakeStatus::Done),
        };

        match step {
            Ok(stream) => {
                self.inner = HandshakeInner::Complete(Some(stream));
                Ok(HandshakeStatus::Done)
            }
            Err(boring2::ssl::HandshakeError::WouldBlock(mid)) => {
                let status = if mid.error().code() == boring2::ssl::ErrorCode::WANT_WRITE {
                    HandshakeStatus::WantWrite
                } else {
                    HandshakeStatus::WantRead
                };
                self.inner = HandshakeInner::InFlight(Some(mid));
                Ok(status)
            }
            Err(boring2::ssl::HandshakeError::Failure(mid)) => {
                Err(error::tls(mid.into_error()))
            }
            Err(boring2::ssl::HandshakeError::SetupFailure(stack)) => Err(error::tls(stack)),
        }
    }

    /// The raw fd to arm readiness on while mid-handshake.
    pub fn raw_fd(&self) -> Option<RawFd> {
        match &self.inner {
            HandshakeInner::Pending(slot) => slot.as_ref().map(|(_, t)| t.raw_fd()),
            HandshakeInner::InFlight(slot) => slot.as_ref().map(|m| m.get_ref().raw_fd()),
            HandshakeInner::Complete(slot) => slot.as_ref().map(|s| s.get_ref().raw_fd()),
        }
    }

    /// Take the established session. Panics if the handshake is not done;
    /// callers gate on `drive` returning `Done`.
    pub fn into_transport(mut self) -> Transport {
        match &mut self.inner {
            HandshakeInner::Complete(slot) => {
                Transport::Tls(Box::new(slot.take().expect("session already taken")))
            }
            _ => unreachable!("handshake not complete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::Browser;

    #[test]
    fn test_alpn_wire_format() {
        let wire = alpn_wire_format(&["h2", "http/1.1"]);
        assert_eq!(wire[0], 2);
        assert_eq!(&wire[1..3], b"h2");
        assert_eq!(wire[3], 8);
        assert_eq!(&wire[4..12], b"http/1.1");
    }

    #[test]
    fn test_group_mapping_skips_unknown() {
        assert_eq!(group_name(29), Some("X25519"));
        assert_eq!(group_name(0x11ec), Some("X25519MLKEM768"));
        // FFDHE groups are offered by Firefox but unsupported underneath.
        assert_eq!(group_name(256), None);
    }

    #[test]
    fn test_profile_group_list_renders() {
        let p = Browser::Chrome131.profile();
        let curves: Vec<&str> = p
            .groups
            .iter()
            .copied()
            .filter(|g| !is_grease(*g))
            .filter_map(group_name)
            .collect();
        assert_eq!(curves, vec!["X25519MLKEM768", "X25519", "P-256", "P-384"]);
    }
}
