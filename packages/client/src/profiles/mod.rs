//! Browser profiles
//!
//! Each profile is an immutable record of the TLS and HTTP/2 shape of a
//! specific browser build: cipher order, extension order, supported groups,
//! signature algorithms, ALPN, GREASE, certificate compression posture and
//! the SETTINGS block it opens HTTP/2 connections with. Profiles are shared
//! statics; nothing mutates one after construction.

use std::sync::OnceLock;

mod chrome;
mod edge;
mod firefox;
mod safari;

pub use chrome::{CHROME_124, CHROME_131};
pub use edge::EDGE_122;
pub use firefox::FIREFOX_122;
pub use safari::SAFARI_17;

/// TLS protocol version bound used by profile records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    Tls12,
    Tls13,
}

impl TlsVersion {
    /// The wire value, as it appears in the JA3 first field.
    pub fn wire_code(&self) -> u16 {
        match self {
            TlsVersion::Tls12 => 0x0303,
            TlsVersion::Tls13 => 0x0304,
        }
    }
}

/// Immutable description of one browser build's TLS + HTTP/2 shape.
pub struct BrowserProfile {
    /// Display name, e.g. `"Chrome/131"`.
    pub name: &'static str,
    pub min_tls: TlsVersion,
    pub max_tls: TlsVersion,
    /// Cipher suite codes in ClientHello order, TLS 1.3 and 1.2 intermixed.
    pub cipher_codes: &'static [u16],
    /// The same suites in BoringSSL's cipher mini-language, same order.
    pub cipher_list: &'static str,
    /// Extension codes in ClientHello order. GREASE slots appear inline
    /// with the profile's GREASE extension value.
    pub extension_codes: &'static [u16],
    /// Supported groups in preference order. GREASE slots appear inline.
    pub groups: &'static [u16],
    /// Signature algorithm codes in preference order.
    pub sigalg_codes: &'static [u16],
    /// The same algorithms in BoringSSL's sigalgs list syntax, same order.
    pub sigalgs_list: &'static str,
    /// ALPN protocols in offer order.
    pub alpn: &'static [&'static str],
    /// EC point formats advertised (JA3 field five).
    pub point_formats: &'static [u8],
    pub grease: bool,
    pub grease_cipher: u16,
    pub grease_extension: u16,
    pub grease_group: u16,
    /// Advertise ALPS (application_settings, extension 17513) for each
    /// offered ALPN protocol.
    pub enable_alps: bool,
    /// HTTP/2 SETTINGS pairs in emission order.
    pub h2_settings: &'static [(u16, u32)],
    /// Connection-level WINDOW_UPDATE increment sent after SETTINGS.
    pub h2_window_update: u32,
    pub user_agent: &'static str,
    /// Default headers the facade applies when the caller has not.
    pub default_headers: &'static [(&'static str, &'static str)],
    pub(crate) ja3_cache: OnceLock<String>,
}

impl BrowserProfile {
    /// The JA3 fingerprint of this profile, lowercase MD5 hex. Computed
    /// from the profile's own ordered lists, never from a negotiation
    /// outcome, so it is deterministic across servers.
    pub fn ja3_hex(&'static self) -> &'static str {
        self.ja3_cache
            .get_or_init(|| crate::tls::ja3::ja3_hex(self))
            .as_str()
    }

    /// ALPN list with `h2` removed, used when HTTP/2 is disabled on a
    /// request.
    pub fn alpn_without_h2(&self) -> Vec<&'static str> {
        self.alpn.iter().copied().filter(|p| *p != "h2").collect()
    }
}

impl std::fmt::Debug for BrowserProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserProfile")
            .field("name", &self.name)
            .field("ciphers", &self.cipher_codes.len())
            .field("extensions", &self.extension_codes.len())
            .field("alpn", &self.alpn)
            .finish()
    }
}

/// GREASE values follow the reserved 0x?a?a pattern.
pub fn is_grease(value: u16) -> bool {
    value & 0x0f0f == 0x0a0a
}

/// Selects one of the shipped browser profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Browser {
    #[default]
    Chrome131,
    Chrome124,
    Firefox122,
    Safari17,
    Edge122,
}

impl Browser {
    pub fn profile(&self) -> &'static BrowserProfile {
        match self {
            Browser::Chrome131 => &CHROME_131,
            Browser::Chrome124 => &CHROME_124,
            Browser::Firefox122 => &FIREFOX_122,
            Browser::Safari17 => &SAFARI_17,
            Browser::Edge122 => &EDGE_122,
        }
    }

    /// All shipped profiles, for enumeration surfaces.
    pub fn all() -> &'static [Browser] {
        &[
            Browser::Chrome131,
            Browser::Chrome124,
            Browser::Firefox122,
            Browser::Safari17,
            Browser::Edge122,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grease_pattern() {
        assert!(is_grease(0x0a0a));
        assert!(is_grease(0x5a5a));
        assert!(is_grease(0xbaba));
        assert!(!is_grease(0x1301));
        assert!(!is_grease(0x0017));
    }

    #[test]
    fn test_profiles_are_well_formed() {
        for browser in Browser::all() {
            let p = browser.profile();
            assert!(!p.cipher_codes.is_empty(), "{} has no ciphers", p.name);
            assert!(!p.extension_codes.is_empty(), "{} has no extensions", p.name);
            assert!(!p.groups.is_empty(), "{} has no groups", p.name);
            assert!(!p.alpn.is_empty(), "{} has no ALPN", p.name);
            assert_eq!(
                p.cipher_list.split(':').count(),
                p.cipher_codes.iter().filter(|c| !is_grease(**c)).count(),
                "{} cipher names and codes disagree",
                p.name
            );
        }
    }

    #[test]
    fn test_chrome_cipher_order_starts_with_tls13_suites() {
        let p = Browser::Chrome131.profile();
        let non_grease: Vec<u16> = p
            .cipher_codes
            .iter()
            .copied()
            .filter(|c| !is_grease(*c))
            .collect();
        assert_eq!(&non_grease[..4], &[4865, 4866, 4867, 49195]);
    }

    #[test]
    fn test_alpn_filter_drops_h2_only() {
        let p = Browser::Chrome131.profile();
        assert_eq!(p.alpn, &["h2", "http/1.1"]);
        assert_eq!(p.alpn_without_h2(), vec!["http/1.1"]);
    }

    #[test]
    fn test_grease_slots_present_for_chrome() {
        let p = Browser::Chrome131.profile();
        assert!(p.grease);
        assert!(p.cipher_codes.iter().any(|c| is_grease(*c)));
        assert!(p.extension_codes.iter().any(|c| is_grease(*c)));
        assert!(p.groups.iter().any(|c| is_grease(*c)));
    }

    #[test]
    fn test_firefox_has_no_grease() {
        let p = Browser::Firefox122.profile();
        assert!(!p.grease);
        assert!(!p.cipher_codes.iter().any(|c| is_grease(*c)));
    }
}
