//! Edge profile
//!
//! Chromium-derived; identical TLS shape to Chrome of the same era, with
//! Edge's own user-agent block.

use std::sync::OnceLock;

use super::chrome::{
    CHROME_CIPHER_CODES, CHROME_CIPHER_LIST, CHROME_DEFAULT_HEADERS, CHROME_EXTENSION_CODES,
    CHROME_H2_SETTINGS, CHROME_H2_WINDOW_UPDATE, CHROME_SIGALGS_LIST, CHROME_SIGALG_CODES,
};
use super::{BrowserProfile, TlsVersion};

/// Edge 122.
pub static EDGE_122: BrowserProfile = BrowserProfile {
    name: "Edge/122",
    min_tls: TlsVersion::Tls12,
    max_tls: TlsVersion::Tls13,
    cipher_codes: CHROME_CIPHER_CODES,
    cipher_list: CHROME_CIPHER_LIST,
    extension_codes: CHROME_EXTENSION_CODES,
    groups: &[
        0x9a9a, // GREASE
        29,     // x25519
        23,     // secp256r1
        24,     // secp384r1
    ],
    sigalg_codes: CHROME_SIGALG_CODES,
    sigalgs_list: CHROME_SIGALGS_LIST,
    alpn: &["h2", "http/1.1"],
    point_formats: &[0],
    grease: true,
    grease_cipher: 0x5a5a,
    grease_extension: 0xbaba,
    grease_group: 0x9a9a,
    enable_alps: true,
    h2_settings: CHROME_H2_SETTINGS,
    h2_window_update: CHROME_H2_WINDOW_UPDATE,
    user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36 Edg/122.0.0.0",
    default_headers: CHROME_DEFAULT_HEADERS,
    ja3_cache: OnceLock::new(),
};
