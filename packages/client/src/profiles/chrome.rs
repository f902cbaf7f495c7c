//! Chrome profiles
//!
//! Chrome intermixes GREASE into ciphers, extensions and groups, offers
//! ALPS on `h2`, compresses certificates with brotli, and since 131 leads
//! its key shares with the X25519MLKEM768 hybrid group.

use std::sync::OnceLock;

use super::{BrowserProfile, TlsVersion};

pub(super) const CHROME_CIPHER_CODES: &[u16] = &[
    0x5a5a, // GREASE
    4865,  // TLS_AES_128_GCM_SHA256
    4866,  // TLS_AES_256_GCM_SHA384
    4867,  // TLS_CHACHA20_POLY1305_SHA256
    49195, // TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
    49199, // TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
    49196, // TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
    49200, // TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
    52393, // TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256
    52392, // TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256
    49171, // TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA
    49172, // TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA
    156,   // TLS_RSA_WITH_AES_128_GCM_SHA256
    157,   // TLS_RSA_WITH_AES_256_GCM_SHA384
    47,    // TLS_RSA_WITH_AES_128_CBC_SHA
    53,    // TLS_RSA_WITH_AES_256_CBC_SHA
];

pub(super) const CHROME_CIPHER_LIST: &str = "TLS_AES_128_GCM_SHA256:\
TLS_AES_256_GCM_SHA384:\
TLS_CHACHA20_POLY1305_SHA256:\
ECDHE-ECDSA-AES128-GCM-SHA256:\
ECDHE-RSA-AES128-GCM-SHA256:\
ECDHE-ECDSA-AES256-GCM-SHA384:\
ECDHE-RSA-AES256-GCM-SHA384:\
ECDHE-ECDSA-CHACHA20-POLY1305:\
ECDHE-RSA-CHACHA20-POLY1305:\
ECDHE-RSA-AES128-SHA:\
ECDHE-RSA-AES256-SHA:\
AES128-GCM-SHA256:\
AES256-GCM-SHA384:\
AES128-SHA:\
AES256-SHA";

pub(super) const CHROME_EXTENSION_CODES: &[u16] = &[
    0xbaba, // GREASE
    0,      // server_name
    23,     // extended_master_secret
    65281,  // renegotiation_info
    10,     // supported_groups
    11,     // ec_point_formats
    35,     // session_ticket
    16,     // application_layer_protocol_negotiation
    5,      // status_request
    13,     // signature_algorithms
    18,     // signed_certificate_timestamp
    51,     // key_share
    45,     // psk_key_exchange_modes
    43,     // supported_versions
    27,     // compress_certificate
    17513,  // application_settings
    0x3a3a, // GREASE
    21,     // padding
];

pub(super) const CHROME_SIGALG_CODES: &[u16] = &[
    0x0403, // ecdsa_secp256r1_sha256
    0x0804, // rsa_pss_rsae_sha256
    0x0401, // rsa_pkcs1_sha256
    0x0503, // ecdsa_secp384r1_sha384
    0x0805, // rsa_pss_rsae_sha384
    0x0501, // rsa_pkcs1_sha384
    0x0806, // rsa_pss_rsae_sha512
    0x0601, // rsa_pkcs1_sha512
];

pub(super) const CHROME_SIGALGS_LIST: &str = "ecdsa_secp256r1_sha256:\
rsa_pss_rsae_sha256:\
rsa_pkcs1_sha256:\
ecdsa_secp384r1_sha384:\
rsa_pss_rsae_sha384:\
rsa_pkcs1_sha384:\
rsa_pss_rsae_sha512:\
rsa_pkcs1_sha512";

// SETTINGS order Chrome emits: HEADER_TABLE_SIZE, ENABLE_PUSH,
// INITIAL_WINDOW_SIZE, MAX_HEADER_LIST_SIZE.
pub(super) const CHROME_H2_SETTINGS: &[(u16, u32)] = &[(1, 65536), (2, 0), (4, 6_291_456), (6, 262_144)];

pub(super) const CHROME_H2_WINDOW_UPDATE: u32 = 15_663_105;

pub(super) const CHROME_DEFAULT_HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
    ),
    ("accept-encoding", "gzip, deflate, br"),
    ("accept-language", "en-US,en;q=0.9"),
];

/// Chrome 131: X25519MLKEM768 hybrid leads the group list.
pub static CHROME_131: BrowserProfile = BrowserProfile {
    name: "Chrome/131",
    min_tls: TlsVersion::Tls12,
    max_tls: TlsVersion::Tls13,
    cipher_codes: CHROME_CIPHER_CODES,
    cipher_list: CHROME_CIPHER_LIST,
    extension_codes: CHROME_EXTENSION_CODES,
    groups: &[
        0x9a9a, // GREASE
        0x11ec, // X25519MLKEM768
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
    user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    default_headers: CHROME_DEFAULT_HEADERS,
    ja3_cache: OnceLock::new(),
};

/// Chrome 124: the Kyber draft hybrid rather than the final ML-KEM group.
pub static CHROME_124: BrowserProfile = BrowserProfile {
    name: "Chrome/124",
    min_tls: TlsVersion::Tls12,
    max_tls: TlsVersion::Tls13,
    cipher_codes: CHROME_CIPHER_CODES,
    cipher_list: CHROME_CIPHER_LIST,
    extension_codes: CHROME_EXTENSION_CODES,
    groups: &[
        0x9a9a, // GREASE
        25497,  // X25519Kyber768Draft00
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
    user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    default_headers: CHROME_DEFAULT_HEADERS,
    ja3_cache: OnceLock::new(),
};
