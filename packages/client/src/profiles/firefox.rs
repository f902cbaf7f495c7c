//! Firefox profile
//!
//! Firefox sends no GREASE, keeps CBC suites Chrome dropped, offers FFDHE
//! groups, and uses a distinctive 128 KiB initial stream window with a
//! 12 MiB connection window.

use std::sync::OnceLock;

use super::{BrowserProfile, TlsVersion};

const FIREFOX_CIPHER_CODES: &[u16] = &[
    4865,  // TLS_AES_128_GCM_SHA256
    4867,  // TLS_CHACHA20_POLY1305_SHA256
    4866,  // TLS_AES_256_GCM_SHA384
    49195, // TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
    49199, // TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
    52393, // TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256
    52392, // TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256
    49196, // TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
    49200, // TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
    49162, // TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA
    49161, // TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA
    49171, // TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA
    49172, // TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA
    156,   // TLS_RSA_WITH_AES_128_GCM_SHA256
    157,   // TLS_RSA_WITH_AES_256_GCM_SHA384
    47,    // TLS_RSA_WITH_AES_128_CBC_SHA
    53,    // TLS_RSA_WITH_AES_256_CBC_SHA
];

const FIREFOX_CIPHER_LIST: &str = "TLS_AES_128_GCM_SHA256:\
TLS_CHACHA20_POLY1305_SHA256:\
TLS_AES_256_GCM_SHA384:\
ECDHE-ECDSA-AES128-GCM-SHA256:\
ECDHE-RSA-AES128-GCM-SHA256:\
ECDHE-ECDSA-CHACHA20-POLY1305:\
ECDHE-RSA-CHACHA20-POLY1305:\
ECDHE-ECDSA-AES256-GCM-SHA384:\
ECDHE-RSA-AES256-GCM-SHA384:\
ECDHE-ECDSA-AES256-SHA:\
ECDHE-ECDSA-AES128-SHA:\
ECDHE-RSA-AES128-SHA:\
ECDHE-RSA-AES256-SHA:\
AES128-GCM-SHA256:\
AES256-GCM-SHA384:\
AES128-SHA:\
AES256-SHA";

// Firefox extension order; no GREASE slots.
const FIREFOX_EXTENSION_CODES: &[u16] = &[
    0,     // server_name
    23,    // extended_master_secret
    65281, // renegotiation_info
    10,    // supported_groups
    11,    // ec_point_formats
    35,    // session_ticket
    16,    // application_layer_protocol_negotiation
    5,     // status_request
    34,    // delegated_credentials
    51,    // key_share
    43,    // supported_versions
    13,    // signature_algorithms
    28,    // record_size_limit
    27,    // compress_certificate
    45,    // psk_key_exchange_modes
    21,    // padding
];

const FIREFOX_SIGALG_CODES: &[u16] = &[
    0x0403, // ecdsa_secp256r1_sha256
    0x0503, // ecdsa_secp384r1_sha384
    0x0603, // ecdsa_secp521r1_sha512
    0x0804, // rsa_pss_rsae_sha256
    0x0805, // rsa_pss_rsae_sha384
    0x0806, // rsa_pss_rsae_sha512
    0x0401, // rsa_pkcs1_sha256
    0x0501, // rsa_pkcs1_sha384
    0x0601, // rsa_pkcs1_sha512
    0x0203, // ecdsa_sha1
    0x0201, // rsa_pkcs1_sha1
];

const FIREFOX_SIGALGS_LIST: &str = "ecdsa_secp256r1_sha256:\
ecdsa_secp384r1_sha384:\
ecdsa_secp521r1_sha512:\
rsa_pss_rsae_sha256:\
rsa_pss_rsae_sha384:\
rsa_pss_rsae_sha512:\
rsa_pkcs1_sha256:\
rsa_pkcs1_sha384:\
rsa_pkcs1_sha512:\
ecdsa_sha1:\
rsa_pkcs1_sha1";

/// Firefox 122.
pub static FIREFOX_122: BrowserProfile = BrowserProfile {
    name: "Firefox/122",
    min_tls: TlsVersion::Tls12,
    max_tls: TlsVersion::Tls13,
    cipher_codes: FIREFOX_CIPHER_CODES,
    cipher_list: FIREFOX_CIPHER_LIST,
    extension_codes: FIREFOX_EXTENSION_CODES,
    groups: &[
        29,  // x25519
        23,  // secp256r1
        24,  // secp384r1
        25,  // secp521r1
        256, // ffdhe2048
        257, // ffdhe3072
    ],
    sigalg_codes: FIREFOX_SIGALG_CODES,
    sigalgs_list: FIREFOX_SIGALGS_LIST,
    alpn: &["h2", "http/1.1"],
    point_formats: &[0],
    grease: false,
    grease_cipher: 0,
    grease_extension: 0,
    grease_group: 0,
    enable_alps: false,
    // HEADER_TABLE_SIZE, ENABLE_PUSH, INITIAL_WINDOW_SIZE, MAX_FRAME_SIZE.
    h2_settings: &[(1, 65536), (2, 0), (4, 131_072), (5, 16384)],
    h2_window_update: 12_517_377,
    user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
    default_headers: &[
        (
            "accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
        ("accept-encoding", "gzip, deflate, br"),
        ("accept-language", "en-US,en;q=0.5"),
    ],
    ja3_cache: OnceLock::new(),
};
