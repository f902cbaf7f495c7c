//! Safari profile
//!
//! Safari GREASEs ciphers and extensions, keeps the legacy CBC block, and
//! caps concurrent streams at 100 with a 2 MiB stream window.

use std::sync::OnceLock;

use super::{BrowserProfile, TlsVersion};

const SAFARI_CIPHER_CODES: &[u16] = &[
    0x3a3a, // GREASE
    4865,   // TLS_AES_128_GCM_SHA256
    4866,   // TLS_AES_256_GCM_SHA384
    4867,   // TLS_CHACHA20_POLY1305_SHA256
    49196,  // TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
    49195,  // TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
    52393,  // TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256
    49200,  // TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
    49199,  // TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
    52392,  // TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256
    49162,  // TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA
    49161,  // TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA
    49172,  // TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA
    49171,  // TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA
    157,    // TLS_RSA_WITH_AES_256_GCM_SHA384
    156,    // TLS_RSA_WITH_AES_128_GCM_SHA256
    53,     // TLS_RSA_WITH_AES_256_CBC_SHA
    47,     // TLS_RSA_WITH_AES_128_CBC_SHA
];

const SAFARI_CIPHER_LIST: &str = "TLS_AES_128_GCM_SHA256:\
TLS_AES_256_GCM_SHA384:\
TLS_CHACHA20_POLY1305_SHA256:\
ECDHE-ECDSA-AES256-GCM-SHA384:\
ECDHE-ECDSA-AES128-GCM-SHA256:\
ECDHE-ECDSA-CHACHA20-POLY1305:\
ECDHE-RSA-AES256-GCM-SHA384:\
ECDHE-RSA-AES128-GCM-SHA256:\
ECDHE-RSA-CHACHA20-POLY1305:\
ECDHE-ECDSA-AES256-SHA:\
ECDHE-ECDSA-AES128-SHA:\
ECDHE-RSA-AES256-SHA:\
ECDHE-RSA-AES128-SHA:\
AES256-GCM-SHA384:\
AES128-GCM-SHA256:\
AES256-SHA:\
AES128-SHA";

const SAFARI_EXTENSION_CODES: &[u16] = &[
    0x1a1a, // GREASE
    0,      // server_name
    23,     // extended_master_secret
    65281,  // renegotiation_info
    10,     // supported_groups
    11,     // ec_point_formats
    16,     // application_layer_protocol_negotiation
    5,      // status_request
    13,     // signature_algorithms
    18,     // signed_certificate_timestamp
    51,     // key_share
    45,     // psk_key_exchange_modes
    43,     // supported_versions
    27,     // compress_certificate
    0x2a2a, // GREASE
    21,     // padding
];

const SAFARI_SIGALG_CODES: &[u16] = &[
    0x0403, // ecdsa_secp256r1_sha256
    0x0804, // rsa_pss_rsae_sha256
    0x0401, // rsa_pkcs1_sha256
    0x0503, // ecdsa_secp384r1_sha384
    0x0203, // ecdsa_sha1
    0x0805, // rsa_pss_rsae_sha384
    0x0501, // rsa_pkcs1_sha384
    0x0806, // rsa_pss_rsae_sha512
    0x0601, // rsa_pkcs1_sha512
    0x0201, // rsa_pkcs1_sha1
];

const SAFARI_SIGALGS_LIST: &str = "ecdsa_secp256r1_sha256:\
rsa_pss_rsae_sha256:\
rsa_pkcs1_sha256:\
ecdsa_secp384r1_sha384:\
ecdsa_sha1:\
rsa_pss_rsae_sha384:\
rsa_pkcs1_sha384:\
rsa_pss_rsae_sha512:\
rsa_pkcs1_sha512:\
rsa_pkcs1_sha1";

/// Safari 17.
pub static SAFARI_17: BrowserProfile = BrowserProfile {
    name: "Safari/17",
    min_tls: TlsVersion::Tls12,
    max_tls: TlsVersion::Tls13,
    cipher_codes: SAFARI_CIPHER_CODES,
    cipher_list: SAFARI_CIPHER_LIST,
    extension_codes: SAFARI_EXTENSION_CODES,
    groups: &[
        0x4a4a, // GREASE
        29,     // x25519
        23,     // secp256r1
        24,     // secp384r1
        25,     // secp521r1
    ],
    sigalg_codes: SAFARI_SIGALG_CODES,
    sigalgs_list: SAFARI_SIGALGS_LIST,
    alpn: &["h2", "http/1.1"],
    point_formats: &[0],
    grease: true,
    grease_cipher: 0x3a3a,
    grease_extension: 0x1a1a,
    grease_group: 0x4a4a,
    enable_alps: false,
    // MAX_CONCURRENT_STREAMS, INITIAL_WINDOW_SIZE.
    h2_settings: &[(3, 100), (4, 2_097_152)],
    h2_window_update: 10_420_225,
    user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15",
    default_headers: &[
        (
            "accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
        ("accept-encoding", "gzip, deflate, br"),
        ("accept-language", "en-US,en;q=0.9"),
    ],
    ja3_cache: OnceLock::new(),
};
