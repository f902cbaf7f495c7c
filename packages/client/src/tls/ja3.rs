//! JA3 fingerprint computation
//!
//! JA3 is a client fingerprint: it is computed from the profile's ordered
//! lists, not from anything the peer negotiated, so a profile's JA3 is
//! identical against every server. GREASE values are excluded from the
//! string per the JA3 convention.

use md5::{Digest, Md5};

use crate::profiles::{is_grease, BrowserProfile};

fn join_codes<I: Iterator<Item = u16>>(iter: I) -> String {
    let mut out = String::new();
    for (i, code) in iter.enumerate() {
        if i > 0 {
            out.push('-');
        }
        out.push_str(&code.to_string());
    }
    out
}

/// The five-field JA3 string:
/// `version,ciphers,extensions,groups,point_formats`.
///
/// The version field is the ClientHello `legacy_version`, which stays at
/// TLS 1.2 (771) even when TLS 1.3 is offered via supported_versions.
pub fn ja3_string(profile: &BrowserProfile) -> String {
    let version = 771u16;
    let ciphers = join_codes(profile.cipher_codes.iter().copied().filter(|c| !is_grease(*c)));
    let extensions = join_codes(
        profile
            .extension_codes
            .iter()
            .copied()
            .filter(|c| !is_grease(*c)),
    );
    let groups = join_codes(profile.groups.iter().copied().filter(|c| !is_grease(*c)));
    let formats = {
        let mut out = String::new();
        for (i, f) in profile.point_formats.iter().enumerate() {
            if i > 0 {
                out.push('-');
            }
            out.push_str(&f.to_string());
        }
        out
    };
    format!("{version},{ciphers},{extensions},{groups},{formats}")
}

/// Lowercase MD5 hex of the JA3 string.
pub fn ja3_hex(profile: &BrowserProfile) -> String {
    let mut hasher = Md5::new();
    hasher.update(ja3_string(profile).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::Browser;

    #[test]
    fn test_ja3_is_deterministic() {
        for browser in Browser::all() {
            let p = browser.profile();
            assert_eq!(ja3_string(p), ja3_string(p));
            assert_eq!(ja3_hex(p), ja3_hex(p));
        }
    }

    #[test]
    fn test_ja3_hex_shape() {
        let hash = ja3_hex(Browser::Chrome131.profile());
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash.to_lowercase());
    }

    #[test]
    fn test_chrome_ja3_cipher_field_prefix() {
        let s = ja3_string(Browser::Chrome131.profile());
        let fields: Vec<&str> = s.split(',').collect();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[0], "771");
        assert!(fields[1].starts_with("4865-4866-4867-49195-"));
        assert_eq!(fields[4], "0");
    }

    #[test]
    fn test_grease_is_excluded() {
        let p = Browser::Chrome131.profile();
        let s = ja3_string(p);
        assert!(!s.contains(&p.grease_cipher.to_string()));
        assert!(!s.contains(&format!("-{}", p.grease_extension)));
    }

    #[test]
    fn test_profiles_have_distinct_ja3() {
        let chrome = ja3_hex(Browser::Chrome131.profile());
        let firefox = ja3_hex(Browser::Firefox122.profile());
        let safari = ja3_hex(Browser::Safari17.profile());
        assert_ne!(chrome, firefox);
        assert_ne!(chrome, safari);
        assert_ne!(firefox, safari);
    }

    #[test]
    fn test_profile_cached_ja3_matches_direct() {
        let p = Browser::Chrome131.profile();
        assert_eq!(p.ja3_hex(), ja3_hex(p).as_str());
    }
}
