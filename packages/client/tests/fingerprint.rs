//! Fingerprint surface: JA3 shape per profile, ALPN offers, and the
//! HTTP/2 preamble each profile opens with.

use veneer_client::proto::h2::frame::{Frame, FrameReader, CONNECTION_PREFACE};
use veneer_client::proto::h2::H2Session;
use veneer_client::tls::ja3;
use veneer_client::Browser;

#[test]
fn test_chrome131_ja3_literal_prefix() {
    let profile = Browser::Chrome131.profile();
    let s = ja3::ja3_string(profile);
    assert!(
        s.starts_with("771,4865-4866-4867-49195-"),
        "unexpected JA3: {s}"
    );

    let hash = profile.ja3_hex();
    assert_eq!(hash.len(), 32);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_every_profile_offers_h2_then_http11() {
    for browser in Browser::all() {
        let profile = browser.profile();
        assert_eq!(profile.alpn, &["h2", "http/1.1"], "{}", profile.name);
    }
}

#[test]
fn test_ja3_stable_across_calls_and_profiles_disjoint() {
    let mut seen = std::collections::HashSet::new();
    for browser in Browser::all() {
        let profile = browser.profile();
        assert_eq!(profile.ja3_hex(), profile.ja3_hex());
        assert!(
            seen.insert(profile.ja3_hex().to_string()),
            "{} shares a JA3 with another profile",
            profile.name
        );
    }
}

#[test]
fn test_h2_preamble_carries_profile_settings_and_window_update() {
    use std::io::Read;
    use std::net::{TcpListener, TcpStream};
    use veneer_client::tls::Transport;

    for browser in [Browser::Chrome131, Browser::Firefox122, Browser::Safari17] {
        let profile = browser.profile();

        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let client = TcpStream::connect(("127.0.0.1", port)).expect("connect");
        client.set_nonblocking(true).expect("nonblocking");
        let (mut server, _) = listener.accept().expect("accept");

        let mut session = H2Session::new(Transport::Plain(client), 16 * 1024);
        session.send_preamble(profile.h2_settings, profile.h2_window_update);
        assert!(session.pump_writes().expect("flush"));

        let mut wire = Vec::new();
        let mut scratch = [0u8; 4096];
        // Preface, SETTINGS (header + 6 bytes per pair), WINDOW_UPDATE.
        let expected_min =
            CONNECTION_PREFACE.len() + 9 + 6 * profile.h2_settings.len() + 9 + 4;
        while wire.len() < expected_min {
            let n = server.read(&mut scratch).expect("read");
            assert_ne!(n, 0);
            wire.extend_from_slice(&scratch[..n]);
        }

        assert!(wire.starts_with(CONNECTION_PREFACE), "{}", profile.name);

        let mut reader = FrameReader::new();
        reader.feed(&wire[CONNECTION_PREFACE.len()..]);

        match reader.next_frame().expect("settings frame") {
            Some(Frame::Settings { ack, settings }) => {
                assert!(!ack);
                assert_eq!(settings, profile.h2_settings, "{}", profile.name);
            }
            other => panic!("expected SETTINGS first, got {other:?}"),
        }
        match reader.next_frame().expect("window update frame") {
            Some(Frame::WindowUpdate {
                stream_id,
                increment,
            }) => {
                assert_eq!(stream_id, 0);
                assert_eq!(increment, profile.h2_window_update, "{}", profile.name);
            }
            // The whole preamble goes out in one write; both frames are
            // already buffered.
            other => panic!("expected WINDOW_UPDATE second, got {other:?}"),
        }
    }
}

#[test]
fn test_grease_values_never_reach_ja3() {
    for browser in Browser::all() {
        let profile = browser.profile();
        let s = ja3::ja3_string(profile);
        for field in s.split(',').skip(1) {
            for code in field.split('-').filter(|c| !c.is_empty()) {
                let value: u16 = code.parse().expect("numeric ja3 field");
                assert!(
                    !veneer_client::profiles::is_grease(value),
                    "{} leaked GREASE {value} into JA3",
                    profile.name
                );
            }
        }
    }
}
