//! State machine transition discipline, driven by hand.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use veneer_client::dns::{cache::DnsCache, SystemResolver};
use veneer_client::tls::TlsBackend;
use veneer_client::{
    Browser, ClientConfig, Progress, Readiness, ReadinessPoller, Request, RequestMachine, State,
};

/// Canonical forward order of states; a legal run visits a monotonically
/// non-decreasing subsequence (the I/O states may repeat in place).
const ORDER: [State; 9] = [
    State::Init,
    State::DnsLookup,
    State::Connecting,
    State::ProxyConnect,
    State::TlsHandshake,
    State::Sending,
    State::ReceivingHeaders,
    State::ReceivingBody,
    State::Complete,
];

fn rank(state: State) -> usize {
    ORDER
        .iter()
        .position(|s| *s == state)
        .expect("non-terminal state")
}

fn machine_for(url: &str) -> RequestMachine {
    let mut request = Request::new(http::Method::GET, url).expect("url");
    request.browser = Browser::Chrome131;
    request.set_timeout(Duration::from_secs(10));
    let config = ClientConfig::default();
    let connector = TlsBackend::new()
        .configure_context(request.browser.profile())
        .expect("connector");
    RequestMachine::new(
        request,
        Arc::new(connector),
        Arc::new(SystemResolver::new()),
        Arc::new(DnsCache::default()),
        &config,
    )
}

/// Drive to completion, recording the state after every step.
fn drive(machine: &mut RequestMachine) -> (Vec<State>, Progress) {
    let mut poller = ReadinessPoller::new().expect("poller");
    let mut states = Vec::new();
    loop {
        let progress = machine.step();
        states.push(machine.state());
        match progress {
            Progress::Pending(set) => {
                if set.fd >= 0 && (set.readable || set.writable) {
                    let _ = poller.wait(set, Duration::from_millis(100)).expect("wait");
                } else {
                    thread::sleep(Duration::from_millis(2));
                }
            }
            done => return (states, done),
        }
    }
}

#[test]
fn test_state_sequence_is_monotonic_for_plain_get() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut buf = [0u8; 4096];
        let mut seen = Vec::new();
        while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).expect("read");
            assert_ne!(n, 0, "client hung up early");
            seen.extend_from_slice(&buf[..n]);
        }
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nabc")
            .expect("write");
        thread::sleep(Duration::from_millis(100));
    });

    let mut machine = machine_for(&format!("http://127.0.0.1:{port}/seq"));
    assert_eq!(machine.state(), State::Init);

    let (states, progress) = drive(&mut machine);
    let response = match progress {
        Progress::Done(response) => response,
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"abc");

    // Monotone over the canonical order, no proxy/TLS states for a
    // direct plaintext request.
    let mut last = 0;
    for state in &states {
        let r = rank(*state);
        assert!(r >= last, "state went backwards: {states:?}");
        last = r;
        assert!(
            !matches!(state, State::ProxyConnect | State::TlsHandshake),
            "plaintext direct request entered {state:?}"
        );
    }
    assert_eq!(*states.last().expect("nonempty"), State::Complete);

    server.join().expect("server");
}

#[test]
fn test_deadline_trips_to_error() {
    // A server that accepts and never responds.
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        thread::sleep(Duration::from_millis(500));
        drop(stream);
    });

    let mut request = Request::new(http::Method::GET, &format!("http://127.0.0.1:{port}/slow"))
        .expect("url");
    request.set_timeout(Duration::from_millis(100));
    let config = ClientConfig::default();
    let connector = TlsBackend::new()
        .configure_context(request.browser.profile())
        .expect("connector");
    let mut machine = RequestMachine::new(
        request,
        Arc::new(connector),
        Arc::new(SystemResolver::new()),
        Arc::new(DnsCache::default()),
        &config,
    );

    let (_, progress) = drive(&mut machine);
    match progress {
        Progress::Failed(err) => assert!(err.is_timeout()),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(machine.state(), State::Error);

    server.join().expect("server");
}

#[test]
fn test_connect_refused_is_network_error() {
    // Bind then drop to find a port with no listener.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };

    let mut machine = machine_for(&format!("http://127.0.0.1:{port}/nobody"));
    let (_, progress) = drive(&mut machine);
    match progress {
        Progress::Failed(err) => {
            assert_eq!(err.kind(), veneer_client::Kind::Network);
        }
        other => panic!("expected network error, got {other:?}"),
    }
}

#[test]
fn test_truncated_length_body_is_parse_error() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf).expect("read");
        // Claim five bytes, deliver two, close.
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nab")
            .expect("write");
    });

    let mut machine = machine_for(&format!("http://127.0.0.1:{port}/truncated"));
    let (_, progress) = drive(&mut machine);
    match progress {
        Progress::Failed(err) => {
            assert_eq!(err.kind(), veneer_client::Kind::Parse);
        }
        other => panic!("expected parse error, got {other:?}"),
    }

    server.join().expect("server");
}
