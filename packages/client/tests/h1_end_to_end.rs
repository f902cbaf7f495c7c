//! End-to-end HTTP/1.1 scenarios against an in-process server.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use veneer_client::{Browser, Client, Request};

/// Read one request (head + Content-Length body) off the stream.
/// Returns the raw bytes, or `None` on EOF.
fn read_request(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut scratch = [0u8; 4096];
    loop {
        if let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head_end = head_end + 4;
            let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
            let content_length: usize = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0);
            while buf.len() < head_end + content_length {
                let n = stream.read(&mut scratch).ok()?;
                if n == 0 {
                    return None;
                }
                buf.extend_from_slice(&scratch[..n]);
            }
            return Some(buf);
        }
        let n = stream.read(&mut scratch).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&scratch[..n]);
    }
}

fn get(url: &str) -> Request {
    let mut request = Request::new(http::Method::GET, url).expect("url");
    request.browser = Browser::Chrome131;
    request.set_timeout(Duration::from_secs(10));
    request
}

#[test]
fn test_plain_get_round_trip_and_pooling() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _request = read_request(&mut stream).expect("request");
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nworld")
            .expect("write");
        // Stay open so the connection is poolable.
        thread::sleep(Duration::from_millis(300));
    });

    let client = Client::new().expect("client");
    let response = client.execute(get(&format!("http://127.0.0.1:{port}/hello")));

    assert_eq!(response.error, None, "{:?}", response.error_message);
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"world");
    assert_eq!(client.pool().total(), 1, "connection should be pooled");

    let timings = response.timings;
    assert!(timings.total_us >= timings.connect_us + timings.tls_us + timings.first_byte_us);

    server.join().expect("server");
}

#[test]
fn test_post_json_wire_bytes() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let (wire_tx, wire_rx) = mpsc::channel();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let request = read_request(&mut stream).expect("request");
        wire_tx.send(request).expect("send wire");
        stream
            .write_all(b"HTTP/1.1 201 Created\r\nContent-Length: 2\r\n\r\nOK")
            .expect("write");
    });

    let client = Client::new().expect("client");
    let mut request = get(&format!("http://127.0.0.1:{port}/items"));
    request.method = http::Method::POST;
    request.headers.append("Content-Type", "application/json");
    request.body = Some(bytes::Bytes::from_static(b"{\"a\":1}"));

    let response = client.execute(request);
    assert_eq!(response.status, 201);
    assert_eq!(response.body, b"OK");

    let wire = wire_rx.recv_timeout(Duration::from_secs(5)).expect("wire");
    let text = String::from_utf8_lossy(&wire);
    assert!(text.starts_with("POST /items HTTP/1.1\r\n"));
    assert!(text.contains("Content-Length: 7\r\n"));
    assert!(text.ends_with("{\"a\":1}"));

    server.join().expect("server");
}

#[test]
fn test_chunked_body_terminates_at_terminator() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _request = read_request(&mut stream).expect("request");
        stream
            .write_all(
                b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                  7\r\nchunked\r\n5\r\nworks\r\n0\r\n\r\n",
            )
            .expect("write");
        thread::sleep(Duration::from_millis(200));
    });

    let client = Client::new().expect("client");
    let response = client.execute(get(&format!("http://127.0.0.1:{port}/stream")));
    assert_eq!(response.error, None, "{:?}", response.error_message);
    assert_eq!(response.body, b"chunkedworks");

    server.join().expect("server");
}

#[test]
fn test_connection_close_is_not_pooled() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _request = read_request(&mut stream).expect("request");
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 2\r\n\r\nok")
            .expect("write");
    });

    let client = Client::new().expect("client");
    let response = client.execute(get(&format!("http://127.0.0.1:{port}/")));
    assert_eq!(response.status, 200);
    assert_eq!(client.pool().total(), 0, "Connection: close must not pool");

    server.join().expect("server");
}

#[test]
fn test_read_to_eof_body_is_not_pooled() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _request = read_request(&mut stream).expect("request");
        // No framing headers at all: body is delimited by close.
        stream
            .write_all(b"HTTP/1.1 200 OK\r\n\r\nuntil-close")
            .expect("write");
    });

    let client = Client::new().expect("client");
    let response = client.execute(get(&format!("http://127.0.0.1:{port}/")));
    assert_eq!(response.error, None, "{:?}", response.error_message);
    assert_eq!(response.body, b"until-close");
    assert_eq!(client.pool().total(), 0);

    server.join().expect("server");
}

#[test]
fn test_head_reads_no_body_despite_content_length() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _request = read_request(&mut stream).expect("request");
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\n")
            .expect("write");
        thread::sleep(Duration::from_millis(200));
    });

    let client = Client::new().expect("client");
    let mut request = get(&format!("http://127.0.0.1:{port}/"));
    request.method = http::Method::HEAD;
    let response = client.execute(request);
    assert_eq!(response.error, None, "{:?}", response.error_message);
    assert_eq!(response.status, 200);
    assert!(response.body.is_empty());

    server.join().expect("server");
}

#[test]
fn test_content_length_zero_completes_immediately() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _request = read_request(&mut stream).expect("request");
        stream
            .write_all(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n")
            .expect("write");
        thread::sleep(Duration::from_millis(200));
    });

    let client = Client::new().expect("client");
    let response = client.execute(get(&format!("http://127.0.0.1:{port}/")));
    assert_eq!(response.error, None, "{:?}", response.error_message);
    assert_eq!(response.status, 204);
    assert!(response.body.is_empty());

    server.join().expect("server");
}

#[test]
fn test_gzip_response_is_decoded() {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let payload = b"compressed payload for the decode path";
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).expect("compress");
    let compressed = encoder.finish().expect("finish");

    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let body = compressed.clone();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _request = read_request(&mut stream).expect("request");
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).expect("write head");
        stream.write_all(&body).expect("write body");
        thread::sleep(Duration::from_millis(200));
    });

    let client = Client::new().expect("client");
    let response = client.execute(get(&format!("http://127.0.0.1:{port}/")));
    assert_eq!(response.error, None, "{:?}", response.error_message);
    assert_eq!(response.body, payload);

    server.join().expect("server");
}

#[test]
fn test_stale_pooled_connection_is_retried_once() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = thread::spawn(move || {
        // First connection: serve R1, then accept R2's bytes and close
        // without replying — the classic stale-keepalive race.
        let (mut first, _) = listener.accept().expect("accept first");
        let _r1 = read_request(&mut first).expect("r1");
        first
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nr1")
            .expect("write r1");
        let _r2_attempt = read_request(&mut first);
        drop(first);

        // Second connection: serve the redialled R2.
        let (mut second, _) = listener.accept().expect("accept second");
        let _r2 = read_request(&mut second).expect("r2");
        second
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nr2")
            .expect("write r2");
        thread::sleep(Duration::from_millis(200));
    });

    let client = Client::new().expect("client");
    let url = format!("http://127.0.0.1:{port}/");

    let r1 = client.execute(get(&url));
    assert_eq!(r1.error, None, "{:?}", r1.error_message);
    assert_eq!(r1.body, b"r1");
    assert_eq!(client.pool().total(), 1);

    let r2 = client.execute(get(&url));
    assert_eq!(r2.error, None, "{:?}", r2.error_message);
    assert_eq!(r2.body, b"r2", "no duplicated or corrupted body");

    let stats = client.stats().snapshot();
    assert_eq!(stats.successful_requests, 2);
    assert!(stats.retries <= 1);

    server.join().expect("server");
}

#[test]
fn test_default_profile_headers_are_applied() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let (wire_tx, wire_rx) = mpsc::channel();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let request = read_request(&mut stream).expect("request");
        wire_tx.send(request).expect("send");
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
            .expect("write");
    });

    let client = Client::new().expect("client");
    let _ = client.execute(get(&format!("http://127.0.0.1:{port}/")));

    let wire = wire_rx.recv_timeout(Duration::from_secs(5)).expect("wire");
    let text = String::from_utf8_lossy(&wire);
    assert!(text.contains("user-agent: Mozilla/5.0"));
    assert!(text.contains("Chrome/131"));
    assert!(text.contains("accept-language: "));

    server.join().expect("server");
}
