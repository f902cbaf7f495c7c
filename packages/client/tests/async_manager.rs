//! Async manager behaviour: submit/poll/process, cancellation, shutdown.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use veneer_client::{AsyncManager, Browser, Kind, Request, Response};

fn get(url: &str) -> Request {
    let mut request = Request::new(http::Method::GET, url).expect("url");
    request.browser = Browser::Chrome131;
    request
}

fn serve_n(listener: TcpListener, count: usize) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for i in 0..count {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut buf = [0u8; 8192];
            let mut seen = Vec::new();
            while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).expect("read");
                if n == 0 {
                    return;
                }
                seen.extend_from_slice(&buf[..n]);
            }
            let body = format!("resp{i}");
            let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len());
            stream.write_all(head.as_bytes()).expect("write");
            stream.write_all(body.as_bytes()).expect("write");
        }
    })
}

fn drain(manager: &mut AsyncManager, expected: u32, done: &Arc<AtomicU32>) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while done.load(Ordering::SeqCst) < expected {
        assert!(Instant::now() < deadline, "manager stalled");
        let _ = manager.poll(Duration::from_millis(20)).expect("poll");
        manager.process();
    }
}

#[test]
fn test_submit_poll_process_delivers_callbacks() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server = serve_n(listener, 3);

    let mut manager = AsyncManager::new().expect("manager");
    let done = Arc::new(AtomicU32::new(0));
    let bodies = Arc::new(Mutex::new(Vec::<String>::new()));

    let mut ids = Vec::new();
    for _ in 0..3 {
        let done = Arc::clone(&done);
        let bodies = Arc::clone(&bodies);
        let id = manager
            .submit(
                get(&format!("http://127.0.0.1:{port}/x")),
                Some(Duration::from_secs(5)),
                Box::new(move |_id, response: Response| {
                    assert_eq!(response.error, None, "{:?}", response.error_message);
                    bodies.lock().expect("lock").push(response.text());
                    done.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .expect("submit");
        ids.push(id);
    }
    assert_eq!(manager.pending(), 3);
    // Ids are unique and monotonic.
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    drain(&mut manager, 3, &done);
    assert_eq!(manager.pending(), 0);

    let mut bodies = bodies.lock().expect("lock").clone();
    bodies.sort();
    assert_eq!(bodies, vec!["resp0", "resp1", "resp2"]);

    server.join().expect("server");
}

#[test]
fn test_cancel_fires_cancelled_callback() {
    // No listener at all; the request would stall in connect/DNS.
    let mut manager = AsyncManager::new().expect("manager");
    let done = Arc::new(AtomicU32::new(0));

    let done_cb = Arc::clone(&done);
    let id = manager
        .submit(
            get("http://203.0.113.1:9/blackhole"),
            Some(Duration::from_secs(30)),
            Box::new(move |_id, response: Response| {
                assert_eq!(response.error, Some(Kind::Cancelled));
                done_cb.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .expect("submit");

    assert!(manager.cancel(id));
    assert!(!manager.cancel(id), "double cancel is a no-op");
    manager.process();
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert_eq!(manager.pending(), 0);
}

#[test]
fn test_shutdown_forces_remaining_requests_out() {
    // A server that accepts and never responds, so the request stays in
    // flight until shutdown forces it out.
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let held = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        thread::sleep(Duration::from_secs(12));
        drop(stream);
    });

    let mut manager = AsyncManager::new().expect("manager");
    let done = Arc::new(AtomicU32::new(0));
    let kinds = Arc::new(Mutex::new(Vec::<Option<Kind>>::new()));

    let done_cb = Arc::clone(&done);
    let kinds_cb = Arc::clone(&kinds);
    manager
        .submit(
            get(&format!("http://127.0.0.1:{port}/hang")),
            Some(Duration::from_secs(300)),
            Box::new(move |_id, response: Response| {
                kinds_cb.lock().expect("lock").push(response.error);
                done_cb.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .expect("submit");

    let started = Instant::now();
    manager.shutdown();
    assert!(started.elapsed() <= Duration::from_secs(11));
    assert_eq!(done.load(Ordering::SeqCst), 1);

    let kinds = kinds.lock().expect("lock");
    assert_eq!(kinds.as_slice(), &[Some(Kind::ShuttingDown)]);
    drop(manager);
    held.join().expect("held server");
}

#[test]
fn test_timeout_surfaces_on_callback() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        thread::sleep(Duration::from_millis(500));
        drop(stream);
    });

    let mut manager = AsyncManager::new().expect("manager");
    let done = Arc::new(AtomicU32::new(0));
    let done_cb = Arc::clone(&done);
    manager
        .submit(
            get(&format!("http://127.0.0.1:{port}/slow")),
            Some(Duration::from_millis(100)),
            Box::new(move |_id, response: Response| {
                assert_eq!(response.error, Some(Kind::Timeout));
                done_cb.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .expect("submit");

    drain(&mut manager, 1, &done);
    server.join().expect("server");
}
