//! Request state machine
//!
//! Drives one request from DNS through body receipt without blocking.
//! Every call to [`RequestMachine::step`] advances as far as the sockets
//! allow and returns either a readiness requirement, the finished
//! response, or an error. The machine never waits and never retries; the
//! orchestrator owns both.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use boring2::ssl::SslConnector;
use http::{Method, Version};

use crate::config::ClientConfig;
use crate::dns::{cache::DnsCache, DnsQuery, Resolver};
use crate::error::{self, Error};
use crate::http::{HeaderList, Request, Response, Timings, TlsInfo};
use crate::io::{connect_begin, connect_finish, ConnectStart, ReadySet};
use crate::proto::h1::{self, chunked::ChunkedDecoder, BodyFraming};
use crate::proto::h2::{H2RequestHead, H2Session};
use crate::proxy;
use crate::tls::{Handshaker, HandshakeStatus, Transport};

/// The request lifecycle. The three I/O-looping states are re-entered;
/// everything else advances monotonically or trips into `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    DnsLookup,
    Connecting,
    ProxyConnect,
    TlsHandshake,
    Sending,
    ReceivingHeaders,
    ReceivingBody,
    Complete,
    Error,
}

/// Verdict of one `step` call.
#[derive(Debug)]
pub enum Progress {
    /// Suspended; re-drive once the named fd is ready.
    Pending(ReadySet),
    /// Finished; the response is yielded exactly once.
    Done(Box<Response>),
    Failed(Error),
}

/// Which endpoint the in-flight TLS handshake is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TlsTarget {
    Proxy,
    Origin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProxyPhase {
    Send,
    Recv,
}

enum StepOutcome {
    Continue,
    Suspend(ReadySet),
    Finished,
    Fail(Error),
}

/// One request in flight.
pub struct RequestMachine {
    request: Request,
    connector: Arc<SslConnector>,
    resolver: Arc<dyn Resolver>,
    dns_cache: Arc<DnsCache>,

    state: State,
    deadline: Instant,
    started: Instant,
    /// Start of the current timing stage; advanced at each boundary so
    /// stage durations are disjoint.
    last_mark: Instant,
    timings: Timings,
    tls_info: TlsInfo,

    dns_query: Option<DnsQuery>,
    addrs: Vec<SocketAddr>,
    addr_index: usize,
    connect_pending: Option<socket2::Socket>,

    transport: Option<Transport>,
    handshaker: Option<Handshaker>,
    tls_target: TlsTarget,

    proxy_phase: ProxyPhase,
    proxy_buf: Vec<u8>,
    proxy_pos: usize,
    proxy_recv: Vec<u8>,

    send_buf: Vec<u8>,
    send_pos: usize,
    recv_buf: Vec<u8>,

    response_version: Version,
    response_status: u16,
    response_headers: HeaderList,
    body: Vec<u8>,
    framing: BodyFraming,
    chunked: Option<ChunkedDecoder>,
    body_received: u64,
    will_close: bool,

    alpn_h2: bool,
    h2: Option<H2Session>,
    h2_stream: u32,

    reused_connection: bool,

    header_buffer_size: usize,
    socket_buffer_size: usize,
    h2_stream_buffer_size: usize,
}

impl RequestMachine {
    pub fn new(
        request: Request,
        connector: Arc<SslConnector>,
        resolver: Arc<dyn Resolver>,
        dns_cache: Arc<DnsCache>,
        config: &ClientConfig,
    ) -> Self {
        let now = Instant::now();
        let timeout = request.timeout.unwrap_or(config.request_timeout);
        Self {
            request,
            connector,
            resolver,
            dns_cache,
            state: State::Init,
            deadline: now + timeout,
            started: now,
            last_mark: now,
            timings: Timings::default(),
            tls_info: TlsInfo::default(),
            dns_query: None,
            addrs: Vec::new(),
            addr_index: 0,
            connect_pending: None,
            transport: None,
            handshaker: None,
            tls_target: TlsTarget::Origin,
            proxy_phase: ProxyPhase::Send,
            proxy_buf: Vec::new(),
            proxy_pos: 0,
            proxy_recv: Vec::new(),
            send_buf: Vec::new(),
            send_pos: 0,
            recv_buf: Vec::with_capacity(config.header_buffer_size),
            response_version: Version::HTTP_11,
            response_status: 0,
            response_headers: HeaderList::new(),
            body: Vec::new(),
            framing: BodyFraming::ReadToEof,
            chunked: None,
            body_received: 0,
            will_close: false,
            alpn_h2: false,
            h2: None,
            h2_stream: 0,
            reused_connection: false,
            header_buffer_size: config.header_buffer_size,
            socket_buffer_size: config.socket_buffer_size,
            h2_stream_buffer_size: config.h2_stream_buffer_size,
        }
    }

    /// Start over an already-established transport taken from the pool:
    /// the machine skips straight to SENDING.
    pub fn with_transport(
        request: Request,
        transport: Transport,
        connector: Arc<SslConnector>,
        resolver: Arc<dyn Resolver>,
        dns_cache: Arc<DnsCache>,
        config: &ClientConfig,
    ) -> Self {
        let mut machine = Self::new(request, connector, resolver, dns_cache, config);
        machine.alpn_h2 = transport.alpn_protocol().as_deref() == Some("h2");
        machine.tls_info.version = transport.tls_version();
        machine.tls_info.cipher = transport.tls_cipher();
        machine.transport = Some(transport);
        machine.reused_connection = true;
        machine.state = State::Sending;
        machine
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Close the current timing stage and return its duration.
    fn mark(&mut self) -> u64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_mark).as_micros() as u64;
        self.last_mark = now;
        elapsed
    }

    pub fn timings(&self) -> Timings {
        let mut timings = self.timings;
        timings.total_us = self.started.elapsed().as_micros() as u64;
        timings
    }

    pub fn reused_connection(&self) -> bool {
        self.reused_connection
    }

    /// The pool key of the request being driven.
    pub fn authority(&self) -> String {
        self.request.authority()
    }

    /// Whether any response byte has arrived; once true, the orchestrator
    /// must not retry on a fresh connection.
    pub fn response_started(&self) -> bool {
        !self.recv_buf.is_empty()
            || self.timings.first_byte_us != 0
            || self.response_status != 0
    }

    /// The fd readiness would be armed on right now, if any.
    pub fn current_fd(&self) -> Option<std::os::fd::RawFd> {
        if let Some(ref pending) = self.connect_pending {
            use std::os::fd::AsRawFd;
            return Some(pending.as_raw_fd());
        }
        if let Some(ref handshaker) = self.handshaker {
            return handshaker.raw_fd();
        }
        if let Some(ref session) = self.h2 {
            return Some(session.raw_fd());
        }
        self.transport.as_ref().map(|t| t.raw_fd())
    }

    /// Force the machine into `Error` (cancellation, shutdown).
    pub fn fail(&mut self, err: Error) -> Progress {
        self.state = State::Error;
        Progress::Failed(err)
    }

    /// Whether the connection may be returned to the pool afterwards.
    pub fn poolable(&self) -> bool {
        self.state == State::Complete
            && self.request.proxy.is_none()
            && !self.will_close
            && !self.response_headers.connection_close()
    }

    /// Take the HTTP/1.1 transport back after completion.
    pub fn take_transport(&mut self) -> Option<Transport> {
        self.transport.take()
    }

    /// Take the HTTP/2 session back after completion.
    pub fn take_h2_session(&mut self) -> Option<H2Session> {
        self.h2.take()
    }

    pub fn tls_info(&self) -> &TlsInfo {
        &self.tls_info
    }

    /// Advance until the request suspends, finishes, or fails.
    pub fn step(&mut self) -> Progress {
        if matches!(self.state, State::Complete | State::Error) {
            return Progress::Failed(error::invalid_param("stepping a finished request"));
        }

        loop {
            if Instant::now() >= self.deadline {
                return self.fail(error::timeout().with_url(self.request.url.clone()));
            }

            let outcome = match self.state {
                State::Init => self.step_init(),
                State::DnsLookup => self.step_dns(),
                State::Connecting => self.step_connecting(),
                State::ProxyConnect => self.step_proxy_connect(),
                State::TlsHandshake => self.step_tls(),
                State::Sending => self.step_sending(),
                State::ReceivingHeaders => self.step_receiving_headers(),
                State::ReceivingBody => self.step_receiving_body(),
                State::Complete | State::Error => unreachable!("terminal state stepped"),
            };

            match outcome {
                StepOutcome::Continue => continue,
                StepOutcome::Suspend(set) => return Progress::Pending(set),
                StepOutcome::Finished => {
                    self.state = State::Complete;
                    return Progress::Done(self.assemble_response());
                }
                StepOutcome::Fail(err) => {
                    return self.fail(err.with_url(self.request.url.clone()));
                }
            }
        }
    }

    // ===== INIT / DNS =====

    /// The DNS target: the proxy authority when a proxy is configured,
    /// the origin otherwise.
    fn dial_target(&self) -> (String, u16) {
        match self.request.proxy {
            Some(ref proxy) => (proxy.host().to_string(), proxy.port()),
            None => (self.request.host().to_string(), self.request.port()),
        }
    }

    fn step_init(&mut self) -> StepOutcome {
        let (host, port) = self.dial_target();
        if let Some(addrs) = self.dns_cache.lookup(&host, port) {
            self.addrs = addrs;
            self.state = State::Connecting;
            return StepOutcome::Continue;
        }
        self.dns_query = Some(self.resolver.resolve(&host, port));
        self.state = State::DnsLookup;
        StepOutcome::Continue
    }

    fn step_dns(&mut self) -> StepOutcome {
        let Some(ref query) = self.dns_query else {
            return StepOutcome::Fail(error::network("DNS state without query"));
        };
        match query.poll() {
            None => {
                // The resolver runs on its own worker; there is no fd to
                // arm, so the caller re-drives on its poll cadence.
                let fd = self.current_fd().unwrap_or(-1);
                StepOutcome::Suspend(ReadySet {
                    fd,
                    readable: false,
                    writable: false,
                })
            }
            Some(Ok(addrs)) => {
                let (host, port) = self.dial_target();
                self.dns_cache.insert(&host, port, addrs.clone());
                self.addrs = addrs;
                self.dns_query = None;
                self.state = State::Connecting;
                StepOutcome::Continue
            }
            Some(Err(message)) => StepOutcome::Fail(error::network(message)),
        }
    }

    // ===== CONNECT =====

    fn step_connecting(&mut self) -> StepOutcome {
        if let Some(pending) = self.connect_pending.take() {
            match connect_finish(pending) {
                Ok(stream) => return self.on_connected(stream),
                Err(e) => {
                    tracing::debug!("connect attempt failed: {e}");
                    self.addr_index += 1;
                }
            }
        }

        loop {
            let Some(addr) = self.addrs.get(self.addr_index).copied() else {
                return StepOutcome::Fail(error::network("connect failed on every address"));
            };
            match connect_begin(addr, self.socket_buffer_size) {
                Ok(ConnectStart::Connected(stream)) => return self.on_connected(stream),
                Ok(ConnectStart::Pending(socket)) => {
                    use std::os::fd::AsRawFd;
                    let fd = socket.as_raw_fd();
                    self.connect_pending = Some(socket);
                    return StepOutcome::Suspend(ReadySet::writable(fd));
                }
                Err(e) => {
                    tracing::debug!("connect to {addr} failed: {e}");
                    self.addr_index += 1;
                }
            }
        }
    }

    fn on_connected(&mut self, stream: std::net::TcpStream) -> StepOutcome {
        self.timings.connect_us = self.mark();
        self.transport = Some(Transport::Plain(stream));

        match self.request.proxy {
            Some(ref proxy) if proxy.is_tls() => {
                self.tls_target = TlsTarget::Proxy;
                self.state = State::TlsHandshake;
            }
            Some(_) if self.request.is_https() => {
                self.state = State::ProxyConnect;
                self.prepare_proxy_connect();
            }
            Some(_) => {
                self.state = State::Sending;
            }
            None if self.request.is_https() => {
                self.tls_target = TlsTarget::Origin;
                self.state = State::TlsHandshake;
            }
            None => {
                self.state = State::Sending;
            }
        }
        StepOutcome::Continue
    }

    // ===== TLS =====

    fn step_tls(&mut self) -> StepOutcome {
        if self.handshaker.is_none() {
            let Some(transport) = self.transport.take() else {
                return StepOutcome::Fail(error::tls("handshake without transport"));
            };
            let sni = match self.tls_target {
                TlsTarget::Proxy => self
                    .request
                    .proxy
                    .as_ref()
                    .map(|p| p.host().to_string())
                    .unwrap_or_default(),
                TlsTarget::Origin => self.request.host().to_string(),
            };
            let profile = self.request.browser.profile();
            let handshaker = match Handshaker::new(
                &self.connector,
                transport,
                &sni,
                profile,
                self.request.http2,
                self.request.verify_ssl,
            ) {
                Ok(handshaker) => handshaker,
                Err(e) => return StepOutcome::Fail(e),
            };
            self.handshaker = Some(handshaker);
        }

        let handshaker = self.handshaker.as_mut().expect("handshaker installed");
        match handshaker.drive() {
            Ok(HandshakeStatus::Done) => {
                let handshaker = self.handshaker.take().expect("handshaker present");
                let transport = handshaker.into_transport();
                if self.tls_target == TlsTarget::Origin {
                    self.timings.tls_us = self.mark();
                    self.alpn_h2 = transport.alpn_protocol().as_deref() == Some("h2");
                    self.tls_info.version = transport.tls_version();
                    self.tls_info.cipher = transport.tls_cipher();
                    self.tls_info.ja3 =
                        Some(self.request.browser.profile().ja3_hex().to_string());
                    self.transport = Some(transport);
                    self.state = State::Sending;
                } else {
                    // Proxy handshake time is not origin TLS time.
                    let _ = self.mark();
                    self.transport = Some(transport);
                    self.state = State::ProxyConnect;
                    self.prepare_proxy_connect();
                }
                StepOutcome::Continue
            }
            Ok(HandshakeStatus::WantRead) => {
                let fd = handshaker.raw_fd().unwrap_or(-1);
                StepOutcome::Suspend(ReadySet::readable(fd))
            }
            Ok(HandshakeStatus::WantWrite) => {
                let fd = handshaker.raw_fd().unwrap_or(-1);
                StepOutcome::Suspend(ReadySet::writable(fd))
            }
            Err(e) => StepOutcome::Fail(e),
        }
    }

    // ===== PROXY CONNECT =====

    fn prepare_proxy_connect(&mut self) {
        let proxy = self.request.proxy.as_ref().expect("proxy configured");
        self.proxy_buf = proxy::encode_connect(self.request.host(), self.request.port(), proxy);
        self.proxy_pos = 0;
        self.proxy_recv.clear();
        self.proxy_phase = ProxyPhase::Send;
    }

    fn step_proxy_connect(&mut self) -> StepOutcome {
        let Some(transport) = self.transport.as_mut() else {
            return StepOutcome::Fail(error::network("proxy state without transport"));
        };
        let fd = transport.raw_fd();

        if self.proxy_phase == ProxyPhase::Send {
            while self.proxy_pos < self.proxy_buf.len() {
                match transport.write(&self.proxy_buf[self.proxy_pos..]) {
                    Ok(0) => {
                        return StepOutcome::Fail(error::network("proxy closed during CONNECT"))
                    }
                    Ok(n) => self.proxy_pos += n,
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                        return StepOutcome::Suspend(ReadySet::writable(fd));
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return StepOutcome::Fail(error::network(e)),
                }
            }
            self.proxy_phase = ProxyPhase::Recv;
        }

        let mut scratch = [0u8; 4096];
        loop {
            match transport.read(&mut scratch) {
                Ok(0) => {
                    return StepOutcome::Fail(error::network("proxy closed before CONNECT reply"))
                }
                Ok(n) => {
                    self.proxy_recv.extend_from_slice(&scratch[..n]);
                    if let Some(end) = h1::find_headers_end(&self.proxy_recv) {
                        if let Err(e) = proxy::check_connect_reply(&self.proxy_recv[..end]) {
                            return StepOutcome::Fail(e);
                        }
                        // Tunnel open. HTTPS targets get a fresh origin
                        // handshake through it; plaintext targets send
                        // directly.
                        if self.request.is_https() {
                            self.tls_target = TlsTarget::Origin;
                            self.state = State::TlsHandshake;
                        } else {
                            self.state = State::Sending;
                        }
                        return StepOutcome::Continue;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return StepOutcome::Suspend(ReadySet::readable(fd));
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return StepOutcome::Fail(error::network(e)),
            }
        }
    }

    // ===== SEND =====

    /// Absolute-form is used only when speaking to the proxy without a
    /// tunnel, i.e. a plaintext target.
    fn via_plain_proxy(&self) -> bool {
        self.request.proxy.is_some() && !self.request.is_https()
    }

    fn step_sending(&mut self) -> StepOutcome {
        if self.alpn_h2 {
            return self.step_sending_h2();
        }

        if self.send_buf.is_empty() {
            self.send_buf = h1::encode_request(&self.request, self.via_plain_proxy());
            self.send_pos = 0;
        }

        let Some(transport) = self.transport.as_mut() else {
            return StepOutcome::Fail(error::network("send without transport"));
        };
        let fd = transport.raw_fd();

        while self.send_pos < self.send_buf.len() {
            match transport.write(&self.send_buf[self.send_pos..]) {
                Ok(0) => return StepOutcome::Fail(error::network("connection closed during send")),
                Ok(n) => self.send_pos += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return StepOutcome::Suspend(ReadySet::writable(fd));
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return StepOutcome::Fail(error::network(e)),
            }
        }

        self.state = State::ReceivingHeaders;
        StepOutcome::Continue
    }

    fn step_sending_h2(&mut self) -> StepOutcome {
        if self.h2.is_none() {
            let Some(transport) = self.transport.take() else {
                return StepOutcome::Fail(error::network("h2 send without transport"));
            };
            let mut session = H2Session::new(transport, self.h2_stream_buffer_size);
            let profile = self.request.browser.profile();
            session.send_preamble(profile.h2_settings, profile.h2_window_update);
            let head = H2RequestHead::from_request(&self.request);
            match session.submit(&head) {
                Ok(stream_id) => self.h2_stream = stream_id,
                Err(e) => return StepOutcome::Fail(e),
            }
            self.h2 = Some(session);
        }

        let session = self.h2.as_mut().expect("h2 session installed");
        let fd = session.raw_fd();
        match session.pump_writes() {
            Ok(true) => {
                self.state = State::ReceivingHeaders;
                StepOutcome::Continue
            }
            Ok(false) => StepOutcome::Suspend(ReadySet::writable(fd)),
            Err(e) => StepOutcome::Fail(e),
        }
    }

    // ===== RECEIVE =====

    /// Read from the transport with the borrow scoped to the one call.
    fn transport_read(&mut self, scratch: &mut [u8]) -> io::Result<usize> {
        match self.transport.as_mut() {
            Some(transport) => transport.read(scratch),
            None => Err(io::Error::other("no transport")),
        }
    }

    fn step_receiving_headers(&mut self) -> StepOutcome {
        if self.alpn_h2 {
            return self.step_receiving_h2(false);
        }

        let Some(fd) = self.transport.as_ref().map(|t| t.raw_fd()) else {
            return StepOutcome::Fail(error::network("receive without transport"));
        };

        let mut scratch = [0u8; 16 * 1024];
        loop {
            match self.transport_read(&mut scratch) {
                Ok(0) => {
                    return StepOutcome::Fail(error::network("EOF before response headers"));
                }
                Ok(n) => {
                    if self.recv_buf.is_empty() {
                        self.timings.first_byte_us = self.mark();
                    }
                    self.recv_buf.extend_from_slice(&scratch[..n]);
                    if self.recv_buf.len() > self.header_buffer_size {
                        return StepOutcome::Fail(error::parse("response head too large"));
                    }
                    if let Some(end) = h1::find_headers_end(&self.recv_buf) {
                        return self.on_headers_complete(end);
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return StepOutcome::Suspend(ReadySet::readable(fd));
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return StepOutcome::Fail(error::network(e)),
            }
        }
    }

    fn on_headers_complete(&mut self, headers_end: usize) -> StepOutcome {
        let (version, status, headers) = match h1::parse_response_head(&self.recv_buf[..headers_end])
        {
            Ok(parsed) => parsed,
            Err(e) => return StepOutcome::Fail(e),
        };
        self.response_version = version;
        self.response_status = status;
        self.response_headers = headers;

        self.framing = h1::body_framing(
            self.request.method == Method::HEAD,
            status,
            &self.response_headers,
        );
        if self.framing == BodyFraming::ReadToEof {
            self.will_close = true;
        }
        if self.framing == BodyFraming::Chunked {
            self.chunked = Some(ChunkedDecoder::new());
        }

        // Bytes past the terminator already belong to the body.
        let leftover = self.recv_buf.split_off(headers_end);
        self.state = State::ReceivingBody;
        if self.framing == BodyFraming::None && !leftover.is_empty() {
            // Stray bytes after a bodiless response desynchronize the
            // connection; it must not be reused.
            self.will_close = true;
        }
        if !leftover.is_empty() {
            if let Some(outcome) = self.consume_body_bytes(&leftover) {
                return outcome;
            }
        }
        // Zero-length bodies complete without entering a recv loop.
        if self.body_done() {
            return StepOutcome::Finished;
        }
        StepOutcome::Continue
    }

    fn body_done(&self) -> bool {
        match self.framing {
            BodyFraming::None => true,
            BodyFraming::Length(n) => self.body_received >= n,
            BodyFraming::Chunked => self.chunked.as_ref().map(|c| c.is_done()).unwrap_or(false),
            BodyFraming::ReadToEof => false,
        }
    }

    /// Apply freshly-received body bytes per the framing mode. Returns an
    /// outcome only when the body finished or failed.
    fn consume_body_bytes(&mut self, bytes: &[u8]) -> Option<StepOutcome> {
        match self.framing {
            BodyFraming::None => Some(StepOutcome::Finished),
            BodyFraming::Length(total) => {
                let want = (total - self.body_received) as usize;
                let take = want.min(bytes.len());
                self.body.extend_from_slice(&bytes[..take]);
                self.body_received += take as u64;
                (self.body_received >= total).then_some(StepOutcome::Finished)
            }
            BodyFraming::Chunked => {
                let decoder = self.chunked.as_mut().expect("chunked decoder");
                match decoder.feed(bytes, &mut self.body) {
                    Ok(_) => decoder.is_done().then_some(StepOutcome::Finished),
                    Err(e) => Some(StepOutcome::Fail(e)),
                }
            }
            BodyFraming::ReadToEof => {
                self.body.extend_from_slice(bytes);
                self.body_received += bytes.len() as u64;
                None
            }
        }
    }

    fn step_receiving_body(&mut self) -> StepOutcome {
        if self.alpn_h2 {
            return self.step_receiving_h2(true);
        }
        if self.body_done() {
            return StepOutcome::Finished;
        }

        let Some(fd) = self.transport.as_ref().map(|t| t.raw_fd()) else {
            return StepOutcome::Fail(error::network("receive without transport"));
        };

        let mut scratch = [0u8; 16 * 1024];
        loop {
            match self.transport_read(&mut scratch) {
                Ok(0) => {
                    return match self.framing {
                        BodyFraming::ReadToEof => StepOutcome::Finished,
                        BodyFraming::Length(_) => {
                            StepOutcome::Fail(error::parse("EOF before Content-Length satisfied"))
                        }
                        _ => StepOutcome::Fail(error::parse("EOF inside chunked body")),
                    };
                }
                Ok(n) => {
                    if let Some(outcome) = self.consume_body_bytes(&scratch[..n]) {
                        return outcome;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return StepOutcome::Suspend(ReadySet::readable(fd));
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return StepOutcome::Fail(error::network(e)),
            }
        }
    }

    fn step_receiving_h2(&mut self, body_phase: bool) -> StepOutcome {
        let stream_id = self.h2_stream;
        let session = self.h2.as_mut().expect("h2 session installed");
        let fd = session.raw_fd();

        if let Err(e) = session.pump_reads() {
            return StepOutcome::Fail(e);
        }
        // Window updates and acks queue during reads; push them out.
        if let Err(e) = session.pump_writes() {
            return StepOutcome::Fail(e);
        }

        if session.stream_complete(stream_id) {
            let stream = session.take_stream(stream_id).expect("completed stream");
            if let Some(message) = stream.error {
                return StepOutcome::Fail(error::protocol(message));
            }
            if self.timings.first_byte_us == 0 {
                self.timings.first_byte_us = self.mark();
            }
            self.response_version = Version::HTTP_2;
            self.response_status = stream.status.unwrap_or(0);
            self.response_headers = stream.headers;
            self.body = stream.body;
            return StepOutcome::Finished;
        }

        if !body_phase {
            self.state = State::ReceivingBody;
        }

        StepOutcome::Suspend(ReadySet::readable(fd))
    }

    fn assemble_response(&mut self) -> Box<Response> {
        let mut timings = self.timings;
        timings.total_us = self.started.elapsed().as_micros() as u64;
        Box::new(Response {
            status: self.response_status,
            version: self.response_version,
            headers: std::mem::take(&mut self.response_headers),
            body: std::mem::take(&mut self.body),
            timings,
            tls: self.tls_info.clone(),
            error: None,
            error_message: None,
        })
    }
}

impl std::fmt::Debug for RequestMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestMachine")
            .field("url", &self.request.url.as_str())
            .field("state", &self.state)
            .finish()
    }
}
