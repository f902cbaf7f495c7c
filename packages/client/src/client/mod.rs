//! Client facade
//!
//! Owns the per-profile TLS connectors, the connection pool, the resolver
//! and DNS cache, and the retry-once orchestration around the request
//! state machine. `execute` always returns a `Response`; failures travel
//! in its `error` field.

pub mod session;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use boring2::ssl::SslConnector;

use crate::config::ClientConfig;
use crate::dns::{cache::DnsCache, Resolver, SystemResolver};
use crate::error::{self, Error};
use crate::http::{Request, Response, Timings};
use crate::io::{Readiness, ReadinessPoller};
use crate::machine::{Progress, RequestMachine};
use crate::pool::{ConnIo, ConnectionPool, PoolConfig, PooledConnection};
use crate::profiles::Browser;
use crate::proto::h2::{H2RequestHead, SessionManager};
use crate::tls::TlsBackend;

/// Cap on one readiness wait so deadlines are re-checked promptly.
const WAIT_SLICE: Duration = Duration::from_millis(100);
/// Re-drive cadence for suspensions with no fd (DNS in flight).
const NO_FD_SLEEP: Duration = Duration::from_millis(2);

/// Client counters, monotonic over the client's life.
#[derive(Debug, Default)]
pub struct ClientStats {
    pub total_requests: AtomicU64,
    pub successful_requests: AtomicU64,
    pub failed_requests: AtomicU64,
    pub pool_hits: AtomicU64,
    pub pool_misses: AtomicU64,
    pub retries: AtomicU64,
    pub bytes_received: AtomicU64,
}

/// Point-in-time copy of [`ClientStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStatsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub pool_hits: u64,
    pub pool_misses: u64,
    pub retries: u64,
    pub bytes_received: u64,
}

impl ClientStats {
    pub fn snapshot(&self) -> ClientStatsSnapshot {
        ClientStatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            pool_hits: self.pool_hits.load(Ordering::Relaxed),
            pool_misses: self.pool_misses.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

/// Synchronous HTTP client with browser-accurate TLS fingerprinting.
pub struct Client {
    config: ClientConfig,
    backend: TlsBackend,
    connectors: Mutex<HashMap<Browser, Arc<SslConnector>>>,
    pool: Arc<ConnectionPool>,
    resolver: Arc<dyn Resolver>,
    dns_cache: Arc<DnsCache>,
    stats: Arc<ClientStats>,
}

impl Client {
    pub fn new() -> Result<Self, Error> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, Error> {
        crate::init();
        config.validate().map_err(error::invalid_param)?;
        let pool = Arc::new(ConnectionPool::new(PoolConfig {
            max_total: config.pool_max_total,
            max_per_host: config.pool_max_per_host,
            idle_timeout: config.pool_idle_timeout,
        }));
        Ok(Self {
            backend: TlsBackend::new(),
            connectors: Mutex::new(HashMap::new()),
            pool,
            resolver: Arc::new(SystemResolver::new()),
            dns_cache: Arc::new(DnsCache::new(config.dns_ttl, config.dns_capacity)),
            stats: Arc::new(ClientStats::default()),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn pool(&self) -> Arc<ConnectionPool> {
        Arc::clone(&self.pool)
    }

    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    pub fn dns_cache(&self) -> Arc<DnsCache> {
        Arc::clone(&self.dns_cache)
    }

    pub(crate) fn resolver(&self) -> Arc<dyn Resolver> {
        Arc::clone(&self.resolver)
    }

    /// The configured connector for a profile; built once per profile,
    /// serialized by the backend's configuration lock.
    pub(crate) fn connector_for(&self, browser: Browser) -> Result<Arc<SslConnector>, Error> {
        let mut connectors = self
            .connectors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(connector) = connectors.get(&browser) {
            return Ok(Arc::clone(connector));
        }
        let connector = Arc::new(self.backend.configure_context(browser.profile())?);
        connectors.insert(browser, Arc::clone(&connector));
        Ok(connector)
    }

    /// Fill in the profile's identity headers wherever the caller left
    /// them unset.
    fn apply_default_headers(&self, request: &mut Request) {
        let profile = request.browser.profile();
        if !request.headers.contains("user-agent") {
            request.headers.append("user-agent", profile.user_agent);
        }
        for (name, value) in profile.default_headers {
            if !request.headers.contains(name) {
                request.headers.append(*name, *value);
            }
        }
    }

    /// Execute a request on the synchronous path. Every return is a
    /// non-null response; on failure `error` is set and the timings
    /// gathered so far are preserved.
    pub fn execute(&self, mut request: Request) -> Response {
        self.stats.total_requests.fetch_add(1, Ordering::Relaxed);
        self.apply_default_headers(&mut request);

        let response = self.execute_with_retry(&request);
        match response {
            Ok(mut response) => {
                self.stats
                    .successful_requests
                    .fetch_add(1, Ordering::Relaxed);
                self.stats
                    .bytes_received
                    .fetch_add(response.body.len() as u64, Ordering::Relaxed);
                self.decode_response(&mut response);
                response
            }
            Err((err, timings)) => {
                self.stats.failed_requests.fetch_add(1, Ordering::Relaxed);
                Response::from_error(&err, timings)
            }
        }
    }

    /// Pool-aware orchestration: a transport failure on a pooled
    /// connection is retried exactly once on a fresh dial, provided no
    /// response byte was seen.
    fn execute_with_retry(&self, request: &Request) -> Result<Response, (Error, Timings)> {
        let use_pool = request.proxy.is_none();

        if use_pool {
            if let Some(conn) = self.pool.get(&request.authority()) {
                self.stats.pool_hits.fetch_add(1, Ordering::Relaxed);
                match self.execute_on_pooled(request, conn) {
                    Ok(response) => return Ok(response),
                    Err(RetryVerdict::Fatal(err, timings)) => return Err((err, timings)),
                    Err(RetryVerdict::Retry(err)) => {
                        tracing::warn!("stale pooled connection, redialling: {}", err.message());
                        self.stats.retries.fetch_add(1, Ordering::Relaxed);
                    }
                }
            } else {
                self.stats.pool_misses.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.execute_fresh(request)
    }

    /// Run on a pooled connection. `Retry` is only returned when no
    /// response byte arrived.
    fn execute_on_pooled(
        &self,
        request: &Request,
        conn: PooledConnection,
    ) -> Result<Response, RetryVerdict> {
        match conn.io {
            ConnIo::H2(manager) => {
                let started = std::time::Instant::now();
                let head = H2RequestHead::from_request(request);
                let stream_id = match manager.submit_stream(&head) {
                    Ok(id) => id,
                    Err(err) => return Err(RetryVerdict::Retry(err)),
                };
                let timeout = request.timeout.unwrap_or(self.config.request_timeout);
                let outcome = manager.wait_for_stream(stream_id, timeout);
                // Dropping the pending record absorbs any late completion.
                manager.remove_stream(stream_id);

                let tls = (conn.ja3.clone(), conn.tls_version.clone(), conn.tls_cipher.clone());
                let session_alive = manager.is_alive();
                if session_alive {
                    // The session multiplexes; hand it straight back.
                    let mut back = PooledConnection::new(request.authority(), ConnIo::H2(manager));
                    back.preface_sent = true;
                    back.ja3 = tls.0.clone();
                    back.tls_version = tls.1.clone();
                    back.tls_cipher = tls.2.clone();
                    self.pool.put(back);
                }

                let timings = Timings {
                    total_us: started.elapsed().as_micros() as u64,
                    ..Default::default()
                };
                match outcome {
                    Ok(stream) => {
                        let mut response = Response {
                            status: stream.status.unwrap_or(0),
                            version: http::Version::HTTP_2,
                            headers: stream.headers,
                            body: stream.body,
                            timings,
                            ..Default::default()
                        };
                        response.tls.ja3 = tls.0;
                        response.tls.version = tls.1;
                        response.tls.cipher = tls.2;
                        Ok(response)
                    }
                    Err(err) if err.is_timeout() => Err(RetryVerdict::Fatal(err, timings)),
                    // Stream-level errors surface when the session itself
                    // survived them; a dead session earns one redial.
                    Err(err) if session_alive => Err(RetryVerdict::Fatal(err, timings)),
                    Err(err) => Err(RetryVerdict::Retry(err)),
                }
            }
            ConnIo::H1(transport) => {
                let connector = match self.connector_for(request.browser) {
                    Ok(connector) => connector,
                    Err(err) => return Err(RetryVerdict::Fatal(err, Timings::default())),
                };
                let mut machine = RequestMachine::with_transport(
                    request.clone(),
                    transport,
                    connector,
                    self.resolver(),
                    self.dns_cache(),
                    &self.config,
                );
                match self.drive(&mut machine) {
                    Ok(response) => {
                        self.maybe_pool(request, &mut machine);
                        Ok(*response)
                    }
                    Err(err) => {
                        if err.is_transport() && !machine.response_started() {
                            Err(RetryVerdict::Retry(err))
                        } else {
                            Err(RetryVerdict::Fatal(err, machine.timings()))
                        }
                    }
                }
            }
        }
    }

    fn execute_fresh(&self, request: &Request) -> Result<Response, (Error, Timings)> {
        let connector = self
            .connector_for(request.browser)
            .map_err(|e| (e, Timings::default()))?;
        let mut machine = RequestMachine::new(
            request.clone(),
            connector,
            self.resolver(),
            self.dns_cache(),
            &self.config,
        );
        match self.drive(&mut machine) {
            Ok(response) => {
                self.maybe_pool(request, &mut machine);
                Ok(*response)
            }
            Err(err) => Err((err, machine.timings())),
        }
    }

    /// Drive a machine to quiescence with the default readiness source.
    fn drive(&self, machine: &mut RequestMachine) -> Result<Box<Response>, Error> {
        let mut poller = ReadinessPoller::new()?;
        loop {
            match machine.step() {
                Progress::Done(response) => return Ok(response),
                Progress::Failed(err) => return Err(err),
                Progress::Pending(set) => {
                    if set.fd >= 0 && (set.readable || set.writable) {
                        let _ = poller.wait(set, WAIT_SLICE)?;
                    } else {
                        // No fd to arm (resolver worker in flight).
                        std::thread::sleep(NO_FD_SLEEP);
                    }
                }
            }
        }
    }

    /// Return a completed machine's connection to the pool when policy
    /// allows. First HTTP/2 use wraps the session in a manager so later
    /// hits can multiplex.
    fn maybe_pool(&self, request: &Request, machine: &mut RequestMachine) {
        if !machine.poolable() {
            return;
        }
        let authority = request.authority();
        if let Some(session) = machine.take_h2_session() {
            if !session.is_alive() {
                return;
            }
            let preface_sent = session.preface_sent();
            let manager = SessionManager::spawn(session);
            let mut conn = PooledConnection::new(authority, ConnIo::H2(manager));
            conn.preface_sent = preface_sent;
            conn.ja3 = machine.tls_info().ja3.clone();
            conn.tls_version = machine.tls_info().version.clone();
            conn.tls_cipher = machine.tls_info().cipher.clone();
            self.pool.put(conn);
        } else if let Some(transport) = machine.take_transport() {
            let mut conn = PooledConnection::new(authority, ConnIo::H1(transport));
            conn.ja3 = machine.tls_info().ja3.clone();
            conn.tls_version = machine.tls_info().version.clone();
            conn.tls_cipher = machine.tls_info().cipher.clone();
            self.pool.put(conn);
        }
    }

    /// Decode `Content-Encoding` in place; an undecodable body is left
    /// as received with the error noted.
    fn decode_response(&self, response: &mut Response) {
        let encoding = response.header("content-encoding").map(str::to_owned);
        if let Some(encoding) = encoding {
            match crate::decode::decode_body(Some(&encoding), &response.body) {
                Ok(decoded) => response.body = decoded,
                Err(e) => {
                    tracing::warn!("failed to decode {encoding} body: {}", e.message());
                }
            }
        }
    }
}

enum RetryVerdict {
    /// Redial once; transport failed before any response byte.
    Retry(Error),
    Fatal(Error, Timings),
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("pool_total", &self.pool.total())
            .finish()
    }
}
