//! Connection pool
//!
//! Caches live connections keyed by `host:port`. A connection is owned
//! either by the pool or by exactly one in-flight request; `get` transfers
//! ownership out, `put` transfers it back in (or destroys it). One mutex
//! guards the list; it is never held across I/O other than the one-byte
//! liveness peek.

use std::io;
use std::os::fd::RawFd;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::proto::h2::SessionManager;
use crate::tls::Transport;

/// Global connection cap.
pub const DEFAULT_MAX_TOTAL: usize = 100;
/// Per-authority cap, matching browser behaviour.
pub const DEFAULT_MAX_PER_HOST: usize = 6;
/// Idle reaping threshold.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// The I/O half of a pooled connection.
pub enum ConnIo {
    /// HTTP/1.1: the transport itself.
    H1(Transport),
    /// HTTP/2: the session manager that owns the transport.
    H2(Arc<SessionManager>),
}

impl ConnIo {
    pub fn is_http2(&self) -> bool {
        matches!(self, ConnIo::H2(_))
    }

    pub fn raw_fd(&self) -> RawFd {
        match self {
            ConnIo::H1(transport) => transport.raw_fd(),
            ConnIo::H2(manager) => manager.raw_fd(),
        }
    }
}

impl std::fmt::Debug for ConnIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnIo::H1(_) => f.write_str("ConnIo::H1"),
            ConnIo::H2(_) => f.write_str("ConnIo::H2"),
        }
    }
}

/// One cached connection plus the metadata reuse needs.
#[derive(Debug)]
pub struct PooledConnection {
    pub authority: String,
    pub io: ConnIo,
    pub last_used: Instant,
    /// HTTP/2 preface already sent on this connection.
    pub preface_sent: bool,
    pub ja3: Option<String>,
    pub tls_version: Option<String>,
    pub tls_cipher: Option<String>,
}

impl PooledConnection {
    pub fn new(authority: String, io: ConnIo) -> Self {
        Self {
            authority,
            io,
            last_used: Instant::now(),
            preface_sent: false,
            ja3: None,
            tls_version: None,
            tls_cipher: None,
        }
    }

    pub fn is_http2(&self) -> bool {
        self.io.is_http2()
    }

    /// Liveness probe. HTTP/1.1: non-blocking one-byte peek — zero means
    /// the peer closed, `WouldBlock` means alive; a TLS layer must also be
    /// free of close_notify. HTTP/2: the manager's session must be usable.
    pub fn is_alive(&mut self) -> bool {
        match &mut self.io {
            ConnIo::H1(transport) => {
                if transport.tls_shutdown_seen() {
                    return false;
                }
                if transport.tls_pending() > 0 {
                    return true;
                }
                match transport.peek() {
                    Ok(0) => false,
                    Ok(_) => true,
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => true,
                    Err(_) => false,
                }
            }
            ConnIo::H2(manager) => manager.is_alive(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_total: usize,
    pub max_per_host: usize,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_total: DEFAULT_MAX_TOTAL,
            max_per_host: DEFAULT_MAX_PER_HOST,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Authority-keyed connection cache.
#[derive(Debug)]
pub struct ConnectionPool {
    connections: Mutex<Vec<PooledConnection>>,
    config: PoolConfig,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            connections: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Take a validated live connection for `authority`, newest first.
    /// Dead entries found on the way are destroyed.
    pub fn get(&self, authority: &str) -> Option<PooledConnection> {
        let mut list = self.lock();
        self.reap_expired(&mut list);
        while let Some(pos) = list.iter().rposition(|c| c.authority == authority) {
            let mut conn = list.remove(pos);
            if conn.is_alive() {
                tracing::debug!(authority, "pool hit");
                return Some(conn);
            }
            tracing::debug!(authority, "dropping dead pooled connection");
        }
        None
    }

    /// Return a connection to the pool. It is destroyed instead when it is
    /// invalid, the caps are exceeded, or (HTTP/2) its session died.
    pub fn put(&self, mut conn: PooledConnection) -> bool {
        if !conn.is_alive() {
            tracing::debug!(authority = %conn.authority, "refusing dead connection");
            return false;
        }
        if let ConnIo::H1(ref mut transport) = conn.io {
            // Unread plaintext means a desynchronized exchange; pooling it
            // would corrupt the next response.
            if transport.tls_pending() > 0 {
                tracing::debug!(authority = %conn.authority, "refusing connection with pending plaintext");
                return false;
            }
        }

        let mut list = self.lock();
        self.reap_expired(&mut list);
        if list.len() >= self.config.max_total {
            tracing::debug!(authority = %conn.authority, "pool full");
            return false;
        }
        let per_host = list
            .iter()
            .filter(|c| c.authority == conn.authority)
            .count();
        if per_host >= self.config.max_per_host {
            tracing::debug!(authority = %conn.authority, "per-host cap reached");
            return false;
        }

        conn.last_used = Instant::now();
        list.push(conn);
        true
    }

    /// Remove entries idle past the timeout.
    pub fn cleanup_expired(&self) {
        let mut list = self.lock();
        self.reap_expired(&mut list);
    }

    pub fn total(&self) -> usize {
        self.lock().len()
    }

    pub fn count_for(&self, authority: &str) -> usize {
        self.lock()
            .iter()
            .filter(|c| c.authority == authority)
            .count()
    }

    /// The fd of a pooled connection for `host:port`, for diagnostics;
    /// the connection stays pooled.
    pub fn get_connection_fd(&self, host: &str, port: u16) -> Option<RawFd> {
        let authority = format!("{host}:{port}");
        self.lock()
            .iter()
            .find(|c| c.authority == authority)
            .map(|c| c.io.raw_fd())
    }

    fn reap_expired(&self, list: &mut Vec<PooledConnection>) {
        let now = Instant::now();
        list.retain(|c| {
            let keep = now.duration_since(c.last_used) < self.config.idle_timeout;
            if !keep {
                tracing::debug!(authority = %c.authority, "reaping idle connection");
            }
            keep
        });
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PooledConnection>> {
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}
