//! DNS resolution
//!
//! `getaddrinfo` blocks, so it runs on a small worker pool behind the
//! [`Resolver`] trait; the state machine polls a [`DnsQuery`] and stays
//! non-blocking. Results are cached by `(host, port)` in [`cache::DnsCache`].

pub mod cache;

use std::net::{SocketAddr, ToSocketAddrs};
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

/// Number of resolver worker threads.
const WORKERS: usize = 2;

/// An in-flight resolution. Poll until a result arrives.
pub struct DnsQuery {
    rx: Receiver<Result<Vec<SocketAddr>, String>>,
}

impl DnsQuery {
    /// Non-blocking check; `None` while the lookup is still running.
    pub fn poll(&self) -> Option<Result<Vec<SocketAddr>, String>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(crossbeam_channel::TryRecvError::Empty) => None,
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                Some(Err("resolver worker gone".to_string()))
            }
        }
    }

    /// Immediately-resolved query, used on cache hits.
    pub fn ready(addrs: Vec<SocketAddr>) -> Self {
        let (tx, rx) = bounded(1);
        let _ = tx.send(Ok(addrs));
        Self { rx }
    }
}

/// Host resolution seam. The default implementation is the system
/// resolver; embedders can substitute their own.
pub trait Resolver: Send + Sync {
    fn resolve(&self, host: &str, port: u16) -> DnsQuery;
}

struct Job {
    host: String,
    port: u16,
    reply: Sender<Result<Vec<SocketAddr>, String>>,
}

/// `getaddrinfo` on a fixed worker pool.
pub struct SystemResolver {
    jobs: Sender<Job>,
}

impl SystemResolver {
    pub fn new() -> Self {
        let (jobs, queue) = unbounded::<Job>();
        for i in 0..WORKERS {
            let queue: Receiver<Job> = queue.clone();
            thread::Builder::new()
                .name(format!("veneer-dns-{i}"))
                .spawn(move || {
                    while let Ok(job) = queue.recv() {
                        let result = resolve_blocking(&job.host, job.port);
                        let _ = job.reply.send(result);
                    }
                })
                .expect("spawn dns worker");
        }
        Self { jobs }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str, port: u16) -> DnsQuery {
        let (reply, rx) = bounded(1);
        let job = Job {
            host: host.to_string(),
            port,
            reply,
        };
        if self.jobs.send(job).is_err() {
            // Workers only exit when the resolver is dropped; a send
            // failure here means shutdown raced the lookup.
            let (tx, rx) = bounded(1);
            let _ = tx.send(Err("resolver shut down".to_string()));
            return DnsQuery { rx };
        }
        DnsQuery { rx }
    }
}

fn resolve_blocking(host: &str, port: u16) -> Result<Vec<SocketAddr>, String> {
    match (host, port).to_socket_addrs() {
        Ok(addrs) => {
            let addrs: Vec<SocketAddr> = addrs.collect();
            if addrs.is_empty() {
                Err(format!("no addresses found for {host}"))
            } else {
                Ok(addrs)
            }
        }
        Err(e) => Err(format!("resolution failed for {host}: {e}")),
    }
}
