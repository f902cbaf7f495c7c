//! Async request manager
//!
//! Owns any number of request state machines and a readiness poller. The
//! embedder calls `poll` to wait and advance, `process` to collect
//! completion callbacks, `cancel` to abort, `shutdown` to drain. Callers
//! hold opaque ids; machines never leave the manager's store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::client::Client;
use crate::config::ClientConfig;
use crate::error::{self, Error};
use crate::http::{Request, Response};
use crate::io::{ReadinessPoller, ReadySet};
use crate::machine::{Progress, RequestMachine};
use crate::pool::{ConnIo, ConnectionPool, PooledConnection};
use crate::proto::h2::SessionManager;

/// Opaque handle to a submitted request.
pub type RequestId = u64;

/// Completion callback: the id and its finished response.
pub type Callback = Box<dyn FnOnce(RequestId, Response) + Send>;

/// Drain budget for [`AsyncManager::shutdown`].
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(10);
/// Step cadence while draining.
const SHUTDOWN_SLICE: Duration = Duration::from_millis(100);

struct Entry {
    machine: RequestMachine,
    callback: Option<Callback>,
    waiting_on: Option<ReadySet>,
}

/// Non-blocking orchestrator for many concurrent requests.
pub struct AsyncManager {
    client: Arc<Client>,
    pool: Option<Arc<ConnectionPool>>,
    entries: HashMap<RequestId, Entry>,
    next_id: RequestId,
    poller: ReadinessPoller,
    completions_tx: Sender<(RequestId, Response, Option<Callback>)>,
    completions_rx: Receiver<(RequestId, Response, Option<Callback>)>,
}

impl AsyncManager {
    /// A manager with its own client and no shared pool.
    pub fn new() -> Result<Self, Error> {
        Self::with_client(Arc::new(Client::new()?), None)
    }

    /// A manager sharing `client`'s configuration; `pool` enables
    /// connection reuse for HTTP/1.1 requests.
    pub fn with_client(client: Arc<Client>, pool: Option<Arc<ConnectionPool>>) -> Result<Self, Error> {
        let (completions_tx, completions_rx) = unbounded();
        Ok(Self {
            client,
            pool,
            entries: HashMap::new(),
            next_id: 1,
            poller: ReadinessPoller::new()?,
            completions_tx,
            completions_rx,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        self.client.config()
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Submit a request. The machine is created immediately; it first
    /// advances inside the next `poll`.
    pub fn submit(
        &mut self,
        mut request: Request,
        timeout: Option<Duration>,
        callback: Callback,
    ) -> Result<RequestId, Error> {
        if let Some(timeout) = timeout {
            request.set_timeout(timeout);
        }

        let connector = self.client.connector_for(request.browser)?;
        // Reuse pooled HTTP/1.1 transports; multiplexed HTTP/2 entries
        // stay pooled for the synchronous path.
        let reusable = self.pool.as_ref().and_then(|pool| {
            if request.proxy.is_some() {
                return None;
            }
            match pool.get(&request.authority()) {
                Some(conn) if !conn.is_http2() => Some(conn),
                Some(conn) => {
                    pool.put(conn);
                    None
                }
                None => None,
            }
        });

        let machine = match reusable {
            Some(conn) => match conn.io {
                ConnIo::H1(transport) => RequestMachine::with_transport(
                    request,
                    transport,
                    connector,
                    self.client.resolver(),
                    self.client.dns_cache(),
                    self.client.config(),
                ),
                ConnIo::H2(_) => unreachable!("h2 entries are filtered above"),
            },
            None => RequestMachine::new(
                request,
                connector,
                self.client.resolver(),
                self.client.dns_cache(),
                self.client.config(),
            ),
        };

        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            id,
            Entry {
                machine,
                callback: Some(callback),
                waiting_on: None,
            },
        );
        Ok(id)
    }

    /// Wait up to `timeout` for readiness, then advance every runnable
    /// machine. Returns how many requests finished during this call.
    pub fn poll(&mut self, timeout: Duration) -> Result<usize, Error> {
        // First advance anything never stepped or waiting without an fd.
        let runnable: Vec<RequestId> = self
            .entries
            .iter()
            .filter(|(_, e)| {
                e.waiting_on
                    .map(|s| s.fd < 0 || (!s.readable && !s.writable))
                    .unwrap_or(true)
            })
            .map(|(id, _)| *id)
            .collect();
        let mut finished = 0;
        for id in runnable {
            finished += usize::from(self.step_entry(id));
        }

        let sets: Vec<(usize, ReadySet)> = self
            .entries
            .iter()
            .filter_map(|(id, e)| {
                e.waiting_on
                    .filter(|s| s.fd >= 0 && (s.readable || s.writable))
                    .map(|s| (*id as usize, s))
            })
            .collect();
        if sets.is_empty() {
            if finished == 0 && !self.entries.is_empty() {
                std::thread::sleep(timeout.min(Duration::from_millis(2)));
            }
            return Ok(finished);
        }

        let ready = self.poller.wait_many(&sets, timeout)?;
        for key in ready {
            finished += usize::from(self.step_entry(key as RequestId));
        }
        Ok(finished)
    }

    /// Deliver queued completion callbacks. Returns how many ran.
    pub fn process(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok((id, response, callback)) = self.completions_rx.try_recv() {
            if let Some(callback) = callback {
                callback(id, response);
            }
            delivered += 1;
        }
        delivered
    }

    /// Cancel an in-flight request. Its callback fires from the next
    /// `process` with a `Cancelled` response.
    pub fn cancel(&mut self, id: RequestId) -> bool {
        let Some(mut entry) = self.entries.remove(&id) else {
            return false;
        };
        let timings = entry.machine.timings();
        let _ = entry.machine.fail(error::cancelled());
        let response = Response::from_error(&error::cancelled(), timings);
        let _ = self.completions_tx.send((id, response, entry.callback.take()));
        true
    }

    /// Drain in-flight requests for up to ten seconds, stepping at a
    /// 100 ms cadence; whatever remains is forced into `ShuttingDown`.
    pub fn shutdown(&mut self) {
        let deadline = Instant::now() + SHUTDOWN_BUDGET;
        while !self.entries.is_empty() && Instant::now() < deadline {
            let _ = self.poll(SHUTDOWN_SLICE);
            self.process();
        }

        let remaining: Vec<RequestId> = self.entries.keys().copied().collect();
        for id in remaining {
            if let Some(mut entry) = self.entries.remove(&id) {
                let timings = entry.machine.timings();
                let response = Response::from_error(&error::shutting_down(), timings);
                let _ = self
                    .completions_tx
                    .send((id, response, entry.callback.take()));
            }
        }
        self.process();
    }

    /// Advance one machine; true when it finished (successfully or not).
    fn step_entry(&mut self, id: RequestId) -> bool {
        let progress = match self.entries.get_mut(&id) {
            Some(entry) => entry.machine.step(),
            None => return false,
        };
        match progress {
            Progress::Pending(set) => {
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.waiting_on = Some(set);
                }
                false
            }
            Progress::Done(mut response) => {
                let mut entry = self.entries.remove(&id).expect("entry present");
                self.return_connection(&mut entry.machine);
                self.decode(&mut response);
                let _ = self
                    .completions_tx
                    .send((id, *response, entry.callback.take()));
                true
            }
            Progress::Failed(err) => {
                let mut entry = self.entries.remove(&id).expect("entry present");
                let response = Response::from_error(&err, entry.machine.timings());
                let _ = self
                    .completions_tx
                    .send((id, response, entry.callback.take()));
                true
            }
        }
    }

    fn return_connection(&self, machine: &mut RequestMachine) {
        let Some(pool) = self.pool.as_ref() else {
            return;
        };
        if !machine.poolable() {
            return;
        }
        // The machine carries its own authority via the request; pooled
        // return mirrors the synchronous facade.
        if let Some(session) = machine.take_h2_session() {
            if session.is_alive() {
                let authority = machine.authority();
                let preface_sent = session.preface_sent();
                let manager = SessionManager::spawn(session);
                let mut conn = PooledConnection::new(authority, ConnIo::H2(manager));
                conn.preface_sent = preface_sent;
                conn.ja3 = machine.tls_info().ja3.clone();
                conn.tls_version = machine.tls_info().version.clone();
                conn.tls_cipher = machine.tls_info().cipher.clone();
                pool.put(conn);
            }
        } else if let Some(transport) = machine.take_transport() {
            let mut conn = PooledConnection::new(machine.authority(), ConnIo::H1(transport));
            conn.ja3 = machine.tls_info().ja3.clone();
            conn.tls_version = machine.tls_info().version.clone();
            conn.tls_cipher = machine.tls_info().cipher.clone();
            pool.put(conn);
        }
    }

    fn decode(&self, response: &mut Response) {
        let encoding = response.header("content-encoding").map(str::to_owned);
        if let Some(encoding) = encoding {
            if let Ok(decoded) = crate::decode::decode_body(Some(&encoding), &response.body) {
                response.body = decoded;
            }
        }
    }
}

impl Drop for AsyncManager {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for AsyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncManager")
            .field("pending", &self.entries.len())
            .finish()
    }
}
