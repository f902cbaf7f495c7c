//! Concurrent HTTP/2 session manager
//!
//! Owns the session's I/O thread. Application threads submit streams and
//! block on per-stream condition variables; the I/O thread pumps the
//! session under its mutex and signals completions after releasing it.
//! Lock order: the session mutex is never held while a stream mutex is
//! taken.

use std::collections::HashMap;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::session::{H2RequestHead, H2Session, StreamState};
use crate::error::{self, Error};
use crate::io::{Readiness, ReadinessPoller, ReadySet};

/// Readiness wait bound inside the I/O loop.
const IO_WAIT: Duration = Duration::from_millis(10);
/// Idle backoff when the socket has nothing for us.
const IDLE_SLEEP: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
struct PendingState {
    completed: bool,
    has_error: bool,
    result: Option<StreamState>,
}

/// One pending stream: its own mutex and condvar, signalled exactly once.
#[derive(Debug, Default)]
struct PendingStream {
    state: Mutex<PendingState>,
    cond: Condvar,
}

impl PendingStream {
    /// Deliver the completion; returns false if it was already delivered.
    fn complete(&self, result: Option<StreamState>, has_error: bool) -> bool {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.completed {
            return false;
        }
        state.completed = true;
        state.has_error = has_error;
        state.result = result;
        self.cond.notify_all();
        true
    }
}

/// Stream statistics, monotonic over the manager's life.
#[derive(Debug, Default)]
pub struct ManagerStats {
    pub streams_submitted: AtomicU64,
    pub streams_completed: AtomicU64,
}

struct Shared {
    session: Mutex<H2Session>,
    pending: Mutex<HashMap<u32, Arc<PendingStream>>>,
    shutdown: AtomicBool,
    stats: ManagerStats,
    fd: RawFd,
}

impl Shared {
    fn lock_session(&self) -> MutexGuard<'_, H2Session> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<u32, Arc<PendingStream>>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark every still-pending stream completed-with-error and signal it.
    fn fail_pending(&self, reason: &str) {
        let entries: Vec<Arc<PendingStream>> = self.lock_pending().values().cloned().collect();
        for entry in entries {
            let failed = StreamState::failed(reason);
            if entry.complete(Some(failed), true) {
                self.stats.streams_completed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn io_loop(&self) {
        let mut poller = match ReadinessPoller::new() {
            Ok(poller) => poller,
            Err(e) => {
                tracing::error!("h2 io thread could not create poller: {e}");
                self.fail_pending("readiness poller unavailable");
                return;
            }
        };

        loop {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }

            // Send under the session mutex, then release it before
            // waiting on the socket.
            let healthy = {
                let mut session = self.lock_session();
                session.pump_writes().is_ok()
                    && (session.is_alive() || session.open_stream_count() > 0)
            };
            if !healthy {
                self.fail_pending("session failed");
                break;
            }

            let ready = poller
                .wait(ReadySet::readable(self.fd), IO_WAIT)
                .unwrap_or(false);

            let completed = {
                let mut session = self.lock_session();
                if ready {
                    if let Err(e) = session.pump_reads() {
                        drop(session);
                        self.fail_pending(&e.message());
                        break;
                    }
                } else {
                    thread::sleep(IDLE_SLEEP);
                }
                let mut done = Vec::new();
                for stream_id in session.completed_streams() {
                    if let Some(stream) = session.take_stream(stream_id) {
                        done.push(stream);
                    }
                }
                done
            };

            // Session mutex released; now take per-stream locks to signal.
            for stream in completed {
                let entry = self.lock_pending().get(&stream.stream_id).cloned();
                if let Some(entry) = entry {
                    let has_error = stream.error.is_some();
                    if entry.complete(Some(stream), has_error) {
                        self.stats.streams_completed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
    }
}

/// Drives one HTTP/2 session for any number of application threads.
pub struct SessionManager {
    shared: Arc<Shared>,
    io_thread: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// Take ownership of an established session and spawn the I/O thread.
    pub fn spawn(session: H2Session) -> Arc<Self> {
        let fd = session.raw_fd();
        let shared = Arc::new(Shared {
            session: Mutex::new(session),
            pending: Mutex::new(HashMap::new()),
            shutdown: AtomicBool::new(false),
            stats: ManagerStats::default(),
            fd,
        });

        let io_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("veneer-h2-io".to_string())
            .spawn(move || io_shared.io_loop())
            .expect("spawn h2 io thread");

        Arc::new(Self {
            shared,
            io_thread: Mutex::new(Some(handle)),
        })
    }

    /// The socket fd, for diagnostics.
    pub fn raw_fd(&self) -> RawFd {
        self.shared.fd
    }

    pub fn is_alive(&self) -> bool {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return false;
        }
        self.shared.lock_session().is_alive()
    }

    pub fn streams_submitted(&self) -> u64 {
        self.shared.stats.streams_submitted.load(Ordering::Relaxed)
    }

    pub fn streams_completed(&self) -> u64 {
        self.shared.stats.streams_completed.load(Ordering::Relaxed)
    }

    /// Submit a stream and return its id. The stream's completion is later
    /// collected with [`wait_for_stream`].
    ///
    /// [`wait_for_stream`]: SessionManager::wait_for_stream
    pub fn submit_stream(&self, head: &H2RequestHead) -> Result<u32, Error> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(error::protocol("session manager shut down"));
        }
        let stream_id = {
            let mut session = self.shared.lock_session();
            session.submit(head)?
        };
        self.shared
            .lock_pending()
            .insert(stream_id, Arc::new(PendingStream::default()));
        self.shared
            .stats
            .streams_submitted
            .fetch_add(1, Ordering::Relaxed);
        Ok(stream_id)
    }

    /// Block until the stream completes or `timeout` elapses. On timeout
    /// the pending record stays registered so a late completion is
    /// absorbed; drop it with [`remove_stream`].
    ///
    /// [`remove_stream`]: SessionManager::remove_stream
    pub fn wait_for_stream(&self, stream_id: u32, timeout: Duration) -> Result<StreamState, Error> {
        let entry = self
            .shared
            .lock_pending()
            .get(&stream_id)
            .cloned()
            .ok_or_else(|| error::protocol(format!("unknown stream {stream_id}")))?;

        // Spurious wakeups re-enter the loop, so the wait is bounded by a
        // deadline rather than re-arming the full timeout each pass.
        let deadline = Instant::now() + timeout;
        let mut state = entry
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        while !state.completed {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(error::timeout());
            }
            let (next, wait) = entry
                .cond
                .wait_timeout(state, remaining)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state = next;
            if wait.timed_out() && !state.completed {
                return Err(error::timeout());
            }
        }

        if state.has_error {
            let message = state
                .result
                .as_ref()
                .and_then(|s| s.error.clone())
                .unwrap_or_else(|| "stream failed".to_string());
            return Err(error::protocol(message));
        }
        state
            .result
            .take()
            .ok_or_else(|| error::protocol("stream result already taken"))
    }

    /// Drop a stream's pending record. Double-remove is a no-op.
    pub fn remove_stream(&self, stream_id: u32) {
        self.shared.lock_pending().remove(&stream_id);
    }

    /// Stop the I/O thread and fail whatever is still pending.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        {
            let mut session = self.shared.lock_session();
            session.queue_goaway();
            let _ = session.pump_writes();
        }
        if let Some(handle) = self
            .io_thread
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            let _ = handle.join();
        }
        self.shared.fail_pending("session manager shut down");
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("submitted", &self.streams_submitted())
            .field("completed", &self.streams_completed())
            .finish()
    }
}
