//! Readiness abstraction
//!
//! The engine never blocks on a socket itself; it reports which fd it needs
//! readable or writable and the embedder waits. [`ReadinessPoller`] is the
//! default embedder, a thin wrapper over the portable
//! epoll / kqueue / IOCP poller.

use std::os::fd::{BorrowedFd, RawFd};
use std::time::Duration;

use polling::{Event, Events, Poller};

use crate::error::{self, Error};

/// What a suspended request needs before it can make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadySet {
    pub fd: RawFd,
    pub readable: bool,
    pub writable: bool,
}

impl ReadySet {
    pub fn readable(fd: RawFd) -> Self {
        Self {
            fd,
            readable: true,
            writable: false,
        }
    }

    pub fn writable(fd: RawFd) -> Self {
        Self {
            fd,
            readable: false,
            writable: true,
        }
    }
}

/// The seam an embedder implements to integrate its own reactor. Returns
/// `Ok(true)` when the fd became ready, `Ok(false)` on timeout.
pub trait Readiness {
    fn wait(&mut self, set: ReadySet, timeout: Duration) -> Result<bool, Error>;
}

/// Default readiness source backed by the system poller.
pub struct ReadinessPoller {
    poller: Poller,
    events: Events,
}

impl ReadinessPoller {
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            poller: Poller::new().map_err(error::network)?,
            events: Events::new(),
        })
    }

    fn event_for(set: ReadySet, key: usize) -> Event {
        match (set.readable, set.writable) {
            (true, true) => Event::all(key),
            (true, false) => Event::readable(key),
            (false, true) => Event::writable(key),
            (false, false) => Event::none(key),
        }
    }

    /// Wait for several fds at once; returns the keys that became ready.
    /// Registration is per-call (one-shot), which keeps the poller free of
    /// stale interest between rounds.
    pub fn wait_many(
        &mut self,
        sets: &[(usize, ReadySet)],
        timeout: Duration,
    ) -> Result<Vec<usize>, Error> {
        for (key, set) in sets {
            // SAFETY: the fd outlives this call; it is deleted below
            // before the owning socket can be dropped by the caller.
            unsafe {
                self.poller
                    .add(set.fd, Self::event_for(*set, *key))
                    .map_err(error::network)?;
            }
        }

        self.events.clear();
        let wait_result = self.poller.wait(&mut self.events, Some(timeout));

        for (_, set) in sets {
            // SAFETY: same fd registered above; still open here.
            let borrowed = unsafe { BorrowedFd::borrow_raw(set.fd) };
            let _ = self.poller.delete(borrowed);
        }
        wait_result.map_err(error::network)?;

        Ok(self.events.iter().map(|e| e.key).collect())
    }
}

impl Readiness for ReadinessPoller {
    fn wait(&mut self, set: ReadySet, timeout: Duration) -> Result<bool, Error> {
        let ready = self.wait_many(&[(0, set)], timeout)?;
        Ok(!ready.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::os::fd::AsRawFd;

    #[test]
    fn test_wait_times_out_on_idle_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let client = TcpStream::connect(listener.local_addr().expect("addr")).expect("connect");
        let (_server, _) = listener.accept().expect("accept");

        let mut poller = ReadinessPoller::new().expect("poller");
        let ready = poller
            .wait(
                ReadySet::readable(client.as_raw_fd()),
                Duration::from_millis(20),
            )
            .expect("wait");
        assert!(!ready);
    }

    #[test]
    fn test_wait_sees_incoming_data() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let client = TcpStream::connect(listener.local_addr().expect("addr")).expect("connect");
        let (mut server, _) = listener.accept().expect("accept");
        server.write_all(b"x").expect("write");

        let mut poller = ReadinessPoller::new().expect("poller");
        let ready = poller
            .wait(
                ReadySet::readable(client.as_raw_fd()),
                Duration::from_secs(5),
            )
            .expect("wait");
        assert!(ready);
    }

    #[test]
    fn test_wait_many_reports_keys() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let client = TcpStream::connect(listener.local_addr().expect("addr")).expect("connect");
        let (mut server, _) = listener.accept().expect("accept");
        server.write_all(b"x").expect("write");

        let mut poller = ReadinessPoller::new().expect("poller");
        let ready = poller
            .wait_many(
                &[(7, ReadySet::readable(client.as_raw_fd()))],
                Duration::from_secs(5),
            )
            .expect("wait");
        assert_eq!(ready, vec![7]);
    }
}
