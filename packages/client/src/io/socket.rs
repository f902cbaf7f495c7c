//! Socket construction
//!
//! Non-blocking connect with the performance options browsers set:
//! TCP_NODELAY, keepalive probing, 64 KiB buffers, and on Linux
//! TCP_QUICKACK plus TCP_FASTOPEN_CONNECT.

use std::io;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};

use crate::error::{self, Error};

const KEEPALIVE_IDLE: Duration = Duration::from_secs(60);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);
const KEEPALIVE_RETRIES: u32 = 3;

/// Outcome of [`connect_begin`].
pub enum ConnectStart {
    /// Connected immediately (loopback commonly does).
    Connected(TcpStream),
    /// In progress; finalize with [`connect_finish`] once writable.
    Pending(Socket),
}

fn apply_options(socket: &Socket, buffer_size: usize) -> io::Result<()> {
    socket.set_nonblocking(true)?;
    socket.set_tcp_nodelay(true)?;
    socket.set_send_buffer_size(buffer_size)?;
    socket.set_recv_buffer_size(buffer_size)?;

    let keepalive = TcpKeepalive::new()
        .with_time(KEEPALIVE_IDLE)
        .with_interval(KEEPALIVE_INTERVAL)
        .with_retries(KEEPALIVE_RETRIES);
    socket.set_tcp_keepalive(&keepalive)?;

    #[cfg(target_os = "linux")]
    {
        use std::os::fd::AsRawFd;

        if let Err(e) = socket.set_tcp_quickack(true) {
            tracing::debug!("TCP_QUICKACK unavailable: {e}");
        }
        // TCP_FASTOPEN_CONNECT lets the SYN carry data on repeat
        // connects; harmless to lose on older kernels.
        let one: libc::c_int = 1;
        let rc = unsafe {
            libc::setsockopt(
                socket.as_raw_fd(),
                libc::IPPROTO_TCP,
                libc::TCP_FASTOPEN_CONNECT,
                std::ptr::addr_of!(one).cast(),
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            tracing::debug!(
                "TCP_FASTOPEN_CONNECT unavailable: {}",
                io::Error::last_os_error()
            );
        }
    }

    Ok(())
}

/// Create a non-blocking socket and issue `connect`.
pub fn connect_begin(addr: SocketAddr, buffer_size: usize) -> Result<ConnectStart, Error> {
    let domain = Domain::for_address(addr);
    let socket =
        Socket::new(domain, Type::STREAM, Some(Protocol::TCP)).map_err(error::network)?;
    apply_options(&socket, buffer_size).map_err(error::network)?;

    match socket.connect(&addr.into()) {
        Ok(()) => Ok(ConnectStart::Connected(socket.into())),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(ConnectStart::Pending(socket)),
        Err(e) if e.raw_os_error() == Some(libc_einprogress()) => {
            Ok(ConnectStart::Pending(socket))
        }
        Err(e) => Err(error::network(e)),
    }
}

fn libc_einprogress() -> i32 {
    libc::EINPROGRESS
}

/// Finalize a pending connect after the socket reported writable. Reads
/// `SO_ERROR` to distinguish success from a deferred refusal.
pub fn connect_finish(socket: Socket) -> Result<TcpStream, Error> {
    match socket.take_error() {
        Ok(None) => Ok(socket.into()),
        Ok(Some(e)) => Err(error::network(e)),
        Err(e) => Err(error::network(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::os::fd::AsRawFd;

    #[test]
    fn test_connect_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");

        let stream = match connect_begin(addr, 64 * 1024).expect("begin") {
            ConnectStart::Connected(stream) => stream,
            ConnectStart::Pending(socket) => {
                // Loopback completes promptly; poll writability briefly.
                let mut poller = crate::io::ReadinessPoller::new().expect("poller");
                let set = crate::io::ReadySet::writable(socket.as_raw_fd());
                use crate::io::Readiness;
                assert!(poller.wait(set, Duration::from_secs(5)).expect("wait"));
                connect_finish(socket).expect("finish")
            }
        };
        assert!(stream.peer_addr().is_ok());
    }

    #[test]
    fn test_connected_socket_is_nonblocking() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let stream = match connect_begin(addr, 64 * 1024).expect("begin") {
            ConnectStart::Connected(stream) => stream,
            ConnectStart::Pending(socket) => {
                std::thread::sleep(Duration::from_millis(50));
                connect_finish(socket).expect("finish")
            }
        };
        let mut buf = [0u8; 1];
        use std::io::Read;
        let err = (&stream).read(&mut buf).expect_err("no data queued");
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        drop(listener);
    }
}
