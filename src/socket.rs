//! Async UDP transport boundary.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` carrying raw
//! frame buffers.  All protocol logic (encoding, checksums, windowing) lives
//! elsewhere; this module owns only byte I/O and readiness.
//!
//! The sender connects its socket to the single peer and drives it through
//! the non-blocking `try_*` calls paired with `readable`/`writable`
//! readiness, so its event loop can also service the retransmission timer.
//! The receiver stays unconnected and replies to whichever address each
//! datagram came from.

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

/// An async, datagram-oriented UDP socket.
///
/// All methods are `&self`; readiness and non-blocking calls never require
/// exclusive access.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (resolved after the OS assigns an
    /// ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing port 0 lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Restrict the socket to a single peer; `try_send`/`try_recv` then
    /// talk to exactly that address.
    pub async fn connect(&self, peer: SocketAddr) -> io::Result<()> {
        self.inner.connect(peer).await
    }

    /// Wait until the socket is ready to read.
    pub async fn readable(&self) -> io::Result<()> {
        self.inner.readable().await
    }

    /// Wait until the socket is ready to write.
    pub async fn writable(&self) -> io::Result<()> {
        self.inner.writable().await
    }

    /// Non-blocking send to the connected peer.
    ///
    /// A `WouldBlock` error is transient, not a failure — the caller retries
    /// after the next `writable` readiness.
    pub fn try_send(&self, buf: &[u8]) -> io::Result<usize> {
        self.inner.try_send(buf)
    }

    /// Non-blocking receive from the connected peer.
    pub fn try_recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.try_recv(buf)
    }

    /// Blocking receive of the next datagram from any source.
    pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }

    /// Blocking send of one datagram to `dest`.
    pub async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<usize> {
        self.inner.send_to(buf, dest).await
    }
}
