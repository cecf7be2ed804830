//! Datagram I/O beneath the [`Channel`](crate::channel::Channel).
//!
//! The engines need very little from the network: send one datagram to an
//! address, receive one datagram along with who sent it. Datagrams may be
//! lost, duplicated or reordered; the ARQ layer copes with all three. What a
//! transport must preserve is message boundaries.
//!
//! Two implementations ship with the crate:
//!
//! - [`UdpTransport`] over `tokio::net::UdpSocket` (feature `udp`, default)
//! - [`MemoryTransport`], a connected in-process pair for tests and benches

use std::fmt::{self, Debug, Display};
use std::future::Future;
use std::hash::Hash;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

/// Peer identity as seen by a [`Transport`].
///
/// Senders compare it against the source of every inbound ACK and receivers
/// reply to it, so it must be cheap to clone, comparable and printable in
/// log fields. Blanket-implemented for every type with those bounds.
pub trait Addr: Clone + Eq + Hash + Send + Sync + Debug + Display + 'static {}

impl<A> Addr for A where A: Clone + Eq + Hash + Send + Sync + Debug + Display + 'static {}

/// Unreliable, boundary-preserving datagram I/O.
pub trait Transport: Send + Sync + 'static {
    type Addr: Addr;

    /// Transmit one datagram. Success means handed to the network, not
    /// delivered.
    fn send_to<'a>(
        &'a self,
        buf: &'a [u8],
        target: &'a Self::Addr,
    ) -> impl Future<Output = io::Result<usize>> + Send + 'a;

    /// Wait for the next datagram. A datagram longer than `buf` is truncated.
    fn recv_from<'a>(
        &'a self,
        buf: &'a mut [u8],
    ) -> impl Future<Output = io::Result<(usize, Self::Addr)>> + Send + 'a;

    fn local_addr(&self) -> io::Result<Self::Addr>;
}

// ── UdpTransport ────────────────────────────────────────────────────────

#[cfg(feature = "udp")]
pub use udp::UdpTransport;

#[cfg(feature = "udp")]
mod udp {
    use super::Transport;
    use std::io;
    use std::net::SocketAddr;
    use tokio::net::{ToSocketAddrs, UdpSocket};

    /// [`Transport`] over an unconnected UDP socket. One socket serves both
    /// directions of a request/reply exchange.
    pub struct UdpTransport {
        socket: UdpSocket,
    }

    impl UdpTransport {
        pub async fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
            UdpSocket::bind(addr).await.map(Self::from)
        }

        pub fn socket(&self) -> &UdpSocket {
            &self.socket
        }
    }

    impl From<UdpSocket> for UdpTransport {
        fn from(socket: UdpSocket) -> Self {
            Self { socket }
        }
    }

    impl Transport for UdpTransport {
        type Addr = SocketAddr;

        async fn send_to(&self, buf: &[u8], target: &SocketAddr) -> io::Result<usize> {
            self.socket.send_to(buf, target).await
        }

        async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            self.socket.recv_from(buf).await
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            self.socket.local_addr()
        }
    }
}

// ── MemoryTransport ─────────────────────────────────────────────────────

/// Address of one side of a [`MemoryTransport`] pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryAddr(pub u32);

impl Display for MemoryAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mem:{}", self.0)
    }
}

type Datagram = (Vec<u8>, MemoryAddr);

/// One end of an in-process, lossless, ordered datagram link.
///
/// Datagrams sent to any address arrive at the peer. [`close`](Self::close)
/// shuts the link down from this end: pending and future receives here fail
/// with `NotConnected`, sends from here fail with `NotConnected`, and sends
/// from the peer fail with `BrokenPipe`.
pub struct MemoryTransport {
    local: MemoryAddr,
    tx: Mutex<Option<mpsc::UnboundedSender<Datagram>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
    closed: Notify,
    is_closed: Arc<AtomicBool>,
    peer_closed: Arc<AtomicBool>,
}

impl MemoryTransport {
    /// Create two connected ends, addressed `mem:0` and `mem:1`.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = mpsc::unbounded_channel();
        let (tx_b, rx_a) = mpsc::unbounded_channel();
        let a_closed = Arc::new(AtomicBool::new(false));
        let b_closed = Arc::new(AtomicBool::new(false));
        (
            Self::new(MemoryAddr(0), tx_a, rx_a, a_closed.clone(), b_closed.clone()),
            Self::new(MemoryAddr(1), tx_b, rx_b, b_closed, a_closed),
        )
    }

    fn new(
        local: MemoryAddr,
        tx: mpsc::UnboundedSender<Datagram>,
        rx: mpsc::UnboundedReceiver<Datagram>,
        is_closed: Arc<AtomicBool>,
        peer_closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            local,
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            closed: Notify::new(),
            is_closed,
            peer_closed,
        }
    }

    /// Close this end of the link.
    pub fn close(&self) {
        self.is_closed.store(true, Ordering::SeqCst);
        self.tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        self.closed.notify_waiters();
    }

    fn closed_error() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "memory transport closed")
    }

    fn peer_gone() -> io::Error {
        io::Error::new(io::ErrorKind::BrokenPipe, "memory peer closed")
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.is_closed.load(Ordering::SeqCst) {
            Err(Self::closed_error())
        } else {
            Ok(())
        }
    }
}

impl Transport for MemoryTransport {
    type Addr = MemoryAddr;

    async fn send_to(&self, buf: &[u8], _target: &MemoryAddr) -> io::Result<usize> {
        self.ensure_open()?;
        if self.peer_closed.load(Ordering::SeqCst) {
            return Err(Self::peer_gone());
        }
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or_else(Self::closed_error)?;
        tx.send((buf.to_vec(), self.local))
            .map_err(|_| Self::peer_gone())?;
        Ok(buf.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, MemoryAddr)> {
        self.ensure_open()?;
        let closed = self.closed.notified();
        tokio::pin!(closed);
        closed.as_mut().enable();
        self.ensure_open()?;

        let mut rx = self.rx.lock().await;
        let datagram = tokio::select! {
            datagram = rx.recv() => datagram,
            _ = &mut closed => return Err(Self::closed_error()),
        };
        let (data, from) = datagram.ok_or_else(|| {
            io::Error::new(io::ErrorKind::ConnectionReset, "memory peer closed")
        })?;

        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok((n, from))
    }

    fn local_addr(&self) -> io::Result<MemoryAddr> {
        Ok(self.local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_pair_delivers_to_peer() {
        let (a, b) = MemoryTransport::pair();
        let b_addr = b.local_addr().unwrap();
        a.send_to(b"ping", &b_addr).await.unwrap();

        let mut buf = [0u8; 16];
        let (n, from) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(from, a.local_addr().unwrap());
        assert_eq!(from.to_string(), "mem:0");
    }

    #[tokio::test]
    async fn oversized_datagram_is_truncated() {
        let (a, b) = MemoryTransport::pair();
        a.send_to(b"0123456789", &MemoryAddr(1)).await.unwrap();

        let mut buf = [0u8; 4];
        let (n, _) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"0123");
    }

    #[tokio::test]
    async fn close_fails_pending_receive() {
        let (a, _b) = MemoryTransport::pair();
        let a = Arc::new(a);
        let reader = {
            let a = a.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 16];
                a.recv_from(&mut buf).await
            })
        };
        tokio::task::yield_now().await;
        a.close();

        let err = reader.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        let err = a.send_to(b"x", &MemoryAddr(1)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn close_refuses_peer_sends() {
        let (a, b) = MemoryTransport::pair();
        b.close();
        let err = a.send_to(b"x", &MemoryAddr(1)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn dropped_peer_fails_send() {
        let (a, b) = MemoryTransport::pair();
        drop(b);
        let err = a.send_to(b"x", &MemoryAddr(1)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
