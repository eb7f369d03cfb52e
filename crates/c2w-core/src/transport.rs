//! Datagram transport abstraction.
//!
//! The messenger engine is generic over `DatagramTransport` rather than
//! hard-wired to `tokio::net::UdpSocket` so tests can swap in a recording
//! double, and so packet-loss simulation can be layered on as a decorator
//! instead of baked into the real socket type.

use rand::Rng;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;

/// Send/receive of opaque byte buffers to/from address tuples. The
/// transport may arbitrarily drop, duplicate, or reorder datagrams; the
/// messenger is built to tolerate all three.
pub trait DatagramTransport: Send + Sync {
    /// Best-effort send. Implementations may silently drop.
    async fn send_to(&self, datagram: &[u8], peer: SocketAddr) -> io::Result<()>;

    /// Blocks until a datagram arrives, writing it into `buf` and
    /// returning its length and source address.
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

/// The real transport: a bound UDP socket.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramTransport for UdpTransport {
    async fn send_to(&self, datagram: &[u8], peer: SocketAddr) -> io::Result<()> {
        self.socket.send_to(datagram, peer).await?;
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}

/// Wraps another transport and drops a fraction of outbound datagrams,
/// simulating the lossy link the spec requires the messenger to tolerate.
/// Inbound datagrams are passed through untouched: loss is a property of
/// the wire between two peers, and we only control our own sends.
pub struct LossyTransport<T: DatagramTransport> {
    inner: T,
    drop_probability: f64,
}

impl<T: DatagramTransport> LossyTransport<T> {
    pub fn new(inner: T, drop_probability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&drop_probability),
            "drop_probability must be in [0.0, 1.0], got {drop_probability}"
        );
        Self { inner, drop_probability }
    }
}

impl<T: DatagramTransport> DatagramTransport for LossyTransport<T> {
    async fn send_to(&self, datagram: &[u8], peer: SocketAddr) -> io::Result<()> {
        if self.drop_probability > 0.0 && rand::thread_rng().gen_bool(self.drop_probability) {
            tracing::trace!(%peer, "simulated packet loss, dropping outbound datagram");
            return Ok(());
        }
        self.inner.send_to(datagram, peer).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }
}

/// A transport double for unit tests: records every outbound datagram and
/// serves inbound datagrams from a preloaded queue.
pub struct RecordingTransport {
    sent: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
    inbound: Mutex<std::collections::VecDeque<(Vec<u8>, SocketAddr)>>,
    inbound_ready: tokio::sync::Notify,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            inbound: Mutex::new(std::collections::VecDeque::new()),
            inbound_ready: tokio::sync::Notify::new(),
        }
    }

    /// Queues a datagram to be returned by a future `recv_from` call.
    pub fn push_inbound(&self, datagram: Vec<u8>, source: SocketAddr) {
        self.inbound.lock().unwrap().push_back((datagram, source));
        self.inbound_ready.notify_one();
    }

    /// Returns every datagram sent so far, in send order.
    pub fn sent(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramTransport for RecordingTransport {
    async fn send_to(&self, datagram: &[u8], peer: SocketAddr) -> io::Result<()> {
        self.sent.lock().unwrap().push((peer, datagram.to_vec()));
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        loop {
            if let Some((datagram, source)) = self.inbound.lock().unwrap().pop_front() {
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                return Ok((len, source));
            }
            self.inbound_ready.notified().await;
        }
    }
}

/// Lets an `Arc<T>` stand in for `T` as a transport, so the same socket
/// can be shared between the messenger's outbound writes and a dedicated
/// inbound read loop without a lock around the whole transport.
impl<T: DatagramTransport + ?Sized> DatagramTransport for Arc<T> {
    async fn send_to(&self, datagram: &[u8], peer: SocketAddr) -> io::Result<()> {
        (**self).send_to(datagram, peer).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        (**self).recv_from(buf).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_transport_replays_queued_datagrams() {
        let transport = RecordingTransport::new();
        let source: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        transport.push_inbound(vec![1, 2, 3, 4], source);

        let mut buf = [0u8; 16];
        let (len, got_source) = transport.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[1, 2, 3, 4]);
        assert_eq!(got_source, source);
    }

    #[tokio::test]
    async fn recording_transport_records_sends() {
        let transport = RecordingTransport::new();
        let peer: SocketAddr = "127.0.0.1:9002".parse().unwrap();
        transport.send_to(&[9, 9], peer).await.unwrap();
        assert_eq!(transport.sent(), vec![(peer, vec![9, 9])]);
    }

    #[tokio::test]
    async fn lossy_transport_drops_everything_at_probability_one() {
        let inner = RecordingTransport::new();
        let lossy = LossyTransport::new(inner, 1.0);
        let peer: SocketAddr = "127.0.0.1:9003".parse().unwrap();
        lossy.send_to(&[1], peer).await.unwrap();
        assert!(lossy.inner.sent().is_empty());
    }

    #[tokio::test]
    async fn lossy_transport_passes_everything_at_probability_zero() {
        let inner = RecordingTransport::new();
        let lossy = LossyTransport::new(inner, 0.0);
        let peer: SocketAddr = "127.0.0.1:9004".parse().unwrap();
        lossy.send_to(&[1], peer).await.unwrap();
        assert_eq!(lossy.inner.sent().len(), 1);
    }
}
