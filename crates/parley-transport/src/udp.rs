//! The datagram link: a UDP socket plus dynamic peer-port discovery.
//!
//! The server answers from a freshly allocated port, not the one the
//! client was configured with. The first inbound datagram whose source
//! port differs from the configured one fixes the destination for the
//! rest of the session; every later send targets that port.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Mutex;

use tokio::net::UdpSocket;

use crate::TransportError;

/// Largest datagram the receiver will accept. Comfortably above the
/// biggest legal frame (MSG header + 20-char name + 1400-char content).
const MAX_DATAGRAM: usize = 4096;

/// A bound UDP socket addressed at one server.
///
/// Send and receive take `&self`, so the inbound loop and any number
/// of confirmed-send tasks can share one link behind an `Arc`. Only
/// the peer address is mutable, guarded by its own lock.
pub struct DatagramLink {
    socket: UdpSocket,
    peer: Mutex<PeerAddress>,
}

/// The server's address: fixed host, configured port until the dynamic
/// port is learned.
#[derive(Debug, Clone, Copy)]
struct PeerAddress {
    current: SocketAddr,
    configured_port: u16,
    learned: bool,
}

impl DatagramLink {
    /// Binds an ephemeral local socket of the same address family as
    /// `server`.
    pub async fn bind(server: SocketAddr) -> Result<Self, TransportError> {
        let local: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(TransportError::ConnectFailed)?;
        tracing::debug!(%server, "datagram link bound");
        Ok(Self {
            socket,
            peer: Mutex::new(PeerAddress {
                current: server,
                configured_port: server.port(),
                learned: false,
            }),
        })
    }

    /// Sends one frame to the current peer address.
    pub async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let target = self.peer();
        self.socket
            .send_to(frame, target)
            .await
            .map_err(TransportError::SendFailed)?;
        Ok(())
    }

    /// Receives one datagram; returns its bytes and source address.
    pub async fn recv(&self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (len, src) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        buf.truncate(len);
        Ok((buf, src))
    }

    /// Adopts `src` as the fixed peer if the dynamic port has not been
    /// learned yet and `src` differs from the configured port.
    ///
    /// Returns `true` when the peer address changed.
    pub fn learn_peer(&self, src: SocketAddr) -> bool {
        let mut peer = self.peer.lock().expect("peer lock poisoned");
        if !peer.learned && src.port() != peer.configured_port {
            tracing::debug!(
                configured = peer.configured_port,
                dynamic = src.port(),
                "adopted dynamic server port"
            );
            peer.current = src;
            peer.learned = true;
            return true;
        }
        false
    }

    /// The address sends currently target.
    pub fn peer(&self) -> SocketAddr {
        self.peer.lock().expect("peer lock poisoned").current
    }

    /// Whether any dynamic port was ever adopted — i.e. whether the
    /// server has spoken to us at all.
    pub fn peer_learned(&self) -> bool {
        self.peer.lock().expect("peer lock poisoned").learned
    }

    /// Local address, for tests.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket
            .local_addr()
            .map_err(TransportError::ConnectFailed)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[tokio::test]
    async fn learns_the_first_differing_source_port_once() {
        let link = DatagramLink::bind(addr(4567)).await.unwrap();
        assert!(!link.peer_learned());

        // Same port as configured: nothing to learn.
        assert!(!link.learn_peer(addr(4567)));
        assert_eq!(link.peer(), addr(4567));

        // First differing port is adopted...
        assert!(link.learn_peer(addr(50001)));
        assert_eq!(link.peer(), addr(50001));
        assert!(link.peer_learned());

        // ...and stays fixed for the rest of the session.
        assert!(!link.learn_peer(addr(50002)));
        assert_eq!(link.peer(), addr(50001));
    }

    #[tokio::test]
    async fn sends_go_to_the_learned_port() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();

        // Configure the link at some port nobody answers from, then
        // pretend the server's first datagram arrived from its real
        // (dynamic) port.
        let link = DatagramLink::bind(addr(4567)).await.unwrap();
        link.learn_peer(server_addr);

        link.send(b"ping").await.unwrap();
        let mut buf = [0u8; 16];
        let (n, src) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(src, link.local_addr().unwrap());
    }

    #[tokio::test]
    async fn recv_reports_bytes_and_source() {
        let link = DatagramLink::bind(addr(4567)).await.unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(b"\x00\x00\x07", link.local_addr().unwrap())
            .await
            .unwrap();

        let (bytes, src) = link.recv().await.unwrap();
        assert_eq!(bytes, vec![0x00, 0x00, 0x07]);
        assert_eq!(src, sender.local_addr().unwrap());
    }
}
