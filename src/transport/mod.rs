//! # Transport Layer
//!
//! Moves opaque frames between this host and a device. A transport knows
//! nothing about packet contents: it sends exactly one frame and waits for
//! exactly one reply from the same peer, without retrying.
//!
//! ## Implementations
//! - [`udp::UdpTransport`]: one datagram out, one datagram back (default)
//! - [`tcp::TcpTransport`]: length-prefixed frames over a short-lived TCP
//!   connection, for gateways that tunnel the protocol over streams
//!
//! ## Failure modes
//! - `ProtocolError::Timeout`: nothing arrived in time; safe to retry
//! - `ProtocolError::Network`: the send failed or the peer is unreachable

use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;

use crate::config::TransportKind;
use crate::error::Result;

pub mod tcp;
pub mod udp;

pub use tcp::TcpTransport;
pub use udp::UdpTransport;

/// Request/response frame exchange with a single peer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `frame` to `addr` and return the first reply from that peer.
    async fn send_and_receive(
        &self,
        addr: SocketAddr,
        frame: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>>;

    /// Send `frame` to `addr` without waiting for a reply.
    async fn send(&self, addr: SocketAddr, frame: &[u8]) -> Result<()>;
}

/// Build the transport selected in configuration.
pub fn from_kind(kind: TransportKind, local: Option<SocketAddr>) -> Box<dyn Transport> {
    match kind {
        TransportKind::Udp => Box::new(UdpTransport::new(local)),
        TransportKind::Tcp => Box::new(TcpTransport::new(local)),
    }
}

/// Unspecified local address matching the family of `peer`.
pub(crate) fn unspecified_for(peer: &SocketAddr) -> SocketAddr {
    match peer {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    }
}
