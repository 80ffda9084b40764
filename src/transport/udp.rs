//! UDP datagram transport.
//!
//! Each call binds an ephemeral socket, sends one datagram and waits for the
//! first datagram coming back from the device's IP. Datagrams from other
//! hosts are ignored for the rest of the window.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, instrument, trace};

use super::{unspecified_for, Transport};
use crate::config::MAX_FRAME_SIZE;
use crate::error::{constants, ProtocolError, Result};
use crate::utils::timeout::with_timeout_error;

#[derive(Debug, Clone, Default)]
pub struct UdpTransport {
    local: Option<SocketAddr>,
}

impl UdpTransport {
    pub fn new(local: Option<SocketAddr>) -> Self {
        Self { local }
    }

    async fn bind(&self, peer: &SocketAddr) -> Result<UdpSocket> {
        let local = self.local.unwrap_or_else(|| unspecified_for(peer));
        UdpSocket::bind(local).await.map_err(|e| {
            ProtocolError::Network(format!("{} {local}: {e}", constants::ERR_SOCKET_BIND))
        })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    #[instrument(skip(self, frame), fields(bytes = frame.len()), level = "debug")]
    async fn send_and_receive(
        &self,
        addr: SocketAddr,
        frame: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let socket = self.bind(&addr).await?;
        socket
            .send_to(frame, addr)
            .await
            .map_err(|e| ProtocolError::Network(format!("send to {addr} failed: {e}")))?;

        with_timeout_error(
            async {
                let mut buf = vec![0u8; MAX_FRAME_SIZE];
                loop {
                    let (len, src) = socket.recv_from(&mut buf).await.map_err(recv_error)?;
                    if src.ip() != addr.ip() {
                        trace!(%src, "Ignoring datagram from unexpected peer");
                        continue;
                    }
                    debug!(%src, len, "Reply received");
                    buf.truncate(len);
                    return Ok(buf);
                }
            },
            timeout,
        )
        .await
    }

    async fn send(&self, addr: SocketAddr, frame: &[u8]) -> Result<()> {
        let socket = self.bind(&addr).await?;
        socket
            .send_to(frame, addr)
            .await
            .map_err(|e| ProtocolError::Network(format!("send to {addr} failed: {e}")))?;
        Ok(())
    }
}

/// ICMP port-unreachable surfaces as `ConnectionRefused` on the next receive.
fn recv_error(e: io::Error) -> ProtocolError {
    match e.kind() {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => {
            ProtocolError::Network(format!("peer unreachable: {e}"))
        }
        _ => ProtocolError::Io(e),
    }
}
