//! TCP fallback transport.
//!
//! Opens a connection per call, writes one length-prefixed frame with
//! [`FrameCodec`] and reads one frame back.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpSocket, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, instrument};

use super::Transport;
use crate::core::codec::FrameCodec;
use crate::error::{constants, ProtocolError, Result};
use crate::utils::timeout::with_timeout_error;

#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    local: Option<SocketAddr>,
}

impl TcpTransport {
    pub fn new(local: Option<SocketAddr>) -> Self {
        Self { local }
    }

    async fn connect(&self, addr: SocketAddr) -> Result<Framed<TcpStream, FrameCodec>> {
        let stream = match self.local {
            Some(local) => {
                let socket = if addr.is_ipv4() {
                    TcpSocket::new_v4()?
                } else {
                    TcpSocket::new_v6()?
                };
                socket.bind(local).map_err(|e| {
                    ProtocolError::Network(format!("{} {local}: {e}", constants::ERR_SOCKET_BIND))
                })?;
                socket.connect(addr).await
            }
            None => TcpStream::connect(addr).await,
        }
        .map_err(|e| ProtocolError::Network(format!("connect to {addr} failed: {e}")))?;

        Ok(Framed::new(stream, FrameCodec))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    #[instrument(skip(self, frame), fields(bytes = frame.len()), level = "debug")]
    async fn send_and_receive(
        &self,
        addr: SocketAddr,
        frame: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        // connect and send share the reply window
        with_timeout_error(
            async {
                let mut framed = self.connect(addr).await?;
                framed.send(frame.to_vec()).await.map_err(|e| match e {
                    ProtocolError::Io(io) => {
                        ProtocolError::Network(format!("send to {addr} failed: {io}"))
                    }
                    other => other,
                })?;

                let reply = framed.next().await.ok_or_else(|| {
                    ProtocolError::Network(constants::ERR_CONNECTION_CLOSED.into())
                })??;
                debug!(len = reply.len(), "Reply received");
                Ok(reply)
            },
            timeout,
        )
        .await
    }

    async fn send(&self, addr: SocketAddr, frame: &[u8]) -> Result<()> {
        let mut framed = self.connect(addr).await?;
        framed.send(frame.to_vec()).await
    }
}
