//! Fake devices for integration tests.
//!
//! [`Responder`] speaks the device side of the protocol: it validates and
//! decrypts each request, answers handshakes with fixed credentials and
//! delegates everything else to a handler closure. It can be driven in
//! memory through [`FakeTransport`] or over loopback UDP with
//! [`spawn_udp_device`].

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use broadlink_protocol::config::SessionConfig;
use broadlink_protocol::core::packet::{command, Packet, PacketHeader};
use broadlink_protocol::error::{ProtocolError, Result};
use broadlink_protocol::transport::Transport;
use broadlink_protocol::utils::crypto::Crypto;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;

pub const DEVICE_ID: u32 = 0x1234;
pub const SESSION_KEY: [u8; 16] = [
    0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x01,
];
pub const MAC: [u8; 6] = [0x34, 0xea, 0x34, 0xaa, 0xbb, 0xcc];

pub type Handler = Box<dyn FnMut(u16, &[u8]) -> Vec<u8> + Send>;

/// One-shot misbehaviour applied to the next reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Swallow the request; the client sees a timeout.
    Drop,
    /// Flip one bit of the reply frame at this offset.
    Corrupt(usize),
    /// Reply with this error code and an empty payload.
    ErrorCode(i16),
    /// Encrypt the reply under an unrelated key.
    WrongKey,
}

pub struct Responder {
    handler: Handler,
    faults: VecDeque<Fault>,
    /// Headers of every request received, in order.
    pub seen: Vec<PacketHeader>,
    /// Decrypted payloads of every request received, in order.
    pub payloads: Vec<Vec<u8>>,
}

impl Responder {
    pub fn new(handler: Handler) -> Self {
        Self {
            handler,
            faults: VecDeque::new(),
            seen: Vec::new(),
            payloads: Vec::new(),
        }
    }

    /// Answers every command with an empty 16-byte payload.
    pub fn acking() -> Self {
        Self::new(Box::new(|_, _| vec![0u8; 16]))
    }

    pub fn push_fault(&mut self, fault: Fault) {
        self.faults.push_back(fault);
    }

    /// Handle one request frame; `None` means no reply.
    pub fn respond(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
        let request = Packet::from_bytes(frame).expect("client sent an invalid frame");
        let crypto = if request.header.command == command::HANDSHAKE {
            assert_eq!(request.header.device_id, 0, "handshake must use id 0");
            Crypto::bootstrap()
        } else {
            assert_eq!(request.header.device_id, DEVICE_ID);
            Crypto::new(&SESSION_KEY)
        };
        let plaintext = request.open(&crypto).expect("client payload did not decrypt");
        self.seen.push(request.header);
        self.payloads.push(plaintext.clone());

        let fault = self.faults.pop_front();
        if fault == Some(Fault::Drop) {
            return None;
        }

        let mut header = PacketHeader {
            payload_checksum: 0,
            ..request.header
        };
        let body = if let Some(Fault::ErrorCode(code)) = fault {
            header.error_code = code;
            Vec::new()
        } else if request.header.command == command::HANDSHAKE {
            let mut body = DEVICE_ID.to_le_bytes().to_vec();
            body.extend_from_slice(&SESSION_KEY);
            body.resize(0x30, 0);
            body
        } else {
            (self.handler)(request.header.command, &plaintext)
        };

        let reply_crypto = if fault == Some(Fault::WrongKey) {
            Crypto::new(&[0x5a; 16])
        } else {
            crypto
        };
        let mut bytes = Packet::seal(header, &body, &reply_crypto).to_bytes();
        if let Some(Fault::Corrupt(offset)) = fault {
            bytes[offset] ^= 0x01;
        }
        Some(bytes)
    }
}

/// In-memory transport backed by a shared [`Responder`].
#[derive(Clone)]
pub struct FakeTransport {
    pub responder: Arc<Mutex<Responder>>,
}

impl FakeTransport {
    pub fn new(responder: Responder) -> Self {
        Self {
            responder: Arc::new(Mutex::new(responder)),
        }
    }

    pub fn push_fault(&self, fault: Fault) {
        self.responder.lock().unwrap().push_fault(fault);
    }

    pub fn seen(&self) -> Vec<PacketHeader> {
        self.responder.lock().unwrap().seen.clone()
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.responder.lock().unwrap().payloads.clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send_and_receive(
        &self,
        _addr: SocketAddr,
        frame: &[u8],
        _timeout: Duration,
    ) -> Result<Vec<u8>> {
        let reply = self.responder.lock().unwrap().respond(frame);
        reply.ok_or(ProtocolError::Timeout)
    }

    async fn send(&self, _addr: SocketAddr, _frame: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Run `responder` behind a loopback UDP socket.
pub async fn spawn_udp_device(responder: Responder) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let mut responder = responder;

    tokio::spawn(async move {
        let mut buf = vec![0u8; 2048];
        loop {
            let Ok((len, src)) = socket.recv_from(&mut buf).await else {
                return;
            };
            if let Some(reply) = responder.respond(&buf[..len]) {
                let _ = socket.send_to(&reply, src).await;
            }
        }
    });
    addr
}

pub fn device_addr() -> SocketAddr {
    SocketAddr::from(([192, 168, 1, 40], 80))
}

/// Configuration with a fixed starting counter.
pub fn session_config() -> SessionConfig {
    SessionConfig {
        initial_counter: Some(0x8100),
        request_timeout: Duration::from_millis(500),
        ..Default::default()
    }
}
