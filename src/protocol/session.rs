//! Per-device session: handshake state machine and request/response.
//!
//! A session owns everything that changes while talking to one device: the
//! control id and key issued by the handshake, and the packet counter. All
//! mutation goes through `&mut self`, so one session never has more than one
//! request in flight. Distinct sessions share nothing and can run in
//! parallel tasks.
//!
//! ## Counter discipline
//! The counter in the header identifies a logical attempt. It advances only
//! after a reply has passed checksum and decryption checks (or carried a
//! device error code, which is still a completed round trip). Timeouts and
//! integrity failures leave it untouched so a caller's retry goes out with
//! the same value.
//!
//! ## Key rotation
//! The handshake is always sent under the bootstrap key with control id 0.
//! The issued id and key are installed together only when the reply parses;
//! otherwise the previous credentials and state stay in place.

use rand::Rng;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::{HandshakePolicy, SessionConfig, BOOTSTRAP_DEVICE_ID};
use crate::core::packet::{command, Packet, PacketHeader};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::discovery::heartbeat_frame;
use crate::protocol::handshake::{auth_request_payload, parse_auth_reply};
use crate::transport::{self, Transport};
use crate::utils::crypto::{Crypto, KEY_LEN};
use crate::utils::metrics::{global_metrics, Metrics, Timer};
use crate::utils::timeout::MIN_ADAPTIVE_TIMEOUT;

/// Lowest counter value; the high bit is always set on the wire.
pub const COUNTER_FLOOR: u16 = 0x8000;

/// Multiple of the last round trip used by [`Session::suggested_timeout`].
const ADAPTIVE_FACTOR: u32 = 4;

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

/// Counter value following `counter`, wrapping within `0x8000..=0xFFFF`.
pub fn next_counter(counter: u16) -> u16 {
    counter.wrapping_add(1) | COUNTER_FLOOR
}

pub struct Session {
    addr: SocketAddr,
    devtype: u16,
    mac: [u8; 6],
    device_id: u32,
    crypto: Crypto,
    counter: u16,
    state: SessionState,
    policy: HandshakePolicy,
    timeout: Duration,
    last_rtt: Option<Duration>,
    transport: Box<dyn Transport>,
    metrics: &'static Metrics,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("addr", &self.addr)
            .field("devtype", &format_args!("{:#06x}", self.devtype))
            .field("device_id", &format_args!("{:#x}", self.device_id))
            .field("counter", &format_args!("{:#06x}", self.counter))
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Session using the transport selected in `config`.
    ///
    /// # Errors
    /// Returns `ProtocolError::ConfigError` if the configured local address
    /// does not parse.
    pub fn new(addr: SocketAddr, devtype: u16, mac: [u8; 6], config: &SessionConfig) -> Result<Self> {
        let transport = transport::from_kind(config.transport, config.local()?);
        Ok(Self::with_transport(addr, devtype, mac, transport, config))
    }

    /// Session over a caller-supplied transport.
    pub fn with_transport(
        addr: SocketAddr,
        devtype: u16,
        mac: [u8; 6],
        transport: Box<dyn Transport>,
        config: &SessionConfig,
    ) -> Self {
        let counter = config
            .initial_counter
            .unwrap_or_else(|| rand::rng().random_range(COUNTER_FLOOR..=u16::MAX));

        Self {
            addr,
            devtype,
            mac,
            device_id: BOOTSTRAP_DEVICE_ID,
            crypto: Crypto::bootstrap(),
            counter,
            state: SessionState::Unauthenticated,
            policy: config.handshake_policy,
            timeout: config.request_timeout,
            last_rtt: None,
            transport,
            metrics: global_metrics(),
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn devtype(&self) -> u16 {
        self.devtype
    }

    pub fn mac(&self) -> [u8; 6] {
        self.mac
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    pub fn key(&self) -> &[u8; KEY_LEN] {
        self.crypto.key()
    }

    /// Counter value the next request will carry.
    pub fn counter(&self) -> u16 {
        self.counter
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn policy(&self) -> HandshakePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: HandshakePolicy) {
        self.policy = policy;
    }

    /// Configured per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.timeout
    }

    /// Round-trip time of the last completed request.
    pub fn last_rtt(&self) -> Option<Duration> {
        self.last_rtt
    }

    /// A timeout derived from the last round trip, capped by the configured one.
    pub fn suggested_timeout(&self) -> Duration {
        match self.last_rtt {
            Some(rtt) => (rtt * ADAPTIVE_FACTOR)
                .max(MIN_ADAPTIVE_TIMEOUT)
                .min(self.timeout),
            None => self.timeout,
        }
    }

    /// Authenticate with the device and install the issued credentials.
    ///
    /// # Errors
    /// - `ProtocolError::Authentication` when the reply fails validation or
    ///   the device refuses; credentials and state are left unchanged
    /// - `ProtocolError::Timeout` / `ProtocolError::Network` from the transport
    #[instrument(skip(self), fields(addr = %self.addr), level = "debug")]
    pub async fn handshake(&mut self) -> Result<()> {
        self.handshake_with_timeout(self.timeout).await
    }

    pub async fn handshake_with_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.metrics.handshake_attempt();
        let previous = self.state;
        self.state = SessionState::Authenticating;

        let bootstrap = Crypto::bootstrap();
        let payload = auth_request_payload();
        let outcome = self
            .exchange(command::HANDSHAKE, &payload, &bootstrap, BOOTSTRAP_DEVICE_ID, timeout)
            .await;
        self.settle(&outcome);

        let grant = outcome.and_then(|(_, plaintext, _)| parse_auth_reply(&plaintext));
        match grant {
            Ok(grant) => {
                self.device_id = grant.device_id;
                self.crypto = Crypto::new(&grant.key);
                self.state = SessionState::Authenticated;
                self.metrics.handshake_success();
                info!(device_id = self.device_id, "Handshake complete");
                Ok(())
            }
            Err(e) => {
                self.state = previous;
                self.metrics.handshake_failed();
                warn!(error = %e, "Handshake failed");
                Err(match e {
                    ProtocolError::Checksum { .. }
                    | ProtocolError::Malformed(_)
                    | ProtocolError::Crypto(_) => ProtocolError::Authentication(e.to_string()),
                    ProtocolError::Device { code, message } => ProtocolError::Authentication(
                        format!("{} ({code}: {message})", constants::ERR_AUTH_REJECTED),
                    ),
                    other => other,
                })
            }
        }
    }

    /// Apply the handshake policy before a semantic command.
    pub async fn ensure_authenticated(&mut self) -> Result<()> {
        if self.is_authenticated() {
            return Ok(());
        }
        match self.policy {
            HandshakePolicy::Implicit => self.handshake().await,
            HandshakePolicy::Explicit => Err(ProtocolError::NotAuthenticated),
        }
    }

    /// Send `payload` under `command` and return the decrypted reply payload.
    ///
    /// The payload keeps the zero padding added for encryption.
    ///
    /// # Errors
    /// `ProtocolError::NotAuthenticated` before a successful handshake, plus
    /// everything listed on [`ProtocolError`] for a round trip.
    pub async fn request(&mut self, command: u16, payload: &[u8]) -> Result<Vec<u8>> {
        self.request_with_timeout(command, payload, self.timeout).await
    }

    #[instrument(
        skip(self, payload),
        fields(addr = %self.addr, counter = self.counter),
        level = "debug"
    )]
    pub async fn request_with_timeout(
        &mut self,
        command: u16,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        if !self.is_authenticated() {
            return Err(ProtocolError::NotAuthenticated);
        }

        let outcome = self
            .exchange(command, payload, &self.crypto, self.device_id, timeout)
            .await;
        self.settle(&outcome);
        outcome.map(|(_, plaintext, _)| plaintext)
    }

    /// Send the keep-alive datagram. No reply is expected.
    pub async fn ping(&self) -> Result<()> {
        debug!(addr = %self.addr, "Sending heartbeat");
        self.transport.send(self.addr, &heartbeat_frame()).await
    }

    /// One framed exchange. Leaves all session state untouched.
    async fn exchange(
        &self,
        command: u16,
        payload: &[u8],
        crypto: &Crypto,
        device_id: u32,
        timeout: Duration,
    ) -> Result<(PacketHeader, Vec<u8>, Duration)> {
        let header = PacketHeader {
            devtype: self.devtype,
            command,
            counter: self.counter,
            mac: self.mac,
            device_id,
            ..Default::default()
        };
        let frame = Packet::seal(header, payload, crypto).to_bytes();

        self.metrics.request_sent(frame.len() as u64);
        let timer = Timer::start("round_trip");
        let reply = self
            .transport
            .send_and_receive(self.addr, &frame, timeout)
            .await?;
        let rtt = timer.elapsed();
        self.metrics.reply_received(reply.len() as u64);

        let packet = Packet::from_bytes(&reply)?;
        if packet.header.error_code != 0 {
            return Err(ProtocolError::from_device_code(packet.header.error_code));
        }
        let plaintext = packet.open(crypto)?;
        debug!(len = plaintext.len(), rtt_ms = rtt.as_millis(), "Reply validated");

        Ok((packet.header, plaintext, rtt))
    }

    /// Advance the counter after a completed round trip and record failures.
    fn settle(&mut self, outcome: &Result<(PacketHeader, Vec<u8>, Duration)>) {
        match outcome {
            Ok((_, _, rtt)) => {
                self.last_rtt = Some(*rtt);
                self.counter = next_counter(self.counter);
                self.metrics.request_completed();
            }
            Err(e @ ProtocolError::Device { .. }) => {
                self.counter = next_counter(self.counter);
                self.metrics.request_failed(e);
            }
            Err(e) => self.metrics.request_failed(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn local_device() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 80))
    }

    #[test]
    fn test_counter_wraps_inside_high_range() {
        assert_eq!(next_counter(0x8000), 0x8001);
        assert_eq!(next_counter(0xfffe), 0xffff);
        assert_eq!(next_counter(0xffff), 0x8000);
        // values below the floor are lifted into range
        assert_eq!(next_counter(0x0001), 0x8002);
    }

    #[test]
    fn test_random_initial_counter_in_range() {
        let config = SessionConfig::default();
        for _ in 0..32 {
            let session = Session::new(local_device(), 0x2737, [0; 6], &config).unwrap();
            assert!(session.counter() >= COUNTER_FLOOR);
        }
    }

    #[test]
    fn test_new_session_uses_bootstrap_credentials() {
        let config = SessionConfig {
            initial_counter: Some(0x9000),
            ..Default::default()
        };
        let session = Session::new(local_device(), 0x2737, [1, 2, 3, 4, 5, 6], &config).unwrap();

        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(session.key(), &crate::config::BOOTSTRAP_KEY);
        assert_eq!(session.device_id(), 0);
        assert_eq!(session.counter(), 0x9000);
        assert_eq!(session.suggested_timeout(), config.request_timeout);
    }

    #[test]
    fn test_invalid_local_address_rejected() {
        let config = SessionConfig {
            local_address: Some("not an address".into()),
            ..Default::default()
        };
        let result = Session::new(local_device(), 0x2737, [0; 6], &config);
        assert!(matches!(result, Err(ProtocolError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_explicit_policy_refuses_before_handshake() {
        let config = SessionConfig {
            handshake_policy: HandshakePolicy::Explicit,
            ..Default::default()
        };
        let mut session = Session::new(local_device(), 0x2737, [0; 6], &config).unwrap();
        assert!(matches!(
            session.ensure_authenticated().await,
            Err(ProtocolError::NotAuthenticated)
        ));
        assert!(matches!(
            session.request(command::CONTROL, &[1]).await,
            Err(ProtocolError::NotAuthenticated)
        ));
    }
}
