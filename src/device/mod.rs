//! # Device Capabilities
//!
//! Semantic commands layered on top of an authenticated [`Session`].
//!
//! Each device family implements [`Capability`]: it declares which
//! [`Command`]s it accepts, turns them into a command code and plaintext
//! payload, and decodes the decrypted reply into a [`Response`]. Framing,
//! encryption and counter handling stay in the session, so a new family only
//! has to describe its payloads.
//!
//! Commands shared by every family (firmware version, name, lock) are
//! served by [`common`] regardless of the device type.
//!
//! ## Example Usage
//! ```rust,no_run
//! use broadlink_protocol::config::SessionConfig;
//! use broadlink_protocol::device::{Command, Device, DeviceKind, Response};
//!
//! # async fn example() -> broadlink_protocol::error::Result<()> {
//! let addr = "192.168.1.40:80".parse().unwrap();
//! let mut device = Device::connect(addr, 0x2737, [0; 6], &SessionConfig::default())?;
//! assert_eq!(device.kind(), DeviceKind::RmMini);
//!
//! device.execute(Command::EnterLearning).await?;
//! if let Response::Data(code) = device.execute(Command::CheckData).await? {
//!     device.execute(Command::SendData(code)).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod kind;
pub mod remote;
pub mod sensor;
pub mod switch;

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::SessionConfig;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::discovery::DeviceDescriptor;
use crate::protocol::session::Session;
use crate::transport::Transport;

pub use kind::{DeviceKind, DeviceModel};

/// A semantic operation on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    // every family
    GetFirmwareVersion,
    SetName(String),
    SetLock(bool),

    // remotes
    SendData(Vec<u8>),
    EnterLearning,
    CheckData,
    SweepFrequency,
    CheckFrequency,
    FindRfPacket,
    CancelSweepFrequency,

    // sensors
    CheckTemperature,
    CheckSensors,

    // switches
    SetPower(bool),
    CheckPower,
    SetNightlight(bool),
    CheckNightlight,
    GetEnergy,
    SetSocketPower { socket: u8, on: bool },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetFirmwareVersion => "GetFirmwareVersion",
            Command::SetName(_) => "SetName",
            Command::SetLock(_) => "SetLock",
            Command::SendData(_) => "SendData",
            Command::EnterLearning => "EnterLearning",
            Command::CheckData => "CheckData",
            Command::SweepFrequency => "SweepFrequency",
            Command::CheckFrequency => "CheckFrequency",
            Command::FindRfPacket => "FindRfPacket",
            Command::CancelSweepFrequency => "CancelSweepFrequency",
            Command::CheckTemperature => "CheckTemperature",
            Command::CheckSensors => "CheckSensors",
            Command::SetPower(_) => "SetPower",
            Command::CheckPower => "CheckPower",
            Command::SetNightlight(_) => "SetNightlight",
            Command::CheckNightlight => "CheckNightlight",
            Command::GetEnergy => "GetEnergy",
            Command::SetSocketPower { .. } => "SetSocketPower",
        }
    }

    /// Served by every family.
    pub fn is_generic(&self) -> bool {
        matches!(
            self,
            Command::GetFirmwareVersion | Command::SetName(_) | Command::SetLock(_)
        )
    }
}

/// Environment readings. Fields a device does not report are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorReading {
    pub temperature: f32,
    pub humidity: Option<f32>,
    pub light: Option<u8>,
    pub air_quality: Option<u8>,
    pub noise: Option<u8>,
}

/// Decoded reply to a [`Command`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// Accepted; the reply carries nothing of interest.
    Ack,
    /// Raw bytes, e.g. a learned IR/RF code.
    Data(Vec<u8>),
    /// Result of a frequency or packet search.
    Found(bool),
    Power(bool),
    Nightlight(bool),
    Temperature(f32),
    Sensors(SensorReading),
    /// Energy meter reading in watts.
    Energy(f32),
    /// Per-socket state of a power strip.
    Sockets([bool; 4]),
    Firmware(u16),
}

/// Wire form of a command: code plus plaintext payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: u16,
    pub payload: Vec<u8>,
}

impl Request {
    pub fn control(payload: Vec<u8>) -> Self {
        Self {
            command: crate::core::packet::command::CONTROL,
            payload,
        }
    }
}

/// Device state a payload builder may depend on.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub name: &'a str,
    pub is_locked: bool,
    /// Reply to the command returned by [`Capability::prelude`], if any.
    pub prior: Option<&'a Response>,
}

/// Command set of one device family.
pub trait Capability: std::fmt::Debug + Send + Sync {
    /// Human-readable family name.
    fn family(&self) -> &'static str;

    fn supports(&self, command: &Command) -> bool;

    /// A read that must complete before `command` can be encoded.
    ///
    /// Used for writes that carry state the caller did not specify.
    fn prelude(&self, _command: &Command) -> Option<Command> {
        None
    }

    fn build(&self, command: &Command, ctx: &Context<'_>) -> Result<Request>;

    fn parse(&self, command: &Command, reply: &[u8]) -> Result<Response>;

    /// Error for a command this family does not handle.
    fn unsupported(&self, command: &Command) -> ProtocolError {
        ProtocolError::UnsupportedCommand {
            family: self.family(),
            command: command.name(),
        }
    }
}

/// Ensure `reply` holds at least `len` bytes.
pub(crate) fn require_len(reply: &[u8], len: usize) -> Result<()> {
    if reply.len() < len {
        return Err(ProtocolError::Malformed(format!(
            "{}: {} < {len}",
            constants::ERR_SHORT_RESPONSE,
            reply.len()
        )));
    }
    Ok(())
}

/// A session bound to the command set of its device type.
#[derive(Debug)]
pub struct Device {
    session: Session,
    kind: DeviceKind,
    capability: &'static dyn Capability,
    name: String,
    is_locked: bool,
}

impl Device {
    /// Wrap an existing session.
    pub fn new(session: Session) -> Self {
        let kind = DeviceKind::from_devtype(session.devtype());
        Self {
            session,
            kind,
            capability: kind.capability(),
            name: String::new(),
            is_locked: false,
        }
    }

    /// Open a session to a device at a known address.
    pub fn connect(addr: SocketAddr, devtype: u16, mac: [u8; 6], config: &SessionConfig) -> Result<Self> {
        Ok(Self::new(Session::new(addr, devtype, mac, config)?))
    }

    /// Open a session to a discovered device.
    pub fn from_descriptor(descriptor: &DeviceDescriptor, config: &SessionConfig) -> Result<Self> {
        let session = Session::new(descriptor.address, descriptor.devtype, descriptor.mac, config)?;
        Ok(Self::new(session).with_identity(&descriptor.name, descriptor.is_locked))
    }

    /// Open a session to a discovered device over a caller-supplied transport.
    pub fn with_transport(
        descriptor: &DeviceDescriptor,
        transport: Box<dyn Transport>,
        config: &SessionConfig,
    ) -> Self {
        let session = Session::with_transport(
            descriptor.address,
            descriptor.devtype,
            descriptor.mac,
            transport,
            config,
        );
        Self::new(session).with_identity(&descriptor.name, descriptor.is_locked)
    }

    fn with_identity(mut self, name: &str, is_locked: bool) -> Self {
        self.name = name.to_string();
        self.is_locked = is_locked;
        self
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// Authenticate now instead of on the first command.
    pub async fn handshake(&mut self) -> Result<()> {
        self.session.handshake().await
    }

    /// Whether this device's family accepts `command`.
    pub fn supports(&self, command: &Command) -> bool {
        self.capability_for(command).supports(command)
    }

    /// Run `command` with the session's configured timeout.
    pub async fn execute(&mut self, command: Command) -> Result<Response> {
        let timeout = self.session.request_timeout();
        self.execute_with_timeout(command, timeout).await
    }

    /// Run `command`, authenticating first according to the session policy.
    ///
    /// # Errors
    /// `ProtocolError::UnsupportedCommand` before any traffic when the family
    /// lacks the command, otherwise whatever the round trip returns.
    #[instrument(skip(self, command), fields(command = command.name(), kind = ?self.kind), level = "debug")]
    pub async fn execute_with_timeout(&mut self, command: Command, timeout: Duration) -> Result<Response> {
        let capability = self.capability_for(&command);
        if !capability.supports(&command) {
            return Err(capability.unsupported(&command));
        }

        self.session.ensure_authenticated().await?;

        let prior = match capability.prelude(&command) {
            Some(read) => {
                debug!(prelude = read.name(), "Reading current state");
                Some(self.round_trip(capability, &read, None, timeout).await?)
            }
            None => None,
        };

        let response = self
            .round_trip(capability, &command, prior.as_ref(), timeout)
            .await?;

        match command {
            Command::SetName(name) => self.name = name,
            Command::SetLock(lock) => self.is_locked = lock,
            _ => {}
        }
        Ok(response)
    }

    async fn round_trip(
        &mut self,
        capability: &'static dyn Capability,
        command: &Command,
        prior: Option<&Response>,
        timeout: Duration,
    ) -> Result<Response> {
        let ctx = Context {
            name: &self.name,
            is_locked: self.is_locked,
            prior,
        };
        let request = capability.build(command, &ctx)?;
        let reply = self
            .session
            .request_with_timeout(request.command, &request.payload, timeout)
            .await?;
        capability.parse(command, &reply)
    }

    fn capability_for(&self, command: &Command) -> &'static dyn Capability {
        if command.is_generic() {
            &common::GENERIC
        } else {
            self.capability
        }
    }

    // Convenience wrappers

    pub async fn send_data(&mut self, data: &[u8]) -> Result<()> {
        self.execute(Command::SendData(data.to_vec())).await.map(|_| ())
    }

    pub async fn set_power(&mut self, on: bool) -> Result<bool> {
        match self.execute(Command::SetPower(on)).await? {
            Response::Power(state) => Ok(state),
            other => Err(unexpected(other)),
        }
    }

    pub async fn check_power(&mut self) -> Result<bool> {
        match self.execute(Command::CheckPower).await? {
            Response::Power(state) => Ok(state),
            other => Err(unexpected(other)),
        }
    }

    pub async fn check_sensors(&mut self) -> Result<SensorReading> {
        match self.execute(Command::CheckSensors).await? {
            Response::Sensors(reading) => Ok(reading),
            other => Err(unexpected(other)),
        }
    }

    pub async fn firmware_version(&mut self) -> Result<u16> {
        match self.execute(Command::GetFirmwareVersion).await? {
            Response::Firmware(version) => Ok(version),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: Response) -> ProtocolError {
    ProtocolError::Malformed(format!("unexpected response {response:?}"))
}
