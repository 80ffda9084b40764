//! # Discovery
//!
//! Finds devices on the local network with an unencrypted probe.
//!
//! The probe is a 0x30-byte datagram carrying the local time and the
//! address devices should answer to. Every device that hears it replies
//! once with its type, MAC, name and lock flag. Replies are collected until
//! the window closes, so zero responders yields an empty stream, not an
//! error.
//!
//! The same datagram sent unicast ([`hello`]) asks one device to identify
//! itself.

use chrono::{DateTime, Datelike, FixedOffset, Local, Timelike};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::{DiscoveryConfig, MAX_FRAME_SIZE};
use crate::core::packet::{read_u16, stamp_checksum_field, verify_frame_checksum};
use crate::device::{kind, DeviceKind, DeviceModel};
use crate::error::{constants, ProtocolError, Result};
use crate::transport::unspecified_for;
use crate::utils::metrics::global_metrics;

/// Length of the probe and heartbeat datagrams.
pub const PROBE_LEN: usize = 0x30;

/// Shortest reply carrying every descriptor field.
pub const DISCOVERY_REPLY_MIN_LEN: usize = 0x80;

const PROBE_COMMAND: u8 = 0x06;
const HEARTBEAT_COMMAND: u8 = 0x01;
const COMMAND_OFFSET: usize = 0x26;

mod reply {
    pub const DEVTYPE: usize = 0x34;
    pub const MAC: usize = 0x3a;
    pub const NAME: usize = 0x40;
}

/// What a device reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub address: SocketAddr,
    pub devtype: u16,
    /// Name as reported, up to the first NUL. Bytes that are not valid
    /// UTF-8 are replaced with U+FFFD; `raw_name` keeps the original bytes.
    pub name: String,
    #[serde(default)]
    pub raw_name: Vec<u8>,
    /// MAC in display order.
    pub mac: [u8; 6],
    /// Taken from the last byte of the reply.
    pub is_locked: bool,
}

impl DeviceDescriptor {
    pub fn kind(&self) -> DeviceKind {
        DeviceKind::from_devtype(self.devtype)
    }

    /// Table entry for the device type, if known.
    pub fn model(&self) -> Option<&'static DeviceModel> {
        kind::lookup(self.devtype)
    }

    pub fn model_name(&self) -> &'static str {
        self.model().map_or("Unknown", |m| m.model)
    }

    pub fn manufacturer(&self) -> &'static str {
        self.model().map_or("Unknown", |m| m.manufacturer)
    }

    pub fn mac_string(&self) -> String {
        self.mac
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({:#06x}) \"{}\" at {} [{}]",
            self.manufacturer(),
            self.model_name(),
            self.devtype,
            self.name,
            self.address,
            self.mac_string()
        )?;
        if self.is_locked {
            f.write_str(" locked")?;
        }
        Ok(())
    }
}

/// Build the discovery probe advertising `local` as the reply address.
pub fn probe_frame(local: SocketAddr, now: DateTime<FixedOffset>) -> [u8; PROBE_LEN] {
    let mut frame = [0u8; PROBE_LEN];

    let tz_hours = now.offset().local_minus_utc() / 3600;
    frame[0x08..0x0c].copy_from_slice(&tz_hours.to_le_bytes());

    let year = now.year();
    frame[0x0c..0x0e].copy_from_slice(&(year as u16).to_le_bytes());
    frame[0x0e] = now.minute() as u8;
    frame[0x0f] = now.hour() as u8;
    frame[0x10] = year.rem_euclid(100) as u8;
    frame[0x11] = now.weekday().number_from_monday() as u8;
    frame[0x12] = now.day() as u8;
    frame[0x13] = now.month() as u8;

    if let IpAddr::V4(ip) = local.ip() {
        let mut octets = ip.octets();
        octets.reverse();
        frame[0x18..0x1c].copy_from_slice(&octets);
    }
    frame[0x1c..0x1e].copy_from_slice(&local.port().to_le_bytes());
    frame[COMMAND_OFFSET] = PROBE_COMMAND;

    stamp_checksum_field(&mut frame);
    frame
}

/// Keep-alive datagram. Carries no checksum and gets no reply.
pub fn heartbeat_frame() -> [u8; PROBE_LEN] {
    let mut frame = [0u8; PROBE_LEN];
    frame[COMMAND_OFFSET] = HEARTBEAT_COMMAND;
    frame
}

/// Decode a discovery reply received from `src`.
///
/// # Errors
/// `ProtocolError::Malformed` for short replies and
/// `ProtocolError::Checksum` when the frame checksum does not match.
pub fn parse_reply(bytes: &[u8], src: SocketAddr) -> Result<DeviceDescriptor> {
    if bytes.len() < DISCOVERY_REPLY_MIN_LEN {
        return Err(ProtocolError::Malformed(
            constants::ERR_SHORT_DISCOVERY_REPLY.into(),
        ));
    }
    verify_frame_checksum(bytes)?;

    let mut mac = [0u8; 6];
    mac.copy_from_slice(&bytes[reply::MAC..reply::MAC + 6]);
    mac.reverse();

    let name_field = &bytes[reply::NAME..];
    let name_len = name_field
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(name_field.len());
    let raw_name = name_field[..name_len].to_vec();
    let name = String::from_utf8_lossy(&raw_name).into_owned();

    Ok(DeviceDescriptor {
        address: src,
        devtype: read_u16(bytes, reply::DEVTYPE),
        name,
        raw_name,
        mac,
        is_locked: bytes[bytes.len() - 1] != 0,
    })
}

/// Discover devices using the configured target and window.
pub async fn discover(
    config: &DiscoveryConfig,
) -> Result<BoxStream<'static, Result<DeviceDescriptor>>> {
    discover_on(config.target()?, config.local()?, config.timeout).await
}

/// Probe `target` and stream replies until `timeout` elapses.
///
/// Malformed replies are logged and skipped. The stream ends with an error
/// item only if the socket itself fails.
#[instrument(skip(local), level = "debug")]
pub async fn discover_on(
    target: SocketAddr,
    local: Option<SocketAddr>,
    timeout: Duration,
) -> Result<BoxStream<'static, Result<DeviceDescriptor>>> {
    let bind = local.unwrap_or_else(|| unspecified_for(&target));
    let socket = UdpSocket::bind(bind).await.map_err(|e| {
        ProtocolError::Network(format!("{} {bind}: {e}", constants::ERR_SOCKET_BIND))
    })?;
    socket.set_broadcast(true)?;

    let advertised = advertised_address(&socket, target).await?;
    let probe = probe_frame(advertised, Local::now().fixed_offset());
    socket
        .send_to(&probe, target)
        .await
        .map_err(|e| ProtocolError::Network(format!("send to {target} failed: {e}")))?;
    debug!(%target, %advertised, "Discovery probe sent");

    let deadline = Instant::now() + timeout;
    let state = Some((socket, vec![0u8; MAX_FRAME_SIZE]));

    Ok(stream::unfold(state, move |state| async move {
        let (socket, mut buf) = state?;
        loop {
            let received = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await;
            match received {
                Err(_) => return None,
                Ok(Ok((len, src))) => match parse_reply(&buf[..len], src) {
                    Ok(descriptor) => {
                        global_metrics().discovery_reply();
                        info!(%src, devtype = descriptor.devtype, name = %descriptor.name, "Device found");
                        return Some((Ok(descriptor), Some((socket, buf))));
                    }
                    Err(e) => warn!(%src, len, error = %e, "Skipping malformed discovery reply"),
                },
                Ok(Err(e)) if is_transient(&e) => trace!(error = %e, "Ignoring ICMP error"),
                Ok(Err(e)) => return Some((Err(ProtocolError::Io(e)), None)),
            }
        }
    })
    .boxed())
}

/// Run discovery to completion and collect every descriptor.
pub async fn discover_all(config: &DiscoveryConfig) -> Result<Vec<DeviceDescriptor>> {
    discover(config).await?.try_collect().await
}

/// Ask the device at `addr` to identify itself.
///
/// # Errors
/// `ProtocolError::Timeout` when no valid reply from `addr` arrives in time.
pub async fn hello(
    addr: SocketAddr,
    timeout: Duration,
    local: Option<SocketAddr>,
) -> Result<DeviceDescriptor> {
    let mut replies = discover_on(addr, local, timeout).await?;
    while let Some(reply) = replies.next().await {
        let descriptor = reply?;
        if descriptor.address.ip() == addr.ip() {
            return Ok(descriptor);
        }
        trace!(from = %descriptor.address, "Ignoring reply from another device");
    }
    Err(ProtocolError::Timeout)
}

/// Address devices should answer to.
///
/// When bound to the unspecified address, asks the routing table which
/// local IP reaches `target`, falling back to a public route.
async fn advertised_address(socket: &UdpSocket, target: SocketAddr) -> Result<SocketAddr> {
    let bound = socket.local_addr()?;
    if !bound.ip().is_unspecified() {
        return Ok(bound);
    }

    let public: SocketAddr = SocketAddr::from(([8, 8, 8, 8], 53));
    for route in [target, public] {
        let Ok(probe) = UdpSocket::bind(unspecified_for(&route)).await else {
            continue;
        };
        if probe.connect(route).await.is_ok() {
            if let Ok(local) = probe.local_addr() {
                if !local.ip().is_unspecified() {
                    return Ok(SocketAddr::new(local.ip(), bound.port()));
                }
            }
        }
    }
    Ok(bound)
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
    )
}
