//! # broadlink-protocol
//!
//! Client-side core for the Broadlink local network protocol: discovery,
//! session handshake, packet framing/encryption and per-family command
//! dispatch for IR/RF remotes, smart plugs, power strips and sensors.
//!
//! ## Layers
//! - [`utils::crypto`]: AES-128-CBC with the fixed protocol IV, and the
//!   16-bit additive checksum
//! - [`core::packet`]: the fixed 0x38-byte envelope (encode/decode)
//! - [`transport`]: UDP datagrams (default) and length-prefixed TCP frames
//! - [`protocol::session`]: handshake state machine and request/response
//! - [`protocol::discovery`]: broadcast probe and reply collection
//! - [`device`]: device families and the uniform `execute` surface
//!
//! ## Example
//! ```no_run
//! use broadlink_protocol::config::BroadlinkConfig;
//! use broadlink_protocol::device::{Command, Device};
//! use broadlink_protocol::protocol::discovery;
//! use futures::StreamExt;
//!
//! # async fn run() -> broadlink_protocol::error::Result<()> {
//! let config = BroadlinkConfig::default();
//! let mut found = discovery::discover(&config.discovery).await?;
//! while let Some(descriptor) = found.next().await {
//!     let mut device = Device::from_descriptor(&descriptor?, &config.session)?;
//!     let reply = device.execute(Command::CheckPower).await;
//!     println!("{reply:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod device;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use device::{Command, Device, DeviceKind, Response};
pub use error::{ProtocolError, Result};
pub use protocol::discovery::DeviceDescriptor;
pub use protocol::session::{Session, SessionState};
