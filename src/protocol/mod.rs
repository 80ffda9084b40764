//! # Protocol Layer
//!
//! Everything above raw frames: finding devices, authenticating with them
//! and running request/response exchanges.
//!
//! - [`discovery`]: broadcast/unicast probe and reply parsing
//! - [`handshake`]: handshake request payload and reply parsing
//! - [`session`]: per-device state machine owning key, id and counter

pub mod discovery;
pub mod handshake;
pub mod session;

pub use discovery::{discover, discover_all, hello, DeviceDescriptor};
pub use session::{Session, SessionState};
