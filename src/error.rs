//! # Error Types
//!
//! Error handling for the device protocol.
//!
//! Every failure a caller can observe is a distinct [`ProtocolError`] variant so
//! retry and re-handshake policy can be decided outside the core.
//!
//! ## Error Categories
//! - **Network**: the send failed or the host is unreachable (fatal for the call)
//! - **Timeout**: no reply inside the window (safe to retry, counter unchanged)
//! - **Checksum / Malformed**: corrupted or spoofed frame, never decrypted
//! - **Crypto**: decryption failed after the checksum passed (key mismatch)
//! - **Authentication**: handshake rejected or malformed
//! - **UnsupportedCommand**: the command is not part of the device family
//! - **InvalidCommand**: the command carries an argument the device cannot take
//! - **Device**: the device answered with a non-zero error code
//!
//! ## Example Usage
//! ```rust
//! use broadlink_protocol::error::{ProtocolError, Result};
//! use tracing::{info, warn};
//!
//! fn report(result: Result<u16>) {
//!     match result {
//!         Ok(version) => info!(version, "firmware"),
//!         Err(e) if e.is_retryable() => warn!(error = %e, "transient failure"),
//!         Err(e) => warn!(error = %e, "giving up"),
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Framing errors
    pub const ERR_SHORT_FRAME: &str = "Frame shorter than the packet header";
    pub const ERR_NO_CHECKSUM_FIELD: &str = "Frame too short to hold the checksum field";
    pub const ERR_BAD_MAGIC: &str = "Frame does not start with the protocol magic";
    pub const ERR_SHORT_DISCOVERY_REPLY: &str = "Discovery reply shorter than 0x80 bytes";
    pub const ERR_SHORT_RESPONSE: &str = "Response payload shorter than expected";
    pub const ERR_OVERSIZED_FRAME: &str = "Frame exceeds the maximum datagram size";

    /// Cryptographic errors
    pub const ERR_UNALIGNED_CIPHERTEXT: &str = "Ciphertext is not a multiple of the block size";
    pub const ERR_PAYLOAD_CHECKSUM: &str = "Decrypted payload checksum mismatch";

    /// Handshake errors
    pub const ERR_SHORT_AUTH_REPLY: &str = "Handshake reply too short for device id and key";
    pub const ERR_AUTH_REJECTED: &str = "Device rejected the handshake";

    /// Transport errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed before a reply arrived";
    pub const ERR_SOCKET_BIND: &str = "Failed to bind local socket";
}

/// Primary error type for all protocol operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Checksum mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    Checksum { expected: u16, computed: u16 },

    #[error("Malformed packet: {0}")]
    Malformed(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Session is not authenticated")]
    NotAuthenticated,

    #[error("Command {command} is not supported by {family}")]
    UnsupportedCommand {
        family: &'static str,
        command: &'static str,
    },

    #[error("Invalid command argument: {0}")]
    InvalidCommand(String),

    #[error("Device error {code}: {message}")]
    Device { code: i16, message: &'static str },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Whether the same call can be repeated as-is.
    ///
    /// Retrying after any of these reuses the unchanged packet counter.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProtocolError::Timeout | ProtocolError::Checksum { .. } | ProtocolError::Malformed(_)
        )
    }

    /// Whether the session key is likely stale and a new handshake is needed.
    pub fn requires_handshake(&self) -> bool {
        match self {
            ProtocolError::Crypto(_)
            | ProtocolError::Authentication(_)
            | ProtocolError::NotAuthenticated => true,
            // -2 logged out, -7 control key expired, -4011 control id error
            ProtocolError::Device { code, .. } => matches!(code, -1 | -2 | -7 | -4011),
            _ => false,
        }
    }

    /// Build the error for a non-zero device error code.
    pub fn from_device_code(code: i16) -> Self {
        ProtocolError::Device {
            code,
            message: device_error_message(code),
        }
    }
}

/// Describe an error code reported in the reply header.
pub fn device_error_message(code: i16) -> &'static str {
    match code {
        -1 => "Authentication failed",
        -2 => "You have been logged out",
        -3 => "The device is offline",
        -4 => "Command not supported",
        -5 => "The device storage is full",
        -6 => "Structure is abnormal",
        -7 => "Control key is expired",
        -8 => "Send error",
        -9 => "Write error",
        -10 => "Read error",
        -11 => "SSID could not be found in AP configuration",
        -4000 => "Network timeout",
        -4007 => "Received data packet length error",
        -4008 => "Received data packet check error",
        -4009 => "Received encrypted data packet length error",
        -4010 => "Received encrypted data packet check error",
        -4011 => "Device control ID error",
        _ => "Unknown device error",
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
