//! # Core Protocol Components
//!
//! Low-level packet handling and stream framing.
//!
//! ## Components
//! - **Packet**: the fixed 0x38-byte header plus encrypted payload
//! - **Codec**: Tokio codec for carrying frames over byte streams
//!
//! ## Security
//! - Frame checksum is verified before any header field is returned
//! - Payloads are decrypted only after the frame checksum has passed
//! - Frames larger than `MAX_FRAME_SIZE` are rejected before allocation

pub mod codec;
pub mod packet;

pub use packet::{command, Packet, PacketHeader, HEADER_LEN};
