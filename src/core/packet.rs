//! Fixed-layout packet envelope.
//!
//! ```text
//! 0x00  magic (8)            5a a5 aa 55 5a a5 aa 55
//! 0x20  frame checksum (2)   additive, over the whole frame minus this field
//! 0x22  error code (2)       signed, replies only
//! 0x24  device type (2)
//! 0x26  command code (2)
//! 0x28  packet counter (2)
//! 0x2a  hardware id (6)      byte-reversed MAC
//! 0x30  device id (4)
//! 0x34  payload checksum (2) over the plaintext payload
//! 0x38  encrypted payload
//! ```
//!
//! All multi-byte fields are little-endian. Encoding and decoding are pure:
//! no I/O and no key material beyond what [`Packet::seal`] and
//! [`Packet::open`] are handed.

use crate::config::{MAGIC_BYTES, MAX_FRAME_SIZE};
use crate::error::{constants, ProtocolError, Result};
use crate::utils::crypto::{checksum, Crypto};

/// Length of the fixed header preceding the encrypted payload.
pub const HEADER_LEN: usize = 0x38;

const CHECKSUM_OFFSET: usize = 0x20;
const ERROR_OFFSET: usize = 0x22;
const DEVTYPE_OFFSET: usize = 0x24;
const COMMAND_OFFSET: usize = 0x26;
const COUNTER_OFFSET: usize = 0x28;
const MAC_OFFSET: usize = 0x2a;
const DEVICE_ID_OFFSET: usize = 0x30;
const PAYLOAD_CHECKSUM_OFFSET: usize = 0x34;

/// Command codes carried at offset 0x26.
pub mod command {
    /// Keep-alive datagram, no reply expected
    pub const HEARTBEAT: u16 = 0x0001;
    /// Discovery probe
    pub const DISCOVER: u16 = 0x0006;
    /// Handshake request
    pub const HANDSHAKE: u16 = 0x0065;
    /// Power control on first generation plugs
    pub const SP1_POWER: u16 = 0x0066;
    /// Generic encrypted command
    pub const CONTROL: u16 = 0x006a;
}

/// Header fields of a request or reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketHeader {
    pub devtype: u16,
    pub command: u16,
    pub counter: u16,
    /// MAC in display order; reversed on the wire
    pub mac: [u8; 6],
    pub device_id: u32,
    pub payload_checksum: u16,
    /// Non-zero in replies that report a failure
    pub error_code: i16,
}

/// A framed packet. `payload` is always ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Encrypt `plaintext` under `crypto` and embed its checksum in the header.
    pub fn seal(mut header: PacketHeader, plaintext: &[u8], crypto: &Crypto) -> Self {
        header.payload_checksum = checksum(plaintext);
        Self {
            header,
            payload: crypto.encrypt(plaintext),
        }
    }

    /// Decrypt the payload and check it against the embedded payload checksum.
    ///
    /// Only call this on a packet that came out of [`Packet::from_bytes`], which
    /// has already verified the frame checksum.
    ///
    /// # Errors
    /// `ProtocolError::Crypto` when decryption fails or the plaintext does not
    /// match the payload checksum (usually a key mismatch).
    pub fn open(&self, crypto: &Crypto) -> Result<Vec<u8>> {
        let plaintext = crypto.decrypt(&self.payload)?;
        if checksum(&plaintext) != self.header.payload_checksum {
            return Err(ProtocolError::Crypto(constants::ERR_PAYLOAD_CHECKSUM.into()));
        }
        Ok(plaintext)
    }

    /// Serialize to wire bytes. The frame checksum is computed last.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut frame = vec![0u8; HEADER_LEN];
        let h = &self.header;

        frame[..MAGIC_BYTES.len()].copy_from_slice(&MAGIC_BYTES);
        frame[ERROR_OFFSET..ERROR_OFFSET + 2].copy_from_slice(&h.error_code.to_le_bytes());
        frame[DEVTYPE_OFFSET..DEVTYPE_OFFSET + 2].copy_from_slice(&h.devtype.to_le_bytes());
        frame[COMMAND_OFFSET..COMMAND_OFFSET + 2].copy_from_slice(&h.command.to_le_bytes());
        frame[COUNTER_OFFSET..COUNTER_OFFSET + 2].copy_from_slice(&h.counter.to_le_bytes());
        let mut mac = h.mac;
        mac.reverse();
        frame[MAC_OFFSET..MAC_OFFSET + 6].copy_from_slice(&mac);
        frame[DEVICE_ID_OFFSET..DEVICE_ID_OFFSET + 4].copy_from_slice(&h.device_id.to_le_bytes());
        frame[PAYLOAD_CHECKSUM_OFFSET..PAYLOAD_CHECKSUM_OFFSET + 2]
            .copy_from_slice(&h.payload_checksum.to_le_bytes());
        frame.extend_from_slice(&self.payload);

        let sum = checksum(&frame);
        frame[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].copy_from_slice(&sum.to_le_bytes());
        frame
    }

    /// Parse wire bytes. Length and checksum are validated before any field is read.
    ///
    /// # Errors
    /// - `ProtocolError::Malformed` for short/oversized frames or a bad magic
    /// - `ProtocolError::Checksum` when the frame checksum does not match
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(ProtocolError::Malformed(constants::ERR_SHORT_FRAME.into()));
        }
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::Malformed(
                constants::ERR_OVERSIZED_FRAME.into(),
            ));
        }

        verify_frame_checksum(bytes)?;

        if bytes[..MAGIC_BYTES.len()] != MAGIC_BYTES {
            return Err(ProtocolError::Malformed(constants::ERR_BAD_MAGIC.into()));
        }

        let mut mac = [0u8; 6];
        mac.copy_from_slice(&bytes[MAC_OFFSET..MAC_OFFSET + 6]);
        mac.reverse();

        let header = PacketHeader {
            devtype: read_u16(bytes, DEVTYPE_OFFSET),
            command: read_u16(bytes, COMMAND_OFFSET),
            counter: read_u16(bytes, COUNTER_OFFSET),
            mac,
            device_id: u32::from_le_bytes([
                bytes[DEVICE_ID_OFFSET],
                bytes[DEVICE_ID_OFFSET + 1],
                bytes[DEVICE_ID_OFFSET + 2],
                bytes[DEVICE_ID_OFFSET + 3],
            ]),
            payload_checksum: read_u16(bytes, PAYLOAD_CHECKSUM_OFFSET),
            error_code: read_u16(bytes, ERROR_OFFSET) as i16,
        };

        Ok(Self {
            header,
            payload: bytes[HEADER_LEN..].to_vec(),
        })
    }
}

/// Checksum of a frame with its checksum field treated as zero.
///
/// # Errors
/// `ProtocolError::Malformed` when `bytes` ends before offset 0x22.
pub fn frame_checksum(bytes: &[u8]) -> Result<u16> {
    require_checksum_field(bytes)?;
    Ok(unchecked_frame_checksum(bytes))
}

/// Compare the stored frame checksum at 0x20 with the computed one.
///
/// # Errors
/// `ProtocolError::Malformed` when `bytes` ends before offset 0x22 and
/// `ProtocolError::Checksum` on a mismatch.
pub fn verify_frame_checksum(bytes: &[u8]) -> Result<()> {
    require_checksum_field(bytes)?;
    let expected = read_u16(bytes, CHECKSUM_OFFSET);
    let computed = unchecked_frame_checksum(bytes);
    if expected != computed {
        return Err(ProtocolError::Checksum { expected, computed });
    }
    Ok(())
}

/// Write the frame checksum of `frame` into place.
///
/// # Errors
/// `ProtocolError::Malformed` when `frame` ends before offset 0x22.
pub fn stamp_frame_checksum(frame: &mut [u8]) -> Result<()> {
    require_checksum_field(frame)?;
    stamp_checksum_field(frame);
    Ok(())
}

/// Stamp a frame already known to cover the checksum field.
pub(crate) fn stamp_checksum_field(frame: &mut [u8]) {
    frame[CHECKSUM_OFFSET] = 0;
    frame[CHECKSUM_OFFSET + 1] = 0;
    let sum = checksum(frame);
    frame[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].copy_from_slice(&sum.to_le_bytes());
}

fn unchecked_frame_checksum(bytes: &[u8]) -> u16 {
    checksum(bytes)
        .wrapping_sub(u16::from(bytes[CHECKSUM_OFFSET]))
        .wrapping_sub(u16::from(bytes[CHECKSUM_OFFSET + 1]))
}

fn require_checksum_field(bytes: &[u8]) -> Result<()> {
    if bytes.len() < CHECKSUM_OFFSET + 2 {
        return Err(ProtocolError::Malformed(
            constants::ERR_NO_CHECKSUM_FIELD.into(),
        ));
    }
    Ok(())
}

#[inline]
pub(crate) fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}
