//! Handshake payloads.
//!
//! The client sends command 0x65 encrypted under the bootstrap key with a
//! fixed 0x50-byte payload. The device answers with its control id in the
//! first four bytes of the decrypted payload followed by the 16-byte session
//! key. Building and parsing live here; the state machine lives in
//! [`crate::protocol::session`].

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{constants, ProtocolError, Result};
use crate::utils::crypto::KEY_LEN;

/// Length of the handshake request payload.
pub const AUTH_PAYLOAD_LEN: usize = 0x50;

/// Minimum decrypted reply length: device id plus key.
pub const AUTH_REPLY_MIN_LEN: usize = 4 + KEY_LEN;

/// Client identity announced during the handshake.
const CLIENT_NAME: &[u8] = b"Test 1";

/// Credentials issued by the device.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AuthGrant {
    pub device_id: u32,
    pub key: [u8; KEY_LEN],
}

impl std::fmt::Debug for AuthGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGrant")
            .field("device_id", &format_args!("{:#x}", self.device_id))
            .finish_non_exhaustive()
    }
}

/// Fixed handshake request payload.
pub fn auth_request_payload() -> [u8; AUTH_PAYLOAD_LEN] {
    let mut payload = [0u8; AUTH_PAYLOAD_LEN];
    payload[0x04..0x14].fill(0x31);
    payload[0x1e] = 0x01;
    payload[0x2d] = 0x01;
    payload[0x30..0x30 + CLIENT_NAME.len()].copy_from_slice(CLIENT_NAME);
    payload
}

/// Extract the device id and key from a decrypted handshake reply.
///
/// # Errors
/// Returns `ProtocolError::Authentication` when the reply is too short or
/// carries an all-zero key.
pub fn parse_auth_reply(plaintext: &[u8]) -> Result<AuthGrant> {
    if plaintext.len() < AUTH_REPLY_MIN_LEN {
        return Err(ProtocolError::Authentication(
            constants::ERR_SHORT_AUTH_REPLY.into(),
        ));
    }

    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&plaintext[4..4 + KEY_LEN]);
    if key.iter().all(|&b| b == 0) {
        return Err(ProtocolError::Authentication(
            constants::ERR_AUTH_REJECTED.into(),
        ));
    }

    Ok(AuthGrant {
        device_id: u32::from_le_bytes([plaintext[0], plaintext[1], plaintext[2], plaintext[3]]),
        key,
    })
}
