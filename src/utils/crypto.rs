//! Payload encryption and integrity checksum.
//!
//! Devices encrypt the payload region with AES-128 in CBC mode. The IV is a
//! fixed protocol constant and never randomized; the key is the bootstrap key
//! until a handshake installs the device-issued one. Plaintext is padded to
//! the block size with zero bytes before encryption.

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::Zeroize;

use crate::config::{BOOTSTRAP_KEY, CHECKSUM_SEED, PROTOCOL_IV};
use crate::error::{constants, ProtocolError, Result};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Cipher block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Session key length in bytes.
pub const KEY_LEN: usize = 16;

/// Per-session cipher state.
///
/// The key is wiped from memory when the value is dropped or replaced.
#[derive(Clone)]
pub struct Crypto {
    key: [u8; KEY_LEN],
}

impl Crypto {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self { key: *key }
    }

    /// Cipher keyed with the well-known bootstrap key.
    pub fn bootstrap() -> Self {
        Self::new(&BOOTSTRAP_KEY)
    }

    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn is_bootstrap(&self) -> bool {
        self.key == BOOTSTRAP_KEY
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        encrypt(&self.key, &PROTOCOL_IV, plaintext)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        decrypt(&self.key, &PROTOCOL_IV, ciphertext)
    }
}

impl Drop for Crypto {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for Crypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crypto")
            .field("bootstrap", &self.is_bootstrap())
            .finish_non_exhaustive()
    }
}

/// Zero-pad `data` up to the next block boundary.
pub fn pad_to_block(data: &[u8]) -> Vec<u8> {
    let padding = (BLOCK_SIZE - data.len() % BLOCK_SIZE) % BLOCK_SIZE;
    let mut padded = Vec::with_capacity(data.len() + padding);
    padded.extend_from_slice(data);
    padded.resize(data.len() + padding, 0);
    padded
}

/// Encrypt `plaintext`, zero-padding it to the block size first.
pub fn encrypt(key: &[u8; KEY_LEN], iv: &[u8; BLOCK_SIZE], plaintext: &[u8]) -> Vec<u8> {
    let mut buf = pad_to_block(plaintext);
    let len = buf.len();
    let encrypted = Aes128CbcEnc::new(key.into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
        .map(<[u8]>::len);
    // buf is block aligned so NoPadding never fails here
    debug_assert_eq!(encrypted.ok(), Some(len));
    buf
}

/// Decrypt `ciphertext`. The zero padding is returned as part of the plaintext.
///
/// # Errors
/// Returns `ProtocolError::Crypto` if the ciphertext is not block aligned.
pub fn decrypt(key: &[u8; KEY_LEN], iv: &[u8; BLOCK_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(ProtocolError::Crypto(
            constants::ERR_UNALIGNED_CIPHERTEXT.into(),
        ));
    }

    let mut buf = ciphertext.to_vec();
    let len = Aes128CbcDec::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|e| ProtocolError::Crypto(e.to_string()))?
        .len();
    buf.truncate(len);
    Ok(buf)
}

/// 16-bit additive checksum seeded with `0xBEAF`.
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(CHECKSUM_SEED, |acc, &b| acc.wrapping_add(u16::from(b)))
}
