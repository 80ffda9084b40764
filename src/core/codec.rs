//! Stream framing for the TCP fallback transport.
//!
//! Datagrams delimit frames on UDP. Over a byte stream each frame is
//! prefixed with its length as a big-endian `u16`:
//!
//! ```text
//! [Length(2)] [Frame(N)]
//! ```

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::MAX_FRAME_SIZE;
use crate::error::{constants, ProtocolError, Result};

const LENGTH_PREFIX: usize = 2;

/// Length-prefixed frame codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Vec<u8>;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let len = usize::from(u16::from_be_bytes([src[0], src[1]]));
        if len > MAX_FRAME_SIZE {
            return Err(ProtocolError::Malformed(
                constants::ERR_OVERSIZED_FRAME.into(),
            ));
        }

        if src.len() < LENGTH_PREFIX + len {
            src.reserve(LENGTH_PREFIX + len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX);
        Ok(Some(src.split_to(len).to_vec()))
    }
}

impl Encoder<Vec<u8>> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Vec<u8>, dst: &mut BytesMut) -> Result<()> {
        if frame.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::Malformed(
                constants::ERR_OVERSIZED_FRAME.into(),
            ));
        }
        dst.reserve(LENGTH_PREFIX + frame.len());
        dst.put_u16(frame.len() as u16);
        dst.extend_from_slice(&frame);
        Ok(())
    }
}
