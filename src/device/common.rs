//! Commands every device answers: firmware version, name and lock.

use super::{require_len, Capability, Command, Context, Request, Response};
use crate::error::{ProtocolError, Result};

/// Length of the name/lock settings payload.
const SETTINGS_LEN: usize = 0x50;
/// Offset of the name inside the settings payload.
const NAME_OFFSET: usize = 4;
/// Offset of the lock flag inside the settings payload.
const LOCK_OFFSET: usize = 0x43;
/// Longest name that does not overlap the lock flag.
pub const MAX_NAME_LEN: usize = LOCK_OFFSET - NAME_OFFSET;

const FIRMWARE_QUERY: u8 = 0x68;

#[derive(Debug)]
pub struct Generic;

pub static GENERIC: Generic = Generic;

fn settings_payload(name: &str, is_locked: bool) -> Result<Vec<u8>> {
    let name = name.as_bytes();
    if name.len() > MAX_NAME_LEN {
        return Err(ProtocolError::InvalidCommand(format!(
            "name is {} bytes, limit is {MAX_NAME_LEN}",
            name.len()
        )));
    }
    let mut payload = vec![0u8; SETTINGS_LEN];
    payload[NAME_OFFSET..NAME_OFFSET + name.len()].copy_from_slice(name);
    payload[LOCK_OFFSET] = u8::from(is_locked);
    Ok(payload)
}

impl Capability for Generic {
    fn family(&self) -> &'static str {
        "generic"
    }

    fn supports(&self, command: &Command) -> bool {
        command.is_generic()
    }

    fn build(&self, command: &Command, ctx: &Context<'_>) -> Result<Request> {
        let payload = match command {
            Command::GetFirmwareVersion => vec![FIRMWARE_QUERY],
            Command::SetName(name) => settings_payload(name, ctx.is_locked)?,
            Command::SetLock(lock) => settings_payload(ctx.name, *lock)?,
            other => return Err(self.unsupported(other)),
        };
        Ok(Request::control(payload))
    }

    fn parse(&self, command: &Command, reply: &[u8]) -> Result<Response> {
        match command {
            Command::GetFirmwareVersion => {
                require_len(reply, 6)?;
                Ok(Response::Firmware(u16::from_le_bytes([reply[4], reply[5]])))
            }
            Command::SetName(_) | Command::SetLock(_) => Ok(Response::Ack),
            other => Err(self.unsupported(other)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ctx<'a>(name: &'a str, is_locked: bool) -> Context<'a> {
        Context {
            name,
            is_locked,
            prior: None,
        }
    }

    #[test]
    fn test_firmware_round_trip() {
        let request = GENERIC.build(&Command::GetFirmwareVersion, &ctx("", false)).unwrap();
        assert_eq!(request.payload, vec![0x68]);

        let reply = [0, 0, 0, 0, 0x2c, 0x00, 0, 0];
        assert_eq!(
            GENERIC.parse(&Command::GetFirmwareVersion, &reply).unwrap(),
            Response::Firmware(44)
        );
        assert!(GENERIC.parse(&Command::GetFirmwareVersion, &reply[..5]).is_err());
    }

    #[test]
    fn test_set_name_keeps_lock_state() {
        let request = GENERIC
            .build(&Command::SetName("Living room".into()), &ctx("old", true))
            .unwrap();
        assert_eq!(request.payload.len(), SETTINGS_LEN);
        assert_eq!(&request.payload[4..15], b"Living room");
        assert_eq!(request.payload[LOCK_OFFSET], 1);
    }

    #[test]
    fn test_set_lock_keeps_name() {
        let request = GENERIC.build(&Command::SetLock(true), &ctx("Hall", false)).unwrap();
        assert_eq!(&request.payload[4..8], b"Hall");
        assert_eq!(request.payload[LOCK_OFFSET], 1);
    }

    #[test]
    fn test_long_name_rejected() {
        let name = "x".repeat(MAX_NAME_LEN + 1);
        let result = GENERIC.build(&Command::SetName(name), &ctx("", false));
        assert!(matches!(result, Err(ProtocolError::InvalidCommand(_))));
    }
}
