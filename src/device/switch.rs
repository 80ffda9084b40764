//! Smart plugs and power strips.

use super::{require_len, Capability, Command, Context, Request, Response};
use crate::core::packet::command;
use crate::error::{ProtocolError, Result};

const STATE_LEN: usize = 16;
const POWER_BIT: u8 = 0x01;
const NIGHTLIGHT_BIT: u8 = 0x02;

/// First generation plug: one write-only command outside the control channel.
#[derive(Debug)]
pub struct Sp1;

pub static SP1: Sp1 = Sp1;

impl Capability for Sp1 {
    fn family(&self) -> &'static str {
        "SP1"
    }

    fn supports(&self, command: &Command) -> bool {
        matches!(command, Command::SetPower(_))
    }

    fn build(&self, cmd: &Command, _ctx: &Context<'_>) -> Result<Request> {
        match cmd {
            Command::SetPower(on) => Ok(Request {
                command: command::SP1_POWER,
                payload: vec![u8::from(*on), 0, 0, 0],
            }),
            other => Err(self.unsupported(other)),
        }
    }

    fn parse(&self, cmd: &Command, _reply: &[u8]) -> Result<Response> {
        match cmd {
            Command::SetPower(on) => Ok(Response::Power(*on)),
            other => Err(self.unsupported(other)),
        }
    }
}

/// SP2/SP3 plugs. Power and nightlight share one state byte, so each write
/// reads the other half first.
#[derive(Debug)]
pub struct Sp2 {
    family: &'static str,
    energy: bool,
}

pub static SP2: Sp2 = Sp2 {
    family: "SP2",
    energy: false,
};

pub static SP2S: Sp2 = Sp2 {
    family: "SP2S",
    energy: true,
};

const ENERGY_QUERY: [u8; 10] = [8, 0, 254, 1, 5, 1, 0, 0, 0, 45];

fn state_payload(op: u8, state: u8) -> Vec<u8> {
    let mut payload = vec![0u8; STATE_LEN];
    payload[0] = op;
    payload[4] = state;
    payload
}

fn state_byte(power: bool, nightlight: bool) -> u8 {
    let mut state = 0;
    if power {
        state |= POWER_BIT;
    }
    if nightlight {
        state |= NIGHTLIGHT_BIT;
    }
    state
}

/// Decode packed decimal digits, e.g. `0x0123` to `123`.
fn from_bcd(value: u32) -> Result<u32> {
    let mut out = 0;
    for shift in (0..8).rev() {
        let digit = (value >> (shift * 4)) & 0xf;
        if digit > 9 {
            return Err(ProtocolError::Malformed(format!("{value:#x} is not BCD")));
        }
        out = out * 10 + digit;
    }
    Ok(out)
}

impl Capability for Sp2 {
    fn family(&self) -> &'static str {
        self.family
    }

    fn supports(&self, command: &Command) -> bool {
        match command {
            Command::SetPower(_)
            | Command::CheckPower
            | Command::SetNightlight(_)
            | Command::CheckNightlight => true,
            Command::GetEnergy => self.energy,
            _ => false,
        }
    }

    fn prelude(&self, command: &Command) -> Option<Command> {
        match command {
            Command::SetPower(_) => Some(Command::CheckNightlight),
            Command::SetNightlight(_) => Some(Command::CheckPower),
            _ => None,
        }
    }

    fn build(&self, command: &Command, ctx: &Context<'_>) -> Result<Request> {
        let payload = match command {
            Command::CheckPower | Command::CheckNightlight => state_payload(1, 0),
            Command::SetPower(on) => {
                let nightlight = matches!(ctx.prior, Some(Response::Nightlight(true)));
                state_payload(2, state_byte(*on, nightlight))
            }
            Command::SetNightlight(on) => {
                let power = matches!(ctx.prior, Some(Response::Power(true)));
                state_payload(2, state_byte(power, *on))
            }
            Command::GetEnergy if self.energy => ENERGY_QUERY.to_vec(),
            other => return Err(self.unsupported(other)),
        };
        Ok(Request::control(payload))
    }

    fn parse(&self, command: &Command, reply: &[u8]) -> Result<Response> {
        match command {
            Command::CheckPower => {
                require_len(reply, 5)?;
                Ok(Response::Power(matches!(reply[4], 1 | 3 | 0xfd)))
            }
            Command::CheckNightlight => {
                require_len(reply, 5)?;
                Ok(Response::Nightlight(matches!(reply[4], 2 | 3 | 0xff)))
            }
            Command::SetPower(on) => Ok(Response::Power(*on)),
            Command::SetNightlight(on) => Ok(Response::Nightlight(*on)),
            Command::GetEnergy if self.energy => {
                require_len(reply, 8)?;
                let whole = from_bcd(u32::from(u16::from_le_bytes([reply[6], reply[7]])))?;
                let fraction = from_bcd(u32::from(reply[5]))?;
                Ok(Response::Energy(whole as f32 + fraction as f32 / 100.0))
            }
            other => Err(self.unsupported(other)),
        }
    }
}

/// MP1 four-socket power strip.
#[derive(Debug)]
pub struct Mp1;

pub static MP1: Mp1 = Mp1;

const MP1_SOCKETS: u8 = 4;

impl Mp1 {
    fn mask(socket: u8) -> Result<u8> {
        if !(1..=MP1_SOCKETS).contains(&socket) {
            return Err(ProtocolError::InvalidCommand(format!(
                "socket {socket} outside 1..={MP1_SOCKETS}"
            )));
        }
        Ok(1 << (socket - 1))
    }

    fn preamble(op: u8) -> Vec<u8> {
        let mut payload = vec![0u8; STATE_LEN];
        payload[0x00] = op;
        payload[0x02] = 0xa5;
        payload[0x03] = 0xa5;
        payload[0x04] = 0x5a;
        payload[0x05] = 0x5a;
        payload[0x07] = 0xc0;
        payload
    }
}

impl Capability for Mp1 {
    fn family(&self) -> &'static str {
        "MP1"
    }

    fn supports(&self, command: &Command) -> bool {
        matches!(command, Command::SetSocketPower { .. } | Command::CheckPower)
    }

    fn build(&self, command: &Command, _ctx: &Context<'_>) -> Result<Request> {
        let payload = match command {
            Command::SetSocketPower { socket, on } => {
                let mask = Self::mask(*socket)?;
                let mut payload = Self::preamble(0x0d);
                payload[0x06] = 0xb2 + (if *on { mask << 1 } else { mask });
                payload[0x08] = 0x02;
                payload[0x0a] = 0x03;
                payload[0x0d] = mask;
                payload[0x0e] = if *on { mask } else { 0 };
                payload
            }
            Command::CheckPower => {
                let mut payload = Self::preamble(0x0a);
                payload[0x06] = 0xae;
                payload[0x08] = 0x01;
                payload
            }
            other => return Err(self.unsupported(other)),
        };
        Ok(Request::control(payload))
    }

    fn parse(&self, command: &Command, reply: &[u8]) -> Result<Response> {
        match command {
            Command::SetSocketPower { on, .. } => Ok(Response::Power(*on)),
            Command::CheckPower => {
                require_len(reply, 0x0f)?;
                let bits = reply[0x0e];
                let mut sockets = [false; MP1_SOCKETS as usize];
                for (i, socket) in sockets.iter_mut().enumerate() {
                    *socket = bits & (1 << i) != 0;
                }
                Ok(Response::Sockets(sockets))
            }
            other => Err(self.unsupported(other)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ctx(prior: Option<&Response>) -> Context<'_> {
        Context {
            name: "",
            is_locked: false,
            prior,
        }
    }

    #[test]
    fn test_sp1_power() {
        let request = SP1.build(&Command::SetPower(true), &ctx(None)).unwrap();
        assert_eq!(request.command, command::SP1_POWER);
        assert_eq!(request.payload, vec![1, 0, 0, 0]);
        assert!(!SP1.supports(&Command::CheckPower));
    }

    #[test]
    fn test_sp2_set_power_keeps_nightlight() {
        assert_eq!(SP2.prelude(&Command::SetPower(true)), Some(Command::CheckNightlight));

        let lit = Response::Nightlight(true);
        let request = SP2.build(&Command::SetPower(true), &ctx(Some(&lit))).unwrap();
        assert_eq!(request.payload[0], 2);
        assert_eq!(request.payload[4], 3);

        let dark = Response::Nightlight(false);
        let request = SP2.build(&Command::SetPower(false), &ctx(Some(&dark))).unwrap();
        assert_eq!(request.payload[4], 0);
    }

    #[test]
    fn test_sp2_set_nightlight_keeps_power() {
        let on = Response::Power(true);
        let request = SP2.build(&Command::SetNightlight(false), &ctx(Some(&on))).unwrap();
        assert_eq!(request.payload[4], 1);
    }

    #[test]
    fn test_sp2_check_states() {
        let mut reply = [0u8; 16];
        reply[4] = 3;
        assert_eq!(SP2.parse(&Command::CheckPower, &reply).unwrap(), Response::Power(true));
        assert_eq!(
            SP2.parse(&Command::CheckNightlight, &reply).unwrap(),
            Response::Nightlight(true)
        );
        reply[4] = 0xfd;
        assert_eq!(SP2.parse(&Command::CheckPower, &reply).unwrap(), Response::Power(true));
        assert_eq!(
            SP2.parse(&Command::CheckNightlight, &reply).unwrap(),
            Response::Nightlight(false)
        );
    }

    #[test]
    fn test_energy_only_on_metering_plugs() {
        assert!(!SP2.supports(&Command::GetEnergy));
        assert!(SP2S.supports(&Command::GetEnergy));

        let request = SP2S.build(&Command::GetEnergy, &ctx(None)).unwrap();
        assert_eq!(request.payload, ENERGY_QUERY.to_vec());

        // 0x0123 watts and 0x45 hundredths
        let reply = [0, 0, 0, 0, 0, 0x45, 0x23, 0x01];
        let Response::Energy(watts) = SP2S.parse(&Command::GetEnergy, &reply).unwrap() else {
            panic!("expected energy");
        };
        assert!((watts - 123.45).abs() < 1e-3);
    }

    #[test]
    fn test_bcd_rejects_hex_digits() {
        assert_eq!(from_bcd(0x1234).unwrap(), 1234);
        assert!(from_bcd(0x1a).is_err());
    }

    #[test]
    fn test_mp1_set_socket() {
        let request = MP1
            .build(&Command::SetSocketPower { socket: 2, on: true }, &ctx(None))
            .unwrap();
        let p = request.payload;
        assert_eq!(p[0x00], 0x0d);
        assert_eq!(&p[0x02..0x06], &[0xa5, 0xa5, 0x5a, 0x5a]);
        assert_eq!(p[0x06], 0xb2 + 4);
        assert_eq!(p[0x0d], 2);
        assert_eq!(p[0x0e], 2);

        let result = MP1.build(&Command::SetSocketPower { socket: 5, on: true }, &ctx(None));
        assert!(matches!(result, Err(ProtocolError::InvalidCommand(_))));
    }

    #[test]
    fn test_mp1_check_power() {
        let mut reply = [0u8; 16];
        reply[0x0e] = 0b0101;
        assert_eq!(
            MP1.parse(&Command::CheckPower, &reply).unwrap(),
            Response::Sockets([true, false, true, false])
        );
    }
}
