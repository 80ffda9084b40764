//! e-Sensor (A1) environment sensor.

use super::{require_len, Capability, Command, Context, Request, Response, SensorReading};
use crate::error::Result;

/// Readings start after a 4-byte echo.
const DATA_OFFSET: usize = 4;
/// Bytes of sensor data covering every field.
const DATA_LEN: usize = 9;

#[derive(Debug)]
pub struct A1Sensor;

pub static A1: A1Sensor = A1Sensor;

impl Capability for A1Sensor {
    fn family(&self) -> &'static str {
        "A1"
    }

    fn supports(&self, command: &Command) -> bool {
        matches!(command, Command::CheckSensors | Command::CheckTemperature)
    }

    fn build(&self, command: &Command, _ctx: &Context<'_>) -> Result<Request> {
        if !self.supports(command) {
            return Err(self.unsupported(command));
        }
        let mut payload = vec![0u8; 16];
        payload[0] = 1;
        Ok(Request::control(payload))
    }

    fn parse(&self, command: &Command, reply: &[u8]) -> Result<Response> {
        require_len(reply, DATA_OFFSET + DATA_LEN)?;
        let d = &reply[DATA_OFFSET..];
        let reading = SensorReading {
            temperature: f32::from(d[0]) + f32::from(d[1]) / 10.0,
            humidity: Some(f32::from(d[2]) + f32::from(d[3]) / 10.0),
            light: Some(d[4]),
            air_quality: Some(d[6]),
            noise: Some(d[8]),
        };
        match command {
            Command::CheckSensors => Ok(Response::Sensors(reading)),
            Command::CheckTemperature => Ok(Response::Temperature(reading.temperature)),
            other => Err(self.unsupported(other)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;

    #[test]
    fn test_check_sensors() {
        let reply = [1, 0, 0, 0, 23, 4, 55, 1, 2, 0, 1, 0, 3, 0, 0, 0];
        let Response::Sensors(r) = A1.parse(&Command::CheckSensors, &reply).unwrap() else {
            panic!("expected sensor reading");
        };
        assert!((r.temperature - 23.4).abs() < 1e-4);
        assert!((r.humidity.unwrap() - 55.1).abs() < 1e-4);
        assert_eq!(r.light, Some(2));
        assert_eq!(r.air_quality, Some(1));
        assert_eq!(r.noise, Some(3));
    }

    #[test]
    fn test_short_reply_is_malformed() {
        let result = A1.parse(&Command::CheckSensors, &[1, 0, 0, 0, 23]);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_rejects_switch_commands() {
        assert!(!A1.supports(&Command::SetPower(true)));
        assert!(A1
            .build(&Command::SetPower(true), &Context { name: "", is_locked: false, prior: None })
            .is_err());
    }
}
