#![no_main]

use broadlink_protocol::device::{Command, DeviceKind};
use broadlink_protocol::device::kind::known_models;
use broadlink_protocol::protocol::discovery::parse_reply;
use broadlink_protocol::protocol::handshake::parse_auth_reply;
use libfuzzer_sys::fuzz_target;
use std::net::SocketAddr;

const QUERIES: &[Command] = &[
    Command::GetFirmwareVersion,
    Command::CheckData,
    Command::CheckFrequency,
    Command::CheckTemperature,
    Command::CheckSensors,
    Command::CheckPower,
    Command::CheckNightlight,
    Command::GetEnergy,
];

fuzz_target!(|data: &[u8]| {
    let src = SocketAddr::from(([192, 168, 1, 2], 80));
    let _ = parse_reply(data, src);
    let _ = parse_auth_reply(data);

    // Decrypted payloads reach every family parser
    let mut kinds: Vec<DeviceKind> = known_models().iter().map(|m| m.kind).collect();
    kinds.dedup();
    for kind in kinds {
        let capability = kind.capability();
        for query in QUERIES.iter().filter(|q| capability.supports(q)) {
            let _ = capability.parse(query, data);
        }
    }
});
