#![no_main]

use broadlink_protocol::core::packet::Packet;
use broadlink_protocol::utils::crypto::Crypto;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decoding must reject or accept without panicking; opening must too
    if let Ok(packet) = Packet::from_bytes(data) {
        let _ = packet.open(&Crypto::bootstrap());
    }
});
