//! Property-based tests using proptest
//!
//! Framing and encryption invariants over randomly generated headers,
//! payloads and keys.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use broadlink_protocol::core::packet::{Packet, PacketHeader, HEADER_LEN};
use broadlink_protocol::device::kind::known_models;
use broadlink_protocol::device::{Command, DeviceKind};
use broadlink_protocol::error::ProtocolError;
use broadlink_protocol::utils::crypto::{pad_to_block, Crypto, BLOCK_SIZE};
use proptest::prelude::*;

fn header_strategy() -> impl Strategy<Value = PacketHeader> {
    (any::<u16>(), any::<u16>(), 0x8000u16.., any::<[u8; 6]>(), any::<u32>()).prop_map(
        |(devtype, command, counter, mac, device_id)| PacketHeader {
            devtype,
            command,
            counter,
            mac,
            device_id,
            ..Default::default()
        },
    )
}

// Property: a sealed packet decodes to the same header and plaintext
proptest! {
    #[test]
    fn prop_seal_open_roundtrip(
        header in header_strategy(),
        key in any::<[u8; 16]>(),
        payload in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let crypto = Crypto::new(&key);
        let bytes = Packet::seal(header, &payload, &crypto).to_bytes();
        prop_assert_eq!(bytes.len(), HEADER_LEN + pad_to_block(&payload).len());

        let decoded = Packet::from_bytes(&bytes).expect("valid frame");
        prop_assert_eq!(decoded.header.devtype, header.devtype);
        prop_assert_eq!(decoded.header.counter, header.counter);
        prop_assert_eq!(decoded.header.mac, header.mac);
        prop_assert_eq!(decoded.header.device_id, header.device_id);

        let plaintext = decoded.open(&crypto).expect("same key");
        prop_assert_eq!(&plaintext[..payload.len()], payload.as_slice());
        prop_assert!(plaintext[payload.len()..].iter().all(|&b| b == 0));
    }
}

// Property: any single flipped bit is caught before decryption
proptest! {
    #[test]
    fn prop_bit_flip_rejected(
        header in header_strategy(),
        payload in prop::collection::vec(any::<u8>(), 1..128),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut bytes = Packet::seal(header, &payload, &Crypto::bootstrap()).to_bytes();
        let at = index.index(bytes.len());
        bytes[at] ^= 1 << bit;

        let result = Packet::from_bytes(&bytes);
        prop_assert!(
            matches!(result, Err(ProtocolError::Checksum { .. }) | Err(ProtocolError::Malformed(_))),
            "flip at {} accepted", at
        );
    }
}

// Property: decoding arbitrary bytes never panics
proptest! {
    #[test]
    fn prop_from_bytes_total(bytes in prop::collection::vec(any::<u8>(), 0..1024)) {
        let _ = Packet::from_bytes(&bytes);
    }
}

// Property: ciphertext is always block aligned
proptest! {
    #[test]
    fn prop_ciphertext_aligned(payload in prop::collection::vec(any::<u8>(), 0..300)) {
        let ciphertext = Crypto::bootstrap().encrypt(&payload);
        prop_assert_eq!(ciphertext.len() % BLOCK_SIZE, 0);
        prop_assert!(ciphertext.len() >= payload.len());
    }
}

// Property: a different key never opens a packet silently
proptest! {
    #[test]
    fn prop_wrong_key_detected(
        key in any::<[u8; 16]>(),
        other in any::<[u8; 16]>(),
        payload in prop::collection::vec(1u8.., 16..64),
    ) {
        prop_assume!(key != other);
        let bytes = Packet::seal(PacketHeader::default(), &payload, &Crypto::new(&key)).to_bytes();
        let packet = Packet::from_bytes(&bytes).unwrap();
        match packet.open(&Crypto::new(&other)) {
            Err(ProtocolError::Crypto(_)) => {}
            // a 16-bit checksum collides now and then; the bytes must still differ
            Ok(plaintext) => prop_assert_ne!(&plaintext[..payload.len()], payload.as_slice()),
            Err(e) => prop_assert!(false, "unexpected error {e}"),
        }
    }
}

// Property: only listed ids resolve to a family
proptest! {
    #[test]
    fn prop_unlisted_ids_are_unknown(devtype in any::<u16>()) {
        let listed = known_models().iter().any(|m| m.devtype == devtype);
        let kind = DeviceKind::from_devtype(devtype);
        prop_assert_eq!(listed, kind.is_known());
        // family tables leave the shared commands to the generic handler
        prop_assert_eq!(
            kind.capability().supports(&Command::GetFirmwareVersion),
            kind == DeviceKind::Unknown
        );
    }
}
