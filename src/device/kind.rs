//! Device-type identifiers.
//!
//! Every identifier a device can report is listed explicitly. Families that
//! look alike on paper still get their own entry, since per-type payload
//! quirks are not guessable from the number.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::remote::{RM4_MINI, RM4_PRO, RM_MINI, RM_MINI_B, RM_PRO};
use super::sensor::A1 as A1_SENSOR;
use super::switch::{MP1, SP1, SP2, SP2S};
use super::{common::GENERIC, Capability};

/// Device family selected by the device-type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// First generation smart plug
    Sp1,
    /// SP2 / SP mini / SP3 plugs
    Sp2,
    /// SP3S plugs with energy metering
    Sp2s,
    /// RM mini IR remotes
    RmMini,
    /// RM pro / plus IR+RF remotes
    RmPro,
    /// RM mini 3 with length-prefixed framing
    RmMiniB,
    /// RM4 mini / RM4C mini
    Rm4Mini,
    /// RM4 pro
    Rm4Pro,
    /// e-Sensor environment sensor
    A1,
    /// MP1 power strip
    Mp1,
    /// Identifier not in the table; only generic commands are available
    Unknown,
}

impl DeviceKind {
    pub fn from_devtype(devtype: u16) -> Self {
        lookup(devtype).map_or(DeviceKind::Unknown, |m| m.kind)
    }

    /// Command set for this family.
    pub fn capability(self) -> &'static dyn Capability {
        match self {
            DeviceKind::Sp1 => &SP1,
            DeviceKind::Sp2 => &SP2,
            DeviceKind::Sp2s => &SP2S,
            DeviceKind::RmMini => &RM_MINI,
            DeviceKind::RmPro => &RM_PRO,
            DeviceKind::RmMiniB => &RM_MINI_B,
            DeviceKind::Rm4Mini => &RM4_MINI,
            DeviceKind::Rm4Pro => &RM4_PRO,
            DeviceKind::A1 => &A1_SENSOR,
            DeviceKind::Mp1 => &MP1,
            DeviceKind::Unknown => &GENERIC,
        }
    }

    pub fn is_known(self) -> bool {
        self != DeviceKind::Unknown
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.capability().family())
    }
}

/// One row of the device-type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceModel {
    pub devtype: u16,
    pub kind: DeviceKind,
    pub model: &'static str,
    pub manufacturer: &'static str,
}

const fn m(devtype: u16, kind: DeviceKind, model: &'static str, manufacturer: &'static str) -> DeviceModel {
    DeviceModel {
        devtype,
        kind,
        model,
        manufacturer,
    }
}

use DeviceKind::*;

static DEVICE_TYPES: &[DeviceModel] = &[
    m(0x0000, Sp1, "SP1", "Broadlink"),
    m(0x2711, Sp2, "SP2", "Broadlink"),
    m(0x2716, Sp2, "NEO PRO", "Ankuoo"),
    m(0x2717, Sp2, "NEO", "Ankuoo"),
    m(0x2719, Sp2, "SP2-compatible", "Honeywell"),
    m(0x271a, Sp2, "SP2-compatible", "Honeywell"),
    m(0x2720, Sp2, "SP mini", "Broadlink"),
    m(0x2728, Sp2, "SP2-compatible", "URANT"),
    m(0x273e, Sp2, "SP mini", "Broadlink"),
    m(0x7530, Sp2, "SP2", "Broadlink (OEM)"),
    m(0x7539, Sp2, "SP2-IL", "Broadlink (OEM)"),
    m(0x753e, Sp2, "SP mini 3", "Broadlink"),
    m(0x7540, Sp2, "MP2", "Broadlink"),
    m(0x7544, Sp2, "SP2-CL", "Broadlink"),
    m(0x7546, Sp2, "SP2-UK/BR/IN", "Broadlink (OEM)"),
    m(0x7547, Sp2, "SC1", "Broadlink"),
    m(0x7918, Sp2, "SP2", "Broadlink (OEM)"),
    m(0x7919, Sp2, "SP2-compatible", "Honeywell"),
    m(0x791a, Sp2, "SP2-compatible", "Honeywell"),
    m(0x7d0d, Sp2, "SP mini 3", "Broadlink (OEM)"),
    m(0x9479, Sp2s, "SP3S-EU", "Broadlink"),
    m(0x947a, Sp2s, "SP3S-US", "Broadlink"),
    m(0x2737, RmMini, "RM mini 3", "Broadlink"),
    m(0x278f, RmMini, "RM mini", "Broadlink"),
    m(0x27c2, RmMini, "RM mini 3", "Broadlink"),
    m(0x27c7, RmMini, "RM mini 3", "Broadlink"),
    m(0x27cc, RmMini, "RM mini 3", "Broadlink"),
    m(0x27cd, RmMini, "RM mini 3", "Broadlink (OEM)"),
    m(0x27d0, RmMini, "RM mini 3", "Broadlink"),
    m(0x27d1, RmMini, "RM mini 3", "Broadlink"),
    m(0x27de, RmMini, "RM mini 3", "Broadlink"),
    m(0x272a, RmPro, "RM pro", "Broadlink"),
    m(0x2787, RmPro, "RM pro", "Broadlink"),
    m(0x279d, RmPro, "RM pro+", "Broadlink"),
    m(0x27a1, RmPro, "RM plus", "Broadlink"),
    m(0x27a6, RmPro, "RM plus", "Broadlink"),
    m(0x27a9, RmPro, "RM pro+", "Broadlink"),
    m(0x27c3, RmPro, "RM pro+", "Broadlink"),
    m(0x5f36, RmMiniB, "RM mini 3", "Broadlink"),
    m(0x6508, RmMiniB, "RM mini 3", "Broadlink"),
    m(0x51da, Rm4Mini, "RM4 mini", "Broadlink"),
    m(0x5209, Rm4Mini, "RM4 TV mate", "Broadlink"),
    m(0x6070, Rm4Mini, "RM4C mini", "Broadlink"),
    m(0x610e, Rm4Mini, "RM4 mini", "Broadlink"),
    m(0x610f, Rm4Mini, "RM4C mini", "Broadlink"),
    m(0x62bc, Rm4Mini, "RM4 mini", "Broadlink"),
    m(0x62be, Rm4Mini, "RM4C mini", "Broadlink"),
    m(0x6364, Rm4Mini, "RM4S", "Broadlink"),
    m(0x648d, Rm4Mini, "RM4 mini", "Broadlink"),
    m(0x6539, Rm4Mini, "RM4C mini", "Broadlink"),
    m(0x653a, Rm4Mini, "RM4 mini", "Broadlink"),
    m(0x6026, Rm4Pro, "RM4 pro", "Broadlink"),
    m(0x61a2, Rm4Pro, "RM4 pro", "Broadlink"),
    m(0x649b, Rm4Pro, "RM4 pro", "Broadlink"),
    m(0x653c, Rm4Pro, "RM4 pro", "Broadlink"),
    m(0x2714, A1, "e-Sensor", "Broadlink"),
    m(0x4eb5, Mp1, "MP1-1K4S", "Broadlink"),
    m(0x4ef7, Mp1, "MP1-1K4S", "Broadlink (OEM)"),
    m(0x4f1b, Mp1, "MP1-1K3S2U", "Broadlink (OEM)"),
    m(0x4f65, Mp1, "MP1-1K3S2U", "Broadlink"),
];

/// Find the table entry for `devtype`.
pub fn lookup(devtype: u16) -> Option<&'static DeviceModel> {
    DEVICE_TYPES.iter().find(|m| m.devtype == devtype)
}

/// All known device types.
pub fn known_models() -> &'static [DeviceModel] {
    DEVICE_TYPES
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_lookup() {
        assert_eq!(DeviceKind::from_devtype(0x2737), DeviceKind::RmMini);
        assert_eq!(DeviceKind::from_devtype(0x649b), DeviceKind::Rm4Pro);
        assert_eq!(DeviceKind::from_devtype(0x2714), DeviceKind::A1);
        assert_eq!(DeviceKind::from_devtype(0x0000), DeviceKind::Sp1);
        assert_eq!(DeviceKind::from_devtype(0xbeef), DeviceKind::Unknown);
        assert!(lookup(0xbeef).is_none());
    }

    #[test]
    fn test_table_has_no_duplicate_ids() {
        let mut seen = HashSet::new();
        for model in known_models() {
            assert!(seen.insert(model.devtype), "duplicate {:#06x}", model.devtype);
            assert!(model.kind.is_known());
        }
    }

    #[test]
    fn test_display_uses_family_name() {
        assert_eq!(DeviceKind::Rm4Mini.to_string(), "RM4 mini");
        assert_eq!(DeviceKind::Unknown.to_string(), "generic");
    }
}
