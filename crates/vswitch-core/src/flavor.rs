//! Switch flavors.
//!
//! ASIC families are a closed set of variants carrying the handful of
//! capabilities that actually differ. Everything else is common code.

use std::fmt;
use std::str::FromStr;

use vswitch_types::VswitchError;

/// Supported switch hardware families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchFlavor {
    /// Broadcom Tomahawk-class NPU.
    Bcm56850,
    /// Broadcom Jericho2-class NPU (fabric-capable).
    Bcm56971B0,
    /// Broadcom PHY; no forwarding database at all.
    Bcm81724,
    /// Mellanox Spectrum-class NPU.
    Mlnx2700,
}

impl SwitchFlavor {
    pub fn default_port_count(&self) -> u32 {
        match self {
            SwitchFlavor::Bcm56850 => 32,
            SwitchFlavor::Bcm56971B0 => 32,
            SwitchFlavor::Bcm81724 => 8,
            SwitchFlavor::Mlnx2700 => 32,
        }
    }

    pub fn queues_per_port(&self) -> u32 {
        match self {
            SwitchFlavor::Bcm56850 | SwitchFlavor::Bcm56971B0 => 10,
            SwitchFlavor::Bcm81724 => 0,
            SwitchFlavor::Mlnx2700 => 8,
        }
    }

    /// PHY-only devices never learn MACs; the FDB engine skips their
    /// frames entirely.
    pub fn supports_mac_learning(&self) -> bool {
        !matches!(self, SwitchFlavor::Bcm81724)
    }

    /// Seed value for `SWITCH_FDB_AGING_TIME` at switch create; 0 means
    /// aging disabled until the management client sets it.
    pub fn default_fdb_aging_secs(&self) -> u32 {
        match self {
            SwitchFlavor::Bcm81724 => 0,
            _ => 600,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SwitchFlavor::Bcm56850 => "BCM56850",
            SwitchFlavor::Bcm56971B0 => "BCM56971B0",
            SwitchFlavor::Bcm81724 => "BCM81724",
            SwitchFlavor::Mlnx2700 => "MLNX2700",
        }
    }
}

impl fmt::Display for SwitchFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SwitchFlavor {
    type Err = VswitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BCM56850" => Ok(SwitchFlavor::Bcm56850),
            "BCM56971B0" => Ok(SwitchFlavor::Bcm56971B0),
            "BCM81724" => Ok(SwitchFlavor::Bcm81724),
            "MLNX2700" => Ok(SwitchFlavor::Mlnx2700),
            _ => Err(VswitchError::InvalidArgument(format!("unknown switch flavor: {s}"))),
        }
    }
}
