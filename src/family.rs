use core::fmt;

use crate::register::{JedecId, StatusRegister};

/// Idle status pattern of the small 512 byte EEPROMs
const SMALL_EEPROM_IDLE: u8 = 0xF0;

/// Save chip families found behind AUXSPI. The discriminants are the historical type codes.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SaveChipFamily {
    /// Nothing answered, or the answer matched no supported chip
    Unknown = 0,
    /// 512 byte EEPROM, address bit 8 folded into the instruction
    SmallEeprom = 1,
    /// 8kB/64kB EEPROM or FRAM with 16 bit addresses
    LargeEeprom = 2,
    /// Serial NOR flash with 24 bit addresses and a JEDEC id
    SerialFlash = 3,
}

impl SaveChipFamily {
    /// Decide the family from a status register read and a JEDEC id read.
    ///
    /// EEPROM and FRAM parts ignore 0x9F and leave the bus at all ones; only the small EEPROM
    /// has extra status bits set while idle.
    pub fn identify(status: StatusRegister, jedec: JedecId) -> Self {
        match (status.identification_bits(), jedec.is_absent()) {
            (SMALL_EEPROM_IDLE, true) => SaveChipFamily::SmallEeprom,
            (0x00, true) => SaveChipFamily::LargeEeprom,
            (0x00, false) => SaveChipFamily::SerialFlash,
            // TODO: the 8MB flash of Band Brothers DX reports a status we do not recognize yet
            _ => SaveChipFamily::Unknown,
        }
    }

    /// Maximum bytes accepted by one write instruction
    pub const fn write_burst(&self) -> usize {
        match self {
            SaveChipFamily::SmallEeprom => 16,
            SaveChipFamily::LargeEeprom => 32,
            SaveChipFamily::SerialFlash => 256,
            SaveChipFamily::Unknown => 0,
        }
    }

    /// Number of address bytes sent after the instruction
    pub const fn address_bytes(&self) -> usize {
        match self {
            SaveChipFamily::SmallEeprom => 1,
            SaveChipFamily::LargeEeprom => 2,
            SaveChipFamily::SerialFlash => 3,
            SaveChipFamily::Unknown => 0,
        }
    }

    /// Size of the address space reachable by the wire encoding
    pub const fn address_space(&self) -> u32 {
        match self {
            SaveChipFamily::SmallEeprom => 1 << 9,
            SaveChipFamily::LargeEeprom => 1 << 16,
            SaveChipFamily::SerialFlash => 1 << 24,
            SaveChipFamily::Unknown => 0,
        }
    }

    /// Only serial flash has a hardware sector erase
    pub const fn has_sector_erase(&self) -> bool {
        matches!(self, SaveChipFamily::SerialFlash)
    }

    pub const fn is_known(&self) -> bool {
        !matches!(self, SaveChipFamily::Unknown)
    }
}

impl From<SaveChipFamily> for u8 {
    fn from(family: SaveChipFamily) -> u8 {
        family as u8
    }
}

impl From<u8> for SaveChipFamily {
    fn from(val: u8) -> SaveChipFamily {
        match val {
            1 => SaveChipFamily::SmallEeprom,
            2 => SaveChipFamily::LargeEeprom,
            3 => SaveChipFamily::SerialFlash,
            _ => SaveChipFamily::Unknown,
        }
    }
}

impl fmt::Display for SaveChipFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SaveChipFamily::Unknown => "unknown",
            SaveChipFamily::SmallEeprom => "EEPROM (512B)",
            SaveChipFamily::LargeEeprom => "EEPROM/FRAM",
            SaveChipFamily::SerialFlash => "serial flash",
        };
        f.write_str(name)
    }
}
