use crate::{command::Command, family::SaveChipFamily};

/// Erase unit of the serial flash family
pub const SECTOR_SIZE: u32 = 0x010000;

/// Bit of the instruction byte carrying address bit 8 on the 512 byte EEPROM
const SMALL_EEPROM_A8_SHIFT: u32 = 3;

/// A 64kB serial flash sector index
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Sector(pub u16);

/// A byte offset in the save chip
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Address(pub u32);

impl Address {
    /// Represents a specific sector in memory.
    pub fn from_sector(sector: Sector) -> Self {
        Address(sector.0 as u32 * SECTOR_SIZE)
    }

    /// Instruction plus address bytes as sent on the wire, and how many of the bytes are used.
    ///
    /// The 512 byte EEPROM has a single address byte and carries bit 8 in the instruction,
    /// the 16 bit parts send two address bytes and serial flash three, most significant first.
    pub(crate) fn frame(self, family: SaveChipFamily, cmd: Command) -> ([u8; 4], usize) {
        let addr = self.0;
        let cmd = cmd as u8;
        match family {
            SaveChipFamily::SmallEeprom => {
                let a8 = ((addr >> 8) & 0x01) as u8;
                ([cmd | a8 << SMALL_EEPROM_A8_SHIFT, addr as u8, 0, 0], 2)
            }
            SaveChipFamily::LargeEeprom => ([cmd, (addr >> 8) as u8, addr as u8, 0], 3),
            SaveChipFamily::SerialFlash => (
                [cmd, (addr >> 16) as u8, (addr >> 8) as u8, addr as u8],
                4,
            ),
            SaveChipFamily::Unknown => ([cmd, 0, 0, 0], 1),
        }
    }
}

impl Sector {
    /// Sector erase instruction with its address bytes.
    ///
    /// The last two address bytes both carry the high byte of the index. This is what shipping
    /// save managers send and is kept as is; for the sector counts of cartridge flash (at most
    /// 128) it equals the plain `index << 16` address.
    pub(crate) fn erase_frame(self) -> [u8; 4] {
        let low = self.0 as u8;
        let high = (self.0 >> 8) as u8;
        [Command::SectorErase as u8, low, high, high]
    }
}

impl From<u16> for Sector {
    fn from(sector_id: u16) -> Sector {
        Sector(sector_id)
    }
}

impl From<u32> for Address {
    fn from(addr: u32) -> Address {
        Address(addr)
    }
}

impl From<Address> for u32 {
    fn from(addr: Address) -> u32 {
        addr.0
    }
}
