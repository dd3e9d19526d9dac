use bit::BitIndex;

/// Status register bits ignored when identifying the chip family (the write enable latch)
pub const STATUS_ID_MASK: u8 = 0xFD;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRegister {
    pub raw: u8,
    pub write_enable_latch: bool,
    pub wip_bit: bool,
}

impl StatusRegister {
    /// The status value with the write enable latch masked out, as used by family detection
    pub fn identification_bits(&self) -> u8 {
        self.raw & STATUS_ID_MASK
    }
}

impl From<u8> for StatusRegister {
    fn from(val: u8) -> StatusRegister {
        StatusRegister {
            raw: val,
            write_enable_latch: val.bit(1),
            wip_bit: val.bit(0),
        }
    }
}

/// The 24 bit JEDEC identification, manufacturer in the top byte
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JedecId(pub u32);

impl JedecId {
    /// What a chip without the 0x9F instruction leaves on the pulled-up bus
    pub const ABSENT: JedecId = JedecId(0x00FF_FFFF);

    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        JedecId((bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[2] as u32)
    }

    pub fn manufacturer(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn device(&self) -> u16 {
        self.0 as u16
    }

    pub fn is_absent(&self) -> bool {
        *self == Self::ABSENT
    }
}

impl From<JedecId> for u32 {
    fn from(id: JedecId) -> u32 {
        id.0
    }
}
