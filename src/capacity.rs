//! Save chip capacity, expressed as a power of two byte count.

use heapless::Vec;

use crate::register::JedecId;

/// Number of vendor ids the extra JEDEC table can hold
pub const EXTRA_JEDEC_CAPACITY: usize = 16;

/// The 512 byte EEPROM
pub const SMALL_EEPROM_SIZE_LOG2: u8 = 9;
/// An EEPROM/FRAM that mirrors its content every 8kB
pub const ALIASED_EEPROM_SIZE_LOG2: u8 = 13;
/// A full 64kB EEPROM/FRAM
pub const LARGE_EEPROM_SIZE_LOG2: u8 = 16;

/// Largest capacity reachable with three address bytes
pub const MAX_SIZE_LOG2: u8 = 24;

/// Offsets used by the differential aliasing probe, 8kB apart
pub const PROBE_OFFSET_LOW: u32 = 8 * 1024 - 1;
pub const PROBE_OFFSET_HIGH: u32 = 2 * 8 * 1024 - 1;

/// A byte capacity of `1 << self.0`
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SizeLog2(pub u8);

impl SizeLog2 {
    /// Exponents a save chip can have, `1..=MAX_SIZE_LOG2`
    pub const fn is_valid(&self) -> bool {
        self.0 >= 1 && self.0 <= MAX_SIZE_LOG2
    }

    pub const fn bytes(&self) -> u32 {
        1 << self.0
    }

    /// Number of 64kB erase sectors, at least one
    pub const fn sectors(&self) -> u32 {
        if self.0 > 16 {
            1 << (self.0 - 16)
        } else {
            1
        }
    }
}

impl From<SizeLog2> for u8 {
    fn from(size: SizeLog2) -> u8 {
        size.0
    }
}

/// Size of the serial flash chips known to ship on cartridges
pub fn jedec_size_log2(id: JedecId) -> Option<u8> {
    match id.0 {
        // 256kB
        0x204012 | 0x621600 => Some(0x12),
        // 512kB
        0x204013 | 0x621100 => Some(0x13),
        // 1MB
        0x204014 => Some(0x14),
        // 2MB
        0x204015 => Some(0x15),
        // 8MB, Band Brothers DX
        0x202017 | 0x204017 => Some(0x17),
        _ => None,
    }
}

/// Whether the low probe offset shows up 8kB higher: the byte at [`PROBE_OFFSET_HIGH`]
/// changed after writing the complement at [`PROBE_OFFSET_LOW`].
pub fn aliasing_size_log2(high_before: u8, high_after: u8) -> u8 {
    if high_before != high_after {
        ALIASED_EEPROM_SIZE_LOG2
    } else {
        LARGE_EEPROM_SIZE_LOG2
    }
}

/// Vendor specific JEDEC ids, consulted after the built-in table
#[derive(Debug, Clone, Default)]
pub struct ExtraJedecTable {
    entries: Vec<(JedecId, u8), EXTRA_JEDEC_CAPACITY>,
}

impl ExtraJedecTable {
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Add or replace an id. Hands the entry back when the table is full or the size is not a
    /// valid [`SizeLog2`].
    pub fn insert(&mut self, id: JedecId, size_log2: u8) -> Result<(), (JedecId, u8)> {
        if !SizeLog2(size_log2).is_valid() {
            return Err((id, size_log2));
        }
        if let Some(entry) = self.entries.iter_mut().find(|(known, _)| *known == id) {
            entry.1 = size_log2;
            return Ok(());
        }
        self.entries.push((id, size_log2))
    }

    pub fn lookup(&self, id: JedecId) -> Option<u8> {
        self.entries
            .iter()
            .find(|(known, _)| *known == id)
            .map(|(_, size)| *size)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(JedecId, u8)> {
        self.entries.iter()
    }

    /// The built-in table first, then this one
    pub fn resolve(&self, id: JedecId) -> Option<u8> {
        jedec_size_log2(id).or_else(|| self.lookup(id))
    }
}
