/// Status polls allowed while waiting on a write or erase before giving up.
///
/// A 64kB flash sector erase is the slowest operation, up to a few seconds; at 4MHz one poll
/// is a few microseconds.
pub const DEFAULT_POLL_LIMIT: u32 = 0x0040_0000;

/// What sits in the cartridge slot
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotType {
    /// Plain cartridge, the save chip owns the bus
    #[default]
    Standard,
    /// Cartridge with an infrared transceiver sharing the AUXSPI lines
    Infrared,
}

impl SlotType {
    /// The infrared transceiver has to be silenced before every transaction
    pub fn has_infrared(&self) -> bool {
        matches!(self, SlotType::Infrared)
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub slot: SlotType,
    pub poll_limit: u32,
}

impl Config {
    pub const fn new(slot: SlotType) -> Self {
        Self {
            slot,
            poll_limit: DEFAULT_POLL_LIMIT,
        }
    }

    pub const fn with_poll_limit(mut self, poll_limit: u32) -> Self {
        self.poll_limit = poll_limit;
        self
    }

    /// Whether each transaction phase is preceded by the infrared disable sequence
    pub fn infrared(&self) -> bool {
        self.slot.has_infrared()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(SlotType::Standard)
    }
}
