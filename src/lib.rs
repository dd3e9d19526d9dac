#![cfg_attr(not(test), no_std)]
//! This is a platform agnostic library for the save memory of game cartridges, reached through the
//! auxiliary SPI bus (AUXSPI), using [embedded-hal](https://github.com/rust-embedded/embedded-hal).
//!
//! Three incompatible chip families share the bus and are told apart at runtime from the status
//! register and the JEDEC id:
//! * 512 byte EEPROMs, one address byte with bit 8 folded into the instruction, 16 byte bursts
//! * 8kB/64kB EEPROMs and FRAMs, two address bytes, 32 byte bursts
//! * serial NOR flash from 256kB to 8MB, three address bytes, 256 byte pages and 64kB sector erase
//!
//! [`blocking::AuxSpiSave`] re-detects the family on every call unless it is given explicitly,
//! [`blocking::SaveChip`] caches the detection result and implements the
//! [embedded-storage](https://github.com/rust-embedded-community/embedded-storage) NOR flash traits.
//!
//! The bus itself is abstracted by [`transport::AuxSpi`]; [`transport::HalAuxSpi`] implements it for
//! any `embedded-hal` SPI bus with a chip select pin.

#[macro_use]
mod fmt;

pub mod address;
pub mod blocking;
pub mod capacity;
mod command;
pub mod config;
pub mod error;
pub mod family;
pub mod register;
pub mod transport;

use crate::error::Error;

pub use address::{Address, Sector, SECTOR_SIZE};
pub use blocking::{AuxSpiSave, ChipInfo, SaveChip};
pub use capacity::{ExtraJedecTable, SizeLog2};
pub use config::{Config, SlotType};
pub use family::SaveChipFamily;
pub use register::{JedecId, StatusRegister};
pub use transport::{AuxSpi, Clock, HalAuxSpi};

/// Largest span written at once when zero-filling EEPROM/FRAM
pub const ERASE_FILL_SPAN: u32 = 0x8000;

pub(crate) fn check_range<E>(capacity: u32, offset: u32, length: usize) -> Result<(), Error<E>> {
    let length = u32::try_from(length).map_err(|_| Error::OutOfBounds)?;
    if length > capacity || offset > capacity - length {
        return Err(Error::OutOfBounds);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_checks() {
        assert!(check_range::<()>(512, 0, 512).is_ok());
        assert!(check_range::<()>(512, 511, 1).is_ok());
        assert!(check_range::<()>(512, 512, 0).is_ok());
        assert_eq!(check_range::<()>(512, 511, 2), Err(Error::OutOfBounds));
        assert_eq!(check_range::<()>(512, 0, 513), Err(Error::OutOfBounds));
        assert_eq!(check_range::<()>(512, 600, 0), Err(Error::OutOfBounds));
    }
}
