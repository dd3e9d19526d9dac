//! The byte level AUXSPI primitive the driver is built on.

use embedded_hal::{delay::DelayNs, digital::OutputPin, spi::SpiBus};

/// Wait around the infrared pass-through switch
pub const INFRARED_SETTLE_US: u32 = 600;

/// Chip select release time after a full close
const CLOSE_SETTLE_US: u32 = 1;

/// AUXSPI clock selector, the value written to the baudrate field of the control register
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Clock {
    Mhz4 = 0,
    Mhz2 = 1,
    Mhz1 = 2,
    Khz512 = 3,
}

/// Transaction framing and single byte transfers on the AUXSPI bus.
///
/// A transaction starts with [`AuxSpi::open`] (chip select held low) and ends with either
/// [`AuxSpi::close`] or [`AuxSpi::close_lite`]. The lite variant skips the closing housekeeping
/// and is used when another phase follows right away, e.g. after a write enable.
pub trait AuxSpi {
    type Error;

    /// Assert chip select and start a transaction
    fn open(&mut self, clock: Clock) -> Result<(), Self::Error>;

    /// End the transaction
    fn close(&mut self) -> Result<(), Self::Error>;

    /// End the transaction, another one follows immediately
    fn close_lite(&mut self) -> Result<(), Self::Error>;

    /// Clock a byte out
    fn write_byte(&mut self, value: u8) -> Result<(), Self::Error>;

    /// Clear the data register, clock a zero out and return what came back
    fn read_byte(&mut self) -> Result<u8, Self::Error>;

    /// Spin until the bus finished the current transfer
    fn wait_busy(&mut self) -> Result<(), Self::Error>;

    fn delay_us(&mut self, us: u32);

    /// Force the infrared transceiver of IR cartridges into pass-through so the save chip sees
    /// the next transaction. Chip select is left asserted, the caller opens again right after.
    fn disable_infrared(&mut self) -> Result<(), Self::Error> {
        self.open(Clock::Mhz4)?;
        self.delay_us(INFRARED_SETTLE_US);
        self.open(Clock::Mhz1)?;
        self.write_byte(0x00)?;
        self.delay_us(INFRARED_SETTLE_US);
        Ok(())
    }
}

impl<T: AuxSpi + ?Sized> AuxSpi for &mut T {
    type Error = T::Error;

    fn open(&mut self, clock: Clock) -> Result<(), Self::Error> {
        (**self).open(clock)
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        (**self).close()
    }

    fn close_lite(&mut self) -> Result<(), Self::Error> {
        (**self).close_lite()
    }

    fn write_byte(&mut self, value: u8) -> Result<(), Self::Error> {
        (**self).write_byte(value)
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        (**self).read_byte()
    }

    fn wait_busy(&mut self) -> Result<(), Self::Error> {
        (**self).wait_busy()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn disable_infrared(&mut self) -> Result<(), Self::Error> {
        (**self).disable_infrared()
    }
}

/// Error of the [`HalAuxSpi`] adapter
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum HalError<SpiError, PinError> {
    /// An SPI transfer failed.
    Spi(SpiError),

    /// A GPIO could not be set.
    Pin(PinError),
}

/// [`AuxSpi`] on top of an `embedded-hal` SPI bus and a chip select pin.
///
/// The clock passed to [`AuxSpi::open`] is ignored, configure the bus frequency on the HAL side.
pub struct HalAuxSpi<SPI, CS, D> {
    spi: SPI,
    cs: CS,
    delay: D,
}

impl<SPI, CS, D, SE, PE> HalAuxSpi<SPI, CS, D>
where
    SPI: SpiBus<u8, Error = SE>,
    CS: OutputPin<Error = PE>,
    D: DelayNs,
{
    /// Wrap the bus, chip select is released right away
    pub fn new(spi: SPI, mut cs: CS, delay: D) -> Result<Self, HalError<SE, PE>> {
        cs.set_high().map_err(HalError::Pin)?;
        Ok(Self { spi, cs, delay })
    }

    pub fn release(self) -> (SPI, CS, D) {
        (self.spi, self.cs, self.delay)
    }
}

impl<SPI, CS, D, SE, PE> AuxSpi for HalAuxSpi<SPI, CS, D>
where
    SPI: SpiBus<u8, Error = SE>,
    CS: OutputPin<Error = PE>,
    D: DelayNs,
{
    type Error = HalError<SE, PE>;

    fn open(&mut self, _clock: Clock) -> Result<(), Self::Error> {
        self.cs.set_low().map_err(HalError::Pin)
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.close_lite()?;
        self.delay.delay_us(CLOSE_SETTLE_US);
        Ok(())
    }

    fn close_lite(&mut self) -> Result<(), Self::Error> {
        self.spi.flush().map_err(HalError::Spi)?;
        self.cs.set_high().map_err(HalError::Pin)
    }

    fn write_byte(&mut self, value: u8) -> Result<(), Self::Error> {
        self.spi.write(&[value]).map_err(HalError::Spi)
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let mut buf = [0u8];
        self.spi.transfer_in_place(&mut buf).map_err(HalError::Spi)?;
        Ok(buf[0])
    }

    fn wait_busy(&mut self) -> Result<(), Self::Error> {
        self.spi.flush().map_err(HalError::Spi)
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}
