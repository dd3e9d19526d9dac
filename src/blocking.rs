use core::cmp::min;

use crate::{
    address::{Address, Sector, SECTOR_SIZE},
    capacity::{
        aliasing_size_log2, ExtraJedecTable, SizeLog2, PROBE_OFFSET_HIGH, PROBE_OFFSET_LOW,
        SMALL_EEPROM_SIZE_LOG2,
    },
    check_range,
    command::Command,
    config::Config,
    error::Error,
    family::SaveChipFamily,
    register::{JedecId, StatusRegister},
    transport::{AuxSpi, Clock},
    ERASE_FILL_SPAN,
};

/// Fill sources for EEPROM/FRAM, a multiple of every EEPROM burst size
static ZEROES: [u8; 256] = [0x00; 256];
static ONES: [u8; 256] = [0xFF; 256];

/// The low level AUXSPI save chip driver, one method per bus transaction
pub struct AuxSpiLowLevel<B> {
    bus: B,
    infrared: bool,
}

impl<B, E> AuxSpiLowLevel<B>
where
    B: AuxSpi<Error = E>,
{
    pub fn new(bus: B, infrared: bool) -> Self {
        Self { bus, infrared }
    }

    pub fn release(self) -> B {
        self.bus
    }

    /// Issue the infrared disable sequence before every transaction
    pub fn set_infrared(&mut self, infrared: bool) {
        self.infrared = infrared;
    }

    pub fn infrared(&self) -> bool {
        self.infrared
    }

    fn begin(&mut self) -> Result<(), Error<E>> {
        if self.infrared {
            self.bus.disable_infrared().map_err(Error::Transport)?;
        }
        self.bus.open(Clock::Mhz4).map_err(Error::Transport)
    }

    /// Closes the transaction even when the body failed, the first error is reported
    fn finish<T>(&mut self, res: Result<T, E>) -> Result<T, Error<E>> {
        let closed = self.bus.close();
        let value = res.map_err(Error::Transport)?;
        closed.map_err(Error::Transport)?;
        Ok(value)
    }

    fn finish_lite<T>(&mut self, res: Result<T, E>) -> Result<T, Error<E>> {
        let closed = self.bus.close_lite();
        let value = res.map_err(Error::Transport)?;
        closed.map_err(Error::Transport)?;
        Ok(value)
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), E> {
        for byte in bytes {
            self.bus.write_byte(*byte)?;
        }
        Ok(())
    }

    fn send_then_receive(&mut self, bytes: &[u8], buff: &mut [u8]) -> Result<(), E> {
        self.send(bytes)?;
        for slot in buff.iter_mut() {
            *slot = self.bus.read_byte()?;
        }
        Ok(())
    }

    /// Read the JEDEC identification
    pub fn read_identification(&mut self) -> Result<JedecId, Error<E>> {
        let mut id = [0u8; 3];
        self.begin()?;
        let res = self.send_then_receive(&[Command::ReadIdentification as u8], &mut id);
        self.finish(res)?;
        Ok(JedecId::from_bytes(id))
    }

    /// Read the status register
    pub fn read_status(&mut self) -> Result<StatusRegister, Error<E>> {
        let mut status = [0u8];
        self.begin()?;
        let res = self.send_then_receive(&[Command::ReadStatus as u8], &mut status);
        self.finish(res)?;
        Ok(status[0].into())
    }

    /// Read n bytes from an address in a single transaction
    pub fn read(
        &mut self,
        family: SaveChipFamily,
        addr: Address,
        buff: &mut [u8],
    ) -> Result<(), Error<E>> {
        let (frame, len) = addr.frame(family, Command::Read);
        self.begin()?;
        let res = self.send_then_receive(&frame[..len], buff);
        self.finish(res)
    }

    /// Set the write enable latch
    pub fn write_enable(&mut self) -> Result<(), Error<E>> {
        self.begin()?;
        let res = self.send(&[Command::WriteEnable as u8]);
        self.finish_lite(res)
    }

    /// Send one write instruction. Write must be enabled, see `write_enable`, and `buff` must
    /// not exceed the family's burst size.
    pub fn write_burst(
        &mut self,
        family: SaveChipFamily,
        addr: Address,
        buff: &[u8],
    ) -> Result<(), Error<E>> {
        let (frame, len) = addr.frame(family, Command::Write);
        self.begin()?;
        let res = self.send(&frame[..len]).and_then(|()| self.send(buff));
        self.finish_lite(res)
    }

    /// Erase a 64kB serial flash sector. Write must be enabled, see `write_enable`
    pub fn sector_erase(&mut self, sector: Sector) -> Result<(), Error<E>> {
        self.begin()?;
        let res = self.send(&sector.erase_frame());
        self.finish_lite(res)
    }

    /// Poll the status register until the write in progress bit clears, at most `poll_limit`
    /// times
    pub fn wait_wip(&mut self, poll_limit: u32) -> Result<(), Error<E>> {
        self.begin()?;
        let res = self
            .send(&[Command::ReadStatus as u8])
            .and_then(|()| self.poll_wip(poll_limit))
            .and_then(|cleared| self.bus.wait_busy().map(|()| cleared));
        if !self.finish(res)? {
            warn!("save chip still busy after {} status polls", poll_limit);
            return Err(Error::Timeout);
        }
        Ok(())
    }

    fn poll_wip(&mut self, poll_limit: u32) -> Result<bool, E> {
        for _ in 0..poll_limit {
            let status = StatusRegister::from(self.bus.read_byte()?);
            self.bus.wait_busy()?;
            if !status.wip_bit {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// What a probe found behind the bus
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipInfo {
    pub family: SaveChipFamily,
    pub jedec: JedecId,
    pub status: StatusRegister,
    pub size: SizeLog2,
}

impl ChipInfo {
    pub fn capacity(&self) -> u32 {
        self.size.bytes()
    }
}

/// The save memory driver. Every operation probes the chip family first unless one is passed
/// in, so a swapped cartridge is picked up on the next call.
///
/// Operations must not be interleaved with other users of the bus; capacity detection of the
/// 16 bit EEPROM/FRAM parts writes to the chip and restores the byte afterwards.
pub struct AuxSpiSave<B> {
    ll: AuxSpiLowLevel<B>,
    config: Config,
    extra: ExtraJedecTable,
}

impl<B, E> AuxSpiSave<B>
where
    B: AuxSpi<Error = E>,
{
    /// Create a new instance
    pub fn new(bus: B, config: Config) -> Self {
        Self {
            ll: AuxSpiLowLevel::new(bus, config.infrared()),
            config,
            extra: ExtraJedecTable::new(),
        }
    }

    pub fn release(self) -> B {
        self.ll.release()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_config(&mut self, config: Config) {
        self.ll.set_infrared(config.infrared());
        self.config = config;
    }

    /// Whether the configured slot needs the infrared transceiver silenced
    pub fn has_infrared(&self) -> bool {
        self.config.slot.has_infrared()
    }

    /// Access to the per transaction driver
    pub fn low_level(&mut self) -> &mut AuxSpiLowLevel<B> {
        &mut self.ll
    }

    pub fn extra_jedec(&self) -> &ExtraJedecTable {
        &self.extra
    }

    /// Teach the driver the size of a serial flash missing from the built-in table. The
    /// exponent must be within `1..=24`.
    pub fn register_jedec(&mut self, id: JedecId, size_log2: u8) -> Result<(), Error<E>> {
        if !SizeLog2(size_log2).is_valid() {
            return Err(Error::InvalidSize(size_log2));
        }
        self.extra
            .insert(id, size_log2)
            .map_err(|_| Error::TableFull)
    }

    pub fn read_jedec_id(&mut self) -> Result<JedecId, Error<E>> {
        self.ll.read_identification()
    }

    pub fn read_status(&mut self) -> Result<StatusRegister, Error<E>> {
        self.ll.read_status()
    }

    /// Identify the chip family. [`SaveChipFamily::Unknown`] is a valid answer here.
    pub fn detect_family(&mut self) -> Result<SaveChipFamily, Error<E>> {
        self.identify().map(|(family, _, _)| family)
    }

    fn identify(&mut self) -> Result<(SaveChipFamily, JedecId, StatusRegister), Error<E>> {
        let jedec = self.ll.read_identification()?;
        let status = self.ll.read_status()?;
        let family = SaveChipFamily::identify(status, jedec);
        debug!("status {:#x}, jedec {:#x}: {}", status.raw, jedec.0, family);
        Ok((family, jedec, status))
    }

    fn resolve(&mut self, hint: SaveChipFamily) -> Result<SaveChipFamily, Error<E>> {
        let family = if hint.is_known() {
            hint
        } else {
            self.detect_family()?
        };
        if !family.is_known() {
            return Err(Error::NoChip);
        }
        Ok(family)
    }

    /// Capacity of the chip in the slot
    pub fn size_log2(&mut self) -> Result<SizeLog2, Error<E>> {
        let family = self.resolve(SaveChipFamily::Unknown)?;
        self.size_log2_of(family)
    }

    /// Capacity for an already known family, `Unknown` probes the family first
    pub fn size_log2_of(&mut self, family: SaveChipFamily) -> Result<SizeLog2, Error<E>> {
        match self.resolve(family)? {
            SaveChipFamily::SerialFlash => {
                let jedec = self.ll.read_identification()?;
                self.flash_size(jedec)
            }
            family => self.eeprom_size(family),
        }
    }

    pub fn size_bytes(&mut self) -> Result<u32, Error<E>> {
        Ok(self.size_log2()?.bytes())
    }

    /// Probe family, identification and capacity at once
    pub fn chip_info(&mut self) -> Result<ChipInfo, Error<E>> {
        let (family, jedec, status) = self.identify()?;
        let size = match family {
            SaveChipFamily::Unknown => return Err(Error::NoChip),
            SaveChipFamily::SerialFlash => self.flash_size(jedec)?,
            family => self.eeprom_size(family)?,
        };
        Ok(ChipInfo {
            family,
            jedec,
            status,
            size,
        })
    }

    /// Probe the chip once and keep the result for the following operations
    pub fn bind(&mut self) -> Result<SaveChip<'_, B>, Error<E>> {
        let info = self.chip_info()?;
        Ok(SaveChip { save: self, info })
    }

    fn flash_size(&self, jedec: JedecId) -> Result<SizeLog2, Error<E>> {
        match self.extra.resolve(jedec) {
            Some(size) => Ok(SizeLog2(size)),
            None => {
                warn!("unsupported serial flash, jedec {:#x}", jedec.0);
                Err(Error::UnsupportedJedec(jedec.0))
            }
        }
    }

    fn eeprom_size(&mut self, family: SaveChipFamily) -> Result<SizeLog2, Error<E>> {
        match family {
            SaveChipFamily::SmallEeprom => Ok(SizeLog2(SMALL_EEPROM_SIZE_LOG2)),
            SaveChipFamily::LargeEeprom => self.probe_aliasing().map(SizeLog2),
            _ => Err(Error::NoChip),
        }
    }

    /// Tell an 8kB part from a 64kB one: write the complement of the byte at 8kB-1 and check
    /// whether the byte at 16kB-1 follows. The original byte is written back in every case.
    fn probe_aliasing(&mut self) -> Result<u8, Error<E>> {
        let family = SaveChipFamily::LargeEeprom;
        let low = Address(PROBE_OFFSET_LOW);
        let high = Address(PROBE_OFFSET_HIGH);

        let mut original = [0u8];
        let mut before = [0u8];
        let mut after = [0u8];
        self.ll.read(family, low, &mut original)?;
        self.ll.read(family, high, &mut before)?;

        let probed = match self.program(family, low, &[!original[0]]) {
            Ok(()) => self.ll.read(family, high, &mut after),
            Err(e) => Err(e),
        };
        let restored = self.program(family, low, &original);
        probed?;
        restored?;

        let size = aliasing_size_log2(before[0], after[0]);
        debug!(
            "aliasing probe: {:#x} -> {:#x}, size log2 {}",
            before[0],
            after[0],
            size
        );
        Ok(size)
    }

    /// Read n bytes from an address, probing the family first
    pub fn read(&mut self, addr: Address, buff: &mut [u8]) -> Result<(), Error<E>> {
        self.read_with(SaveChipFamily::Unknown, addr, buff)
    }

    /// Read n bytes from an address of a chip of the given family, `Unknown` probes it
    pub fn read_with(
        &mut self,
        family: SaveChipFamily,
        addr: Address,
        buff: &mut [u8],
    ) -> Result<(), Error<E>> {
        let family = self.resolve(family)?;
        check_range(family.address_space(), addr.0, buff.len())?;
        self.ll.read(family, addr, buff)
    }

    /// Write n bytes to an address, probing the family first
    pub fn write(&mut self, addr: Address, buff: &[u8]) -> Result<(), Error<E>> {
        self.write_with(SaveChipFamily::Unknown, addr, buff)
    }

    /// Write n bytes to an address of a chip of the given family, `Unknown` probes it.
    ///
    /// The data is sent in bursts of at most [`SaveChipFamily::write_burst`] bytes counted from
    /// `addr`, each burst with its own write enable and busy wait. Serial flash must be erased
    /// beforehand.
    pub fn write_with(
        &mut self,
        family: SaveChipFamily,
        addr: Address,
        buff: &[u8],
    ) -> Result<(), Error<E>> {
        let family = self.resolve(family)?;
        check_range(family.address_space(), addr.0, buff.len())?;
        self.program(family, addr, buff)
    }

    fn program(
        &mut self,
        family: SaveChipFamily,
        addr: Address,
        buff: &[u8],
    ) -> Result<(), Error<E>> {
        let mut addr = addr.0;
        for burst in buff.chunks(family.write_burst()) {
            trace!("write {} bytes at {:#x}", burst.len(), addr);
            self.ll.write_enable()?;
            self.ll.write_burst(family, Address(addr), burst)?;
            self.ll.wait_wip(self.config.poll_limit)?;
            addr += burst.len() as u32;
        }
        Ok(())
    }

    /// Overwrite `[from, to)` with the bytes of `source`, in spans of at most [`ERASE_FILL_SPAN`]
    fn fill(
        &mut self,
        family: SaveChipFamily,
        from: u32,
        to: u32,
        source: &[u8; 256],
    ) -> Result<(), Error<E>> {
        let mut addr = from;
        while addr < to {
            let span = min(ERASE_FILL_SPAN, to - addr);
            debug!("fill {:#x}..{:#x} with {:#x}", addr, addr + span, source[0]);
            let mut offset = 0;
            while offset < span {
                let n = min(source.len() as u32, span - offset);
                self.program(family, Address(addr + offset), &source[..n as usize])?;
                offset += n;
            }
            addr += span;
        }
        Ok(())
    }

    /// Erase the whole chip. Serial flash is erased sector by sector, EEPROM and FRAM have no
    /// erase instruction and are overwritten with zeroes.
    pub fn erase_all(&mut self) -> Result<(), Error<E>> {
        let family = self.resolve(SaveChipFamily::Unknown)?;
        let size = self.size_log2_of(family)?;
        self.erase_all_with(family, size)
    }

    fn erase_all_with(&mut self, family: SaveChipFamily, size: SizeLog2) -> Result<(), Error<E>> {
        if family.has_sector_erase() {
            for index in 0..size.sectors() {
                self.erase_flash_sector(Sector(index as u16))?;
            }
            return Ok(());
        }

        self.fill(family, 0, size.bytes(), &ZEROES)
    }

    /// Erase a 64kB sector of serial flash. Does nothing on EEPROM and FRAM.
    pub fn erase_sector(&mut self, sector: Sector) -> Result<(), Error<E>> {
        self.erase_sector_with(SaveChipFamily::Unknown, sector)
    }

    pub fn erase_sector_with(
        &mut self,
        family: SaveChipFamily,
        sector: Sector,
    ) -> Result<(), Error<E>> {
        let family = self.resolve(family)?;
        if !family.has_sector_erase() {
            debug!("{} has no sector erase, skipped", family);
            return Ok(());
        }
        self.erase_flash_sector(sector)
    }

    fn erase_flash_sector(&mut self, sector: Sector) -> Result<(), Error<E>> {
        debug!("erase sector {}", sector.0);
        self.ll.write_enable()?;
        self.ll.sector_erase(sector)?;
        self.ll.wait_wip(self.config.poll_limit)
    }
}

/// A probed save chip. Family and capacity are fixed, every operation is bounds checked and
/// skips the detection step.
pub struct SaveChip<'a, B> {
    save: &'a mut AuxSpiSave<B>,
    info: ChipInfo,
}

impl<B, E> SaveChip<'_, B>
where
    B: AuxSpi<Error = E>,
{
    pub fn info(&self) -> ChipInfo {
        self.info
    }

    pub fn family(&self) -> SaveChipFamily {
        self.info.family
    }

    pub fn capacity(&self) -> u32 {
        self.info.capacity()
    }

    /// Read n bytes from an address
    pub fn read(&mut self, addr: Address, buff: &mut [u8]) -> Result<(), Error<E>> {
        check_range(self.capacity(), addr.0, buff.len())?;
        self.save.read_with(self.info.family, addr, buff)
    }

    /// Write n bytes to an address, see [`AuxSpiSave::write_with`]
    pub fn write(&mut self, addr: Address, buff: &[u8]) -> Result<(), Error<E>> {
        check_range(self.capacity(), addr.0, buff.len())?;
        self.save.write_with(self.info.family, addr, buff)
    }

    /// Erase a 64kB sector, does nothing on EEPROM and FRAM
    pub fn erase_sector(&mut self, sector: Sector) -> Result<(), Error<E>> {
        if self.info.family.has_sector_erase() && sector.0 as u32 >= self.info.size.sectors() {
            return Err(Error::OutOfBounds);
        }
        self.save.erase_sector_with(self.info.family, sector)
    }

    pub fn erase_all(&mut self) -> Result<(), Error<E>> {
        self.save.erase_all_with(self.info.family, self.info.size)
    }

    /// Erase `[from, to)`. Serial flash needs 64kB aligned bounds, EEPROM and FRAM are zero
    /// filled byte exact.
    pub fn erase_range(&mut self, from: u32, to: u32) -> Result<(), Error<E>> {
        self.erase_range_with(from, to, &ZEROES)
    }

    /// Like [`SaveChip::erase_range`], EEPROM and FRAM are filled with `source` instead
    fn erase_range_with(
        &mut self,
        from: u32,
        to: u32,
        source: &[u8; 256],
    ) -> Result<(), Error<E>> {
        if from > to || to > self.capacity() {
            return Err(Error::OutOfBounds);
        }
        if !self.info.family.has_sector_erase() {
            return self.save.fill(self.info.family, from, to, source);
        }
        if from % SECTOR_SIZE != 0 || to % SECTOR_SIZE != 0 {
            return Err(Error::NotAligned);
        }
        for index in from / SECTOR_SIZE..to / SECTOR_SIZE {
            self.save.erase_flash_sector(Sector(index as u16))?;
        }
        Ok(())
    }
}

/// Implementation of the `NorFlash` traits of the `embedded_storage` crate.
/// Erased EEPROM and FRAM read back as all ones, like erased flash.
mod es {
    use super::*;
    use core::fmt::Debug;
    use embedded_storage::nor_flash::{
        check_erase, check_read, check_write, ErrorType, NorFlash, NorFlashError,
        NorFlashErrorKind, ReadNorFlash,
    };

    impl<E> From<NorFlashErrorKind> for Error<E> {
        fn from(e: NorFlashErrorKind) -> Self {
            match e {
                NorFlashErrorKind::NotAligned => Error::NotAligned,
                _ => Error::OutOfBounds,
            }
        }
    }

    impl<E> NorFlashError for Error<E>
    where
        E: Debug,
    {
        fn kind(&self) -> NorFlashErrorKind {
            match self {
                Error::OutOfBounds => NorFlashErrorKind::OutOfBounds,
                Error::NotAligned => NorFlashErrorKind::NotAligned,
                _ => NorFlashErrorKind::Other,
            }
        }
    }

    impl<B, E> ErrorType for SaveChip<'_, B>
    where
        B: AuxSpi<Error = E>,
        E: Debug,
    {
        type Error = Error<E>;
    }

    impl<B, E> ReadNorFlash for SaveChip<'_, B>
    where
        B: AuxSpi<Error = E>,
        E: Debug,
    {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            check_read(self, offset, bytes.len())?;
            self.read(Address(offset), bytes)
        }

        fn capacity(&self) -> usize {
            self.info.capacity() as usize
        }
    }

    impl<B, E> NorFlash for SaveChip<'_, B>
    where
        B: AuxSpi<Error = E>,
        E: Debug,
    {
        const WRITE_SIZE: usize = 1;
        /// EEPROM and FRAM erase byte exact. Serial flash additionally needs both ends on a 64kB
        /// sector boundary and fails with [`Error::NotAligned`] otherwise.
        const ERASE_SIZE: usize = 1;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            check_erase(self, from, to)?;
            self.erase_range_with(from, to, &ONES)
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            check_write(self, offset, bytes.len())?;
            self.write(Address(offset), bytes)
        }
    }
}
