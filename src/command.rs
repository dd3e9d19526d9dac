/// AUXSPI save chip instructions
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    /// Read the 3 byte JEDEC manufacturer/device id
    ReadIdentification = 0x9F,
    /// Read the status register
    ReadStatus = 0x05,
    /// Set the write enable latch
    WriteEnable = 0x06,
    /// Read data, family 1 folds address bit 8 into bit 3
    Read = 0x03,
    /// Write/program data, family 1 folds address bit 8 into bit 3
    Write = 0x02,
    /// Erase a 64kB sector on serial flash
    SectorErase = 0xD8,
}
