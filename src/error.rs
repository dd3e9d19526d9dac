use core::fmt;

/// All possible errors emitted by the driver
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<TransportError> {
    /// Internal AUXSPI transport error
    Transport(TransportError),

    /// The status register and JEDEC id match no known save chip family
    NoChip,

    /// Serial flash answered with a JEDEC id found in neither size table
    UnsupportedJedec(u32),

    /// The write-in-progress bit never cleared within the configured poll limit
    Timeout,

    /// Address out of bound
    OutOfBounds,

    /// Address not aligned
    NotAligned,

    /// The extra JEDEC table has no free slot left
    TableFull,

    /// A size exponent outside of `1..=24`
    InvalidSize(u8),
}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "AUXSPI transport error: {}", e),
            Self::NoChip => write!(f, "no supported save chip found"),
            Self::UnsupportedJedec(id) => write!(f, "unsupported JEDEC id 0x{:06X}", id),
            Self::Timeout => write!(f, "save chip stayed busy"),
            Self::OutOfBounds => write!(f, "address out of bounds"),
            Self::NotAligned => write!(f, "address not aligned"),
            Self::TableFull => write!(f, "extra JEDEC table is full"),
            Self::InvalidSize(n) => write!(f, "invalid size exponent {}", n),
        }
    }
}
