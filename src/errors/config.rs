use core::fmt;

/// Errors from validating a [`KernelConfig`](crate::config::KernelConfig)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A PIC vector base is not a multiple of 8
    MisalignedPicOffset(u8),
    /// A PIC vector base overlaps the CPU exception vectors (0-31)
    PicOffsetInExceptionRange(u8),
    /// Master and slave would share vectors
    OverlappingPicOffsets { master: u8, slave: u8 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MisalignedPicOffset(offset) => {
                write!(f, "PIC offset {:#04x} is not a multiple of 8", offset)
            }
            ConfigError::PicOffsetInExceptionRange(offset) => {
                write!(f, "PIC offset {:#04x} collides with CPU exceptions", offset)
            }
            ConfigError::OverlappingPicOffsets { master, slave } => {
                write!(f, "PIC offsets {:#04x} and {:#04x} overlap", master, slave)
            }
        }
    }
}
