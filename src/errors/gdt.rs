use core::fmt;

/// Errors from encoding segment descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GdtError {
    /// The requested limit does not fit in a 32-bit address space
    LimitOutOfRange { limit: u64 },
}

impl fmt::Display for GdtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GdtError::LimitOutOfRange { limit } => {
                write!(f, "segment limit {:#x} exceeds 32 bits", limit)
            }
        }
    }
}
