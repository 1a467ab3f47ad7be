use core::fmt;

/// Errors from the interrupt manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptError {
    /// Every slot in the handler chain for this vector is taken
    ChainFull { vector: u8 },
    /// IRQ lines are numbered 0-15
    InvalidIrqLine(u8),
}

impl fmt::Display for InterruptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterruptError::ChainFull { vector } => {
                write!(f, "handler chain for vector {:#04x} is full", vector)
            }
            InterruptError::InvalidIrqLine(line) => write!(f, "no such IRQ line: {}", line),
        }
    }
}
