//! Error types for the bring-up layer.
//!
//! Each subsystem owns a small `Copy` error enum. [`KernelError`] wraps all of
//! them so the boot sequence can bail out with `?`.

use core::fmt;

mod config;
pub use config::ConfigError;

mod gdt;
pub use gdt::GdtError;

mod interrupt;
pub use interrupt::InterruptError;

/// Anything that can stop the boot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// The boot configuration is inconsistent
    Config(ConfigError),
    /// A segment descriptor could not be encoded
    Gdt(GdtError),
    /// The interrupt layer rejected a request
    Interrupt(InterruptError),
    /// A phase was started twice
    AlreadyInitialized(&'static str),
}

impl From<ConfigError> for KernelError {
    fn from(err: ConfigError) -> Self {
        KernelError::Config(err)
    }
}

impl From<GdtError> for KernelError {
    fn from(err: GdtError) -> Self {
        KernelError::Gdt(err)
    }
}

impl From<InterruptError> for KernelError {
    fn from(err: InterruptError) -> Self {
        KernelError::Interrupt(err)
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Config(err) => write!(f, "config: {}", err),
            KernelError::Gdt(err) => write!(f, "gdt: {}", err),
            KernelError::Interrupt(err) => write!(f, "interrupts: {}", err),
            KernelError::AlreadyInitialized(what) => write!(f, "{} already initialized", what),
        }
    }
}
