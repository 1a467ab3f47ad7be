//! # Boot Configuration
//!
//! Everything the bring-up sequence needs to know up front. There is no file
//! system or command line at this stage, so the configuration is a `const`
//! value compiled into the kernel.
//!
//! | Setting            | Default        |
//! |--------------------|----------------|
//! | Code segment limit | 64 MiB         |
//! | Data segment limit | 64 MiB         |
//! | Master PIC base    | 0x20           |
//! | Slave PIC base     | 0x28           |
//! | Unmasked IRQs      | 0 (timer), 1 (keyboard), 2 (cascade) |
//! | Ignored vectors    | none           |
//! | Log level          | Trace (debug), Info (release) |

use log::LevelFilter;

use crate::errors::ConfigError;
use crate::interrupts::pic::IrqLines;

pub const MIB: u64 = 1024 * 1024;

/// First vector not reserved for CPU exceptions
pub const FIRST_EXTERNAL_VECTOR: u8 = 32;

/// Limits for the flat code and data segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    pub code_limit: u64,
    pub data_limit: u64,
}

/// Where the two 8259s deliver their IRQs and which lines start unmasked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PicConfig {
    pub master_offset: u8,
    pub slave_offset: u8,
    pub enabled_lines: IrqLines,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub segments: SegmentLayout,
    pub pic: PicConfig,
    /// Vectors wired straight to the `iret` stub instead of dispatch
    pub ignored_vectors: &'static [u8],
    pub log_level: LevelFilter,
}

impl KernelConfig {
    pub const DEFAULT: KernelConfig = KernelConfig {
        segments: SegmentLayout {
            code_limit: 64 * MIB,
            data_limit: 64 * MIB,
        },
        pic: PicConfig {
            master_offset: FIRST_EXTERNAL_VECTOR,
            slave_offset: FIRST_EXTERNAL_VECTOR + 8,
            enabled_lines: IrqLines::TIMER
                .union(IrqLines::KEYBOARD)
                .union(IrqLines::CASCADE),
        },
        ignored_vectors: &[],
        log_level: DEFAULT_LOG_LEVEL,
    };

    /// Checks that the PIC vector ranges are usable.
    ///
    /// Each chip owns 8 consecutive vectors starting at its offset, so the
    /// offsets must be 8-aligned, clear of the exception vectors and distinct.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let PicConfig {
            master_offset,
            slave_offset,
            ..
        } = self.pic;

        for offset in [master_offset, slave_offset] {
            if offset % 8 != 0 {
                return Err(ConfigError::MisalignedPicOffset(offset));
            }
            if offset < FIRST_EXTERNAL_VECTOR {
                return Err(ConfigError::PicOffsetInExceptionRange(offset));
            }
        }

        if master_offset == slave_offset {
            return Err(ConfigError::OverlappingPicOffsets {
                master: master_offset,
                slave: slave_offset,
            });
        }

        Ok(())
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(debug_assertions)]
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Trace;
#[cfg(not(debug_assertions))]
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;
