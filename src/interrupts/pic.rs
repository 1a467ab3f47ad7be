//! # Programmable Interrupt Controller (8259 PIC)
//!
//! Configures the legacy 8259 PIC chips for interrupt routing.
//!
//! ## PIC Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │   PIC 1     │     │   PIC 2     │
//! │  (Master)   │◀────│  (Slave)    │
//! │ IRQ 0-7     │ IRQ2│ IRQ 8-15    │
//! └─────────────┘     └─────────────┘
//!       │
//!       ▼
//!     CPU
//! ```
//!
//! ## Vector Remapping
//!
//! Out of reset both chips deliver on vectors that collide with CPU
//! exceptions. The default configuration moves them to:
//! - PIC 1: vectors 32-39 (IRQ 0-7)
//! - PIC 2: vectors 40-47 (IRQ 8-15)
//!
//! ## Initialization Sequence
//!
//! | Step | Master port / value | Slave port / value | Meaning              |
//! |------|---------------------|--------------------|----------------------|
//! | ICW1 | 0x20 / 0x11         | 0xA0 / 0x11        | init, ICW4 follows   |
//! | ICW2 | 0x21 / offset       | 0xA1 / offset      | vector base          |
//! | ICW3 | 0x21 / 0x04         | 0xA1 / 0x02        | slave on IRQ 2       |
//! | ICW4 | 0x21 / 0x01         | 0xA1 / 0x01        | 8086 mode            |
//! | OCW1 | 0x21 / mask         | 0xA1 / mask        | unmask enabled lines |
//!
//! Every write goes through [`PortIo::write_byte_slow`].

use bitflags::bitflags;
use log::{debug, info};

use crate::arch::PortIo;
use crate::config::PicConfig;
use crate::errors::InterruptError;

pub const MASTER_COMMAND: u16 = 0x20;
pub const MASTER_DATA: u16 = 0x21;
pub const SLAVE_COMMAND: u16 = 0xA0;
pub const SLAVE_DATA: u16 = 0xA1;

/// End-of-interrupt command
pub const EOI: u8 = 0x20;

const ICW1_INIT: u8 = 0x10;
const ICW1_ICW4: u8 = 0x01;
const ICW4_8086: u8 = 0x01;

/// Master input the slave is wired to
pub const CASCADE_IRQ: u8 = 2;

pub const IRQ_LINES: u8 = 16;

bitflags! {
    /// Set of IRQ lines across both chips, bit `n` is IRQ `n`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqLines: u16 {
        const TIMER = 1 << 0;
        const KEYBOARD = 1 << 1;
        const CASCADE = 1 << 2;
        const COM2 = 1 << 3;
        const COM1 = 1 << 4;
        const LPT2 = 1 << 5;
        const FLOPPY = 1 << 6;
        const LPT1 = 1 << 7;
        const RTC = 1 << 8;
        const MOUSE = 1 << 12;
        const FPU = 1 << 13;
        const PRIMARY_ATA = 1 << 14;
        const SECONDARY_ATA = 1 << 15;
    }
}

impl IrqLines {
    pub fn line(irq: u8) -> Option<Self> {
        (irq < IRQ_LINES).then(|| Self::from_bits_retain(1 << irq))
    }

    /// OCW1 values for (master, slave): a set bit masks the line.
    pub fn masks(self) -> (u8, u8) {
        let bits = self.bits();
        (!(bits as u8), !((bits >> 8) as u8))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pic {
    offset: u8,
    command: u16,
    data: u16,
}

impl Pic {
    fn handles_vector(&self, vector: u8) -> bool {
        (self.offset..self.offset.saturating_add(8)).contains(&vector)
    }

    unsafe fn end_of_interrupt(&self, io: &impl PortIo) {
        io.write_byte_slow(self.command, EOI);
    }
}

/// The master/slave 8259 pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainedPics {
    master: Pic,
    slave: Pic,
}

impl ChainedPics {
    pub const fn new(master_offset: u8, slave_offset: u8) -> Self {
        Self {
            master: Pic {
                offset: master_offset,
                command: MASTER_COMMAND,
                data: MASTER_DATA,
            },
            slave: Pic {
                offset: slave_offset,
                command: SLAVE_COMMAND,
                data: SLAVE_DATA,
            },
        }
    }

    pub const fn from_config(config: &PicConfig) -> Self {
        Self::new(config.master_offset, config.slave_offset)
    }

    pub fn master_offset(&self) -> u8 {
        self.master.offset
    }

    pub fn slave_offset(&self) -> u8 {
        self.slave.offset
    }

    /// Runs the ICW1-ICW4 sequence on both chips and leaves only `enabled`
    /// unmasked.
    ///
    /// # Safety
    /// Reprograms interrupt routing; interrupts should be disabled.
    pub unsafe fn initialize(&self, io: &impl PortIo, enabled: IrqLines) {
        io.write_byte_slow(self.master.command, ICW1_INIT | ICW1_ICW4);
        io.write_byte_slow(self.slave.command, ICW1_INIT | ICW1_ICW4);

        io.write_byte_slow(self.master.data, self.master.offset);
        io.write_byte_slow(self.slave.data, self.slave.offset);

        io.write_byte_slow(self.master.data, 1 << CASCADE_IRQ);
        io.write_byte_slow(self.slave.data, CASCADE_IRQ);

        io.write_byte_slow(self.master.data, ICW4_8086);
        io.write_byte_slow(self.slave.data, ICW4_8086);

        let (master_mask, slave_mask) = enabled.masks();
        self.write_masks(io, master_mask, slave_mask);

        info!(
            "PIC remapped to {:#04x}/{:#04x}, enabled lines {:#06x}",
            self.master.offset,
            self.slave.offset,
            enabled.bits()
        );
    }

    pub fn handles_vector(&self, vector: u8) -> bool {
        self.master.handles_vector(vector) || self.slave.handles_vector(vector)
    }

    /// IRQ line (0-15) delivered on `vector`, if any.
    pub fn irq_for_vector(&self, vector: u8) -> Option<u8> {
        if self.master.handles_vector(vector) {
            Some(vector - self.master.offset)
        } else if self.slave.handles_vector(vector) {
            Some(vector - self.slave.offset + 8)
        } else {
            None
        }
    }

    pub fn vector_for_irq(&self, irq: u8) -> Option<u8> {
        match irq {
            0..=7 => self.master.offset.checked_add(irq),
            8..=15 => self.slave.offset.checked_add(irq - 8),
            _ => None,
        }
    }

    /// Acknowledges the IRQ behind `vector`: slave first when it came from
    /// the slave, then always the master. Other vectors are ignored.
    ///
    /// # Safety
    /// Must only be called once per delivered IRQ.
    pub unsafe fn notify_end_of_interrupt(&self, io: &impl PortIo, vector: u8) {
        if self.handles_vector(vector) {
            if self.slave.handles_vector(vector) {
                self.slave.end_of_interrupt(io);
            }
            self.master.end_of_interrupt(io);
        }
    }

    /// # Safety
    /// Port I/O on the PIC data registers.
    pub unsafe fn read_masks(&self, io: &impl PortIo) -> (u8, u8) {
        (io.read_byte(self.master.data), io.read_byte(self.slave.data))
    }

    /// # Safety
    /// Unmasking a line without a handler behind it is harmless but noisy.
    pub unsafe fn write_masks(&self, io: &impl PortIo, master: u8, slave: u8) {
        io.write_byte_slow(self.master.data, master);
        io.write_byte_slow(self.slave.data, slave);
    }

    /// Masks or unmasks a single line with a read-modify-write of its chip.
    ///
    /// # Safety
    /// Port I/O on the PIC data registers.
    pub unsafe fn set_irq_masked(
        &self,
        io: &impl PortIo,
        irq: u8,
        masked: bool,
    ) -> Result<(), InterruptError> {
        if irq >= IRQ_LINES {
            return Err(InterruptError::InvalidIrqLine(irq));
        }

        let (pic, bit) = if irq < 8 {
            (&self.master, irq)
        } else {
            (&self.slave, irq - 8)
        };

        let mask = io.read_byte(pic.data);
        let mask = if masked { mask | 1 << bit } else { mask & !(1 << bit) };
        io.write_byte_slow(pic.data, mask);

        debug!("IRQ {} {}", irq, if masked { "masked" } else { "unmasked" });
        Ok(())
    }
}
