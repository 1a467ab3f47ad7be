//! # Platform Seam
//!
//! The bring-up code never executes a privileged instruction directly. It goes
//! through [`Platform`], which is implemented by [`x86::Hardware`] on a real
//! i686 machine and by a recording mock in unit tests.
//!
//! | Trait    | Covers                                           |
//! |----------|--------------------------------------------------|
//! | `PortIo` | `in` / `out` on 8-bit ports, slow writes         |
//! | `Cpu`    | `lgdt`, `lidt`, segment reload, `cli` / `sti`    |

use core::mem::size_of;

use x86_64::structures::gdt::SegmentSelector;

#[cfg(target_arch = "x86")]
pub mod x86;

/// Writing anything here takes one bus cycle and has no other effect.
pub const POST_DELAY_PORT: u16 = 0x80;

/// Interrupt flag in EFLAGS
pub const EFLAGS_IF: u32 = 1 << 9;

/// Operand of `lgdt` / `lidt`: table size minus one and linear base.
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct DescriptorTablePointer {
    pub limit: u16,
    pub base: u32,
}

const _: () = assert!(size_of::<DescriptorTablePointer>() == 6);

impl DescriptorTablePointer {
    /// Points at `table`. Tables handed to the CPU must never move, hence `'static`.
    pub fn new<T>(table: &'static T) -> Self {
        Self {
            limit: (size_of::<T>() - 1) as u16,
            base: table as *const T as usize as u32,
        }
    }
}

/// Byte-wide port I/O.
pub trait PortIo {
    /// # Safety
    /// Port I/O can have arbitrary side effects on hardware state.
    unsafe fn write_byte(&self, port: u16, value: u8);

    /// # Safety
    /// Port I/O can have arbitrary side effects on hardware state.
    unsafe fn read_byte(&self, port: u16) -> u8;

    /// Write followed by a dummy bus cycle, for devices (the 8259s) that need
    /// time to settle between consecutive commands.
    ///
    /// # Safety
    /// Port I/O can have arbitrary side effects on hardware state.
    unsafe fn write_byte_slow(&self, port: u16, value: u8) {
        self.write_byte(port, value);
        self.write_byte(POST_DELAY_PORT, 0);
    }
}

/// Privileged CPU state.
pub trait Cpu {
    /// # Safety
    /// `pointer` must describe a valid GDT that stays in place while loaded.
    unsafe fn load_gdt(&self, pointer: &DescriptorTablePointer);

    /// # Safety
    /// `pointer` must describe a valid IDT that stays in place while loaded.
    unsafe fn load_idt(&self, pointer: &DescriptorTablePointer);

    /// Reloads CS with `code` and every data segment register with `data`.
    ///
    /// # Safety
    /// Both selectors must name present descriptors in the loaded GDT.
    unsafe fn reload_segment_registers(&self, code: SegmentSelector, data: SegmentSelector);

    fn enable_interrupts(&self);
    fn disable_interrupts(&self);
    fn interrupts_enabled(&self) -> bool;

    /// Entry stub that saves state and dispatches `vector`.
    fn interrupt_trampoline(&self, vector: u8) -> u32;

    /// Entry stub that returns immediately.
    fn ignore_trampoline(&self) -> u32;

    /// Runs `f` with interrupts disabled, restoring the previous state after.
    fn without_interrupts<R>(&self, f: impl FnOnce() -> R) -> R {
        let was_enabled = self.interrupts_enabled();
        if was_enabled {
            self.disable_interrupts();
        }
        let result = f();
        if was_enabled {
            self.enable_interrupts();
        }
        result
    }
}

/// Everything the bring-up layer needs from the machine.
pub trait Platform: PortIo + Cpu + Sync {}

impl<T: PortIo + Cpu + Sync> Platform for T {}
