//! i686 backend: the real instructions behind [`PortIo`] and [`Cpu`].

use core::arch::asm;

use x86_64::structures::gdt::SegmentSelector;

use super::{Cpu, DescriptorTablePointer, PortIo, EFLAGS_IF};
use crate::interrupts::stubs;

/// The machine we are running on.
pub struct Hardware;

pub static HARDWARE: Hardware = Hardware;

impl PortIo for Hardware {
    #[inline(always)]
    unsafe fn write_byte(&self, port: u16, value: u8) {
        asm!(
            "out dx, al",
            in("dx") port,
            in("al") value,
            options(nomem, nostack, preserves_flags)
        );
    }

    #[inline(always)]
    unsafe fn read_byte(&self, port: u16) -> u8 {
        let value: u8;
        asm!(
            "in al, dx",
            out("al") value,
            in("dx") port,
            options(nomem, nostack, preserves_flags)
        );
        value
    }
}

impl Cpu for Hardware {
    unsafe fn load_gdt(&self, pointer: &DescriptorTablePointer) {
        asm!("lgdt [{}]", in(reg) pointer, options(readonly, nostack, preserves_flags));
    }

    unsafe fn load_idt(&self, pointer: &DescriptorTablePointer) {
        asm!("lidt [{}]", in(reg) pointer, options(readonly, nostack, preserves_flags));
    }

    unsafe fn reload_segment_registers(&self, code: SegmentSelector, data: SegmentSelector) {
        // CS only changes through a far transfer.
        asm!(
            "push {code:e}",
            "lea {tmp:e}, [55f]",
            "push {tmp:e}",
            "retf",
            "55:",
            "mov ds, {data:x}",
            "mov es, {data:x}",
            "mov fs, {data:x}",
            "mov gs, {data:x}",
            "mov ss, {data:x}",
            code = in(reg) u32::from(code.0),
            data = in(reg) u32::from(data.0),
            tmp = out(reg) _,
            options(preserves_flags)
        );
    }

    #[inline]
    fn enable_interrupts(&self) {
        unsafe { asm!("sti", options(nomem, nostack)) };
    }

    #[inline]
    fn disable_interrupts(&self) {
        unsafe { asm!("cli", options(nomem, nostack)) };
    }

    fn interrupts_enabled(&self) -> bool {
        let eflags: u32;
        unsafe {
            asm!("pushfd", "pop {}", out(reg) eflags, options(nomem, preserves_flags));
        }
        eflags & EFLAGS_IF != 0
    }

    fn interrupt_trampoline(&self, vector: u8) -> u32 {
        stubs::stub_address(vector)
    }

    fn ignore_trampoline(&self) -> u32 {
        stubs::ignore_address()
    }
}

/// Parks the CPU until the next interrupt.
#[inline]
pub fn halt() {
    unsafe { asm!("hlt", options(nomem, nostack, preserves_flags)) };
}
