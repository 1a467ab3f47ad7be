//! Low-level entry stubs.
//!
//! `interrupt_stub_table` holds one 16-byte stub per vector. Each stub makes
//! the stack uniform (a dummy error code for vectors the CPU does not push
//! one for), pushes its vector and jumps to `interrupt_common`, which saves
//! the remaining state and calls [`interrupt_entry`]. Whatever stack pointer
//! the dispatch returns is the one state gets restored from.
//!
//! ```text
//! high  ┌──────────────┐
//!       │ eflags       │ ◀─ pushed by the CPU
//!       │ cs           │
//!       │ eip          │
//!       │ error code   │ ◀─ CPU or stub
//!       │ vector       │ ◀─ stub
//!       │ eax .. edi   │ ◀─ pushal
//!       │ ds es fs gs  │
//! low   └──────────────┘ ◀─ stack_pointer handed to handlers
//! ```

use core::mem::size_of;

use crate::interrupts::gdt::{GlobalDescriptorTable, Segment};

/// Distance between two stubs in `interrupt_stub_table`.
pub const STUB_STRIDE: u32 = 16;

/// Vectors for which the CPU pushes an error code itself.
pub const ERROR_CODE_VECTORS: [u8; 10] = [8, 10, 11, 12, 13, 14, 17, 21, 29, 30];

/// Register state as laid out by `interrupt_common`.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct SavedState {
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub vector: u32,
    pub error_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
}

const _: () = assert!(size_of::<SavedState>() == 68);

// `interrupt_common` loads the kernel data selector as an immediate.
const _: () = assert!(GlobalDescriptorTable::selector(Segment::Data).0 == 0x18);

impl SavedState {
    /// Reinterprets the stack pointer handed to an interrupt handler.
    ///
    /// # Safety
    /// `stack_pointer` must be the value an entry stub passed to dispatch.
    pub unsafe fn from_stack_pointer<'a>(stack_pointer: u32) -> &'a SavedState {
        &*(stack_pointer as usize as *const SavedState)
    }

    pub fn has_cpu_error_code(&self) -> bool {
        u8::try_from(self.vector).is_ok_and(|v| ERROR_CODE_VECTORS.contains(&v))
    }
}

#[cfg(target_arch = "x86")]
core::arch::global_asm!(
    r#"
    .section .text
    .global interrupt_stub_table
    .global interrupt_ignore

    .p2align 4
interrupt_stub_table:
    .set stub_vector, 0
    .rept 256
    .p2align 4
    .if (stub_vector == 8) || ((stub_vector >= 10) && (stub_vector <= 14)) || (stub_vector == 17) || (stub_vector == 21) || (stub_vector == 29) || (stub_vector == 30)
    .else
    pushl $0
    .endif
    pushl $stub_vector
    jmp interrupt_common
    .set stub_vector, stub_vector + 1
    .endr

    .p2align 4
interrupt_ignore:
    iret

interrupt_common:
    pushal
    pushl %ds
    pushl %es
    pushl %fs
    pushl %gs
    movw $0x18, %ax
    movw %ax, %ds
    movw %ax, %es
    cld
    pushl %esp
    pushl 52(%esp)
    call {entry}
    movl %eax, %esp
    popl %gs
    popl %fs
    popl %es
    popl %ds
    popal
    addl $8, %esp
    iret
    "#,
    entry = sym interrupt_entry,
    options(att_syntax)
);

#[cfg(target_arch = "x86")]
extern "C" {
    fn interrupt_stub_table();
    fn interrupt_ignore();
}

#[cfg(target_arch = "x86")]
extern "C" fn interrupt_entry(vector: u32, stack_pointer: u32) -> u32 {
    super::manager::handle_interrupt(vector as u8, stack_pointer)
}

#[cfg(target_arch = "x86")]
pub fn stub_address(vector: u8) -> u32 {
    let table = interrupt_stub_table as unsafe extern "C" fn() as usize as u32;
    table + u32::from(vector) * STUB_STRIDE
}

#[cfg(target_arch = "x86")]
pub fn ignore_address() -> u32 {
    interrupt_ignore as unsafe extern "C" fn() as usize as u32
}
