//! # Interrupt Descriptor Table
//!
//! 256 protected-mode gates. Every gate is written at construction time so
//! the CPU never sees a vector without a target.
//!
//! ```text
//!  63            48 47 46  45 44  40 39      32 31            16 15             0
//! ┌────────────────┬──┬──────┬──────┬──────────┬────────────────┬────────────────┐
//! │ handler 31..16 │P │ DPL  │ type │ reserved │ code selector  │ handler 15..0  │
//! └────────────────┴──┴──────┴──────┴──────────┴────────────────┴────────────────┘
//! ```

use core::mem::size_of;

use bit_field::BitField;
use x86_64::structures::gdt::SegmentSelector;
use x86_64::PrivilegeLevel;

use crate::arch::DescriptorTablePointer;

pub const IDT_ENTRIES: usize = 256;

const PRESENT: u8 = 1 << 7;

/// 32-bit gate types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GateType {
    /// Clears IF on entry
    Interrupt = 0xE,
    /// Leaves IF untouched
    Trap = 0xF,
}

/// One IDT entry in hardware format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct GateDescriptor {
    handler_low: u16,
    selector: u16,
    reserved: u8,
    access: u8,
    handler_high: u16,
}

const _: () = assert!(size_of::<GateDescriptor>() == 8);

impl GateDescriptor {
    /// A non-present gate. Delivering through it raises #NP.
    pub const fn missing() -> Self {
        Self {
            handler_low: 0,
            selector: 0,
            reserved: 0,
            access: 0,
            handler_high: 0,
        }
    }

    pub fn new(
        handler: u32,
        selector: SegmentSelector,
        privilege: PrivilegeLevel,
        gate_type: GateType,
    ) -> Self {
        let mut access = PRESENT;
        access.set_bits(5..7, privilege as u8);
        access.set_bits(0..4, gate_type as u8);

        Self {
            handler_low: handler.get_bits(0..16) as u16,
            selector: selector.0,
            reserved: 0,
            access,
            handler_high: handler.get_bits(16..32) as u16,
        }
    }

    pub fn handler_address(&self) -> u32 {
        u32::from(self.handler_low) | u32::from(self.handler_high) << 16
    }

    pub fn selector(&self) -> SegmentSelector {
        SegmentSelector(self.selector)
    }

    pub fn access(&self) -> u8 {
        self.access
    }

    pub fn is_present(&self) -> bool {
        self.access & PRESENT != 0
    }

    pub fn privilege_level(&self) -> PrivilegeLevel {
        PrivilegeLevel::from_u16(u16::from(self.access.get_bits(5..7)))
    }

    pub fn gate_type(&self) -> Option<GateType> {
        match self.access.get_bits(0..4) {
            0xE => Some(GateType::Interrupt),
            0xF => Some(GateType::Trap),
            _ => None,
        }
    }
}

#[derive(Debug)]
#[repr(C)]
pub struct InterruptDescriptorTable {
    entries: [GateDescriptor; IDT_ENTRIES],
}

const _: () = assert!(size_of::<InterruptDescriptorTable>() == 2048);

impl InterruptDescriptorTable {
    /// Fills every vector with a ring 0 interrupt gate whose target is
    /// `trampoline(vector)`.
    pub fn new(code_selector: SegmentSelector, trampoline: impl Fn(u8) -> u32) -> Self {
        let mut idt = Self {
            entries: [GateDescriptor::missing(); IDT_ENTRIES],
        };
        for vector in 0..=u8::MAX {
            idt.set_gate(
                vector,
                GateDescriptor::new(
                    trampoline(vector),
                    code_selector,
                    PrivilegeLevel::Ring0,
                    GateType::Interrupt,
                ),
            );
        }
        idt
    }

    pub fn set_gate(&mut self, vector: u8, gate: GateDescriptor) {
        self.entries[usize::from(vector)] = gate;
    }

    pub fn gate(&self, vector: u8) -> &GateDescriptor {
        &self.entries[usize::from(vector)]
    }

    pub fn iter(&self) -> impl Iterator<Item = &GateDescriptor> {
        self.entries.iter()
    }

    pub fn pointer(&'static self) -> DescriptorTablePointer {
        DescriptorTablePointer::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODE: SegmentSelector = SegmentSelector(0x10);

    #[test]
    fn gate_encoding() {
        let gate = GateDescriptor::new(0x0012_3456, CODE, PrivilegeLevel::Ring0, GateType::Interrupt);
        assert_eq!(gate.handler_address(), 0x0012_3456);
        assert_eq!(gate.selector().0, 0x10);
        assert_eq!(gate.access(), 0x8E);
        assert_eq!(gate.gate_type(), Some(GateType::Interrupt));
        assert_eq!(gate.privilege_level(), PrivilegeLevel::Ring0);
        assert!(gate.is_present());
    }

    #[test]
    fn user_trap_gate() {
        let gate = GateDescriptor::new(0xC000_0000, CODE, PrivilegeLevel::Ring3, GateType::Trap);
        assert_eq!(gate.access(), 0xEF);
        assert_eq!(gate.privilege_level(), PrivilegeLevel::Ring3);
        assert_eq!(gate.handler_address(), 0xC000_0000);
    }

    #[test]
    fn missing_gate_is_not_present() {
        let gate = GateDescriptor::missing();
        assert!(!gate.is_present());
        assert_eq!(gate.gate_type(), None);
    }

    #[test]
    fn every_vector_is_populated() {
        let idt = InterruptDescriptorTable::new(CODE, |vector| 0x0010_0000 + u32::from(vector) * 16);

        assert_eq!(idt.iter().count(), IDT_ENTRIES);
        assert!(idt.iter().all(|gate| gate.is_present()));
        assert!(idt.iter().all(|gate| gate.selector() == CODE));
        assert!(idt
            .iter()
            .all(|gate| gate.gate_type() == Some(GateType::Interrupt)));
        assert_eq!(idt.gate(0x21).handler_address(), 0x0010_0210);
        assert_eq!(idt.gate(0xFF).handler_address(), 0x0010_0FF0);
    }

    #[test]
    fn set_gate_replaces_one_entry() {
        let mut idt = InterruptDescriptorTable::new(CODE, |_| 0x1000);
        idt.set_gate(3, GateDescriptor::missing());
        assert!(!idt.gate(3).is_present());
        assert!(idt.gate(2).is_present());
        assert!(idt.gate(4).is_present());
    }
}
