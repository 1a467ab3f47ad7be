//! # Global Descriptor Table
//!
//! Flat protected-mode segmentation: every segment starts at 0 and the
//! code and data segments share one limit policy.
//!
//! ## Layout
//!
//! | Selector | Slot   | Access | Meaning                       |
//! |----------|--------|--------|-------------------------------|
//! | 0x00     | null   | 0x00   | required by the CPU           |
//! | 0x08     | unused | 0x00   | reserved, never referenced    |
//! | 0x10     | code   | 0x9A   | ring 0, present, exec + read  |
//! | 0x18     | data   | 0x92   | ring 0, present, read + write |
//!
//! ## Descriptor Encoding
//!
//! ```text
//!  63      56 55   52 51    48 47      40 39      32 31       16 15        0
//! ┌──────────┬───────┬────────┬──────────┬──────────┬───────────┬───────────┐
//! │ base     │ flags │ limit  │ access   │ base     │ base      │ limit     │
//! │ 31..24   │ G D L │ 19..16 │          │ 23..16   │ 15..0     │ 15..0     │
//! └──────────┴───────┴────────┴──────────┴──────────┴───────────┴───────────┘
//! ```
//!
//! The limit field is 20 bits wide. Limits up to 0xFFFF are stored exactly
//! with byte granularity. Larger limits are stored as a page count with the
//! granularity flag set, which rounds the effective limit up to the end of its
//! 4 KiB page (at most 4095 extra bytes, never fewer than requested).

use core::mem::{offset_of, size_of};

use bit_field::BitField;
use bitflags::bitflags;
use log::debug;
use x86_64::structures::gdt::SegmentSelector;
use x86_64::PrivilegeLevel;

use crate::arch::{DescriptorTablePointer, Platform};
use crate::config::SegmentLayout;
use crate::errors::GdtError;

/// Largest limit that is stored byte-exact.
pub const BYTE_GRANULAR_MAX: u32 = 0xFFFF;

bitflags! {
    /// The access byte of a code or data descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentAccess: u8 {
        const ACCESSED = 1 << 0;
        /// Readable for code, writable for data
        const READ_WRITE = 1 << 1;
        const CONFORMING = 1 << 2;
        const EXECUTABLE = 1 << 3;
        /// Code or data, as opposed to a system descriptor
        const USER_SEGMENT = 1 << 4;
        const DPL_RING_3 = 3 << 5;
        const PRESENT = 1 << 7;

        const KERNEL_CODE = Self::PRESENT.bits()
            | Self::USER_SEGMENT.bits()
            | Self::EXECUTABLE.bits()
            | Self::READ_WRITE.bits();
        const KERNEL_DATA = Self::PRESENT.bits()
            | Self::USER_SEGMENT.bits()
            | Self::READ_WRITE.bits();
    }
}

bitflags! {
    /// The high nibble of byte 6.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u8 {
        const AVAILABLE = 1 << 0;
        const LONG_MODE = 1 << 1;
        /// 32-bit default operand size (the D/B bit)
        const DEFAULT_SIZE_32 = 1 << 2;
        /// Limit counts 4 KiB pages
        const GRANULARITY = 1 << 3;
    }
}

/// One 8-byte GDT entry in hardware format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct SegmentDescriptor {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    limit_high_flags: u8,
    base_high: u8,
}

const _: () = assert!(size_of::<SegmentDescriptor>() == 8);

impl SegmentDescriptor {
    pub const fn empty() -> Self {
        Self {
            limit_low: 0,
            base_low: 0,
            base_mid: 0,
            access: 0,
            limit_high_flags: 0,
            base_high: 0,
        }
    }

    /// Encodes a segment covering `base..=base + limit`.
    pub fn new(base: u32, limit: u64, access: SegmentAccess) -> Result<Self, GdtError> {
        let limit = u32::try_from(limit).map_err(|_| GdtError::LimitOutOfRange { limit })?;

        let (raw_limit, flags) = if limit <= BYTE_GRANULAR_MAX {
            (limit, SegmentFlags::empty())
        } else {
            (
                limit >> 12,
                SegmentFlags::GRANULARITY | SegmentFlags::DEFAULT_SIZE_32,
            )
        };

        let mut limit_high_flags = 0u8;
        limit_high_flags.set_bits(0..4, raw_limit.get_bits(16..20) as u8);
        limit_high_flags.set_bits(4..8, flags.bits());

        Ok(Self {
            limit_low: raw_limit.get_bits(0..16) as u16,
            base_low: base.get_bits(0..16) as u16,
            base_mid: base.get_bits(16..24) as u8,
            access: access.bits(),
            limit_high_flags,
            base_high: base.get_bits(24..32) as u8,
        })
    }

    pub fn base(&self) -> u32 {
        let mut base = 0u32;
        base.set_bits(0..16, u32::from(self.base_low));
        base.set_bits(16..24, u32::from(self.base_mid));
        base.set_bits(24..32, u32::from(self.base_high));
        base
    }

    /// Effective limit, expanded according to the granularity flag.
    pub fn limit(&self) -> u32 {
        let mut raw = 0u32;
        raw.set_bits(0..16, u32::from(self.limit_low));
        raw.set_bits(16..20, u32::from(self.limit_high_flags.get_bits(0..4)));

        if self.flags().contains(SegmentFlags::GRANULARITY) {
            (raw << 12) | 0xFFF
        } else {
            raw
        }
    }

    pub fn access(&self) -> SegmentAccess {
        SegmentAccess::from_bits_retain(self.access)
    }

    pub fn flags(&self) -> SegmentFlags {
        SegmentFlags::from_bits_truncate(self.limit_high_flags.get_bits(4..8))
    }

    pub fn is_present(&self) -> bool {
        self.access().contains(SegmentAccess::PRESENT)
    }

    /// The descriptor as the CPU reads it.
    pub fn as_u64(&self) -> u64 {
        u64::from(self.limit_low)
            | u64::from(self.base_low) << 16
            | u64::from(self.base_mid) << 32
            | u64::from(self.access) << 40
            | u64::from(self.limit_high_flags) << 48
            | u64::from(self.base_high) << 56
    }
}

/// The four table slots, in selector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Null,
    Unused,
    Code,
    Data,
}

impl Segment {
    pub const ALL: [Segment; 4] = [Segment::Null, Segment::Unused, Segment::Code, Segment::Data];
}

#[derive(Debug)]
#[repr(C)]
pub struct GlobalDescriptorTable {
    null: SegmentDescriptor,
    unused: SegmentDescriptor,
    code: SegmentDescriptor,
    data: SegmentDescriptor,
}

const _: () = assert!(size_of::<GlobalDescriptorTable>() == 32);

impl GlobalDescriptorTable {
    /// Builds the flat layout with the configured segment limits.
    pub fn new(layout: &SegmentLayout) -> Result<Self, GdtError> {
        let gdt = Self {
            null: SegmentDescriptor::empty(),
            unused: SegmentDescriptor::empty(),
            code: SegmentDescriptor::new(0, layout.code_limit, SegmentAccess::KERNEL_CODE)?,
            data: SegmentDescriptor::new(0, layout.data_limit, SegmentAccess::KERNEL_DATA)?,
        };

        debug!(
            "GDT built: code limit {:#x}, data limit {:#x}",
            gdt.code.limit(),
            gdt.data.limit()
        );
        Ok(gdt)
    }

    pub fn descriptor(&self, segment: Segment) -> &SegmentDescriptor {
        match segment {
            Segment::Null => &self.null,
            Segment::Unused => &self.unused,
            Segment::Code => &self.code,
            Segment::Data => &self.data,
        }
    }

    /// Selector for `segment`: its byte offset in the table, ring 0.
    pub const fn selector(segment: Segment) -> SegmentSelector {
        let offset = match segment {
            Segment::Null => offset_of!(GlobalDescriptorTable, null),
            Segment::Unused => offset_of!(GlobalDescriptorTable, unused),
            Segment::Code => offset_of!(GlobalDescriptorTable, code),
            Segment::Data => offset_of!(GlobalDescriptorTable, data),
        };
        let index = offset / size_of::<SegmentDescriptor>();
        SegmentSelector::new(index as u16, PrivilegeLevel::Ring0)
    }

    pub fn code_segment_selector(&self) -> SegmentSelector {
        Self::selector(Segment::Code)
    }

    pub fn data_segment_selector(&self) -> SegmentSelector {
        Self::selector(Segment::Data)
    }

    pub fn pointer(&'static self) -> DescriptorTablePointer {
        DescriptorTablePointer::new(self)
    }

    /// Loads the table with `lgdt` and switches every segment register to it.
    ///
    /// Loading again is harmless. The table must not move afterwards, which
    /// the `'static` borrow guarantees.
    pub fn load(&'static self, platform: &impl Platform) {
        let pointer = self.pointer();
        unsafe {
            platform.load_gdt(&pointer);
            platform.reload_segment_registers(
                self.code_segment_selector(),
                self.data_segment_selector(),
            );
        }

        debug!(
            "GDT loaded at {:#010x}, cs={:#06x} ds={:#06x}",
            { pointer.base },
            self.code_segment_selector().0,
            self.data_segment_selector().0
        );
    }
}
