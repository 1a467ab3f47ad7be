//! # Interrupt Handling Module
//!
//! Provides the protected-mode plumbing for the kernel:
//!
//! - **GDT**: four flat descriptors (null, unused, code, data)
//! - **IDT**: 256 interrupt gates, one entry stub per vector
//! - **PIC**: 8259 pair remapped past the exception vectors, EOI on dispatch
//! - **Manager**: handler registry, dispatch and the active-manager slot
//!
//! ## Interrupt Vector Layout
//!
//! | Vector | Type                   | Default handling            |
//! |--------|------------------------|-----------------------------|
//! | 0-31   | CPU Exceptions         | dispatched, unhandled = log |
//! | 32-39  | Master PIC (IRQ 0-7)   | dispatched, EOI master      |
//! | 40-47  | Slave PIC (IRQ 8-15)   | dispatched, EOI slave+master|
//! | 48-255 | Software               | dispatched                  |
//!
//! ## Usage
//!
//! ```ignore
//! gdt.load(platform);
//! let manager = MANAGER.call_once(|| InterruptManager::new(platform, gdt, &config.pic));
//! manager.register(0x21, &KEYBOARD)?.leak();
//! manager.activate();
//! ```

pub mod gdt;
pub mod handler;
pub mod idt;
pub mod manager;
pub mod pic;
pub mod stubs;

pub use gdt::{GlobalDescriptorTable, Segment, SegmentDescriptor};
pub use handler::InterruptHandler;
pub use manager::{handle_interrupt, InterruptManager, Registration};
