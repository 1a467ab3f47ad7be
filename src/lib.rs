//! Protected-mode bring-up for a 32-bit x86 kernel: flat GDT, 256-gate IDT,
//! remapped 8259 PICs and a handler registry the entry stubs dispatch into.

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod config;
pub mod drivers;
pub mod errors;
pub mod interrupts;
pub mod kernel;
pub mod logger;

#[cfg(test)]
mod testing;
