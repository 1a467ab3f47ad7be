//! Boot-time device drivers.

pub mod console;
pub mod ps2_keyboard;
pub mod serial;
pub mod vga;

pub use console::Console;
pub use vga::TextSink;
