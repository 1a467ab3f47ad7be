//! Boot console: VGA and serial side by side.

use core::fmt;

use super::serial::SerialPort;
use super::vga::{TextSink, VgaWriter};
use crate::arch::PortIo;

pub struct Console<'a, P: PortIo> {
    vga: Option<VgaWriter<'a>>,
    serial: Option<SerialPort<'a, P>>,
}

impl<'a, P: PortIo> Console<'a, P> {
    pub fn new(vga: Option<VgaWriter<'a>>, serial: Option<SerialPort<'a, P>>) -> Self {
        Self { vga, serial }
    }
}

impl<P: PortIo> TextSink for Console<'_, P> {
    fn write_string(&mut self, bytes: &[u8]) {
        if let Some(vga) = self.vga.as_mut() {
            vga.write_string(bytes);
        }
        if let Some(serial) = self.serial.as_mut() {
            serial.write_bytes(bytes);
        }
    }

    /// Only the screen is cleared; the serial log is append-only.
    fn clear_screen(&mut self) {
        if let Some(vga) = self.vga.as_mut() {
            vga.clear_screen();
        }
    }
}

impl<P: PortIo> fmt::Write for Console<'_, P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_string(s.as_bytes());
        Ok(())
    }
}
