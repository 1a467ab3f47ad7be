//! 16550 UART, polled transmit only.

use core::fmt;

use crate::arch::PortIo;

pub const COM1: u16 = 0x3F8;

const DATA: u16 = 0;
const INTERRUPT_ENABLE: u16 = 1;
const FIFO_CONTROL: u16 = 2;
const LINE_CONTROL: u16 = 3;
const MODEM_CONTROL: u16 = 4;
const LINE_STATUS: u16 = 5;

const LINE_STATUS_THR_EMPTY: u8 = 1 << 5;
const LINE_CONTROL_DLAB: u8 = 1 << 7;
const LINE_CONTROL_8N1: u8 = 0x03;

/// 115200 / 3 = 38400 baud
const DIVISOR: u16 = 3;

/// Polls before a byte is written regardless of the status register.
const TRANSMIT_SPINS: usize = 100_000;

pub struct SerialPort<'a, P: PortIo> {
    io: &'a P,
    base: u16,
}

impl<'a, P: PortIo> SerialPort<'a, P> {
    pub const fn new(io: &'a P, base: u16) -> Self {
        Self { io, base }
    }

    /// Programs 8N1 at 38400 baud with FIFOs enabled and UART interrupts off.
    ///
    /// # Safety
    /// `base` must be the I/O base of a 16550-compatible UART.
    pub unsafe fn init(&mut self) {
        let [divisor_low, divisor_high] = DIVISOR.to_le_bytes();

        self.io.write_byte(self.base + INTERRUPT_ENABLE, 0x00);
        self.io.write_byte(self.base + LINE_CONTROL, LINE_CONTROL_DLAB);
        self.io.write_byte(self.base + DATA, divisor_low);
        self.io.write_byte(self.base + INTERRUPT_ENABLE, divisor_high);
        self.io.write_byte(self.base + LINE_CONTROL, LINE_CONTROL_8N1);
        self.io.write_byte(self.base + FIFO_CONTROL, 0xC7);
        self.io.write_byte(self.base + MODEM_CONTROL, 0x0B);
    }

    pub fn send(&mut self, byte: u8) {
        unsafe {
            for _ in 0..TRANSMIT_SPINS {
                if self.io.read_byte(self.base + LINE_STATUS) & LINE_STATUS_THR_EMPTY != 0 {
                    break;
                }
                core::hint::spin_loop();
            }
            self.io.write_byte(self.base + DATA, byte);
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == b'\n' {
                self.send(b'\r');
            }
            self.send(byte);
        }
    }
}

impl<P: PortIo> fmt::Write for SerialPort<'_, P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, MockPlatform};

    #[test]
    fn init_programs_line() {
        let io = MockPlatform::new();
        let mut port = SerialPort::new(&io, COM1);

        unsafe { port.init() };

        let writes: Vec<(u16, u8)> = io
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Write { port, value, .. } => Some((port, value)),
                _ => None,
            })
            .collect();
        assert_eq!(
            writes,
            vec![
                (0x3F9, 0x00),
                (0x3FB, 0x80),
                (0x3F8, 0x03),
                (0x3F9, 0x00),
                (0x3FB, 0x03),
                (0x3FA, 0xC7),
                (0x3FC, 0x0B),
            ]
        );
    }

    #[test]
    fn newline_becomes_crlf() {
        let io = MockPlatform::new();
        io.set_port(COM1 + LINE_STATUS, LINE_STATUS_THR_EMPTY);
        let mut port = SerialPort::new(&io, COM1);

        port.write_bytes(b"ok\n");

        assert_eq!(io.written_to(COM1), b"ok\r\n".to_vec());
    }
}
