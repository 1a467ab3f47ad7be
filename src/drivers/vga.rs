//! VGA text mode (80x25) writer.
//!
//! Each cell is a `u16`: character byte in the low half, color attribute in
//! the high half (background nibble, foreground nibble).

pub const COLS: usize = 80;
pub const ROWS: usize = 25;
pub const VGA_BUFFER_ADDRESS: usize = 0xB8000;

pub type ScreenBuffer = [u16; COLS * ROWS];

/// Fire-and-forget text output.
pub trait TextSink {
    fn write_string(&mut self, bytes: &[u8]);
    fn clear_screen(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VgaColor {
    Black = 0x0,
    Blue = 0x1,
    Green = 0x2,
    Cyan = 0x3,
    Red = 0x4,
    Magenta = 0x5,
    Brown = 0x6,
    LightGray = 0x7,
    DarkGray = 0x8,
    LightBlue = 0x9,
    LightGreen = 0xA,
    LightCyan = 0xB,
    LightRed = 0xC,
    Pink = 0xD,
    Yellow = 0xE,
    White = 0xF,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorCode(u8);

impl ColorCode {
    pub const fn new(foreground: VgaColor, background: VgaColor) -> Self {
        Self((background as u8) << 4 | foreground as u8)
    }
}

pub struct VgaWriter<'a> {
    buffer: &'a mut ScreenBuffer,
    col: usize,
    row: usize,
    color: ColorCode,
}

impl<'a> VgaWriter<'a> {
    pub fn new(buffer: &'a mut ScreenBuffer) -> Self {
        Self {
            buffer,
            col: 0,
            row: 0,
            color: ColorCode::new(VgaColor::LightGray, VgaColor::Black),
        }
    }

    pub fn set_color(&mut self, color: ColorCode) {
        self.color = color;
    }

    pub fn position(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    fn screen_char(&self, byte: u8) -> u16 {
        u16::from(self.color.0) << 8 | u16::from(byte)
    }

    pub fn put_byte(&mut self, byte: u8) {
        if byte == b'\n' {
            self.new_line();
            return;
        }

        self.buffer[self.row * COLS + self.col] = self.screen_char(byte);
        self.col += 1;
        if self.col == COLS {
            self.new_line();
        }
    }

    fn new_line(&mut self) {
        self.col = 0;
        if self.row + 1 < ROWS {
            self.row += 1;
            return;
        }

        self.buffer.copy_within(COLS.., 0);
        self.blank_row(ROWS - 1);
    }

    fn blank_row(&mut self, row: usize) {
        let blank = self.screen_char(b' ');
        self.buffer[row * COLS..(row + 1) * COLS].fill(blank);
    }
}

impl VgaWriter<'static> {
    /// Writer over the memory-mapped text buffer.
    ///
    /// # Safety
    /// Only one writer may exist, and 0xB8000 must be identity mapped.
    pub unsafe fn hardware() -> Self {
        Self::new(&mut *(VGA_BUFFER_ADDRESS as *mut ScreenBuffer))
    }
}

impl TextSink for VgaWriter<'_> {
    fn write_string(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.put_byte(byte);
        }
    }

    fn clear_screen(&mut self) {
        for row in 0..ROWS {
            self.blank_row(row);
        }
        self.col = 0;
        self.row = 0;
    }
}

impl core::fmt::Write for VgaWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.write_string(s.as_bytes());
        Ok(())
    }
}
