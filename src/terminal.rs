use core::fmt;

use crate::config::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use crate::hal::{CellMemory, PortIo};

/// CRT controller index/data ports and the cursor location registers.
pub const CRTC_INDEX: u16 = 0x3D4;
pub const CRTC_DATA: u16 = 0x3D5;
pub const CURSOR_HIGH: u8 = 0x0E;
pub const CURSOR_LOW: u8 = 0x0F;

pub const WIDTH: usize = DISPLAY_WIDTH;
pub const HEIGHT: usize = DISPLAY_HEIGHT;

/// The 16-colour text-mode palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGrey = 7,
    DarkGrey = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    LightMagenta = 13,
    Yellow = 14,
    White = 15,
}

/// An attribute byte: foreground in the low nibble, background in the high one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct ColorCode(pub u8);

impl ColorCode {
    pub const fn new(fg: Color, bg: Color) -> Self {
        ColorCode((fg as u8) | ((bg as u8) << 4))
    }

    pub const fn foreground(self) -> u8 {
        self.0 & 0x0F
    }

    pub const fn background(self) -> u8 {
        self.0 >> 4
    }
}

pub const DEFAULT_COLOR: ColorCode = ColorCode::new(Color::LightGrey, Color::Black);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub character: u8,
    pub color: ColorCode,
}

impl Cell {
    pub const fn blank(color: ColorCode) -> Self {
        Cell {
            character: b' ',
            color,
        }
    }

    pub const fn from_raw(raw: u16) -> Self {
        Cell {
            character: raw as u8,
            color: ColorCode((raw >> 8) as u8),
        }
    }

    pub const fn to_raw(self) -> u16 {
        self.character as u16 | (self.color.0 as u16) << 8
    }
}

/// 80x25 character-cell display with a hardware cursor kept in step.
///
/// Only ever driven from one execution context; callers that reintroduce
/// interrupts must put it behind a lock first.
pub struct Terminal<M, P> {
    memory: M,
    ports: P,
    row: usize,
    column: usize,
    color: ColorCode,
}

impl<M: CellMemory, P: PortIo> Terminal<M, P> {
    pub fn new(memory: M, ports: P) -> Self {
        debug_assert!(memory.cell_count() >= WIDTH * HEIGHT);
        Self {
            memory,
            ports,
            row: 0,
            column: 0,
            color: DEFAULT_COLOR,
        }
    }

    /// Reset to the default colour and a blank screen with the cursor home.
    pub fn init(&mut self) {
        self.row = 0;
        self.column = 0;
        self.color = DEFAULT_COLOR;
        self.clear();
    }

    pub fn put_char(&mut self, c: u8) {
        match c {
            b'\n' => {
                self.column = 0;
                self.row += 1;
            }
            b'\r' => self.column = 0,
            c => {
                let cell = Cell {
                    character: c,
                    color: self.color,
                };
                self.memory.write_cell(self.row * WIDTH + self.column, cell.to_raw());
                self.column += 1;
                if self.column == WIDTH {
                    self.column = 0;
                    self.row += 1;
                }
            }
        }

        // At most one row can have been added above, so one scroll suffices.
        if self.row == HEIGHT {
            self.scroll();
        }

        self.update_cursor();
    }

    pub fn write(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.put_char(b);
        }
    }

    /// Move rows 1..HEIGHT up by one and blank the last row. Leaves the
    /// cursor on the last row; the column is `put_char`'s business.
    pub fn scroll(&mut self) {
        for index in 0..WIDTH * (HEIGHT - 1) {
            let below = self.memory.read_cell(index + WIDTH);
            self.memory.write_cell(index, below);
        }

        let blank = Cell::blank(self.color).to_raw();
        for index in WIDTH * (HEIGHT - 1)..WIDTH * HEIGHT {
            self.memory.write_cell(index, blank);
        }

        self.row = HEIGHT - 1;
    }

    pub fn clear(&mut self) {
        let blank = Cell::blank(self.color).to_raw();
        for index in 0..WIDTH * HEIGHT {
            self.memory.write_cell(index, blank);
        }
        self.row = 0;
        self.column = 0;
        self.update_cursor();
    }

    /// Colour for cells written from now on. Existing cells keep theirs.
    pub fn set_color(&mut self, fg: Color, bg: Color) {
        self.color = ColorCode::new(fg, bg);
    }

    pub fn color(&self) -> ColorCode {
        self.color
    }

    /// (row, column)
    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.column)
    }

    pub fn cell(&self, row: usize, column: usize) -> Cell {
        Cell::from_raw(self.memory.read_cell(row * WIDTH + column))
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }

    fn update_cursor(&mut self) {
        let position = (self.row * WIDTH + self.column) as u16;
        self.ports.write_u8(CRTC_INDEX, CURSOR_LOW);
        self.ports.write_u8(CRTC_DATA, position as u8);
        self.ports.write_u8(CRTC_INDEX, CURSOR_HIGH);
        self.ports.write_u8(CRTC_DATA, (position >> 8) as u8);
    }
}

impl<M: CellMemory, P: PortIo> fmt::Write for Terminal<M, P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s);
        Ok(())
    }
}
