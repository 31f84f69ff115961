//! In-memory stand-ins for the hardware, used by the host unit tests.

use std::collections::VecDeque;

use super::{CellMemory, PortIo};
use crate::logger::{Console, Sink};
use crate::terminal::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortWrite {
    Byte(u16, u8),
    Word(u16, u16),
    Dword(u16, u32),
}

/// Records every port write and answers reads from per-port scripts.
///
/// A read first drains the scripted queue for that port, then falls back to
/// the sticky value set with [`MockPorts::set_default`] (0 if none).
#[derive(Debug, Default)]
pub struct MockPorts {
    writes: Vec<PortWrite>,
    scripted: Vec<(u16, VecDeque<u32>)>,
    defaults: Vec<(u16, u32)>,
    reads: usize,
}

impl MockPorts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_default(&mut self, port: u16, value: u32) {
        match self.defaults.iter_mut().find(|(p, _)| *p == port) {
            Some(entry) => entry.1 = value,
            None => self.defaults.push((port, value)),
        }
    }

    pub fn script(&mut self, port: u16, values: &[u32]) {
        match self.scripted.iter_mut().find(|(p, _)| *p == port) {
            Some(entry) => entry.1.extend(values.iter().copied()),
            None => self.scripted.push((port, values.iter().copied().collect())),
        }
    }

    pub fn writes(&self) -> &[PortWrite] {
        &self.writes
    }

    /// Byte values written to one port, in order.
    pub fn bytes_written_to(&self, port: u16) -> Vec<u8> {
        self.writes
            .iter()
            .filter_map(|w| match *w {
                PortWrite::Byte(p, v) if p == port => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn read_count(&self) -> usize {
        self.reads
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    fn next_read(&mut self, port: u16) -> u32 {
        self.reads += 1;
        if let Some((_, queue)) = self.scripted.iter_mut().find(|(p, _)| *p == port) {
            if let Some(value) = queue.pop_front() {
                return value;
            }
        }
        self.defaults
            .iter()
            .find(|(p, _)| *p == port)
            .map(|(_, v)| *v)
            .unwrap_or(0)
    }
}

impl PortIo for MockPorts {
    fn read_u8(&mut self, port: u16) -> u8 {
        self.next_read(port) as u8
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        self.writes.push(PortWrite::Byte(port, value));
    }

    fn read_u16(&mut self, port: u16) -> u16 {
        self.next_read(port) as u16
    }

    fn write_u16(&mut self, port: u16, value: u16) {
        self.writes.push(PortWrite::Word(port, value));
    }

    fn read_u32(&mut self, port: u16) -> u32 {
        self.next_read(port)
    }

    fn write_u32(&mut self, port: u16, value: u32) {
        self.writes.push(PortWrite::Dword(port, value));
    }
}

/// Display cells held in an ordinary array.
pub struct BufferMemory {
    cells: Vec<u16>,
}

impl BufferMemory {
    pub fn new(cells: usize) -> Self {
        Self {
            cells: vec![0; cells],
        }
    }

    /// A buffer pre-filled with `value`, useful to prove a pass overwrote everything.
    pub fn filled(cells: usize, value: u16) -> Self {
        Self {
            cells: vec![value; cells],
        }
    }

    pub fn cells(&self) -> &[u16] {
        &self.cells
    }
}

impl CellMemory for BufferMemory {
    fn read_cell(&self, index: usize) -> u16 {
        self.cells[index]
    }

    fn write_cell(&mut self, index: usize, value: u16) {
        self.cells[index] = value;
    }

    fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

/// A log sink that keeps everything it was given, colour changes included.
#[derive(Debug, Default)]
pub struct Recorder {
    bytes: Vec<u8>,
    colors: Vec<(Color, Color)>,
    /// Byte offset at which each colour change happened.
    color_marks: Vec<usize>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn colors(&self) -> &[(Color, Color)] {
        &self.colors
    }

    /// The text written while the `n`th colour change was in effect.
    pub fn text_in_color(&self, n: usize) -> String {
        let start = self.color_marks[n];
        let end = self.color_marks.get(n + 1).copied().unwrap_or(self.bytes.len());
        String::from_utf8_lossy(&self.bytes[start..end]).into_owned()
    }
}

impl Sink for Recorder {
    fn put_byte(&mut self, byte: u8) {
        self.bytes.push(byte);
    }
}

impl Console for Recorder {
    fn set_color(&mut self, fg: Color, bg: Color) {
        self.colors.push((fg, bg));
        self.color_marks.push(self.bytes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_reads_drain_before_default() {
        let mut ports = MockPorts::new();
        ports.set_default(0x3FD, 0x20);
        ports.script(0x3FD, &[0x00, 0x01]);
        assert_eq!(ports.read_u8(0x3FD), 0x00);
        assert_eq!(ports.read_u8(0x3FD), 0x01);
        assert_eq!(ports.read_u8(0x3FD), 0x20);
        assert_eq!(ports.read_u8(0x3FD), 0x20);
        assert_eq!(ports.read_u16(0x60), 0);
        assert_eq!(ports.read_count(), 5);
    }

    #[test]
    fn writes_are_recorded_in_order() {
        let mut ports = MockPorts::new();
        ports.write_u8(0x3D4, 0x0F);
        ports.write_u16(0x1F0, 0xBEEF);
        ports.write_u32(0xCF8, 0x8000_0000);
        ports.write_u8(0x3D4, 0x0E);
        assert_eq!(
            ports.writes(),
            &[
                PortWrite::Byte(0x3D4, 0x0F),
                PortWrite::Word(0x1F0, 0xBEEF),
                PortWrite::Dword(0xCF8, 0x8000_0000),
                PortWrite::Byte(0x3D4, 0x0E),
            ]
        );
        assert_eq!(ports.bytes_written_to(0x3D4), vec![0x0F, 0x0E]);
    }
}
