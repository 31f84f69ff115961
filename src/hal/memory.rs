//! Memory-mapped display cells, plus the address-wrap probe.

use core::ptr::{read_volatile, write_volatile};

use crate::config::{DISPLAY_BUFFER_ADDR, DISPLAY_CELLS};

/// With the A20 gate closed this address bit is forced to zero, so every
/// address in the second megabyte wraps onto the first.
pub const ADDRESS_LINE_20: usize = 1 << 20;

/// A linear array of 16-bit display cells (character byte low, attribute byte high).
pub trait CellMemory {
    fn read_cell(&self, index: usize) -> u16;
    fn write_cell(&mut self, index: usize, value: u16);
    fn cell_count(&self) -> usize;
}

/// Cells backed by physical memory, accessed with volatile loads and stores
/// so the compiler never elides or merges writes the display controller reads.
pub struct VgaMemory {
    base: *mut u16,
    cells: usize,
}

// Only one execution context exists; the pointer is never shared across threads.
unsafe impl Send for VgaMemory {}

impl VgaMemory {
    /// # Safety
    /// `base` must point to `cells` writable 16-bit cells that stay mapped
    /// for the life of the value, and nothing else may alias them.
    pub const unsafe fn new(base: usize, cells: usize) -> Self {
        Self {
            base: base as *mut u16,
            cells,
        }
    }

    /// The standard colour text buffer at 0xB8000.
    ///
    /// # Safety
    /// Same as [`VgaMemory::new`]; create at most one.
    pub const unsafe fn text_buffer() -> Self {
        Self::new(DISPLAY_BUFFER_ADDR, DISPLAY_CELLS)
    }
}

impl CellMemory for VgaMemory {
    fn read_cell(&self, index: usize) -> u16 {
        assert!(index < self.cells);
        unsafe { read_volatile(self.base.add(index)) }
    }

    fn write_cell(&mut self, index: usize, value: u16) {
        assert!(index < self.cells);
        unsafe { write_volatile(self.base.add(index), value) }
    }

    fn cell_count(&self) -> usize {
        self.cells
    }
}

/// True when a store through `high` lands on the word behind `low`.
/// Both words hold their old values again on return.
///
/// # Safety
/// Both pointers must be valid for volatile `u32` reads and writes, and
/// nothing else may touch either word while this runs.
pub unsafe fn aliased(low: *mut u32, high: *mut u32) -> bool {
    let saved_low = read_volatile(low);
    let saved_high = read_volatile(high);

    write_volatile(low, 0xDEAD_BEEF);
    write_volatile(high, 0xCAFE_BABE);
    let wrapped = read_volatile(low) != 0xDEAD_BEEF;

    write_volatile(high, saved_high);
    write_volatile(low, saved_low);
    wrapped
}
