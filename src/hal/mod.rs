//! # Hardware Access
//!
//! Everything above this module talks to the machine through two small
//! capability traits instead of raw pointers and `in`/`out` instructions:
//!
//! | Trait        | Real implementation | Host double          |
//! |--------------|---------------------|----------------------|
//! | [`PortIo`]     | [`Pio`]               | `mock::MockPorts`    |
//! | [`CellMemory`] | [`VgaMemory`]         | `mock::BufferMemory` |
//!
//! The CPU primitives (interrupt masking, halting, descriptor table loads,
//! control register reads) live in [`cpu`].

pub mod cpu;
pub mod memory;
pub mod port;

#[cfg(test)]
pub mod mock;

pub use memory::{aliased, CellMemory, VgaMemory, ADDRESS_LINE_20};
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use port::Pio;
pub use port::PortIo;
