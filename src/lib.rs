//! # protokernel
//!
//! The first layer a 32-bit x86 kernel runs after the bootloader hands over
//! in protected mode: descriptor tables, a text console, a serial debug line,
//! printf-style logging and the panic path.
//!
//! ## Modules
//!
//! | Module     | Role                                               |
//! |------------|----------------------------------------------------|
//! | `hal`      | port I/O, display memory and CPU primitives        |
//! | `gdt`      | descriptor encoding and the flat GDT               |
//! | `terminal` | 80x25 text console with hardware cursor            |
//! | `serial`   | polling 16550 transmitter                          |
//! | `format`   | integer/pointer text conversion, fixed buffers     |
//! | `logger`   | `printk!`, level filtering, `log` facade bridge    |
//! | `fatal`    | register snapshot, panic report, halt loop         |
//! | `kernel`   | phased bring-up and component status               |
//! | `ktest`    | in-kernel test harness                             |
//!
//! Everything runs in a single execution context with interrupts off. The
//! components own their state and are passed by reference; none of them
//! locks internally.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod fatal;
pub mod format;
pub mod gdt;
pub mod hal;
pub mod kernel;
pub mod ktest;
pub mod logger;
pub mod serial;
pub mod terminal;
