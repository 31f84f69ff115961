//! Compile-time kernel configuration.
//!
//! There is no configuration file at this boot stage; everything is fixed
//! when the kernel is built. The verbosity threshold is picked with one of the
//! `max-level-*` cargo features (Debug if none is enabled).

use crate::logger::Level;
use crate::serial::{Baud, COM1};
use crate::terminal::Color;

#[cfg(feature = "max-level-error")]
pub const LOG_LEVEL: Level = Level::Error;
#[cfg(all(feature = "max-level-warn", not(feature = "max-level-error")))]
pub const LOG_LEVEL: Level = Level::Warn;
#[cfg(all(
    feature = "max-level-info",
    not(any(feature = "max-level-error", feature = "max-level-warn"))
))]
pub const LOG_LEVEL: Level = Level::Info;
#[cfg(not(any(
    feature = "max-level-error",
    feature = "max-level-warn",
    feature = "max-level-info"
)))]
pub const LOG_LEVEL: Level = Level::Debug;

/// Debug serial line.
pub const SERIAL_PORT: u16 = COM1;
pub const SERIAL_BAUD: Baud = Baud::B38400;

/// Where the bootloader places the image; `linker.ld` links it here too.
pub const KERNEL_LOAD_ADDR: usize = 0x0010_0000;

/// Colour text-mode buffer.
pub const DISPLAY_BUFFER_ADDR: usize = 0xB8000;
pub const DISPLAY_WIDTH: usize = 80;
pub const DISPLAY_HEIGHT: usize = 25;
pub const DISPLAY_CELLS: usize = DISPLAY_WIDTH * DISPLAY_HEIGHT;

/// Colours the fatal handler switches to for its banner and its register dump.
pub const ATTENTION_COLOR: Color = Color::LightRed;
pub const DUMP_COLOR: Color = Color::White;
