//! # Diagnostic Logger
//!
//! printf-style kernel logging to the console and the serial line at once.
//!
//! ## Format Specifiers
//!
//! | Spec | Argument            | Output                     |
//! |------|---------------------|----------------------------|
//! | `%s` | `Arg::Str`          | text, `(null)` for `None`  |
//! | `%d` | `Arg::Int`          | signed decimal             |
//! | `%u` | `Arg::Uint`         | unsigned decimal           |
//! | `%x` | `Arg::Uint`         | lowercase hex              |
//! | `%X` | `Arg::Uint`         | uppercase hex              |
//! | `%c` | `Arg::Char`         | one byte                   |
//! | `%p` | `Arg::Ptr`          | `0x` + 8 hex digits        |
//! | `%%` | none                | `%`                        |
//!
//! Any other character after `%` is printed literally with its `%` and takes
//! no argument; a `%` at the very end is dropped. Integer arguments are
//! reinterpreted as 32-bit values when the specifier wants another integer
//! flavour, the way C varargs behave.
//!
//! ## Usage
//!
//! ```ignore
//! printk!(logger, Level::Info, "PMM: %u pages free\n", free_pages);
//! ```

use core::fmt;

use spin::Mutex;

use crate::config::LOG_LEVEL;
use crate::format::{pointer_to_text, signed_to_text, unsigned_to_text, Radix};
use crate::hal::{CellMemory, PortIo};
use crate::serial::SerialPort;
use crate::terminal::{Color, Terminal};

/// Verbosity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl Level {
    /// Fixed-width prefix; part of the captured-transcript format.
    pub const fn tag(self) -> &'static str {
        match self {
            Level::Error => "[ERROR] ",
            Level::Warn => "[WARN]  ",
            Level::Info => "[INFO]  ",
            Level::Debug => "[DEBUG] ",
        }
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug | log::Level::Trace => Level::Debug,
        }
    }
}

impl From<Level> for log::LevelFilter {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => log::LevelFilter::Error,
            Level::Warn => log::LevelFilter::Warn,
            Level::Info => log::LevelFilter::Info,
            Level::Debug => log::LevelFilter::Trace,
        }
    }
}

/// One typed format argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg<'a> {
    Str(Option<&'a str>),
    Int(i32),
    Uint(u32),
    Char(u8),
    Ptr(u32),
}

impl<'a> Arg<'a> {
    fn as_u32(&self) -> u32 {
        match *self {
            Arg::Int(v) => v as u32,
            Arg::Uint(v) | Arg::Ptr(v) => v,
            Arg::Char(c) => u32::from(c),
            Arg::Str(_) => 0,
        }
    }

    fn as_i32(&self) -> i32 {
        self.as_u32() as i32
    }

    fn as_char(&self) -> Option<u8> {
        match *self {
            Arg::Str(_) => None,
            other => Some(other.as_u32() as u8),
        }
    }

    fn as_str(&self) -> Option<&'a str> {
        match *self {
            Arg::Str(s) => s,
            _ => None,
        }
    }
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(s: &'a str) -> Self {
        Arg::Str(Some(s))
    }
}

impl<'a> From<Option<&'a str>> for Arg<'a> {
    fn from(s: Option<&'a str>) -> Self {
        Arg::Str(s)
    }
}

impl From<i32> for Arg<'_> {
    fn from(v: i32) -> Self {
        Arg::Int(v)
    }
}

impl From<u32> for Arg<'_> {
    fn from(v: u32) -> Self {
        Arg::Uint(v)
    }
}

impl From<usize> for Arg<'_> {
    fn from(v: usize) -> Self {
        Arg::Uint(v as u32)
    }
}

impl From<u16> for Arg<'_> {
    fn from(v: u16) -> Self {
        Arg::Uint(u32::from(v))
    }
}

impl From<u8> for Arg<'_> {
    fn from(c: u8) -> Self {
        Arg::Char(c)
    }
}

impl From<char> for Arg<'_> {
    fn from(c: char) -> Self {
        Arg::Char(if c.is_ascii() { c as u8 } else { b'?' })
    }
}

impl<T> From<*const T> for Arg<'_> {
    fn from(p: *const T) -> Self {
        Arg::Ptr(p as usize as u32)
    }
}

impl<T> From<*mut T> for Arg<'_> {
    fn from(p: *mut T) -> Self {
        Arg::Ptr(p as usize as u32)
    }
}

/// Somewhere bytes can be sent.
pub trait Sink {
    fn put_byte(&mut self, byte: u8);
}

/// A sink that can also change the colour of what follows.
pub trait Console: Sink {
    fn set_color(&mut self, fg: Color, bg: Color);
}

impl<M: CellMemory, P: PortIo> Sink for Terminal<M, P> {
    fn put_byte(&mut self, byte: u8) {
        self.put_char(byte);
    }
}

impl<M: CellMemory, P: PortIo> Console for Terminal<M, P> {
    fn set_color(&mut self, fg: Color, bg: Color) {
        Terminal::set_color(self, fg, bg);
    }
}

impl<P: PortIo> Sink for SerialPort<P> {
    fn put_byte(&mut self, byte: u8) {
        SerialPort::put_byte(self, byte);
    }
}

pub struct Logger<C, S> {
    console: C,
    serial: S,
    threshold: Level,
    serial_crlf: bool,
}

impl<C: Console, S: Sink> Logger<C, S> {
    /// Logger at the compiled-in verbosity.
    pub fn new(console: C, serial: S) -> Self {
        Self::with_threshold(console, serial, LOG_LEVEL)
    }

    pub fn with_threshold(console: C, serial: S, threshold: Level) -> Self {
        Self {
            console,
            serial,
            threshold,
            serial_crlf: false,
        }
    }

    /// Put a `\r` before every `\n` on the serial side only.
    pub fn with_serial_crlf(mut self, enabled: bool) -> Self {
        self.serial_crlf = enabled;
        self
    }

    pub fn threshold(&self) -> Level {
        self.threshold
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.threshold
    }

    pub fn log(&mut self, level: Level, fmt: &str, args: &[Arg<'_>]) {
        if !self.enabled(level) {
            return;
        }
        self.emit_str(level.tag());
        self.format(fmt, args);
    }

    /// Formatted output with no level tag and no filtering.
    pub fn print(&mut self, fmt: &str, args: &[Arg<'_>]) {
        self.format(fmt, args);
    }

    /// Same pipeline for `core::fmt` callers such as the `log` facade.
    pub fn log_fmt(&mut self, level: Level, args: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        self.emit_str(level.tag());
        let _ = fmt::Write::write_fmt(self, args);
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    pub fn serial(&self) -> &S {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    fn format(&mut self, fmt: &str, args: &[Arg<'_>]) {
        let mut args = args.iter();
        let mut bytes = fmt.bytes();

        while let Some(c) = bytes.next() {
            if c != b'%' {
                self.emit(c);
                continue;
            }

            let Some(spec) = bytes.next() else {
                break;
            };

            let mut digits = [0u8; 12];
            match spec {
                b's' => {
                    let s = args.next().and_then(Arg::as_str).unwrap_or("(null)");
                    self.emit_str(s);
                }
                b'd' => {
                    let n = args.next().map_or(0, Arg::as_i32);
                    let len = signed_to_text(&mut digits, n);
                    self.emit_bytes(&digits[..len]);
                }
                b'u' | b'x' | b'X' => {
                    let n = args.next().map_or(0, Arg::as_u32);
                    let radix = if spec == b'u' { Radix::Decimal } else { Radix::Hex };
                    let len = unsigned_to_text(&mut digits, n, radix, spec == b'X');
                    self.emit_bytes(&digits[..len]);
                }
                b'c' => {
                    if let Some(ch) = args.next().and_then(Arg::as_char) {
                        self.emit(ch);
                    }
                }
                b'p' => {
                    let n = args.next().map_or(0, Arg::as_u32);
                    let len = pointer_to_text(&mut digits, n);
                    self.emit_bytes(&digits[..len]);
                }
                b'%' => self.emit(b'%'),
                other => {
                    self.emit(b'%');
                    self.emit(other);
                }
            }
        }
    }

    fn emit(&mut self, byte: u8) {
        self.console.put_byte(byte);
        if self.serial_crlf && byte == b'\n' {
            self.serial.put_byte(b'\r');
        }
        self.serial.put_byte(byte);
    }

    fn emit_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.emit(b);
        }
    }

    fn emit_str(&mut self, s: &str) {
        self.emit_bytes(s.as_bytes());
    }
}

impl<C: Console, S: Sink> fmt::Write for Logger<C, S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.emit_str(s);
        Ok(())
    }
}

/// `printk!(logger, level, "fmt", args...)`, converting each argument with `Arg::from`.
#[macro_export]
macro_rules! printk {
    ($logger:expr, $level:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {
        $logger.log($level, $fmt, &[$($crate::logger::Arg::from($arg)),*])
    };
}

/// The kernel's one logger, reachable from the `log` facade and the panic path.
pub struct GlobalLogger<C, S> {
    inner: Mutex<Option<Logger<C, S>>>,
}

impl<C, S> GlobalLogger<C, S> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    pub fn install(&self, logger: Logger<C, S>) {
        *self.inner.lock() = Some(logger);
    }

    pub fn is_installed(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Run `f` on the installed logger; `None` if nothing is installed yet.
    pub fn with<R>(&self, f: impl FnOnce(&mut Logger<C, S>) -> R) -> Option<R> {
        self.inner.lock().as_mut().map(f)
    }

    /// # Safety
    /// Only for the fatal path: the holder of the lock must never run again.
    pub unsafe fn force_unlock(&self) {
        if self.inner.is_locked() {
            self.inner.force_unlock();
        }
    }
}

impl<C, S> Default for GlobalLogger<C, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, S> log::Log for GlobalLogger<C, S>
where
    C: Console + Send,
    S: Sink + Send,
{
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        self.inner
            .try_lock()
            .and_then(|guard| guard.as_ref().map(|l| l.enabled(metadata.level().into())))
            .unwrap_or(false)
    }

    fn log(&self, record: &log::Record<'_>) {
        // A record raised while the logger is busy (re-entrancy) is dropped
        // rather than spinning on a lock its own caller holds.
        if let Some(mut guard) = self.inner.try_lock() {
            if let Some(logger) = guard.as_mut() {
                let level = record.level().into();
                if logger.enabled(level) {
                    logger.log_fmt(level, *record.args());
                    logger.emit(b'\n');
                }
            }
        }
    }

    fn flush(&self) {}
}
