//! Integer and pointer to text conversion into caller-supplied buffers.
//!
//! Every function here writes at most `buf.len() - 1` characters followed by a
//! NUL, returns the number of characters written (terminator excluded), and
//! quietly truncates when the buffer is too small. An empty buffer is left
//! untouched and yields 0.

use core::fmt::{self, Write};

const DIGITS_LOWER: &[u8; 16] = b"0123456789abcdef";
const DIGITS_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Magnitude of `i32::MIN`, which `-value` cannot produce.
const I32_MIN_DIGITS: &[u8] = b"2147483648";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Decimal = 10,
    Hex = 16,
}

/// Copy as much of `src` as fits (leaving room for the NUL) and terminate.
fn copy_terminated(buf: &mut [u8], src: &[u8]) -> usize {
    let Some(room) = buf.len().checked_sub(1) else {
        return 0;
    };
    let len = src.len().min(room);
    buf[..len].copy_from_slice(&src[..len]);
    buf[len] = 0;
    len
}

pub fn unsigned_to_text(buf: &mut [u8], value: u32, radix: Radix, uppercase: bool) -> usize {
    if value == 0 {
        return copy_terminated(buf, b"0");
    }

    let digits = if uppercase { DIGITS_UPPER } else { DIGITS_LOWER };
    let base = radix as u32;

    // Least significant digit first, from the back of the scratch space.
    let mut scratch = [0u8; 10];
    let mut start = scratch.len();
    let mut n = value;
    while n > 0 {
        start -= 1;
        scratch[start] = digits[(n % base) as usize];
        n /= base;
    }

    copy_terminated(buf, &scratch[start..])
}

pub fn signed_to_text(buf: &mut [u8], value: i32) -> usize {
    if buf.is_empty() {
        return 0;
    }
    if value >= 0 {
        return unsigned_to_text(buf, value as u32, Radix::Decimal, false);
    }

    let sign = copy_terminated(buf, b"-");
    let rest = &mut buf[sign..];
    let len = if value == i32::MIN {
        copy_terminated(rest, I32_MIN_DIGITS)
    } else {
        unsigned_to_text(rest, (-value) as u32, Radix::Decimal, false)
    };
    sign + len
}

/// `0x` and exactly eight lowercase hex digits.
pub fn pointer_to_text(buf: &mut [u8], value: u32) -> usize {
    let mut text = [0u8; 10];
    text[0] = b'0';
    text[1] = b'x';
    for (i, slot) in text[2..].iter_mut().enumerate() {
        let shift = (7 - i) * 4;
        *slot = DIGITS_LOWER[((value >> shift) & 0xF) as usize];
    }
    copy_terminated(buf, &text)
}

/// View the first `len` bytes of a conversion result as text.
pub fn as_text(buf: &[u8], len: usize) -> &str {
    // The converters only ever emit ASCII.
    core::str::from_utf8(&buf[..len]).unwrap_or("")
}

/// A `fmt::Write` sink over a fixed buffer that truncates instead of failing.
pub struct FixedBuf<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FixedBuf<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        FixedBuf { buf, pos: 0 }
    }

    pub fn as_str(&self) -> &str {
        // Only whole UTF-8 sequences are ever stored.
        core::str::from_utf8(&self.buf[..self.pos]).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }
}

impl Write for FixedBuf<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.buf.len() - self.pos;
        let mut take = s.len().min(room);
        while !s.is_char_boundary(take) {
            take -= 1;
        }
        self.buf[self.pos..self.pos + take].copy_from_slice(&s.as_bytes()[..take]);
        self.pos += take;
        Ok(())
    }
}

/// Render `args` into `buf`, keeping whatever fits.
pub fn format_to<'a>(buf: &'a mut [u8], args: fmt::Arguments<'_>) -> &'a str {
    let mut f = FixedBuf::new(buf);
    let _ = f.write_fmt(args);
    let len = f.pos;
    core::str::from_utf8(&buf[..len]).unwrap_or("")
}

#[macro_export]
macro_rules! format_no_std {
    ($buf:expr, $($arg:tt)*) => {
        $crate::format::format_to($buf, core::format_args!($($arg)*))
    };
}
