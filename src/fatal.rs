//! # Fatal Handler
//!
//! The one way out of a broken kernel: snapshot the registers, report once on
//! every sink, then halt for good.
//!
//! ```text
//! Running ──panic()──▶ Panicking ──report done──▶ Halted
//!                          │
//!                          └─ panic() again: skip the report, halt
//! ```
//!
//! The snapshot is only meaningful if it is taken before anything else in the
//! fatal entry touches a register. [`capture_registers`] is therefore always
//! inlined and must stay the first statement of [`panic`], which itself is
//! never inlined so the frame it reports belongs to a known function.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::config::{ATTENTION_COLOR, DUMP_COLOR};
use crate::hal::cpu;
use crate::logger::{Console, Level, Logger, Sink};
use crate::printk;
use crate::terminal::Color;

/// Machine state at the moment of the panic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct RegisterSnapshot {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub eflags: u32,
    /// Return address found at `[ebp + 4]`; only right when the caller keeps
    /// a standard frame pointer.
    pub eip: u32,
}

#[cfg(target_arch = "x86")]
static mut SNAPSHOT: RegisterSnapshot = RegisterSnapshot {
    eax: 0,
    ebx: 0,
    ecx: 0,
    edx: 0,
    esi: 0,
    edi: 0,
    ebp: 0,
    esp: 0,
    eflags: 0,
    eip: 0,
};

/// Store every general-purpose register and EFLAGS.
///
/// The destination is a fixed static reached by absolute address, so no
/// register is spent on it. Must run before the caller computes anything.
#[cfg(target_arch = "x86")]
#[inline(always)]
pub fn capture_registers() -> RegisterSnapshot {
    use core::arch::asm;

    unsafe {
        asm!(
            "mov dword ptr [{s} + 0], eax",
            "mov dword ptr [{s} + 4], ebx",
            "mov dword ptr [{s} + 8], ecx",
            "mov dword ptr [{s} + 12], edx",
            "mov dword ptr [{s} + 16], esi",
            "mov dword ptr [{s} + 20], edi",
            "mov dword ptr [{s} + 24], ebp",
            "mov dword ptr [{s} + 28], esp",
            "pushfd",
            "pop dword ptr [{s} + 32]",
            s = sym SNAPSHOT,
            options(preserves_flags),
        );

        let eip: u32;
        asm!(
            "mov {0}, dword ptr [ebp + 4]",
            out(reg) eip,
            options(nostack, readonly, preserves_flags),
        );

        let mut snapshot = core::ptr::read_volatile(core::ptr::addr_of!(SNAPSHOT));
        snapshot.eip = eip;
        snapshot
    }
}

/// Hosts have no 32-bit register file to report.
#[cfg(not(target_arch = "x86"))]
#[inline(always)]
pub fn capture_registers() -> RegisterSnapshot {
    RegisterSnapshot::default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FatalState {
    Running = 0,
    Panicking = 1,
    Halted = 2,
}

impl FatalState {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => FatalState::Running,
            1 => FatalState::Panicking,
            _ => FatalState::Halted,
        }
    }
}

/// One-way state latch.
pub struct FatalLatch(AtomicU8);

impl FatalLatch {
    pub const fn new() -> Self {
        FatalLatch(AtomicU8::new(FatalState::Running as u8))
    }

    pub fn state(&self) -> FatalState {
        FatalState::from_raw(self.0.load(Ordering::SeqCst))
    }

    /// Running → Panicking. False if a panic was already under way.
    pub fn begin(&self) -> bool {
        self.0
            .compare_exchange(
                FatalState::Running as u8,
                FatalState::Panicking as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    pub fn finish(&self) {
        self.0.store(FatalState::Halted as u8, Ordering::SeqCst);
    }
}

impl Default for FatalLatch {
    fn default() -> Self {
        Self::new()
    }
}

static LATCH: FatalLatch = FatalLatch::new();

pub fn state() -> FatalState {
    LATCH.state()
}

/// Write the panic banner, the register dump and the halt notice.
pub fn report<C: Console, S: Sink>(logger: &mut Logger<C, S>, regs: &RegisterSnapshot, message: &str) {
    logger.console_mut().set_color(ATTENTION_COLOR, Color::Black);
    printk!(logger, Level::Error, "\n*** KERNEL PANIC: %s ***\n\n", message);

    logger.console_mut().set_color(DUMP_COLOR, Color::Black);
    printk!(logger, Level::Error, "Register dump:\n");
    printk!(logger, Level::Error, "  EAX=0x%X  EBX=0x%X\n", regs.eax, regs.ebx);
    printk!(logger, Level::Error, "  ECX=0x%X  EDX=0x%X\n", regs.ecx, regs.edx);
    printk!(logger, Level::Error, "  ESI=0x%X  EDI=0x%X\n", regs.esi, regs.edi);
    printk!(logger, Level::Error, "  EBP=0x%X  ESP=0x%X\n", regs.ebp, regs.esp);
    printk!(logger, Level::Error, "  EIP=0x%X  EFLAGS=0x%X\n\n", regs.eip, regs.eflags);

    logger.console_mut().set_color(ATTENTION_COLOR, Color::Black);
    printk!(logger, Level::Error, "System halted.\n");
}

/// Report `message` with the caller's registers and halt. Never returns.
#[inline(never)]
pub fn panic<C: Console, S: Sink>(logger: &mut Logger<C, S>, message: &str) -> ! {
    // Keep first: any statement above this one pollutes the snapshot.
    let regs = capture_registers();
    panic_with(logger, &regs, message)
}

/// As [`panic`], with a snapshot taken earlier by the caller (the Rust panic
/// handler captures before it formats the message).
pub fn panic_with<C: Console, S: Sink>(logger: &mut Logger<C, S>, regs: &RegisterSnapshot, message: &str) -> ! {
    cpu::disable_interrupts();
    if LATCH.begin() {
        report(logger, regs, message);
        LATCH.finish();
    }
    halt_forever()
}

/// Halt with interrupts off, for good. Also the fallback when no logger exists.
pub fn halt_forever() -> ! {
    loop {
        cpu::disable_interrupts();
        cpu::halt();
    }
}
