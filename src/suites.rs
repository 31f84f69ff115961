//! Checks that only mean something on the real machine: the state the
//! bootloader left behind, live segment registers, the real text buffer,
//! the real serial line.

use protokernel::config::KERNEL_LOAD_ADDR;
use protokernel::format::{pointer_to_text, signed_to_text, unsigned_to_text, Radix};
use protokernel::gdt::{
    self, Descriptor, TablePointer, KERNEL_CODE_SELECTOR, KERNEL_DATA_SELECTOR, TSS_SELECTOR, USER_CODE_SELECTOR,
    USER_DATA_SELECTOR,
};
use protokernel::hal::{self, cpu, CellMemory, PortIo, ADDRESS_LINE_20};
use protokernel::ktest::TestRunner;
use protokernel::logger::{Arg, Console, GlobalLogger, Level, Sink};
use protokernel::serial::SerialPort;
use protokernel::terminal::{Color, ColorCode, Terminal, DEFAULT_COLOR, HEIGHT, WIDTH};
use protokernel::{check, check_eq, printk};

extern "C" {
    /// First byte of the image, from `linker.ld`.
    static __kernel_start: u8;
}

/// Lives in .bss, which the small image keeps inside the second megabyte.
static mut A20_PROBE: u32 = 0;

/// Run every suite; true when nothing failed.
pub fn run_all<M, P>(logger: &GlobalLogger<Terminal<M, P>, SerialPort<P>>) -> bool
where
    M: CellMemory,
    P: PortIo,
{
    logger
        .with(|logger| {
            let mut runner = TestRunner::new(logger);
            boot_suite(&mut runner);
            gdt_suite(&mut runner);
            terminal_suite(&mut runner);
            printk_suite(&mut runner);
            serial_suite(&mut runner);
            runner.finish()
        })
        .unwrap_or(false)
}

fn boot_suite<C: Console, S: Sink>(runner: &mut TestRunner<'_, C, S>) {
    runner.begin("boot");

    let cr0 = cpu::control_register0();
    check!(
        runner,
        cr0 & cpu::CR0_PROTECTION_ENABLE != 0,
        "CR0.PE bit not set - not in protected mode"
    );

    let high = unsafe { core::ptr::addr_of_mut!(A20_PROBE) };
    let low = (high as usize & !ADDRESS_LINE_20) as *mut u32;
    // SAFETY: interrupts are off and nothing else uses either word; both
    // are restored before the probe returns.
    let wrapped = unsafe { hal::aliased(low, high) };
    check!(runner, !wrapped, "A20 line not enabled - memory wrapping detected");

    let start = unsafe { core::ptr::addr_of!(__kernel_start) } as usize;
    check_eq!(runner, KERNEL_LOAD_ADDR, start);

    runner.end();
}

fn gdt_suite<C: Console, S: Sink>(runner: &mut TestRunner<'_, C, S>) {
    runner.begin("gdt");

    check_eq!(runner, 0x08, KERNEL_CODE_SELECTOR.0);
    check_eq!(runner, 0x10, KERNEL_DATA_SELECTOR.0);
    check_eq!(runner, 0x1B, USER_CODE_SELECTOR.0);
    check_eq!(runner, 0x23, USER_DATA_SELECTOR.0);
    check_eq!(runner, 0x28, TSS_SELECTOR.0);

    check_eq!(runner, 8, core::mem::size_of::<Descriptor>());
    check_eq!(runner, 6, core::mem::size_of::<TablePointer>());

    let gdtr = cpu::stored_descriptor_table();
    let limit = gdtr.limit;
    let base = gdtr.base;
    check_eq!(runner, 47, limit);
    check!(runner, base != 0, "GDT base address is NULL");

    check_eq!(runner, KERNEL_CODE_SELECTOR.0, cpu::code_selector());
    check_eq!(runner, KERNEL_DATA_SELECTOR.0, cpu::data_selector());
    check_eq!(runner, KERNEL_DATA_SELECTOR.0, cpu::stack_selector());

    let table = gdt::build_table();
    check!(runner, table.entry(1).is_some_and(Descriptor::is_present));
    check!(runner, table.entry(5).is_some_and(|tss| !tss.is_present()));

    runner.end();
}

fn terminal_suite<M, P, S>(runner: &mut TestRunner<'_, Terminal<M, P>, S>)
where
    M: CellMemory,
    P: PortIo,
    S: Sink,
{
    runner.begin("terminal");

    check_eq!(runner, 80, WIDTH);
    check_eq!(runner, 25, HEIGHT);
    check_eq!(runner, 0x07, DEFAULT_COLOR.0);

    // Each block reads the screen back before checking, because the check
    // itself prints.
    let term = runner.logger_mut().console_mut();
    term.clear();
    let blank = term.cell(0, 0);
    check_eq!(runner, b' ', blank.character);
    check_eq!(runner, DEFAULT_COLOR, blank.color);

    let term = runner.logger_mut().console_mut();
    term.clear();
    term.write("AB");
    let (a, b) = (term.cell(0, 0).character, term.cell(0, 1).character);
    check_eq!(runner, b'A', a);
    check_eq!(runner, b'B', b);

    let term = runner.logger_mut().console_mut();
    term.clear();
    term.write("X\nY");
    let y = term.cell(1, 0).character;
    check_eq!(runner, b'Y', y);

    let term = runner.logger_mut().console_mut();
    term.clear();
    term.set_color(Color::White, Color::Blue);
    term.put_char(b'C');
    let attr = term.cell(0, 0).color;
    term.set_color(Color::LightGrey, Color::Black);
    check_eq!(runner, ColorCode(0x1F), attr);

    let term = runner.logger_mut().console_mut();
    term.clear();
    for _ in 0..WIDTH {
        term.put_char(b'.');
    }
    term.put_char(b'W');
    let wrapped = term.cell(1, 0).character;
    check_eq!(runner, b'W', wrapped);

    let term = runner.logger_mut().console_mut();
    term.clear();
    term.write("ABCDE\rX");
    let (x, b) = (term.cell(0, 0).character, term.cell(0, 1).character);
    check_eq!(runner, b'X', x);
    check_eq!(runner, b'B', b);

    let term = runner.logger_mut().console_mut();
    term.clear();
    for row in 0..HEIGHT {
        term.put_char(b'0' + (row % 10) as u8);
        term.put_char(b'\n');
    }
    let (top, bottom) = (term.cell(0, 0).character, term.cell(HEIGHT - 1, 0).character);
    term.clear();
    check_eq!(runner, b'1', top);
    check_eq!(runner, b' ', bottom);

    runner.end();
}

fn printk_suite<C: Console, S: Sink>(runner: &mut TestRunner<'_, C, S>) {
    runner.begin("printk");

    let mut buf = [0u8; 12];
    let len = signed_to_text(&mut buf, i32::MIN);
    check_eq!(runner, b"-2147483648", &buf[..len]);
    let len = unsigned_to_text(&mut buf, 0xDEADBEEF, Radix::Hex, true);
    check_eq!(runner, b"DEADBEEF", &buf[..len]);
    let len = pointer_to_text(&mut buf, 0xC010_0000);
    check_eq!(runner, b"0xc0100000", &buf[..len]);

    let mut small = [0u8; 4];
    let len = unsigned_to_text(&mut small, 12345, Radix::Decimal, false);
    check_eq!(runner, b"123\0", &small);
    check_eq!(runner, 3, len);

    // The rest is for whoever reads the transcript.
    let logger = runner.logger_mut();
    printk!(logger, Level::Debug, "String test: %s, NULL string: %s\n", "hello", Arg::Str(None));
    printk!(logger, Level::Debug, "Signed: %d %d %d, unsigned: %u\n", 12345, -12345, 0, u32::MAX);
    printk!(logger, Level::Debug, "Hex: %x %X %x\n", 0xDEADBEEFu32, 0xDEADBEEFu32, 0u32);
    printk!(logger, Level::Debug, "Char: %c%c%c\n", 'A', 'B', 'C');
    printk!(logger, Level::Debug, "Pointer: %p, NULL pointer: %p\n", 0xC010_0000usize as *const u8, core::ptr::null::<u8>());
    printk!(logger, Level::Debug, "Percent: 100%% complete\n");
    printk!(logger, Level::Error, "Error level message\n");
    printk!(logger, Level::Warn, "Warning level message\n");
    printk!(logger, Level::Info, "Info level message\n");
    printk!(logger, Level::Debug, "Debug level message\n");
    runner.pass("printk transcript");

    runner.end();
}

fn serial_suite<C: Console, P: PortIo>(runner: &mut TestRunner<'_, C, SerialPort<P>>) {
    runner.begin("serial");

    let port = runner.logger_mut().serial_mut();
    for b in *b"SER\n" {
        port.put_byte(b);
    }
    port.write_text("Serial string test OK\n");
    port.write_bytes(b"RAW\n");
    // Getting here means the transmitter never wedged.
    runner.pass("serial output");

    runner.end();
}
