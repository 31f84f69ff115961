//! Kernel entry for 32-bit protected mode.
//!
//! The bootloader jumps to [`kmain`] with interrupts disabled, a flat code
//! segment and a usable stack. Build with the bundled target description:
//!
//! ```text
//! cargo +nightly build --bin protokernel --target i686-protokernel.json -Zbuild-std=core
//! ```
//!
//! On any other target this binary is an empty shell so that the workspace
//! still builds and tests on a development host.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(all(target_os = "none", target_arch = "x86"))]
extern crate rlibc;

#[cfg(all(target_os = "none", target_arch = "x86", feature = "ktest"))]
mod suites;

#[cfg(all(target_os = "none", target_arch = "x86"))]
mod boot {
    use core::panic::PanicInfo;

    use protokernel::config::LOG_LEVEL;
    use protokernel::gdt::{self, DescriptorTable};
    use protokernel::hal::{cpu, Pio, VgaMemory};
    use protokernel::logger::{GlobalLogger, Logger};
    use protokernel::serial::{SerialConfig, SerialPort};
    use protokernel::terminal::Terminal;
    use protokernel::{fatal, format_no_std, kernel};
    use spin::Lazy;

    pub type KernelTerminal = Terminal<VgaMemory, Pio>;
    pub type KernelSerial = SerialPort<Pio>;

    static GDT: Lazy<DescriptorTable> = Lazy::new(gdt::build_table);

    pub static LOGGER: GlobalLogger<KernelTerminal, KernelSerial> = GlobalLogger::new();

    #[no_mangle]
    pub extern "C" fn kmain() -> ! {
        let descriptors = kernel::init_phase("Descriptor Table", || kernel::init_descriptor_table(&GDT));

        // SAFETY: the only handle on the text buffer for the life of the kernel.
        let mut terminal = Terminal::new(unsafe { VgaMemory::text_buffer() }, Pio);
        let mut serial = SerialPort::new(Pio, SerialConfig::default());

        let display = kernel::init_phase("Terminal", || {
            terminal.init();
            Ok(())
        });
        let line = kernel::init_phase("Serial", || {
            serial.init();
            Ok(())
        });

        LOGGER.install(Logger::new(terminal, serial));
        let logging = kernel::init_phase("Logger", || {
            log::set_logger(&LOGGER).map_err(|_| "another logger is already registered")?;
            log::set_max_level(LOG_LEVEL.into());
            Ok(())
        });

        if let Err(e) = descriptors.and(display).and(line).and(logging) {
            escalate(e);
        }

        LOGGER.with(|logger| kernel::print_banner(logger, &kernel::status::table().lock()));

        #[cfg(feature = "ktest")]
        if !crate::suites::run_all(&LOGGER) {
            // Don't carry on with a kernel that failed its own checks.
            fatal::halt_forever();
        }

        log::info!("Boot complete, idling");
        loop {
            cpu::halt();
        }
    }

    /// Hand a boot error to the fatal handler.
    fn escalate(message: &str) -> ! {
        LOGGER.with(|logger| fatal::panic(logger, message));
        fatal::halt_forever()
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        // Keep first.
        let regs = fatal::capture_registers();

        let mut text = [0u8; 160];
        let message = match info.location() {
            Some(location) => format_no_std!(
                &mut text,
                "{} ({}:{})",
                info.message(),
                location.file(),
                location.line()
            ),
            None => format_no_std!(&mut text, "{}", info.message()),
        };

        // SAFETY: whoever held the logger is the code that just panicked and
        // will never run again.
        unsafe { LOGGER.force_unlock() };
        LOGGER.with(|logger| fatal::panic_with(logger, &regs, message));
        fatal::halt_forever()
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("protokernel is a freestanding i686 kernel; build it with --target i686-protokernel.json");
}
