//! Kernel initialization phases.

use spin::Mutex;

use super::status::{self, InitStatus, StatusTable};
use crate::gdt::{self, DescriptorTable};
use crate::logger::{Console, Level, Logger, Sink};
use crate::printk;

/// Run one boot phase, recording its progress in the kernel status table.
pub fn init_phase<F>(name: &'static str, init_fn: F) -> Result<(), &'static str>
where
    F: FnOnce() -> Result<(), &'static str>,
{
    run_phase(status::table(), name, init_fn)
}

/// [`init_phase`] against an explicit table.
pub fn run_phase<F>(table: &Mutex<StatusTable>, name: &'static str, init_fn: F) -> Result<(), &'static str>
where
    F: FnOnce() -> Result<(), &'static str>,
{
    {
        let mut table = table.lock();
        table.register(name)?;
        table.update(name, InitStatus::InProgress);
    }
    log::debug!("Initializing {}...", name);

    // The lock is not held while the phase runs; a phase may log, and the
    // logger may itself be what the phase installs.
    match init_fn() {
        Ok(()) => {
            table.lock().update(name, InitStatus::Completed);
            log::info!("{} initialized", name);
            Ok(())
        }
        Err(e) => {
            table.lock().update(name, InitStatus::Failed(e));
            log::error!("{} failed: {}", name, e);
            Err(e)
        }
    }
}

/// Load the kernel descriptor table and confirm the CPU took it.
pub fn init_descriptor_table(table: &'static DescriptorTable) -> Result<(), &'static str> {
    table.load();
    gdt::verify_installed(table)
}

/// Startup banner followed by one line per tracked phase.
pub fn print_banner<C: Console, S: Sink>(logger: &mut Logger<C, S>, table: &StatusTable) {
    printk!(logger, Level::Info, "%s %s: protected mode up\n", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    for component in table.iter() {
        match component.status {
            InitStatus::Failed(reason) => {
                printk!(logger, Level::Error, "  %s: failed: %s\n", component.name, reason)
            }
            other => printk!(logger, Level::Info, "  %s: %s\n", component.name, other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::Recorder;

    #[test]
    fn test_run_phase_success() {
        let table = Mutex::new(StatusTable::new());
        let mut ran = false;
        let result = run_phase(&table, "Terminal", || {
            assert_eq!(table.lock().status("Terminal"), Some(InitStatus::InProgress));
            ran = true;
            Ok(())
        });
        assert_eq!(result, Ok(()));
        assert!(ran);
        assert_eq!(table.lock().status("Terminal"), Some(InitStatus::Completed));
    }

    #[test]
    fn test_run_phase_failure_is_recorded_and_returned() {
        let table = Mutex::new(StatusTable::new());
        let result = run_phase(&table, "GDT", || Err("GDTR base does not match the kernel table"));
        assert_eq!(result, Err("GDTR base does not match the kernel table"));
        assert_eq!(
            table.lock().status("GDT"),
            Some(InitStatus::Failed("GDTR base does not match the kernel table"))
        );
        assert!(!table.lock().all_ready());
    }

    #[test]
    fn test_banner_lists_phases() {
        let mut table = StatusTable::new();
        table.register("GDT").unwrap();
        table.update("GDT", InitStatus::Completed);
        table.register("Serial").unwrap();
        table.update("Serial", InitStatus::Failed("line dead"));

        let mut logger = Logger::with_threshold(Recorder::new(), Recorder::new(), Level::Debug);
        print_banner(&mut logger, &table);
        let text = logger.console().text();
        assert!(text.starts_with("[INFO]  protokernel "));
        assert!(text.contains("[INFO]    GDT: Completed\n"));
        assert!(text.ends_with("[ERROR]   Serial: failed: line dead\n"));
    }
}
