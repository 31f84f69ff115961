//! CPU control primitives.
//!
//! On 32-bit x86 these are the real instructions. Any other architecture
//! gets inert stand-ins so the library builds and unit-tests on a development
//! host; nothing there ever loads a table or stops the processor.

use crate::gdt::TablePointer;

/// CR0.PE: set once the processor runs in protected mode.
pub const CR0_PROTECTION_ENABLE: u32 = 1;

#[cfg(target_arch = "x86")]
mod imp {
    use super::TablePointer;
    use core::arch::asm;

    #[inline(always)]
    pub fn disable_interrupts() {
        unsafe { asm!("cli", options(nomem, nostack)) }
    }

    #[inline(always)]
    pub fn halt() {
        unsafe { asm!("hlt", options(nomem, nostack, preserves_flags)) }
    }

    pub unsafe fn load_descriptor_table(pointer: &TablePointer, code: u16, data: u16) {
        asm!(
            "lgdt [{ptr}]",
            "mov ds, {data:x}",
            "mov es, {data:x}",
            "mov fs, {data:x}",
            "mov gs, {data:x}",
            "mov ss, {data:x}",
            // CS can only change through a far transfer.
            "push {code}",
            "lea {tmp}, [55f]",
            "push {tmp}",
            "retf",
            "55:",
            ptr = in(reg) pointer as *const TablePointer,
            data = in(reg) u32::from(data),
            code = in(reg) u32::from(code),
            tmp = lateout(reg) _,
            options(preserves_flags),
        );
    }

    pub fn stored_descriptor_table() -> TablePointer {
        let mut pointer = TablePointer { limit: 0, base: 0 };
        unsafe {
            asm!("sgdt [{}]", in(reg) &mut pointer as *mut TablePointer, options(nostack, preserves_flags));
        }
        pointer
    }

    pub fn code_selector() -> u16 {
        let selector: u16;
        unsafe { asm!("mov {0:x}, cs", out(reg) selector, options(nomem, nostack, preserves_flags)) }
        selector
    }

    pub fn data_selector() -> u16 {
        let selector: u16;
        unsafe { asm!("mov {0:x}, ds", out(reg) selector, options(nomem, nostack, preserves_flags)) }
        selector
    }

    pub fn stack_selector() -> u16 {
        let selector: u16;
        unsafe { asm!("mov {0:x}, ss", out(reg) selector, options(nomem, nostack, preserves_flags)) }
        selector
    }

    pub fn control_register0() -> u32 {
        let cr0: u32;
        unsafe { asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags)) }
        cr0
    }
}

#[cfg(not(target_arch = "x86"))]
mod imp {
    use super::TablePointer;

    pub fn disable_interrupts() {}

    pub fn halt() {
        core::hint::spin_loop();
    }

    pub unsafe fn load_descriptor_table(_pointer: &TablePointer, _code: u16, _data: u16) {}

    pub fn stored_descriptor_table() -> TablePointer {
        TablePointer { limit: 0, base: 0 }
    }

    pub fn code_selector() -> u16 {
        0
    }

    pub fn data_selector() -> u16 {
        0
    }

    pub fn stack_selector() -> u16 {
        0
    }

    pub fn control_register0() -> u32 {
        0
    }
}

/// Mask maskable interrupts (`cli`).
pub fn disable_interrupts() {
    imp::disable_interrupts()
}

/// Idle the processor until the next interrupt (`hlt`).
pub fn halt() {
    imp::halt()
}

/// Load GDTR from `pointer`, reload DS/ES/FS/GS/SS with `data` and CS with `code`.
///
/// # Safety
/// The table `pointer` names must stay alive and unmodified for the rest of
/// the process, and both selectors must index valid present descriptors in it.
pub unsafe fn load_descriptor_table(pointer: &TablePointer, code: u16, data: u16) {
    imp::load_descriptor_table(pointer, code, data)
}

/// The table pointer currently held in GDTR (`sgdt`).
pub fn stored_descriptor_table() -> TablePointer {
    imp::stored_descriptor_table()
}

pub fn code_selector() -> u16 {
    imp::code_selector()
}

pub fn data_selector() -> u16 {
    imp::data_selector()
}

pub fn stack_selector() -> u16 {
    imp::stack_selector()
}

/// Current CR0. Reads as zero off x86.
pub fn control_register0() -> u32 {
    imp::control_register0()
}

#[cfg(all(test, not(target_arch = "x86")))]
mod tests {
    use super::*;

    #[test]
    fn test_host_stand_ins_are_inert() {
        assert_eq!(control_register0() & CR0_PROTECTION_ENABLE, 0);
        let gdtr = stored_descriptor_table();
        let (limit, base) = (gdtr.limit, gdtr.base);
        assert_eq!((limit, base), (0, 0));
        assert_eq!(code_selector(), 0);
    }
}
