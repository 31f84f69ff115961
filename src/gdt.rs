//! # Global Descriptor Table
//!
//! Flat 32-bit segmentation: every code and data segment spans the full
//! 4 GiB with 4 KiB granularity, so linear address == offset.
//!
//! | Index | Selector | Segment                    | Access | Flags |
//! |-------|----------|----------------------------|--------|-------|
//! | 0     | 0x00     | null                       | 0x00   | 0x0   |
//! | 1     | 0x08     | kernel code (ring 0)       | 0x9A   | 0xC   |
//! | 2     | 0x10     | kernel data (ring 0)       | 0x92   | 0xC   |
//! | 3     | 0x1B     | user code (ring 3)         | 0xFA   | 0xC   |
//! | 4     | 0x23     | user data (ring 3)         | 0xF2   | 0xC   |
//! | 5     | 0x28     | task state, not present yet| 0x00   | 0x0   |
//!
//! Descriptors are built as explicit byte arrays rather than packed structs:
//!
//! ```text
//! byte 0-1  limit[15:0]
//! byte 2-3  base[15:0]
//! byte 4    base[23:16]
//! byte 5    access
//! byte 6    flags[3:0] << 4 | limit[19:16]
//! byte 7    base[31:24]
//! ```

use bitflags::bitflags;
use x86_64::structures::gdt::SegmentSelector;
use x86_64::PrivilegeLevel;

use crate::hal::cpu;

pub const GDT_ENTRIES: usize = 6;

pub const KERNEL_CODE_SELECTOR: SegmentSelector = SegmentSelector::new(1, PrivilegeLevel::Ring0);
pub const KERNEL_DATA_SELECTOR: SegmentSelector = SegmentSelector::new(2, PrivilegeLevel::Ring0);
pub const USER_CODE_SELECTOR: SegmentSelector = SegmentSelector::new(3, PrivilegeLevel::Ring3);
pub const USER_DATA_SELECTOR: SegmentSelector = SegmentSelector::new(4, PrivilegeLevel::Ring3);
pub const TSS_SELECTOR: SegmentSelector = SegmentSelector::new(5, PrivilegeLevel::Ring0);

bitflags! {
    /// The access byte (byte 5).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        /// Set by the CPU on first use.
        const ACCESSED = 1 << 0;
        /// Readable for code, writable for data.
        const READ_WRITE = 1 << 1;
        /// Conforming for code, grows-down for data.
        const DIRECTION_CONFORMING = 1 << 2;
        const EXECUTABLE = 1 << 3;
        /// Code/data segment when set, system segment (TSS, gates) when clear.
        const DESCRIPTOR_TYPE = 1 << 4;
        /// Both bits of the descriptor privilege level field.
        const RING3 = 0b11 << 5;
        const PRESENT = 1 << 7;
    }
}

bitflags! {
    /// The flags nibble, stored in the high half of byte 6.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u8 {
        const AVAILABLE = 1 << 0;
        const LONG_MODE = 1 << 1;
        /// 32-bit default operand size.
        const SIZE_32 = 1 << 2;
        /// Limit counts 4 KiB pages instead of bytes.
        const GRANULARITY = 1 << 3;
    }
}

impl Access {
    /// Descriptor privilege level (0..=3).
    pub const fn privilege_level(self) -> u8 {
        (self.bits() >> 5) & 0b11
    }
}

pub const KERNEL_CODE_ACCESS: u8 = Access::PRESENT
    .union(Access::DESCRIPTOR_TYPE)
    .union(Access::EXECUTABLE)
    .union(Access::READ_WRITE)
    .bits();
pub const KERNEL_DATA_ACCESS: u8 = Access::PRESENT
    .union(Access::DESCRIPTOR_TYPE)
    .union(Access::READ_WRITE)
    .bits();
pub const USER_CODE_ACCESS: u8 = KERNEL_CODE_ACCESS | Access::RING3.bits();
pub const USER_DATA_ACCESS: u8 = KERNEL_DATA_ACCESS | Access::RING3.bits();
pub const FLAT_FLAGS: u8 = SegmentFlags::GRANULARITY.union(SegmentFlags::SIZE_32).bits();
pub const FLAT_LIMIT: u32 = 0xFFFFF;

/// Pack one descriptor.
///
/// Nothing is range-checked: bits of `limit` above 19 and of `flags` above 3
/// are dropped, exactly as the hardware layout would drop them.
pub const fn encode(base: u32, limit: u32, access: u8, flags: u8) -> [u8; 8] {
    [
        limit as u8,
        (limit >> 8) as u8,
        base as u8,
        (base >> 8) as u8,
        (base >> 16) as u8,
        access,
        ((limit >> 16) as u8 & 0x0F) | (flags << 4),
        (base >> 24) as u8,
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorFields {
    pub base: u32,
    pub limit: u32,
    pub access: u8,
    pub flags: u8,
}

/// Unpack one descriptor; the inverse of [`encode`] for in-range fields.
pub const fn decode(bytes: &[u8; 8]) -> DescriptorFields {
    DescriptorFields {
        base: bytes[2] as u32
            | (bytes[3] as u32) << 8
            | (bytes[4] as u32) << 16
            | (bytes[7] as u32) << 24,
        limit: bytes[0] as u32 | (bytes[1] as u32) << 8 | ((bytes[6] & 0x0F) as u32) << 16,
        access: bytes[5],
        flags: bytes[6] >> 4,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Descriptor([u8; 8]);

impl Descriptor {
    pub const NULL: Descriptor = Descriptor([0; 8]);

    pub const fn new(base: u32, limit: u32, access: u8, flags: u8) -> Self {
        Descriptor(encode(base, limit, access, flags))
    }

    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    pub const fn fields(&self) -> DescriptorFields {
        decode(&self.0)
    }

    pub const fn is_present(&self) -> bool {
        self.0[5] & Access::PRESENT.bits() != 0
    }
}

/// The operand of `lgdt`: table size in bytes minus one, then its linear address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, packed)]
pub struct TablePointer {
    pub limit: u16,
    pub base: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(C, align(8))]
pub struct DescriptorTable {
    entries: [Descriptor; GDT_ENTRIES],
}

/// The six fixed entries of the flat kernel/user model.
pub const fn build_table() -> DescriptorTable {
    DescriptorTable {
        entries: [
            Descriptor::NULL,
            Descriptor::new(0, FLAT_LIMIT, KERNEL_CODE_ACCESS, FLAT_FLAGS),
            Descriptor::new(0, FLAT_LIMIT, KERNEL_DATA_ACCESS, FLAT_FLAGS),
            Descriptor::new(0, FLAT_LIMIT, USER_CODE_ACCESS, FLAT_FLAGS),
            Descriptor::new(0, FLAT_LIMIT, USER_DATA_ACCESS, FLAT_FLAGS),
            // Filled in once task switching exists.
            Descriptor::new(0, 0, 0, 0),
        ],
    }
}

impl DescriptorTable {
    pub fn entry(&self, index: usize) -> Option<&Descriptor> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[Descriptor; GDT_ENTRIES] {
        &self.entries
    }

    /// The table exactly as the CPU reads it.
    pub fn as_bytes(&self) -> &[u8] {
        unsafe {
            core::slice::from_raw_parts(
                self as *const Self as *const u8,
                core::mem::size_of::<Self>(),
            )
        }
    }

    pub fn pointer(&self) -> TablePointer {
        TablePointer {
            limit: (core::mem::size_of::<Self>() - 1) as u16,
            base: self as *const Self as usize as u32,
        }
    }

    /// Install this table and switch every segment register to the kernel selectors.
    pub fn load(&'static self) {
        let pointer = self.pointer();
        // SAFETY: the table is 'static and never mutated after this point.
        unsafe { install(&pointer) }
    }
}

/// Hand `pointer` to `lgdt`, then reload CS with the kernel code selector and
/// DS/ES/FS/GS/SS with the kernel data selector. There is no way back.
///
/// # Safety
/// The table behind `pointer` must live, unmodified, for the rest of the
/// process and must contain the kernel code and data descriptors at
/// indices 1 and 2.
pub unsafe fn install(pointer: &TablePointer) {
    cpu::disable_interrupts();
    cpu::load_descriptor_table(pointer, KERNEL_CODE_SELECTOR.0, KERNEL_DATA_SELECTOR.0);
}

/// What the CPU reports after an install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readback {
    pub pointer: TablePointer,
    pub code: u16,
    pub data: u16,
    pub stack: u16,
}

impl Readback {
    pub fn current() -> Self {
        Self {
            pointer: cpu::stored_descriptor_table(),
            code: cpu::code_selector(),
            data: cpu::data_selector(),
            stack: cpu::stack_selector(),
        }
    }
}

/// Compare a readback against the table that should be live.
pub fn check_readback(table: &DescriptorTable, readback: &Readback) -> Result<(), &'static str> {
    let expected = table.pointer();
    if readback.pointer.limit != expected.limit {
        return Err("GDTR limit does not match the kernel table");
    }
    if readback.pointer.base != expected.base {
        return Err("GDTR base does not match the kernel table");
    }
    if readback.code != KERNEL_CODE_SELECTOR.0 {
        return Err("CS was not reloaded with the kernel code selector");
    }
    if readback.data != KERNEL_DATA_SELECTOR.0 || readback.stack != KERNEL_DATA_SELECTOR.0 {
        return Err("DS/SS were not reloaded with the kernel data selector");
    }
    Ok(())
}

/// Verify the live CPU state after [`DescriptorTable::load`].
pub fn verify_installed(table: &'static DescriptorTable) -> Result<(), &'static str> {
    check_readback(table, &Readback::current())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_flat_kernel_code() {
        assert_eq!(
            encode(0, 0xFFFFF, 0x9A, 0xC),
            [0xFF, 0xFF, 0x00, 0x00, 0x00, 0x9A, 0xCF, 0x00]
        );
    }

    #[test]
    fn test_encode_splits_base_and_limit() {
        let bytes = encode(0x1234_5678, 0xABCDE, 0x92, 0x4);
        assert_eq!(bytes, [0xDE, 0xBC, 0x78, 0x56, 0x34, 0x92, 0x4A, 0x12]);
    }

    #[test]
    fn test_encode_drops_out_of_range_bits() {
        // limit bit 20 and flags bit 4 have nowhere to go
        assert_eq!(encode(0, 0x1FFFFF, 0x9A, 0x1C), encode(0, 0xFFFFF, 0x9A, 0xC));
    }

    #[test]
    fn test_decode_inverts_encode() {
        let fields = decode(&encode(0xDEAD_B000, 0x00FFF, 0xF2, 0x8));
        assert_eq!(
            fields,
            DescriptorFields {
                base: 0xDEAD_B000,
                limit: 0x00FFF,
                access: 0xF2,
                flags: 0x8,
            }
        );
    }

    #[test]
    fn test_access_constants() {
        assert_eq!(KERNEL_CODE_ACCESS, 0x9A);
        assert_eq!(KERNEL_DATA_ACCESS, 0x92);
        assert_eq!(USER_CODE_ACCESS, 0xFA);
        assert_eq!(USER_DATA_ACCESS, 0xF2);
        assert_eq!(FLAT_FLAGS, 0xC);
        assert_eq!(Access::from_bits_retain(USER_DATA_ACCESS).privilege_level(), 3);
        assert_eq!(Access::from_bits_retain(KERNEL_CODE_ACCESS).privilege_level(), 0);
    }

    #[test]
    fn test_selectors() {
        assert_eq!(KERNEL_CODE_SELECTOR.0, 0x08);
        assert_eq!(KERNEL_DATA_SELECTOR.0, 0x10);
        assert_eq!(USER_CODE_SELECTOR.0, 0x1B);
        assert_eq!(USER_DATA_SELECTOR.0, 0x23);
        assert_eq!(TSS_SELECTOR.0, 0x28);
    }

    #[test]
    fn test_table_layout() {
        assert_eq!(core::mem::size_of::<Descriptor>(), 8);
        assert_eq!(core::mem::size_of::<TablePointer>(), 6);
        assert_eq!(core::mem::size_of::<DescriptorTable>(), 48);

        let table = build_table();
        let limit = table.pointer().limit;
        assert_eq!(limit, 47);
        assert_eq!(table.as_bytes().len(), 48);
        assert_eq!(&table.as_bytes()[8..16], &[0xFF, 0xFF, 0, 0, 0, 0x9A, 0xCF, 0]);
    }

    #[test]
    fn test_build_table_entries() {
        let table = build_table();
        assert_eq!(*table.entry(0).unwrap(), Descriptor::NULL);
        assert!(!table.entry(0).unwrap().is_present());

        let expected_access = [KERNEL_CODE_ACCESS, KERNEL_DATA_ACCESS, USER_CODE_ACCESS, USER_DATA_ACCESS];
        for (index, access) in expected_access.iter().enumerate() {
            let fields = table.entry(index + 1).unwrap().fields();
            assert_eq!(fields.base, 0);
            assert_eq!(fields.limit, FLAT_LIMIT);
            assert_eq!(fields.access, *access);
            assert_eq!(fields.flags, FLAT_FLAGS);
        }

        let tss = table.entry(5).unwrap();
        assert!(!tss.is_present());
        assert_eq!(tss.as_bytes(), &[0; 8]);
        assert!(table.entry(6).is_none());
    }

    #[test]
    fn test_check_readback() {
        let table = build_table();
        let good = Readback {
            pointer: table.pointer(),
            code: 0x08,
            data: 0x10,
            stack: 0x10,
        };
        assert_eq!(check_readback(&table, &good), Ok(()));

        let stale_cs = Readback { code: 0x18, ..good };
        assert!(check_readback(&table, &stale_cs).is_err());

        let wrong_limit = Readback {
            pointer: TablePointer { limit: 0x17, base: good.pointer.base },
            ..good
        };
        assert_eq!(
            check_readback(&table, &wrong_limit),
            Err("GDTR limit does not match the kernel table")
        );

        let stale_ss = Readback { stack: 0x18, ..good };
        assert!(check_readback(&table, &stale_ss).is_err());
    }
}
