//! Build-time layout constants shared across the kernel. Individual modules
//! import from here instead of redefining their own copies of these numbers.

/// Size of a physical/virtual page on 32-bit x86 without PAE.
pub const PAGE_SIZE: u32 = 4096;

/// Number of entries in a page directory or page table.
pub const PAGE_TABLE_ENTRIES: usize = 1024;

/// Number of environment-table slots, fixed at build time.
pub const NENV: usize = 1024;

/// Boundary separating user-accessible addresses (below) from kernel-only
/// addresses (at or above). Kernel mappings are identical across every
/// address space and are never user-accessible.
///
/// Must land on a page-directory boundary (a multiple of `0x40_0000`, the
/// 4 MiB one PDE covers): `clear_user_range`'s top-level sweep stops at
/// `UTOP`'s own PDE, so anything mapped in the same PDE as `UTOP` but above
/// it would fall inside the swept directory index and get silently freed
/// out from under the kernel's own mappings (or, the other way around, a
/// misaligned `UTOP` would hide the last partial PDE of user space from the
/// sweep entirely and leak it on every destroy).
pub const UTOP: u32 = 0xF000_0000;

/// Top of the per-environment user exception stack. The stack occupies the
/// single page `[UXSTACKTOP - PAGE_SIZE, UXSTACKTOP)`.
pub const UXSTACKTOP: u32 = UTOP;

/// Fixed user virtual address of the COW-fork scratch page.
pub const UVPT_SCRATCH: u32 = 0xEFFF_E000;

/// Base of the read-only page-table self-map. Every address space's own
/// directory frame is mapped here, read-only, at its own recursive slot, so
/// user code can read `Pte`s for its own mappings — `UVPT + (va >> 12) * 4`
/// holds the raw PTE for `va` — without a syscall. 4 MiB covers every `Pte`
/// in one directory.
pub const UVPT: u32 = 0xEF40_0000;

/// The one page within the `UVPT` self-map range whose recursive walk lands
/// back on the directory's own `Pde` array instead of a leaf `Pte` table:
/// `UVPD + pd_index*4` holds `Pde[pd_index]` directly, letting user code
/// check a page table's presence before dereferencing `UVPT` for one of its
/// `Pte`s (the standard two-step recursive-mapping read).
pub const UVPD: u32 = UVPT + ((UVPT >> 22) << 12);
