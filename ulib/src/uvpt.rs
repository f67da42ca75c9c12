//! Read-only access to the caller's own page table entries through the
//! kernel's recursive self-map, the standard way user code inspects its
//! own mappings without a syscall. Every address space has its
//! own directory mapped read-only at its own recursive slot
//! ([`mm::pagetable::AddressSpace::new_user`] on the kernel side); `UVPT +
//! (va >> 12) * 4` then holds the raw `Pte` for `va`, and `UVPD + pd_index *
//! 4` holds the raw `Pde` for that `Pte`'s containing table.

use crate::abi::PteFlags;
use crate::config::{PAGE_SIZE, UVPD, UVPT};

fn pde_present(pd_index: u32) -> bool {
    // SAFETY: `UVPD` is always mapped read-only user-present by the kernel
    // for every live environment.
    let raw = unsafe { core::ptr::read((UVPD + pd_index * 4) as *const u32) };
    raw & PteFlags::PRESENT.bits() != 0
}

/// The raw flags of the `Pte` mapping `va`, or `None` if no page is present
/// there (either the containing page table itself doesn't exist, or the
/// leaf entry is clear).
pub fn pte_flags(va: u32) -> Option<PteFlags> {
    let pd_index = va >> 22;
    if !pde_present(pd_index) {
        return None;
    }
    let page_index = va / PAGE_SIZE;
    // SAFETY: the containing page table is present per the check above, so
    // this recursive read lands on a real, mapped `Pte`.
    let raw = unsafe { core::ptr::read((UVPT + page_index * 4) as *const u32) };
    let flags = PteFlags::from_bits_truncate(raw & (PAGE_SIZE - 1));
    flags.contains(PteFlags::PRESENT).then_some(flags)
}

pub fn is_present(va: u32) -> bool {
    pte_flags(va).is_some()
}
