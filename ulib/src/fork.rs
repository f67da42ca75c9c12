//! User-level copy-on-write fork. Pure userspace, built entirely out of
//! the raw syscall surface plus the read-only self-map — no new kernel
//! mechanism beyond what `ulib::syscall` and `ulib::uvpt` already expose.

use crate::abi::PteFlags;
use crate::config::{PAGE_SIZE, UXSTACKTOP};
use crate::pfault;
use crate::syscall::*;
use crate::trampoline;
use crate::uvpt;

const RUNNABLE: u32 = 1;

/// Map the page backing `va` in the caller into `child`, preserving the
/// copy-on-write invariant: a `WRITE` or `COW` source becomes `COW` in both
/// parent and child (never actually writable in hardware again until a
/// fault clones it); anything else is shared read-only as is.
fn duppage(child: u32, va: u32) -> i32 {
    let Some(flags) = uvpt::pte_flags(va) else {
        return 0;
    };
    let self_id = sys_getenvid();

    if flags.contains(PteFlags::WRITE) || flags.contains(PteFlags::COW) {
        let cow_perm = (PteFlags::PRESENT | PteFlags::USER | PteFlags::COW).bits();
        let rc = sys_page_map(self_id, va, child, va, cow_perm);
        if rc < 0 {
            return rc;
        }
        sys_page_map(self_id, va, self_id, va, cow_perm)
    } else {
        let ro_perm = (flags & (PteFlags::PRESENT | PteFlags::USER)).bits();
        sys_page_map(self_id, va, child, va, ro_perm)
    }
}

/// Fork the caller into a new environment sharing every writable page
/// copy-on-write. Returns the child's environment id to the parent and `0`
/// to the child.
pub fn fork() -> i32 {
    // Step 1.
    pfault::ensure_handler_installed();

    // Step 2.
    let child = sys_exofork();
    if child == 0 {
        return 0;
    }
    if child < 0 {
        return child;
    }
    let child_id = child as u32;

    // Step 3: every present mapping strictly below UTOP and strictly below
    // the user exception stack page.
    let uxstack_page = UXSTACKTOP - PAGE_SIZE;
    let mut va = 0u32;
    while va < uxstack_page {
        let rc = duppage(child_id, va);
        if rc < 0 {
            sys_env_destroy(child_id);
            return rc;
        }
        va += PAGE_SIZE;
    }

    // Step 4: a fresh, private (never COW) exception stack for the child —
    // the fault handler itself must never fault on its own stack.
    let rc = sys_page_alloc(child_id, uxstack_page, (PteFlags::PRESENT | PteFlags::USER | PteFlags::WRITE).bits());
    if rc < 0 {
        sys_env_destroy(child_id);
        return rc;
    }

    // Step 5.
    let rc = sys_env_set_pgfault_upcall(child_id, trampoline::trampoline_address());
    if rc < 0 {
        sys_env_destroy(child_id);
        return rc;
    }

    // Step 6.
    let rc = sys_env_set_status(child_id, RUNNABLE);
    if rc < 0 {
        sys_env_destroy(child_id);
        return rc;
    }

    child_id as i32
}

#[cfg(test)]
mod tests {
    // `duppage`'s permission arithmetic is exercised directly; the syscall
    // surface it drives is unavailable on the host, so the COW-fork
    // protocol itself is only exercised end-to-end in
    // `kernel/tests/properties.rs`.
    use super::*;

    #[test]
    fn read_only_perm_never_carries_write_or_cow() {
        let flags = PteFlags::PRESENT | PteFlags::USER;
        let ro_perm = (flags & (PteFlags::PRESENT | PteFlags::USER)).bits();
        assert_eq!(ro_perm & PteFlags::WRITE.bits(), 0);
        assert_eq!(ro_perm & PteFlags::COW.bits(), 0);
    }
}
