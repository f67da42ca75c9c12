//! User-side page-fault handler: the other half of the copy-on-write fork
//! protocol, run entirely in the faulting environment on its own exception
//! stack after the kernel's upcall dispatch has reflected the fault here.
//! A fixed `UTrapframe` sits at the top of the exception stack, with one
//! scratch word below it for recursive-fault detection.

use crate::abi::PteFlags;
use crate::config::{PAGE_SIZE, UVPT_SCRATCH};
use crate::syscall::*;
use crate::uvpt;
use core::sync::atomic::{AtomicBool, Ordering};

/// The fault information the kernel's upcall dispatch lays down:
/// `(fault_va, err, general_regs, eip, eflags, esp)`, in that exact order.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct UTrapframe {
    pub fault_va: u32,
    pub err: u32,
    pub regs: [u32; 8],
    pub eip: u32,
    pub eflags: u32,
    pub esp: u32,
}

const WRITE_BIT: u32 = 1 << 1;

static HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install this library's page-fault upcall on the calling environment, if
/// it has not already been installed this process. Idempotent per caller.
pub fn ensure_handler_installed() {
    if HANDLER_INSTALLED.swap(true, Ordering::AcqRel) {
        return;
    }
    let id = sys_getenvid();
    sys_env_set_pgfault_upcall(id, crate::trampoline::trampoline_address());
}

/// The upcall entry point. `crate::trampoline::fork_trampoline`
/// lands here with `utf` pointing at the `UTrapframe` it was called with;
/// this never returns through the normal call/return convention — the
/// trampoline's assembly tail resumes the interrupted context itself once
/// this returns.
///
/// # Safety
/// Must only be reached via the kernel's page-fault upcall dispatch, with
/// `utf` pointing at a live, kernel-populated `UTrapframe`.
pub unsafe fn handle_pgfault(utf: &UTrapframe) {
    let page = utf.fault_va & !(PAGE_SIZE - 1);

    // Step 1: only a copy-on-write write fault is ours to handle; anything
    // else is a genuine bug in the faulting environment.
    let cow = utf.err & WRITE_BIT != 0 && uvpt::pte_flags(page).is_some_and(|f| f.contains(PteFlags::COW));
    if !cow {
        panic!("pgfault: non-cow fault at {:#x}, err={:#x}", utf.fault_va, utf.err);
    }

    let id = sys_getenvid();

    // Step 2: a fresh writable scratch page.
    let rc = sys_page_alloc(id, UVPT_SCRATCH, (PteFlags::PRESENT | PteFlags::USER | PteFlags::WRITE).bits());
    if rc < 0 {
        panic!("pgfault: page_alloc(scratch) failed: {rc}");
    }

    // Step 3: copy the faulting page's contents into the scratch page.
    // SAFETY: `page` was just asserted to be the faulting COW page (present,
    // user-readable, below `UTOP`); `UVPT_SCRATCH` was just mapped writable.
    unsafe {
        core::ptr::copy_nonoverlapping(page as *const u8, UVPT_SCRATCH as *mut u8, PAGE_SIZE as usize);
    }

    // Step 4: re-map the scratch page over the faulting address, now plain
    // writable (no COW) — this is the page that stops faulting.
    let rc = sys_page_map(id, UVPT_SCRATCH, id, page, (PteFlags::PRESENT | PteFlags::USER | PteFlags::WRITE).bits());
    if rc < 0 {
        panic!("pgfault: page_map(scratch -> fault page) failed: {rc}");
    }

    // Step 5: drop the scratch alias.
    let rc = sys_page_unmap(id, UVPT_SCRATCH);
    if rc < 0 {
        panic!("pgfault: page_unmap(scratch) failed: {rc}");
    }

    // Step 6: resume happens in the trampoline's assembly tail, which pops
    // `utf.regs`/`eip`/`eflags`/`esp` back into place — nothing left to do
    // in Rust.
}
