//! Page-fault upcall construction: reflects a user-mode page fault back
//! into the faulting environment's own registered handler, running on its
//! dedicated exception stack, instead of killing it outright.

use crate::config::{PAGE_SIZE, UXSTACKTOP};
use crate::env::{self, EnvStatus};
use crate::mm::PteFlags;
use crate::trap::PushRegs;

/// Frame handed to the user-mode upcall on the exception stack, matching
/// the trampoline's restore prologue exactly.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct UTrapframe {
    pub fault_va: u32,
    pub err: u32,
    pub regs: PushRegs,
    pub eip: u32,
    pub eflags: u32,
    pub esp: u32,
}

/// Reflect a user-mode page fault to the faulting environment's registered
/// upcall, or destroy it if none is registered or the exception stack
/// region is unusable.
pub fn dispatch_page_fault(fault_va: u32) {
    let env = match env::current() {
        Some(e) => e,
        None => return,
    };

    let Some(upcall) = env.pgfault_upcall else {
        log::warn!("env {:?} took a page fault with no upcall registered", env.id);
        let _ = env::table().destroy(env.id);
        return;
    };

    let tf = env.trapframe;
    let recursive = (tf.esp >= UXSTACKTOP - PAGE_SIZE) && (tf.esp < UXSTACKTOP);

    let new_frame_addr = if recursive {
        tf.esp
            .wrapping_sub(4)
            .wrapping_sub(core::mem::size_of::<UTrapframe>() as u32)
    } else {
        UXSTACKTOP - core::mem::size_of::<UTrapframe>() as u32
    };

    if !frame_range_writable(&env, new_frame_addr) {
        log::warn!("env {:?}: exception stack unusable for upcall", env.id);
        let _ = env::table().destroy(env.id);
        return;
    }

    let utf = UTrapframe {
        fault_va,
        err: tf.err,
        regs: tf.regs,
        eip: tf.eip,
        eflags: tf.eflags,
        esp: tf.esp,
    };

    // SAFETY: `frame_range_writable` confirmed the destination page is
    // present, user-accessible, and writable in this environment's address
    // space, and is part of the dedicated exception-stack range, never a
    // COW page.
    unsafe {
        core::ptr::write_volatile(new_frame_addr as *mut UTrapframe, utf);
    }

    let env = env::current().expect("environment vanished while building upcall frame");
    env.trapframe.esp = new_frame_addr;
    env.trapframe.eip = upcall;
    debug_assert_eq!(env.status, EnvStatus::Runnable);
}

/// True if every byte of `[addr, addr + size_of::<UTrapframe>())` is
/// present, user-accessible, and writable in `env`'s address space.
fn frame_range_writable(env: &env::Env, addr: u32) -> bool {
    let end = addr.wrapping_add(core::mem::size_of::<UTrapframe>() as u32);
    if end <= addr {
        return false; // wrapped
    }
    let first_page = addr & !(PAGE_SIZE - 1);
    let last_page = (end - 1) & !(PAGE_SIZE - 1);
    let mut page = first_page;
    loop {
        match env.address_space.lookup(page) {
            Some(pte) if pte.flags().contains(PteFlags::PRESENT | PteFlags::USER | PteFlags::WRITE) => {}
            _ => return false,
        }
        if page == last_page {
            return true;
        }
        page += PAGE_SIZE;
    }
}
