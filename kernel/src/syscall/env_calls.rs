//! Environment lifecycle syscalls.
//!
//! `exofork` hands back a bare, `NotRunnable` child with no address space
//! or scheduling policy baked in — the copy-on-write fork protocol that
//! turns it into a runnable clone lives entirely in user space
//! (`ulib::fork`).

use crate::env::{self, EnvId, EnvStatus};
use crate::error::{KernelError, KernelResult};
use crate::trap::Trapframe;

pub fn get_env_id() -> i32 {
    env::current().map(|e| e.id.0 as i32).unwrap_or(0)
}

/// **env_destroy(id)**: destroy `id`, or the caller if `id ==
/// 0`. Requires the "dangerous call" descendant gate.
pub fn env_destroy(id: u32) -> KernelResult<i32> {
    let caller = current_id()?;
    let target = env::table().lookup(caller, EnvId(id), true)?;
    env::table().destroy(target)?;
    Ok(0)
}

/// **sys_yield()**: cooperative give-up of the CPU. Never
/// returns to `dispatch` — control passes into the scheduler directly.
pub fn sys_yield() -> KernelResult<i32> {
    crate::sched::yield_current()
}

/// **exofork()**: allocate a bare child, copy the caller's
/// trap frame into it (so the child appears to return from this same
/// syscall once scheduled, with `eax` about to be overwritten to 0 by the
/// caller-side convention: a fork library distinguishes parent/child by the
/// return value of this call, 0 in the child, the child's id in the
/// parent), and leave it `NotRunnable` until userspace finishes setting it
/// up.
pub fn exofork() -> KernelResult<i32> {
    let caller = current_id()?;
    let child = env::table().alloc(caller)?;

    let parent_tf = env::table().with_mut(caller, |e| e.trapframe)?;
    env::table().with_mut(child, |e| {
        e.trapframe = parent_tf;
        e.trapframe.set_return_value(0);
        e.status = EnvStatus::NotRunnable;
    })?;

    Ok(child.0 as i32)
}

/// **env_set_status(id, status)**: move `id` between
/// `Runnable`/`NotRunnable` (the only transitions userspace may request
/// directly; `Dying`/`Free` only happen via `env_destroy`).
pub fn env_set_status(id: u32, status: u32) -> KernelResult<i32> {
    let caller = current_id()?;
    let target = env::table().lookup(caller, EnvId(id), true)?;
    let new_status = match status {
        0 => EnvStatus::NotRunnable,
        1 => EnvStatus::Runnable,
        _ => return Err(KernelError::Inval),
    };
    env::table().with_mut(target, |e| e.status = new_status)?;
    Ok(0)
}

/// **env_set_trapframe(id, tf_va)**: userspace fork support
/// installs a fully-formed trap frame for `id`, copied out of the caller's
/// own address space.
pub fn env_set_trapframe(id: u32, tf_va: u32) -> KernelResult<i32> {
    let caller = current_id()?;
    let target = env::table().lookup(caller, EnvId(id), true)?;
    crate::mm::check_user_va(tf_va)?;

    let caller_env = env::table().with_mut(caller, |e| e.address_space.lookup(tf_va))?;
    let pte = caller_env.ok_or(KernelError::Inval)?;
    if !pte.flags().contains(crate::mm::PteFlags::PRESENT | crate::mm::PteFlags::USER) {
        return Err(KernelError::Inval);
    }

    // SAFETY: `pte` was just confirmed present/user-readable, and a
    // `Trapframe` fits well within one page (checked by the layout of the
    // struct itself, `#[repr(C)]` with no field past a page's worth of
    // offset).
    let tf = unsafe { core::ptr::read((pte.frame_addr() as usize + (tf_va as usize % crate::config::PAGE_SIZE as usize)) as *const Trapframe) };

    // Force ring-3 code/stack selectors and IF=1 regardless of what
    // userspace supplied, so a malicious trapframe can't escalate privilege.
    let mut tf = tf;
    tf.cs = crate::arch::x86::gdt::USER_CODE_SELECTOR;
    tf.ss = crate::arch::x86::gdt::USER_DATA_SELECTOR;
    tf.eflags |= 1 << 9;

    env::table().with_mut(target, |e| e.trapframe = tf)?;
    Ok(0)
}

/// **env_set_pgfault_upcall(id, upcall_va)**.
pub fn env_set_pgfault_upcall(id: u32, upcall_va: u32) -> KernelResult<i32> {
    let caller = current_id()?;
    let target = env::table().lookup(caller, EnvId(id), true)?;
    env::table().with_mut(target, |e| e.pgfault_upcall = Some(upcall_va))?;
    Ok(0)
}

fn current_id() -> KernelResult<EnvId> {
    env::table().current_id().ok_or(KernelError::BadEnv)
}
