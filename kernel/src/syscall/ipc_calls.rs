//! IPC syscalls: `sys_ipc_try_send`/`sys_ipc_recv`.
//!
//! Thin ABI adapters over [`crate::ipc`]'s rendezvous logic.

use crate::env::EnvId;
use crate::error::{KernelError, KernelResult};
use crate::ipc;
use crate::mm::PteFlags;

fn current_id() -> KernelResult<EnvId> {
    crate::env::table().current_id().ok_or(KernelError::BadEnv)
}

/// **ipc_try_send(to, value, src_va, perm)**. `src_va == 0` means "no page
/// grant offered" — `0` is reserved as "absent" throughout this syscall
/// surface, never a valid user virtual address.
pub fn ipc_try_send(to: u32, value: u32, src_va: u32, perm: u32) -> KernelResult<i32> {
    let caller = current_id()?;
    let src_page = if src_va == 0 {
        None
    } else {
        let perm = PteFlags::from_bits(perm).ok_or(KernelError::Inval)?;
        Some((src_va, perm))
    };
    ipc::try_send(caller, EnvId(to), value, src_page)?;
    Ok(0)
}

/// **ipc_recv(dst_va)**. `dst_va == 0` means "not offering to receive a
/// page". Never returns to the caller through this function on success —
/// it blocks the environment and falls into the scheduler; the eventual
/// return value is written into the trap frame directly by
/// [`ipc::try_send`] when a sender arrives.
pub fn ipc_recv(dst_va: u32) -> KernelResult<i32> {
    let caller = current_id()?;
    let dst_va = if dst_va == 0 { None } else { Some(dst_va) };
    ipc::recv(caller, dst_va)?;
    crate::sched::schedule()
}
