//! Numbered syscall dispatch: a `#[repr(u32)]` number enum, one `dispatch`
//! entry point, per-concern submodules underneath it.

mod cons;
mod env_calls;
mod ipc_calls;
mod mem;
mod time;

use crate::error::KernelError;

/// Syscall numbers, `eax` on entry. Kept contiguous and explicit so a user
/// stub table and this dispatch table can never drift silently.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Cputs = 0,
    Cgetc = 1,
    GetEnvId = 2,
    EnvDestroy = 3,
    Yield = 4,
    Exofork = 5,
    EnvSetStatus = 6,
    EnvSetTrapframe = 7,
    EnvSetPgfaultUpcall = 8,
    PageAlloc = 9,
    PageMap = 10,
    PageUnmap = 11,
    IpcTrySend = 12,
    IpcRecv = 13,
    TimeMsec = 14,
    NicXmit = 15,
    NicRecv = 16,
}

impl Syscall {
    fn from_u32(num: u32) -> Option<Self> {
        use Syscall::*;
        let table = [
            Cputs,
            Cgetc,
            GetEnvId,
            EnvDestroy,
            Yield,
            Exofork,
            EnvSetStatus,
            EnvSetTrapframe,
            EnvSetPgfaultUpcall,
            PageAlloc,
            PageMap,
            PageUnmap,
            IpcTrySend,
            IpcRecv,
            TimeMsec,
            NicXmit,
            NicRecv,
        ];
        table.into_iter().find(|s| *s as u32 == num)
    }
}

/// **dispatch(num, a1..a5) → i32**: the single entry point
/// `trap::handle_syscall` calls with the raw ABI registers. `Yield` and
/// `IpcRecv` fall through into the scheduler and so never return to their
/// caller through this function; every other service returns a value or a
/// negative [`KernelError::to_errno`] here.
pub fn dispatch(num: u32, a1: u32, a2: u32, a3: u32, a4: u32, a5: u32) -> i32 {
    let Some(syscall) = Syscall::from_u32(num) else {
        return KernelError::Inval.to_errno();
    };

    let result = match syscall {
        Syscall::Cputs => cons::cputs(a1, a2),
        Syscall::Cgetc => Ok(cons::cgetc()),
        Syscall::GetEnvId => Ok(env_calls::get_env_id()),
        Syscall::EnvDestroy => env_calls::env_destroy(a1),
        Syscall::Yield => env_calls::sys_yield(),
        Syscall::Exofork => env_calls::exofork(),
        Syscall::EnvSetStatus => env_calls::env_set_status(a1, a2),
        Syscall::EnvSetTrapframe => env_calls::env_set_trapframe(a1, a2),
        Syscall::EnvSetPgfaultUpcall => env_calls::env_set_pgfault_upcall(a1, a2),
        Syscall::PageAlloc => mem::page_alloc(a1, a2, a3),
        Syscall::PageMap => mem::page_map(a1, a2, a3, a4, a5),
        Syscall::PageUnmap => mem::page_unmap(a1, a2),
        Syscall::IpcTrySend => ipc_calls::ipc_try_send(a1, a2, a3, a4),
        Syscall::IpcRecv => ipc_calls::ipc_recv(a1),
        Syscall::TimeMsec => Ok(time::time_msec()),
        Syscall::NicXmit => mem::nic_xmit(a1, a2),
        Syscall::NicRecv => mem::nic_recv(a1, a2),
    };

    match result {
        Ok(value) => value,
        Err(e) => e.to_errno(),
    }
}
