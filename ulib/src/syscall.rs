//! Raw syscall stubs: one `int 0x30` trap per service, matching the
//! register convention `kernel/src/trap/mod.rs::handle_syscall` decodes
//! (`eax`=number, `ebx,ecx,edx,esi,edi`=args 1-5, return value in `eax`).
//! Thin wrappers, one function per service, no validation on this side —
//! the kernel does all of it.

use crate::abi::Syscall;
use core::arch::asm;

/// # Safety
/// Callers must pass arguments meaningful for `num`; the kernel validates
/// them, but a misused raw syscall can still corrupt or destroy the
/// calling environment's own state (e.g. unmapping its own stack).
#[inline]
unsafe fn raw_syscall(num: u32, a1: u32, a2: u32, a3: u32, a4: u32, a5: u32) -> i32 {
    let ret: i32;
    // SAFETY: `int 0x30` is the syscall gate installed by `arch::x86::idt`
    // at DPL 3; this is the only sanctioned ring-3-to-ring-0 transition.
    unsafe {
        asm!(
            "int 0x30",
            inout("eax") num => ret,
            in("ebx") a1,
            in("ecx") a2,
            in("edx") a3,
            in("esi") a4,
            in("edi") a5,
            options(nostack),
        );
    }
    ret
}

pub fn sys_cputs(s: &[u8]) -> i32 {
    unsafe { raw_syscall(Syscall::Cputs as u32, s.as_ptr() as u32, s.len() as u32, 0, 0, 0) }
}

pub fn sys_cgetc() -> i32 {
    unsafe { raw_syscall(Syscall::Cgetc as u32, 0, 0, 0, 0, 0) }
}

pub fn sys_getenvid() -> u32 {
    unsafe { raw_syscall(Syscall::GetEnvId as u32, 0, 0, 0, 0, 0) as u32 }
}

pub fn sys_env_destroy(id: u32) -> i32 {
    unsafe { raw_syscall(Syscall::EnvDestroy as u32, id, 0, 0, 0, 0) }
}

pub fn sys_yield() -> ! {
    unsafe { raw_syscall(Syscall::Yield as u32, 0, 0, 0, 0, 0) };
    unreachable!("sys_yield always returns through a fresh trap, never falls through here")
}

pub fn sys_exofork() -> i32 {
    unsafe { raw_syscall(Syscall::Exofork as u32, 0, 0, 0, 0, 0) }
}

pub fn sys_env_set_status(id: u32, status: u32) -> i32 {
    unsafe { raw_syscall(Syscall::EnvSetStatus as u32, id, status, 0, 0, 0) }
}

pub fn sys_env_set_trapframe(id: u32, tf_va: u32) -> i32 {
    unsafe { raw_syscall(Syscall::EnvSetTrapframe as u32, id, tf_va, 0, 0, 0) }
}

pub fn sys_env_set_pgfault_upcall(id: u32, upcall_va: u32) -> i32 {
    unsafe { raw_syscall(Syscall::EnvSetPgfaultUpcall as u32, id, upcall_va, 0, 0, 0) }
}

pub fn sys_page_alloc(id: u32, va: u32, perm: u32) -> i32 {
    unsafe { raw_syscall(Syscall::PageAlloc as u32, id, va, perm, 0, 0) }
}

pub fn sys_page_map(src_id: u32, src_va: u32, dst_id: u32, dst_va: u32, perm: u32) -> i32 {
    unsafe { raw_syscall(Syscall::PageMap as u32, src_id, src_va, dst_id, dst_va, perm) }
}

pub fn sys_page_unmap(id: u32, va: u32) -> i32 {
    unsafe { raw_syscall(Syscall::PageUnmap as u32, id, va, 0, 0, 0) }
}

pub fn sys_ipc_try_send(to: u32, value: u32, src_va: u32, perm: u32) -> i32 {
    unsafe { raw_syscall(Syscall::IpcTrySend as u32, to, value, src_va, perm, 0) }
}

pub fn sys_ipc_recv(dst_va: u32) -> i32 {
    unsafe { raw_syscall(Syscall::IpcRecv as u32, dst_va, 0, 0, 0, 0) }
}

pub fn sys_time_msec() -> i32 {
    unsafe { raw_syscall(Syscall::TimeMsec as u32, 0, 0, 0, 0, 0) }
}
