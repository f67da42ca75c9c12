//! Shared ABI constants between this library and `protokernel`'s syscall
//! dispatch (`kernel/src/syscall/mod.rs`) and page-flag bits
//! (`kernel/src/mm/mod.rs::PteFlags`). Kept as a small duplicated constant
//! set rather than a shared third crate, the way most split kernel/libc
//! pairs define their syscall ABI independently on each side — any drift
//! here is a kernel/userspace ABI break, not a Rust type error, so the
//! numbers must be kept in lock-step by hand.

use bitflags::bitflags;

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

bitflags! {
    /// Mirrors `kernel::mm::PteFlags`'s OS-visible bits exactly.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u32 {
        const PRESENT  = 1 << 0;
        const WRITE    = 1 << 1;
        const USER     = 1 << 2;
        const ACCESSED = 1 << 5;
        const DIRTY    = 1 << 6;
        const COW      = 1 << 9;
    }
}

/// Negative syscall return codes, mirroring
/// `kernel::error::KernelError::to_errno`.
pub const E_BAD_ENV: i32 = -1;
pub const E_INVAL: i32 = -2;
pub const E_NO_MEM: i32 = -3;
pub const E_NO_FREE_ENV: i32 = -4;
pub const E_IPC_NOT_RECV: i32 = -5;
