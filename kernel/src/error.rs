//! Kernel error type and its conversion to the syscall return-value ABI.

use core::fmt;

/// Errors produced by kernel services.
///
/// Variant set matches the negative-integer error namespace of the syscall
/// ABI (`BAD_ENV`, `INVAL`, `NO_MEM`, `NO_FREE_ENV`, `IPC_NOT_RECV`) plus the
/// driver-local DMA-ring codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// `id` does not name a live environment (stale generation or free slot).
    BadEnv,
    /// Bad argument: misaligned address, address `>= UTOP`, bad permission
    /// mask, or an otherwise malformed request.
    Inval,
    /// No physical frame available.
    NoMem,
    /// No free environment-table slot available.
    NoFreeEnv,
    /// `ipc_try_send` lost the rendezvous race: target was not receiving.
    IpcNotRecv,
    /// Transmit DMA ring full.
    CblFull,
    /// Transmit DMA ring unexpectedly empty.
    CblEmpty,
    /// Receive DMA ring full.
    RfaFull,
    /// Receive DMA ring drained; nothing to receive.
    RfaEmpty,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            KernelError::BadEnv => "bad environment id",
            KernelError::Inval => "invalid argument",
            KernelError::NoMem => "out of memory",
            KernelError::NoFreeEnv => "no free environment slots",
            KernelError::IpcNotRecv => "target not receiving",
            KernelError::CblFull => "transmit ring full",
            KernelError::CblEmpty => "transmit ring empty",
            KernelError::RfaFull => "receive ring full",
            KernelError::RfaEmpty => "receive ring empty",
        };
        f.write_str(msg)
    }
}

pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Stable negative-integer code returned across the syscall boundary.
    pub const fn to_errno(self) -> i32 {
        match self {
            KernelError::BadEnv => -1,
            KernelError::Inval => -2,
            KernelError::NoMem => -3,
            KernelError::NoFreeEnv => -4,
            KernelError::IpcNotRecv => -5,
            KernelError::CblFull => -6,
            KernelError::CblEmpty => -7,
            KernelError::RfaFull => -8,
            KernelError::RfaEmpty => -9,
        }
    }
}

impl From<KernelError> for isize {
    fn from(err: KernelError) -> isize {
        err.to_errno() as isize
    }
}
