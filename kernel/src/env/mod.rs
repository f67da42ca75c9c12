//! Environment lifecycle and per-environment address space. An environment
//! record carries only what this kernel actually schedules and faults
//! against — no uid/gid, cpu accounting, thread list, or priority.

pub mod id;
pub mod table;

pub use id::EnvId;

use crate::mm::AddressSpace;
use crate::trap::Trapframe;

/// Environment status. Exactly one environment at a time may be in the
/// implicit `Running` state, tracked outside any record as
/// [`table::EnvTable::current`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvStatus {
    Free,
    Runnable,
    NotRunnable,
    Dying,
}

/// IPC receive state held directly on the environment record. No separate
/// endpoint/channel registry — see `DESIGN.md` for the reasoning.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpcState {
    pub recving: bool,
    /// `None` if the receiver did not request a page grant.
    pub dst_va: Option<u32>,
    pub from: EnvId,
    pub value: u32,
    pub perm: crate::mm::PteFlags,
}

impl Default for EnvId {
    fn default() -> Self {
        EnvId::NONE
    }
}

impl Default for crate::mm::PteFlags {
    fn default() -> Self {
        crate::mm::PteFlags::empty()
    }
}

/// One element of the fixed-size environment table.
pub struct Env {
    pub id: EnvId,
    pub parent_id: EnvId,
    pub status: EnvStatus,
    pub trapframe: Trapframe,
    pub address_space: AddressSpace,
    /// `None` if no handler is registered, else a user virtual address.
    pub pgfault_upcall: Option<u32>,
    pub ipc: IpcState,
}

/// Access the currently-running environment, if any. `None` only while the
/// kernel is idle with no environment resumed (e.g. very early boot).
pub fn current() -> Option<&'static mut Env> {
    table::table().current_mut()
}

/// Access the global environment table.
pub fn table() -> &'static table::EnvTable {
    table::table()
}
