//! The fixed-size environment table: a `Mutex`-guarded `[Env; NENV]` array
//! plus atomic bookkeeping for the currently-running slot, with
//! documented `unsafe` lifetime-extension accessors for mutable access to
//! the current environment across a trap.

use core::sync::atomic::{AtomicUsize, Ordering};
use lazy_static::lazy_static;
use spin::Mutex;

use super::{Env, EnvId, EnvStatus, IpcState};
use crate::config::NENV;
use crate::error::{KernelError, KernelResult};
use crate::mm::AddressSpace;
use crate::trap::Trapframe;

impl Default for Env {
    fn default() -> Self {
        Env {
            id: EnvId::NONE,
            parent_id: EnvId::NONE,
            status: EnvStatus::Free,
            trapframe: Trapframe::default(),
            address_space: AddressSpace::empty(),
            pgfault_upcall: None,
            ipc: IpcState::default(),
        }
    }
}

/// Per-slot state outside the `Env` record itself: the generation the slot
/// is currently on. A free slot's generation is always `>=` every id that
/// ever named it, so a stale id can never resolve to a slot reused after it.
struct Slot {
    env: Env,
    generation: u32,
}

pub struct EnvTable {
    slots: Mutex<alloc::boxed::Box<[Slot]>>,
    /// `0` means "no current environment"; otherwise `1 + index`, so that a
    /// fresh `AtomicUsize::new(0)` means none without an `Option` CAS dance.
    current: AtomicUsize,
    /// Round-robin scan cursor (component H uses this directly).
    pub last_scheduled: AtomicUsize,
}

lazy_static! {
    static ref ENV_TABLE: EnvTable = EnvTable::new();
}

pub fn table() -> &'static EnvTable {
    &ENV_TABLE
}

impl EnvTable {
    fn new() -> Self {
        let slots = (0..NENV)
            .map(|_| Slot {
                env: Env::default(),
                generation: 0,
            })
            .collect::<alloc::vec::Vec<_>>()
            .into_boxed_slice();
        EnvTable {
            slots: Mutex::new(slots),
            current: AtomicUsize::new(0),
            last_scheduled: AtomicUsize::new(0),
        }
    }

    /// Scans for a `FREE` slot, bumps its generation, builds a fresh address
    /// space with the kernel's own mappings already installed, and hands
    /// back a reset `Env` with `status = NotRunnable`. The caller (the
    /// fork syscall's kernel half) still owns copying in a trap frame.
    pub fn alloc(&self, parent: EnvId) -> KernelResult<EnvId> {
        let space = crate::mm::with_allocator(crate::mm::AddressSpace::new_user)?;

        let mut slots = self.slots.lock();
        let index = match slots.iter().position(|s| s.env.status == EnvStatus::Free) {
            Some(index) => index,
            None => {
                // No free slot: the fresh directory never held any user
                // mapping, so reclaiming it is just freeing its one frame.
                crate::mm::with_allocator(|alloc| alloc.free_frame(crate::mm::Frame::from_addr(space.pd_phys)));
                return Err(KernelError::NoFreeEnv);
            }
        };

        let slot = &mut slots[index];
        // Generation 0 at index 0 would encode id 0, reserved for "none";
        // the very first allocation of slot 0 must skip straight to 1.
        if slot.generation == 0 && index == 0 {
            slot.generation = 1;
        } else {
            slot.generation += 1;
        }
        let id = EnvId::new(slot.generation, index);

        slot.env = Env {
            id,
            parent_id: parent,
            status: EnvStatus::NotRunnable,
            address_space: space,
            ..Env::default()
        };

        Ok(id)
    }

    /// `id == 0` resolves to the caller's own environment. A stale id
    /// (free slot, or mismatched generation) fails `BAD_ENV`. With
    /// `require_permission`, the target must additionally be the caller or
    /// a descendant of the caller via the `parent_id` chain — the
    /// "dangerous call" gate every syscall mutating a foreign environment
    /// uses.
    pub fn lookup(&self, caller: EnvId, id: EnvId, require_permission: bool) -> KernelResult<EnvId> {
        let target = if id.is_none() { caller } else { id };

        let slots = self.slots.lock();
        let slot = &slots[target.index()];
        if slot.env.status == EnvStatus::Free || slot.generation != target.generation() {
            return Err(KernelError::BadEnv);
        }

        if require_permission && target != caller && !self.is_descendant(&slots, caller, target) {
            return Err(KernelError::BadEnv);
        }

        Ok(target)
    }

    fn is_descendant(&self, slots: &[Slot], ancestor: EnvId, mut id: EnvId) -> bool {
        loop {
            let slot = &slots[id.index()];
            if slot.generation != id.generation() {
                return false;
            }
            if slot.env.parent_id == ancestor {
                return true;
            }
            if slot.env.parent_id.is_none() {
                return false;
            }
            id = slot.env.parent_id;
        }
    }

    /// Run `f` with mutable access to the environment named by `id`,
    /// already validated by [`lookup`]. Returns `BAD_ENV` if the slot
    /// turned stale in the meantime (impossible under the single-kernel-
    /// stream model, but checked for defense in depth).
    pub fn with_mut<R>(&self, id: EnvId, f: impl FnOnce(&mut Env) -> R) -> KernelResult<R> {
        let mut slots = self.slots.lock();
        let slot = &mut slots[id.index()];
        if slot.generation != id.generation() || slot.env.status == EnvStatus::Free {
            return Err(KernelError::BadEnv);
        }
        Ok(f(&mut slot.env))
    }

    pub fn status_of(&self, id: EnvId) -> Option<EnvStatus> {
        let slots = self.slots.lock();
        let slot = &slots[id.index()];
        (slot.generation == id.generation()).then_some(slot.env.status)
    }

    pub fn is_runnable(&self, index: usize) -> bool {
        self.slots.lock()[index].env.status == EnvStatus::Runnable
    }

    /// Unmaps every user page (dropping refs), frees the page directory,
    /// and frees the slot. If `id` was current, the caller (`trap::
    /// resume_or_schedule`) must invoke the scheduler next — this function
    /// only clears `current` if it matches.
    pub fn destroy(&self, id: EnvId) -> KernelResult<()> {
        let mut slots = self.slots.lock();
        let slot = &mut slots[id.index()];
        if slot.generation != id.generation() || slot.env.status == EnvStatus::Free {
            return Err(KernelError::BadEnv);
        }

        slot.env.status = EnvStatus::Dying;
        crate::mm::unmap_user_space(&mut slot.env.address_space);
        slot.env.status = EnvStatus::Free;
        slot.env.pgfault_upcall = None;
        slot.env.ipc = IpcState::default();

        if self.current.load(Ordering::Acquire) == id.index() + 1 {
            self.current.store(0, Ordering::Release);
        }
        Ok(())
    }

    pub fn set_current(&self, index: usize) {
        self.current.store(index + 1, Ordering::Release);
    }

    pub fn current_id(&self) -> Option<EnvId> {
        let raw = self.current.load(Ordering::Acquire);
        if raw == 0 {
            return None;
        }
        let index = raw - 1;
        let slots = self.slots.lock();
        Some(EnvId::new(slots[index].generation, index))
    }

    /// Mutable access to the current environment.
    ///
    /// # Safety-adjacent note
    /// Returns a `'static` reference out of a `Mutex` guard. Sound only
    /// because the kernel's single execution stream never holds two live
    /// references across a reschedule.
    pub fn current_mut(&self) -> Option<&'static mut Env> {
        let raw = self.current.load(Ordering::Acquire);
        if raw == 0 {
            return None;
        }
        let mut slots = self.slots.lock();
        let slot = &mut slots[raw - 1];
        // SAFETY: the kernel runs on a single execution stream with
        // interrupts disabled across the trap path; no other reference to
        // this slot can be alive concurrently, and the returned reference
        // is never retained past the current trap.
        Some(unsafe { &mut *(&mut slot.env as *mut Env) })
    }

    pub fn len(&self) -> usize {
        NENV
    }
}
