//! Round-robin scheduler: scan starting just past the last scheduled slot,
//! wrapping once, and fall back to idle (`hlt`) when nothing is runnable.
//! No load balancing, no priority, no SMP run queues — a single execution
//! stream is all this kernel ever has.

use crate::env::{self, EnvId};

/// Pick the next runnable environment starting just past `last_scheduled`,
/// scanning the whole table once. Slot 0 is skipped unless it is the only
/// runnable environment — nothing structural depends on this, but it
/// keeps slot 0's id from ever colliding with `EnvId::NONE`.
fn pick_next() -> Option<usize> {
    let table = env::table();
    let len = table.len();
    let start = table.last_scheduled.load(core::sync::atomic::Ordering::Acquire);

    for offset in 1..=len {
        let index = (start + offset) % len;
        if index == 0 {
            continue;
        }
        if table.is_runnable(index) {
            return Some(index);
        }
    }

    // Nothing but slot 0 left runnable.
    if table.is_runnable(0) {
        return Some(0);
    }
    None
}

/// **schedule()**: run the next runnable environment, or halt waiting for
/// an interrupt if none exists. Never returns.
pub fn schedule() -> ! {
    match pick_next() {
        Some(index) => {
            let table = env::table();
            table
                .last_scheduled
                .store(index, core::sync::atomic::Ordering::Release);
            table.set_current(index);
            let tf = table
                .current_mut()
                .expect("just-scheduled index must resolve to a live environment")
                .trapframe;
            // SAFETY: `index` was just confirmed `Runnable` by `pick_next`,
            // so its persisted trapframe describes a valid resumable state
            // (either from its last trap or `exofork`'s initial setup).
            unsafe { crate::trap::resume(&tf) }
        }
        None => idle(),
    }
}

/// Yield the current environment (`sys_yield`): mark it `Runnable` again
/// without otherwise touching it, then reschedule.
pub fn yield_current() -> ! {
    if let Some(id) = env::table().current_id() {
        let _ = env::table().with_mut(id, |e| e.status = env::EnvStatus::Runnable);
    }
    schedule()
}

fn idle() -> ! {
    loop {
        crate::arch::x86::interrupts::enable();
        // SAFETY: halts until the next interrupt; interrupts are enabled
        // just above so the CPU is guaranteed to wake.
        unsafe { core::arch::asm!("hlt", options(nomem, nostack)) };
    }
}

#[allow(dead_code)]
fn debug_current() -> Option<EnvId> {
    env::table().current_id()
}
