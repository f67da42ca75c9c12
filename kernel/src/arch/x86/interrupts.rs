//! Interrupt-flag control. Interrupts stay disabled from trap entry until
//! the kernel either resumes an environment or hands off to the scheduler.
//! Hand-rolled rather than going through the `x86_64` crate's
//! `instructions::interrupts` module, since that crate is no longer a
//! dependency.

use core::arch::asm;

/// Disable maskable interrupts.
///
/// # Safety
/// May only be called from kernel mode.
pub unsafe fn disable() {
    // SAFETY: forwarded from caller.
    unsafe {
        asm!("cli", options(nomem, nostack));
    }
}

/// Enable maskable interrupts.
///
/// # Safety
/// Must only be called once trap/scheduler state is consistent enough to be
/// re-entered.
pub unsafe fn enable() {
    // SAFETY: forwarded from caller.
    unsafe {
        asm!("sti", options(nomem, nostack));
    }
}

/// True if the interrupt flag is currently set.
pub fn are_enabled() -> bool {
    let flags: u32;
    // SAFETY: pushfd/pop only reads machine state, no side effects.
    unsafe {
        asm!("pushfd", "pop {0:e}", out(reg) flags, options(nomem, preserves_flags));
    }
    flags & (1 << 9) != 0
}

/// Run `f` with interrupts disabled, restoring the prior flag state after.
pub fn without_interrupts<T>(f: impl FnOnce() -> T) -> T {
    let was_enabled = are_enabled();
    if was_enabled {
        // SAFETY: restored below before returning.
        unsafe { disable() };
    }
    let result = f();
    if was_enabled {
        // SAFETY: matches the `disable` above.
        unsafe { enable() };
    }
    result
}
