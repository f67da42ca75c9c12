//! Trap entry and dispatch, and the page-fault upcall.
//!
//! One handler per vector behind a common save/dispatch/resume path. The
//! common path is a hand-written `global_asm!` stub (`arch::x86::entry`)
//! rather than `extern "x86-interrupt" fn`, since the `x86_64` crate that
//! supplies that ABI targets long mode only.

pub mod upcall;

use crate::arch::x86::idt::{
    VECTOR_BREAKPOINT, VECTOR_GPF, VECTOR_PAGE_FAULT, VECTOR_SPURIOUS, VECTOR_SYSCALL, VECTOR_TIMER,
};
use crate::env::{self, EnvStatus};
use crate::sched;
use crate::syscall;
use core::arch::asm;

/// General-purpose registers as pushed by `pushad`, in the order a matching
/// `popad` expects (push order is reversed: edi,esi,ebp,<skipped
/// esp>,ebx,edx,ecx,eax).
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct PushRegs {
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub oesp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
}

/// Persisted per-environment trap frame.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct Trapframe {
    pub regs: PushRegs,
    pub es: u16,
    pub _pad1: u16,
    pub ds: u16,
    pub _pad2: u16,
    pub trapno: u32,
    pub err: u32,
    pub eip: u32,
    pub cs: u16,
    pub _pad3: u16,
    pub eflags: u32,
    pub esp: u32,
    pub ss: u16,
    pub _pad4: u16,
}

impl Trapframe {
    /// The slot the syscall ABI writes the return value into (`eax`).
    pub fn set_return_value(&mut self, value: i32) {
        self.regs.eax = value as u32;
    }
}

/// Called by the common `global_asm!` stub with a pointer to the trapframe
/// it just built on the kernel stack. Never returns to the stub directly:
/// either the current environment is resumed from its *persisted* copy, or
/// the scheduler is invoked — control never falls back through to the stub.
#[no_mangle]
pub extern "C" fn trap_dispatch(tf: *mut Trapframe) -> ! {
    // SAFETY: the stub guarantees `tf` points at a fully populated frame for
    // the duration of this call.
    let tf = unsafe { &*tf };
    let from_user = (tf.cs & 0x3) == 3;

    if from_user {
        env::current().expect("trap from user mode with no current environment").trapframe = *tf;
    } else if tf.trapno != VECTOR_TIMER as u32 {
        panic!("unhandled kernel-mode trap {}", { tf.trapno });
    }

    debug_assert!(
        !crate::arch::x86::interrupts::are_enabled(),
        "interrupts must be disabled across the common trap path"
    );

    match tf.trapno as u8 {
        v if v == VECTOR_PAGE_FAULT => handle_page_fault(),
        v if v == VECTOR_SYSCALL => handle_syscall(),
        v if v == VECTOR_TIMER => handle_timer(),
        v if v == VECTOR_BREAKPOINT => handle_breakpoint(),
        v if v == VECTOR_SPURIOUS => log::warn!("spurious IRQ 7 ignored"),
        v if v == VECTOR_GPF => destroy_current("general protection fault"),
        _ if from_user => destroy_current("unhandled user-mode trap"),
        other => panic!("unhandled kernel-mode trap {other}"),
    }

    resume_or_schedule()
}

fn handle_page_fault() {
    // SAFETY: CR2 holds the faulting linear address, set by the CPU before
    // vectoring to the page-fault handler; reading it has no side effects.
    let fault_va = unsafe {
        let cr2: u32;
        asm!("mov {0}, cr2", out(reg) cr2, options(nomem, nostack, preserves_flags));
        cr2
    };
    upcall::dispatch_page_fault(fault_va);
}

fn handle_syscall() {
    let env = env::current().expect("syscall trap with no current environment");
    let tf = env.trapframe;
    let result = syscall::dispatch(
        tf.regs.eax,
        tf.regs.ebx,
        tf.regs.ecx,
        tf.regs.edx,
        tf.regs.esi,
        tf.regs.edi,
    );
    // The syscall may have destroyed its own caller (`env_destroy(0)`, or a
    // fault on an invalid buffer) — in which case there is no trapframe
    // left to write a return value into.
    if let Some(env) = env::current() {
        env.trapframe.set_return_value(result);
    }
}

/// Timer IRQ: advance the tick counter, acknowledge it, and force a
/// reschedule. The kernel's own code is never preempted mid-trap — there is
/// only ever one kernel execution stream, and a trap always runs to
/// completion before anything resumes — but the *user* environment current
/// when the tick landed does not get to monopolize the CPU: `schedule()`
/// round-robins to whichever environment is next in line, same as if this
/// one had called `sys_yield` itself.
fn handle_timer() -> ! {
    crate::arch::x86::timer::tick();
    // SAFETY: PIC EOI for IRQ0 acknowledges the timer interrupt so further
    // IRQs are delivered.
    unsafe { crate::arch::x86::pic::send_eoi(0) };
    sched::schedule()
}

/// Breakpoint trap (`int3`). Hands off to the kernel monitor rather than
/// destroying the environment; `eip` already points past the one-byte
/// `int3` opcode, so once the monitor hook returns, execution just
/// continues.
fn handle_breakpoint() {
    log::info!("breakpoint trap; no kernel monitor wired up, resuming");
}

fn destroy_current(reason: &str) {
    if let Some(env) = env::current() {
        let id = env.id;
        log::warn!("destroying environment {id:?}: {reason}");
        let _ = env::table().destroy(id);
    }
}

/// Resume the current environment if still runnable, otherwise call the
/// scheduler. Never returns.
fn resume_or_schedule() -> ! {
    if let Some(env) = env::current() {
        if env.status == EnvStatus::Runnable {
            // SAFETY: resumes the persisted trapframe of the environment
            // that is current and runnable; this is the only return path
            // out of the common trap handler.
            unsafe { resume(&env.trapframe) };
        }
    }
    sched::schedule()
}

/// Restore a trapframe and `iret` into it.
///
/// # Safety
/// `tf` must describe a consistent, privilege-appropriate machine state
/// (user code selector at ring 3 with IF set, the invariant
/// `env_set_trapframe` enforces on every trapframe it installs).
pub unsafe fn resume(tf: &Trapframe) -> ! {
    // SAFETY: forwarded from caller; loads the full saved register/segment
    // state and `iret`s into it. This function does not return.
    unsafe {
        asm!(
            "mov esp, {0}",
            "jmp trap_resume_from_frame",
            in(reg) tf as *const Trapframe as u32,
            options(noreturn)
        );
    }
}
