//! Interrupt Descriptor Table for 32-bit protected mode.
//!
//! One handler per vector, built into a plain descriptor table rather than
//! through the `x86_64` crate's `extern "x86-interrupt" fn` mechanism,
//! which targets long mode exclusively and is dropped here (see
//! `DESIGN.md`). Every gate instead points at a hand-written `global_asm!`
//! stub (`arch::x86::entry`) that normalizes the hardware error-code split
//! before calling [`crate::trap::dispatch`].

use core::arch::asm;
use core::mem::size_of;
use spin::Once;

use super::gdt::KERNEL_CODE_SELECTOR;

pub const VECTOR_PAGE_FAULT: u8 = 14;
pub const VECTOR_BREAKPOINT: u8 = 3;
pub const VECTOR_GPF: u8 = 13;
pub const VECTOR_SYSCALL: u8 = 0x30;
pub const VECTOR_TIMER: u8 = 0x20;
pub const VECTOR_SPURIOUS: u8 = 0x27;

const GATE_COUNT: usize = 256;

#[derive(Clone, Copy)]
#[repr(C, packed)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl IdtEntry {
    const fn missing() -> Self {
        IdtEntry {
            offset_low: 0,
            selector: 0,
            zero: 0,
            type_attr: 0,
            offset_high: 0,
        }
    }

    /// `dpl` is the minimum privilege level allowed to invoke this gate via
    /// `int`; 3 for the syscall vector, 0 for everything hardware-raised.
    fn new(handler: u32, dpl: u8) -> Self {
        IdtEntry {
            offset_low: (handler & 0xFFFF) as u16,
            selector: KERNEL_CODE_SELECTOR,
            zero: 0,
            type_attr: 0x8E | (dpl << 5),
            offset_high: ((handler >> 16) & 0xFFFF) as u16,
        }
    }
}

#[repr(C, packed)]
struct IdtPointer {
    limit: u16,
    base: u32,
}

static IDT: spin::Mutex<[IdtEntry; GATE_COUNT]> =
    spin::Mutex::new([IdtEntry::missing(); GATE_COUNT]);

static INIT: Once<()> = Once::new();

/// Build and load the IDT. Only the vectors `arch::x86::entry::KNOWN_STUBS`
/// names get a present gate; every other vector stays absent, so an
/// unexpected interrupt turns into a general-protection fault this core
/// already handles rather than a triple fault.
pub fn init() {
    INIT.call_once(|| {
        let mut idt = IDT.lock();
        for (vector, stub) in super::entry::KNOWN_STUBS.iter() {
            let dpl = if *vector == VECTOR_SYSCALL { 3 } else { 0 };
            idt[*vector as usize] = IdtEntry::new(*stub as usize as u32, dpl);
        }
        drop(idt);

        let idt = IDT.lock();
        let ptr = IdtPointer {
            limit: (size_of::<[IdtEntry; GATE_COUNT]>() - 1) as u16,
            base: &*idt as *const [IdtEntry; GATE_COUNT] as u32,
        };
        // SAFETY: IDT has 'static storage duration and stays populated for
        // the life of the kernel; lidt is the standard way to install an
        // interrupt descriptor table base.
        unsafe {
            asm!("lidt [{0}]", in(reg) &ptr, options(readonly, nostack, preserves_flags));
        }
    });
}
