//! 32-bit protected-mode x86 architecture support.
//!
//! Hardware bring-up (GDT, IDT, PIC, PIT), serial/VGA console output, and
//! I/O port primitives. Boot itself — entering protected mode, building the
//! initial page directory, handing the kernel a physical frame allocator —
//! is an external concern and is not implemented here; `init` assumes it
//! has already happened.

pub mod entry;
pub mod gdt;
pub mod idt;
pub mod interrupts;
pub mod pic;
pub mod port;
pub mod serial;
pub mod timer;
pub mod vga;

/// Bring up segmentation, traps, and the interrupt controller. Called once
/// from the boot-supplied entry path before the environment table is used.
pub fn init() {
    // SAFETY: called once, early, before interrupts are unmasked.
    unsafe {
        interrupts::disable();
    }

    println!("[ARCH] Loading GDT...");
    gdt::init();

    println!("[ARCH] Loading IDT...");
    idt::init();

    println!("[ARCH] Remapping PIC...");
    pic::init();

    println!("[ARCH] Arming timer...");
    timer::init();
}
