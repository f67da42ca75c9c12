//! 8259 PIC remap via the `pic8259` crate; its remap/EOI protocol is
//! identical in protected mode.

use pic8259::ChainedPics;
use spin::Mutex;

pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

static PICS: Mutex<ChainedPics> = Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

pub fn init() {
    // SAFETY: called once during boot before interrupts are enabled, with
    // the PIC's I/O ports not otherwise in use.
    unsafe { PICS.lock().initialize() };
}

/// Signal end-of-interrupt for IRQ `irq` (0-15).
///
/// # Safety
/// Must only be called from the trap handler actually servicing `irq`.
pub unsafe fn send_eoi(irq: u8) {
    unsafe { PICS.lock().notify_end_of_interrupt(PIC_1_OFFSET + irq) };
}
