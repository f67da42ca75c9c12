//! Programmable Interval Timer (PIT) driver: the clock source backing
//! `sys_time_msec` and the tick that drives the IDT's timer vector. PIT
//! channel-0 programming and the tick calculation are identical regardless
//! of processor mode.

use core::sync::atomic::{AtomicU64, Ordering};

const PIT_FREQUENCY_HZ: u32 = 1_193_182;
const TARGET_HZ: u32 = 100;
const PIT_CHANNEL0: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;

static TICKS: AtomicU64 = AtomicU64::new(0);

/// Program channel 0 for a 100 Hz square wave (mode 3) and register the
/// divisor actually used, since `PIT_FREQUENCY_HZ / TARGET_HZ` doesn't
/// divide evenly.
pub fn init() {
    let divisor = (PIT_FREQUENCY_HZ / TARGET_HZ) as u16;
    // SAFETY: 0x40/0x43 are the standard PIT ports; this sequence (command
    // byte, then low/high divisor byte) is the documented programming
    // protocol for channel 0, mode 3.
    unsafe {
        super::port::outb(PIT_COMMAND, 0x36);
        super::port::outb(PIT_CHANNEL0, (divisor & 0xFF) as u8);
        super::port::outb(PIT_CHANNEL0, (divisor >> 8) as u8);
    }
}

/// Called from the timer IRQ handler once per tick.
pub fn tick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

pub fn ticks_to_msec(ticks: u64) -> u64 {
    ticks * 1000 / TARGET_HZ as u64
}
