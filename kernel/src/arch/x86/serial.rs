//! Serial port driver for kernel debugging output.
//!
//! Uses the `uart_16550` crate to interface with COM1 at I/O port 0x3F8;
//! its register layout does not depend on the CPU's operating mode.

use lazy_static::lazy_static;
use spin::Mutex;
use uart_16550::SerialPort;

lazy_static! {
    pub static ref SERIAL1: Mutex<SerialPort> = {
        // SAFETY: 0x3F8 is the standard COM1 base port.
        let mut serial_port = unsafe { SerialPort::new(0x3F8) };
        serial_port.init();
        Mutex::new(serial_port)
    };
}

#[doc(hidden)]
pub fn _print(args: ::core::fmt::Arguments) {
    use core::fmt::Write;

    crate::arch::x86::interrupts::without_interrupts(|| {
        SERIAL1
            .lock()
            .write_fmt(args)
            .expect("printing to serial failed");
    });
}

const COM1_BASE: u16 = 0x3F8;
const LINE_STATUS: u16 = COM1_BASE + 5;
const DATA_READY: u8 = 1 << 0;

/// Non-blocking read of one byte from COM1, for `sys_cgetc`.
/// Reads the line-status register directly rather than going through the
/// `uart_16550::SerialPort` handle, whose `receive()` busy-waits — this
/// core's console read must never block the caller.
pub fn try_read_byte() -> Option<u8> {
    crate::arch::x86::interrupts::without_interrupts(|| {
        // SAFETY: 0x3F8/0x3FD are the standard COM1 data/line-status ports,
        // read-only probed here; no concurrent writer since the lock below
        // is held for the duration.
        let _guard = SERIAL1.lock();
        unsafe {
            if crate::arch::x86::port::inb(LINE_STATUS) & DATA_READY != 0 {
                Some(crate::arch::x86::port::inb(COM1_BASE))
            } else {
                None
            }
        }
    })
}
