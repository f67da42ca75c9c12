//! `log` facade wired to the serial/VGA console.
//!
//! Installed once at boot with [`init`]; every module then reaches for the
//! ordinary `log::{trace,debug,info,warn,error}!` macros instead of the
//! console macros directly, the way the trap and syscall dispatch paths do
//! for diagnostics that are logged-and-ignored or logged-and-destroyed.

use core::sync::atomic::{AtomicBool, Ordering};
use log::{Level, Metadata, Record};

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;
static INITIALIZED: AtomicBool = AtomicBool::new(false);

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        crate::println!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        crate::serial_println!("[{:<5} {}] {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {}
}

/// Install the kernel logger. Idempotent; safe to call more than once.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::AcqRel) {
        return;
    }
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(log::LevelFilter::Trace))
        .expect("logger already installed");
}
