//! A small exokernel core for 32-bit protected-mode x86: environment
//! lifecycle, trap/page-fault dispatch with user upcalls, a
//! capability-checked syscall surface, and synchronous two-party IPC. The
//! copy-on-write fork protocol itself lives in user space (`ulib::fork`) —
//! this kernel only exposes the primitives it's built from.

#![no_std]
#![cfg_attr(target_os = "none", feature(alloc_error_handler))]
#![cfg_attr(all(test, target_os = "none"), no_main)]
#![cfg_attr(target_os = "none", test_runner(crate::test_framework::test_runner))]
#![cfg_attr(target_os = "none", reexport_test_harness_main = "test_main")]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(all(target_arch = "x86", target_os = "none"))]
use linked_list_allocator::LockedHeap;

#[cfg(all(target_arch = "x86", target_os = "none"))]
#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

// Host target (running `cargo test` off bare metal): delegate to the
// system allocator so Vec/Box-using unit tests compile and run normally.
#[cfg(not(target_os = "none"))]
extern crate std;
#[cfg(not(target_os = "none"))]
#[global_allocator]
static SYSTEM_ALLOCATOR: std::alloc::System = std::alloc::System;

#[macro_use]
pub mod print;

pub mod arch;
pub mod config;
pub mod env;
pub mod error;
pub mod ipc;
pub mod log_service;
pub mod mm;
pub mod net;
pub mod sched;
mod syscall;
pub mod test_framework;
pub mod trap;

pub use error::{KernelError, KernelResult};

/// Heap allocation failure is unrecoverable in a `no_std` kernel; the
/// `alloc_error_handler` ABI requires `-> !`.
#[cfg(target_os = "none")]
#[alloc_error_handler]
fn alloc_error_handler(layout: core::alloc::Layout) -> ! {
    panic!("allocation error: {layout:?}");
}

#[cfg(all(test, target_os = "none"))]
#[no_mangle]
pub extern "C" fn _start() -> ! {
    test_main();
    loop {
        unsafe { core::arch::asm!("hlt", options(nomem, nostack)) };
    }
}

#[cfg(all(test, target_os = "none"))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    test_framework::test_panic_handler(info)
}
