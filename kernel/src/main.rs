#![no_std]
#![no_main]
#![cfg_attr(target_os = "none", feature(alloc_error_handler))]
#![cfg_attr(target_os = "none", test_runner(protokernel::test_framework::test_runner))]
#![cfg_attr(target_os = "none", reexport_test_harness_main = "test_main")]

extern crate alloc;

use core::panic::PanicInfo;
use protokernel::{arch, log_service, mm, net, println};

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    println!("[KERNEL PANIC] {info}");
    loop {
        unsafe { core::arch::asm!("cli; hlt", options(nomem, nostack)) };
    }
}

#[cfg(test)]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    protokernel::test_framework::test_panic_handler(info)
}

/// Entered by the boot-supplied trampoline (component A, external per spec
/// §1) after it has set up a physical frame allocator, paged itself into its
/// own page directory, and handed the kernel a usable stack. `num_frames` is
/// the size of physical memory in pages, discovered by boot;
/// `frame_allocator` is boot's free-list allocator wired to the
/// [`mm::FrameAllocator`] trait; `kernel_pd_phys` is the physical address of
/// boot's own page directory, copied into every environment's address space
/// by [`mm::pagetable::AddressSpace::new_user`].
#[no_mangle]
pub extern "C" fn kernel_main(
    frame_allocator: alloc::boxed::Box<dyn mm::FrameAllocator + Send>,
    num_frames: usize,
    kernel_pd_phys: u32,
) -> ! {
    log_service::init();
    println!("protokernel starting (build {})", env!("CARGO_PKG_VERSION"));

    arch::x86::init();
    mm::init(frame_allocator, num_frames, kernel_pd_phys);
    net::init();

    #[cfg(test)]
    test_main();

    log::info!("scheduler entering main loop");
    protokernel::sched::schedule()
}
