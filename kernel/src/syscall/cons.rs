//! Console syscalls: `sys_cputs`/`sys_cgetc`.
//!
//! The only console path this core carries; a kernel monitor/shell sits on
//! top of it but is out of scope here.

use crate::error::{KernelError, KernelResult};
use crate::mm;

/// Copy at most `len` bytes out of the caller's address space and print
/// them. Every byte must come from validated, present, user-readable pages.
/// An environment that passes a buffer that isn't, whether malicious or
/// just buggy, is destroyed rather than handed back an error code — the
/// same as any other user-memory fault taken in the kernel.
pub fn cputs(va: u32, len: u32) -> KernelResult<i32> {
    let env = crate::env::current().ok_or(KernelError::Inval)?;
    let len = len as usize;

    let mut remaining = len;
    let mut addr = va;
    while remaining > 0 {
        let pte = mm::check_user_va(addr)
            .ok()
            .and_then(|()| env.address_space.lookup(addr))
            .filter(|pte| pte.flags().contains(mm::PteFlags::PRESENT | mm::PteFlags::USER));
        let pte = match pte {
            Some(pte) => pte,
            None => {
                let id = env.id;
                log::warn!("destroying environment {id:?}: invalid cputs buffer");
                let _ = crate::env::table().destroy(id);
                crate::sched::schedule();
            }
        };
        let page_off = (va as usize + (len - remaining)) % crate::config::PAGE_SIZE as usize;
        let chunk = (crate::config::PAGE_SIZE as usize - page_off).min(remaining);
        // SAFETY: `pte` was just confirmed present and user-readable, and
        // `chunk` was clamped to not cross the page boundary just checked.
        let bytes = unsafe {
            core::slice::from_raw_parts((pte.frame_addr() as usize + page_off) as *const u8, chunk)
        };
        for &b in bytes {
            crate::print!("{}", b as char);
        }
        remaining -= chunk;
        addr = addr.wrapping_add(chunk as u32) & !(crate::config::PAGE_SIZE - 1);
    }
    Ok(len as i32)
}

/// Read one character from the console, non-blocking: `0` if none ready.
pub fn cgetc() -> i32 {
    crate::arch::x86::serial::try_read_byte()
        .map(|b| b as i32)
        .unwrap_or(0)
}
