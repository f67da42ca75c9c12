//! Memory-management syscalls and the NIC ring's transmit/receive syscalls.
//! No `mmap`-style length/flags surface, no shared-memory/async-channel
//! machinery — just alloc/map/unmap one page at a time.

use crate::env::EnvId;
use crate::error::{KernelError, KernelResult};
use crate::mm::{self, PteFlags};

fn current_id() -> KernelResult<EnvId> {
    crate::env::table().current_id().ok_or(KernelError::BadEnv)
}

fn decode_perm(raw: u32) -> KernelResult<PteFlags> {
    let perm = PteFlags::from_bits(raw & (PteFlags::all().bits())).ok_or(KernelError::Inval)?;
    if !perm.is_valid_user_mapping() {
        return Err(KernelError::Inval);
    }
    Ok(perm)
}

/// **page_alloc(id, va, perm)**: allocate a fresh zeroed frame
/// and map it at `va` in `id`'s address space.
pub fn page_alloc(id: u32, va: u32, perm: u32) -> KernelResult<i32> {
    let caller = current_id()?;
    let target = crate::env::table().lookup(caller, EnvId(id), true)?;
    mm::check_user_va(va)?;
    let perm = decode_perm(perm)?;

    let frame = mm::with_allocator(|alloc| alloc.alloc_frame())?;
    // SAFETY: freshly allocated frame, not yet visible to userspace.
    unsafe {
        core::ptr::write_bytes(frame.base_addr() as *mut u8, 0, crate::config::PAGE_SIZE as usize);
    }

    let result = crate::env::table().with_mut(target, |env| {
        mm::with_allocator(|alloc| env.address_space.insert(mm::frame_table(), frame.base_addr(), va, perm, alloc, target == caller))
    })?;

    if result.is_err() {
        mm::with_allocator(|alloc| alloc.free_frame(frame));
    }
    result?;
    Ok(0)
}

/// **page_map(src_id, src_va, dst_id, dst_va, perm)**: share the
/// frame already mapped at `src_va` into `dst_id` at `dst_va` with the
/// requested `perm`, which may differ from the source's own mapping (the
/// COW-fork protocol depends on this: it maps the same frame `WRITE` in the
/// parent and `COW` in the child). Granting `WRITE` requires the source
/// mapping to already be writable.
pub fn page_map(src_id: u32, src_va: u32, dst_id: u32, dst_va: u32, perm: u32) -> KernelResult<i32> {
    let caller = current_id()?;
    let src = crate::env::table().lookup(caller, EnvId(src_id), true)?;
    let dst = crate::env::table().lookup(caller, EnvId(dst_id), true)?;
    mm::check_user_va(src_va)?;
    mm::check_user_va(dst_va)?;
    let perm = decode_perm(perm)?;

    let pte = crate::env::table().with_mut(src, |env| env.address_space.lookup(src_va))?;
    let pte = pte.ok_or(KernelError::Inval)?;
    if !pte.flags().contains(PteFlags::PRESENT | PteFlags::USER) {
        return Err(KernelError::Inval);
    }
    if perm.contains(PteFlags::WRITE) && !pte.flags().contains(PteFlags::WRITE) {
        return Err(KernelError::Inval);
    }

    crate::env::table().with_mut(dst, |env| {
        mm::with_allocator(|alloc| env.address_space.insert(mm::frame_table(), pte.frame_addr(), dst_va, perm, alloc, dst == caller))
    })??;
    Ok(0)
}

/// **page_unmap(id, va)**.
pub fn page_unmap(id: u32, va: u32) -> KernelResult<i32> {
    let caller = current_id()?;
    let target = crate::env::table().lookup(caller, EnvId(id), true)?;
    mm::check_user_va(va)?;
    crate::env::table().with_mut(target, |env| {
        mm::with_allocator(|alloc| env.address_space.remove(mm::frame_table(), va, alloc, target == caller))
    })?;
    Ok(0)
}

/// **sys_nic_xmit(va, len)**: hand one packet buffer to the transmit ring.
/// The NIC driver's DMA internals live outside this module; this only
/// validates the buffer and forwards it.
pub fn nic_xmit(va: u32, len: u32) -> KernelResult<i32> {
    let env = crate::env::current().ok_or(KernelError::BadEnv)?;
    mm::check_user_va(va)?;
    let pte = env.address_space.lookup(va).ok_or(KernelError::Inval)?;
    if !pte.flags().contains(PteFlags::PRESENT | PteFlags::USER) {
        return Err(KernelError::Inval);
    }
    // SAFETY: `pte` just confirmed present/user-readable; `len` is bounded
    // by `crate::net::MAX_PACKET` inside `net::xmit`.
    let buf = unsafe { core::slice::from_raw_parts(pte.frame_addr() as *const u8, len as usize) };
    crate::net::xmit(buf)?;
    Ok(0)
}

/// **sys_nic_recv(va, max_len)**: drain one packet, if any,
/// into the caller's buffer. Returns the packet length, or `RFA_EMPTY` if
/// the receive ring is drained.
pub fn nic_recv(va: u32, max_len: u32) -> KernelResult<i32> {
    let env = crate::env::current().ok_or(KernelError::BadEnv)?;
    mm::check_user_va(va)?;
    let pte = env.address_space.lookup(va).ok_or(KernelError::Inval)?;
    if !pte.flags().contains(PteFlags::PRESENT | PteFlags::USER | PteFlags::WRITE) {
        return Err(KernelError::Inval);
    }
    // SAFETY: `pte` just confirmed present/user-writable.
    let buf = unsafe { core::slice::from_raw_parts_mut(pte.frame_addr() as *mut u8, max_len as usize) };
    let len = crate::net::recv(buf)?;
    Ok(len as i32)
}
