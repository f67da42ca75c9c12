//! Address-space primitives: a two-level 32-bit page table structure, one
//! `PageDirectory` of 1024 `Pde`, each optionally pointing at a
//! `PageTable` of 1024 `Pte`.

use super::{FrameAllocator, FrameTable, PteFlags};
use crate::config::{PAGE_SIZE, PAGE_TABLE_ENTRIES};
use crate::error::KernelResult;

/// A page-directory entry: physical frame of a `PageTable`, plus flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Pde(u32);

/// A page-table entry: physical frame of user data, plus flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Pte(u32);

macro_rules! entry_impl {
    ($t:ty) => {
        impl $t {
            pub const fn empty() -> Self {
                Self(0)
            }

            pub fn is_present(self) -> bool {
                self.flags().contains(PteFlags::PRESENT)
            }

            pub fn flags(self) -> PteFlags {
                PteFlags::from_bits_truncate(self.0 & (PAGE_SIZE - 1))
            }

            pub fn frame_addr(self) -> u32 {
                self.0 & !(PAGE_SIZE - 1)
            }

            pub fn set(&mut self, frame_addr: u32, flags: PteFlags) {
                debug_assert_eq!(frame_addr & (PAGE_SIZE - 1), 0, "frame address must be page-aligned");
                self.0 = frame_addr | flags.bits();
            }

            pub fn clear(&mut self) {
                self.0 = 0;
            }
        }
    };
}

entry_impl!(Pde);
entry_impl!(Pte);

/// A 1024-entry, page-sized page table.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [Pte; PAGE_TABLE_ENTRIES],
}

impl PageTable {
    pub fn zeroed() -> Self {
        PageTable {
            entries: [Pte::empty(); PAGE_TABLE_ENTRIES],
        }
    }
}

/// A 1024-entry, page-sized page directory: the root translation structure.
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [Pde; PAGE_TABLE_ENTRIES],
}

impl PageDirectory {
    pub fn zeroed() -> Self {
        PageDirectory {
            entries: [Pde::empty(); PAGE_TABLE_ENTRIES],
        }
    }
}

fn split(va: u32) -> (usize, usize) {
    let pd_index = (va >> 22) as usize;
    let pt_index = ((va >> 12) & 0x3FF) as usize;
    (pd_index, pt_index)
}

fn uvpt_pd_index() -> usize {
    (crate::config::UVPT >> 22) as usize
}

/// Translate a physical frame address to a kernel-virtual pointer. Boot
/// hands the kernel a window over all of physical memory; this wraps that
/// window.
///
/// # Safety
/// `frame_addr` must name a physical frame actually backed by the boot
/// physical-memory window.
unsafe fn phys_to_kernel_ptr<T>(frame_addr: u32) -> *mut T {
    frame_addr as *mut T
}

/// **lookup(pd, va) → (frame, pte) or none**.
///
/// Walks the two-level structure and reports the containing page-table
/// entry even when the page itself is not present, so the caller may
/// inspect flags (used by `page_map`'s writability check on an unmapped
/// destination, for instance).
pub fn lookup(pd: &PageDirectory, va: u32) -> Option<Pte> {
    let (pd_index, pt_index) = split(va);
    let pde = pd.entries[pd_index];
    if !pde.is_present() {
        return None;
    }
    // SAFETY: `pde.frame_addr()` was installed by `insert`/`ensure_table`
    // below, always a live `PageTable`-sized physical frame.
    let table = unsafe { &*phys_to_kernel_ptr::<PageTable>(pde.frame_addr()) };
    Some(table.entries[pt_index])
}

fn ensure_table(pd: &mut PageDirectory, pd_index: usize, alloc: &mut dyn FrameAllocator) -> KernelResult<*mut PageTable> {
    let pde = pd.entries[pd_index];
    if pde.is_present() {
        // SAFETY: frame was allocated and zeroed as a PageTable below.
        return Ok(unsafe { phys_to_kernel_ptr::<PageTable>(pde.frame_addr()) });
    }
    let frame = alloc.alloc_frame()?;
    // SAFETY: freshly allocated frame, exclusively owned by this directory.
    unsafe {
        core::ptr::write(phys_to_kernel_ptr::<PageTable>(frame.base_addr()), PageTable::zeroed());
    }
    pd.entries[pd_index].set(frame.base_addr(), PteFlags::PRESENT | PteFlags::WRITE | PteFlags::USER);
    // SAFETY: just initialized above.
    Ok(unsafe { phys_to_kernel_ptr::<PageTable>(frame.base_addr()) })
}

/// **insert(pd, frame, va, perm)**.
///
/// Idempotently maps `frame` at `va` with `perm`. Allocates the
/// intermediate page table on demand; on allocation failure returns
/// `NO_MEM` and leaves the directory unchanged. Increments `frame`'s
/// refcount *before* dropping any previous mapping, so map-to-self is safe.
pub fn insert(
    pd: &mut PageDirectory,
    frames: &FrameTable,
    frame_addr: u32,
    va: u32,
    perm: PteFlags,
    alloc: &mut dyn FrameAllocator,
    live: bool,
) -> KernelResult<()> {
    let (pd_index, pt_index) = split(va);
    let table_ptr = ensure_table(pd, pd_index, alloc)?;

    frames.inc_ref(super::Frame::from_addr(frame_addr));

    // SAFETY: `table_ptr` was just confirmed present/initialized.
    let table = unsafe { &mut *table_ptr };
    let previous = table.entries[pt_index];
    table.entries[pt_index].set(frame_addr, perm);

    if previous.is_present() {
        let prev_frame = super::Frame::from_addr(previous.frame_addr());
        if frames.dec_ref(prev_frame) {
            alloc.free_frame(prev_frame);
        }
    }

    if live {
        invlpg(va);
    }
    Ok(())
}

/// **remove(pd, va)**.
///
/// If a page is mapped at `va`, decrements its refcount (possibly freeing
/// it), clears the PTE, and invalidates the TLB for that va if `live`.
pub fn remove(pd: &PageDirectory, frames: &FrameTable, va: u32, alloc: &mut dyn FrameAllocator, live: bool) {
    let (pd_index, pt_index) = split(va);
    let pde = pd.entries[pd_index];
    if !pde.is_present() {
        return;
    }
    // SAFETY: present PDE names a live PageTable frame.
    let table = unsafe { &mut *phys_to_kernel_ptr::<PageTable>(pde.frame_addr()) };
    let pte = table.entries[pt_index];
    if !pte.is_present() {
        return;
    }
    let frame = super::Frame::from_addr(pte.frame_addr());
    table.entries[pt_index].clear();
    if frames.dec_ref(frame) {
        alloc.free_frame(frame);
    }
    if live {
        invlpg(va);
    }
}

fn invlpg(va: u32) {
    // SAFETY: `invlpg` only discards a stale TLB entry; always sound.
    unsafe {
        core::arch::asm!("invlpg [{0}]", in(reg) va, options(nostack, preserves_flags));
    }
}

/// Owning handle to a single environment's address space: the page
/// directory plus the intermediate page tables it points at. Destroyed
/// with the environment.
pub struct AddressSpace {
    pub pd_phys: u32,
}

impl AddressSpace {
    /// An unbound handle for a `FREE` environment slot. Never dereferenced:
    /// callers must not invoke `lookup`/`insert`/`remove` on a `FREE` slot's
    /// address space.
    pub const fn empty() -> Self {
        AddressSpace { pd_phys: 0 }
    }

    /// # Safety
    /// `pd_phys` must name a live, page-aligned `PageDirectory` frame.
    pub unsafe fn from_phys(pd_phys: u32) -> Self {
        AddressSpace { pd_phys }
    }

    /// Allocate a fresh address space for a new environment (the fork
    /// syscall's kernel half): a zeroed directory with the kernel's own
    /// PDEs at and above `UTOP` copied in, so every environment shares one
    /// consistent view of kernel memory, matching however boot's own
    /// directory set it up. The page tables those PDEs point at are
    /// shared, never freed by `clear_user_range`, which only walks indices
    /// below `UTOP`'s PDE.
    pub fn new_user(alloc: &mut dyn FrameAllocator) -> KernelResult<Self> {
        let frame = alloc.alloc_frame()?;
        // SAFETY: freshly allocated frame, exclusively owned by this space.
        unsafe {
            core::ptr::write(phys_to_kernel_ptr::<PageDirectory>(frame.base_addr()), PageDirectory::zeroed());
        }
        let mut space = AddressSpace { pd_phys: frame.base_addr() };

        // SAFETY: `kernel_pd_phys` names the boot-installed kernel
        // directory, live for the kernel's lifetime.
        let kernel_pd = unsafe { &*phys_to_kernel_ptr::<PageDirectory>(super::kernel_pd_phys()) };
        let pd_limit = (crate::config::UTOP >> 22) as usize;
        let pd = space.directory_mut();
        for pd_index in pd_limit..PAGE_TABLE_ENTRIES {
            pd.entries[pd_index] = kernel_pd.entries[pd_index];
        }

        // Recursive self-map: the directory's own frame, read-only and
        // user-visible, at its own slot. `clear_user_range` knows to skip
        // this slot rather than treating the directory as a freeable
        // `PageTable`.
        let uvpt_index = uvpt_pd_index();
        pd.entries[uvpt_index].set(space.pd_phys, PteFlags::PRESENT | PteFlags::USER);

        Ok(space)
    }

    fn directory(&self) -> &PageDirectory {
        // SAFETY: `pd_phys` is a live PageDirectory for the lifetime of
        // `self`, guaranteed by the constructor's contract.
        unsafe { &*phys_to_kernel_ptr::<PageDirectory>(self.pd_phys) }
    }

    fn directory_mut(&mut self) -> &mut PageDirectory {
        // SAFETY: same as `directory`, with exclusive access via `&mut self`.
        unsafe { &mut *phys_to_kernel_ptr::<PageDirectory>(self.pd_phys) }
    }

    pub fn lookup(&self, va: u32) -> Option<Pte> {
        lookup(self.directory(), va)
    }

    pub fn insert(
        &mut self,
        frames: &FrameTable,
        frame_addr: u32,
        va: u32,
        perm: PteFlags,
        alloc: &mut dyn FrameAllocator,
        live: bool,
    ) -> KernelResult<()> {
        insert(self.directory_mut(), frames, frame_addr, va, perm, alloc, live)
    }

    pub fn remove(&mut self, frames: &FrameTable, va: u32, alloc: &mut dyn FrameAllocator, live: bool) {
        remove(self.directory(), frames, va, alloc, live)
    }

    /// Unmap every present page below `utop`, free every page-table frame
    /// it owns, then free the directory frame itself. Used by
    /// `env::destroy` to walk the user portion of an address space,
    /// unmapping every page, then free the directory itself.
    pub fn clear_user_range(&mut self, frames: &FrameTable, utop: u32, alloc: &mut dyn FrameAllocator) {
        let pd_limit = (utop >> 22) as usize;
        let uvpt_index = uvpt_pd_index();
        let pd = self.directory_mut();
        for pd_index in 0..pd_limit {
            if pd_index == uvpt_index {
                // The recursive self-map slot names this very directory,
                // not a freeable `PageTable` frame; it is dropped along with
                // the directory itself below.
                continue;
            }
            let pde = pd.entries[pd_index];
            if !pde.is_present() {
                continue;
            }
            // SAFETY: present PDE names a live PageTable frame owned
            // exclusively by this directory.
            let table = unsafe { &mut *phys_to_kernel_ptr::<PageTable>(pde.frame_addr()) };
            for pt_index in 0..PAGE_TABLE_ENTRIES {
                let pte = table.entries[pt_index];
                if !pte.is_present() {
                    continue;
                }
                let frame = super::Frame::from_addr(pte.frame_addr());
                table.entries[pt_index].clear();
                if frames.dec_ref(frame) {
                    alloc.free_frame(frame);
                }
            }
            let pt_frame = super::Frame::from_addr(pde.frame_addr());
            pd.entries[pd_index].clear();
            alloc.free_frame(pt_frame);
        }
        let pd_frame = super::Frame::from_addr(self.pd_phys);
        alloc.free_frame(pd_frame);
        self.pd_phys = 0;
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        AddressSpace::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An in-memory frame allocator double, isolating `FrameAllocator`
    /// from the real `FRAME_ALLOCATOR` static so this logic is testable
    /// on the host.
    struct PoolAllocator {
        pool: alloc::boxed::Box<[[u8; PAGE_SIZE as usize]]>,
        next: usize,
        freed: alloc::vec::Vec<usize>,
    }

    impl PoolAllocator {
        fn new(frames: usize) -> Self {
            PoolAllocator {
                pool: alloc::vec![[0u8; PAGE_SIZE as usize]; frames].into_boxed_slice(),
                next: 0,
                freed: alloc::vec::Vec::new(),
            }
        }

        fn index_of(&self, addr: u32) -> usize {
            (addr as usize - self.pool.as_ptr() as usize) / PAGE_SIZE as usize
        }
    }

    impl FrameAllocator for PoolAllocator {
        fn alloc_frame(&mut self) -> KernelResult<super::super::Frame> {
            let idx = if let Some(i) = self.freed.pop() {
                i
            } else if self.next < self.pool.len() {
                let i = self.next;
                self.next += 1;
                i
            } else {
                return Err(crate::error::KernelError::NoMem);
            };
            let addr = self.pool.as_ptr() as usize + idx * PAGE_SIZE as usize;
            Ok(super::super::Frame::from_addr(addr as u32))
        }

        fn free_frame(&mut self, frame: super::super::Frame) {
            self.freed.push(self.index_of(frame.base_addr()));
        }
    }

    fn new_directory(alloc: &mut PoolAllocator) -> (u32, PageDirectory) {
        let frame = alloc.alloc_frame().unwrap();
        (frame.base_addr(), PageDirectory::zeroed())
    }

    #[test]
    fn insert_then_lookup_round_trips() {
        let mut alloc = PoolAllocator::new(8);
        let (_pd_addr, mut pd) = new_directory(&mut alloc);
        let frames = FrameTable::new(8);
        let data_frame = alloc.alloc_frame().unwrap();

        insert(
            &mut pd,
            &frames,
            data_frame.base_addr(),
            0x0040_0000,
            PteFlags::PRESENT | PteFlags::USER | PteFlags::WRITE,
            &mut alloc,
            false,
        )
        .unwrap();

        let pte = lookup(&pd, 0x0040_0000).expect("mapping should be present");
        assert!(pte.is_present());
        assert_eq!(pte.frame_addr(), data_frame.base_addr());
        assert_eq!(frames.ref_count(data_frame), 1);
    }

    #[test]
    fn remove_drops_refcount_and_clears_pte() {
        let mut alloc = PoolAllocator::new(8);
        let (_pd_addr, mut pd) = new_directory(&mut alloc);
        let frames = FrameTable::new(8);
        let data_frame = alloc.alloc_frame().unwrap();

        insert(
            &mut pd,
            &frames,
            data_frame.base_addr(),
            0x0040_0000,
            PteFlags::PRESENT | PteFlags::USER,
            &mut alloc,
            false,
        )
        .unwrap();
        remove(&pd, &frames, 0x0040_0000, &mut alloc, false);

        assert!(lookup(&pd, 0x0040_0000).is_none());
        assert_eq!(frames.ref_count(data_frame), 0);
    }

    #[test]
    fn insert_increments_before_dropping_previous_mapping() {
        // Mapping the same frame to the same va twice (map-to-self) must
        // not transiently drop the refcount to zero and free the frame
        // out from under the new mapping.
        let mut alloc = PoolAllocator::new(8);
        let (_pd_addr, mut pd) = new_directory(&mut alloc);
        let frames = FrameTable::new(8);
        let data_frame = alloc.alloc_frame().unwrap();

        insert(
            &mut pd,
            &frames,
            data_frame.base_addr(),
            0x0040_0000,
            PteFlags::PRESENT | PteFlags::USER,
            &mut alloc,
            false,
        )
        .unwrap();
        insert(
            &mut pd,
            &frames,
            data_frame.base_addr(),
            0x0040_0000,
            PteFlags::PRESENT | PteFlags::USER | PteFlags::WRITE,
            &mut alloc,
            false,
        )
        .unwrap();

        assert_eq!(frames.ref_count(data_frame), 1);
        let pte = lookup(&pd, 0x0040_0000).unwrap();
        assert!(pte.flags().contains(PteFlags::WRITE));
    }
}
