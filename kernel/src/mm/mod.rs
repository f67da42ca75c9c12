//! Memory management: physical addresses, the OS-level page flag bits, and
//! the physical-frame refcount table. Addresses stay 32-bit throughout,
//! and the flag set is exactly what a two-level non-PAE directory has.

pub mod pagetable;

use crate::config::PAGE_SIZE;
use crate::error::{KernelError, KernelResult};
use bitflags::bitflags;
use spin::Mutex;

pub use pagetable::{AddressSpace, PageDirectory, PageTable, Pde, Pte};

bitflags! {
    /// OS-visible bits of a page-table entry. `PRESENT`/`WRITE`/`USER`
    /// overlay the architectural bits directly; `COW` is carried in a bit
    /// the architecture leaves available for OS use.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u32 {
        const PRESENT  = 1 << 0;
        const WRITE    = 1 << 1;
        const USER     = 1 << 2;
        const ACCESSED = 1 << 5;
        const DIRTY    = 1 << 6;
        /// Bit 9, in the architecturally-available 9-11 range.
        const COW      = 1 << 9;
    }
}

impl PteFlags {
    /// A mapping is well-formed user-accessible memory only if it carries
    /// exactly `USER | PRESENT` plus any subset of `WRITE`/`COW`, and never
    /// both `WRITE` and `COW` at once.
    pub fn is_valid_user_mapping(self) -> bool {
        if !self.contains(PteFlags::PRESENT | PteFlags::USER) {
            return false;
        }
        !(self.contains(PteFlags::WRITE) && self.contains(PteFlags::COW))
    }
}

/// Physical frame number (`addr / PAGE_SIZE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Frame(pub u32);

impl Frame {
    pub fn from_addr(addr: u32) -> Self {
        Frame(addr / PAGE_SIZE)
    }

    pub fn base_addr(self) -> u32 {
        self.0 * PAGE_SIZE
    }
}

/// A physical frame allocator supplied by boot. Abstracted behind a
/// trait so address-space logic is testable host-side with an in-memory
/// double instead of the real `FRAME_ALLOCATOR` static.
pub trait FrameAllocator {
    fn alloc_frame(&mut self) -> KernelResult<Frame>;
    fn free_frame(&mut self, frame: Frame);
}

/// Reference counts for every physical frame: every mapping contributes
/// one reference, and a frame is returned to the allocator only when its
/// count drops to zero.
pub struct FrameTable {
    counts: Mutex<alloc::vec::Vec<u16>>,
}

impl FrameTable {
    pub fn new(num_frames: usize) -> Self {
        FrameTable {
            counts: Mutex::new(alloc::vec![0u16; num_frames]),
        }
    }

    pub fn inc_ref(&self, frame: Frame) {
        let mut counts = self.counts.lock();
        if let Some(c) = counts.get_mut(frame.0 as usize) {
            *c += 1;
        }
    }

    /// Decrement the refcount, returning `true` if it reached zero and the
    /// frame should be returned to the physical allocator.
    pub fn dec_ref(&self, frame: Frame) -> bool {
        let mut counts = self.counts.lock();
        match counts.get_mut(frame.0 as usize) {
            Some(c) if *c > 0 => {
                *c -= 1;
                *c == 0
            }
            _ => false,
        }
    }

    pub fn ref_count(&self, frame: Frame) -> u16 {
        self.counts
            .lock()
            .get(frame.0 as usize)
            .copied()
            .unwrap_or(0)
    }
}

pub fn page_aligned(addr: u32) -> bool {
    addr % PAGE_SIZE == 0
}

pub fn check_user_va(addr: u32) -> KernelResult<()> {
    if addr >= crate::config::UTOP || !page_aligned(addr) {
        return Err(KernelError::Inval);
    }
    Ok(())
}

/// Global physical frame allocator and refcount table. The allocator
/// itself is supplied by boot; this crate only holds the handle boot
/// installs via [`init`].
static FRAME_ALLOCATOR: Mutex<Option<alloc::boxed::Box<dyn FrameAllocator + Send>>> = Mutex::new(None);
static FRAME_TABLE: spin::Once<FrameTable> = spin::Once::new();

/// Physical address of the kernel's own page directory, supplied by boot.
/// Every environment's address space is created by copying this
/// directory's entries at and above `UTOP`'s PDE index, giving every
/// environment an identical view of kernel memory (see
/// [`pagetable::AddressSpace::new_user`]).
static KERNEL_PD_PHYS: spin::Once<u32> = spin::Once::new();

/// Install the boot-supplied frame allocator, size the refcount table, and
/// record the kernel's own page directory for [`pagetable::AddressSpace::new_user`]
/// to copy from. Called once during boot, before any environment exists.
pub fn init(allocator: alloc::boxed::Box<dyn FrameAllocator + Send>, num_frames: usize, kernel_pd_phys: u32) {
    *FRAME_ALLOCATOR.lock() = Some(allocator);
    FRAME_TABLE.call_once(|| FrameTable::new(num_frames));
    KERNEL_PD_PHYS.call_once(|| kernel_pd_phys);
}

pub(crate) fn kernel_pd_phys() -> u32 {
    *KERNEL_PD_PHYS.wait()
}

pub fn frame_table() -> &'static FrameTable {
    FRAME_TABLE.wait()
}

pub(crate) fn with_allocator<R>(f: impl FnOnce(&mut dyn FrameAllocator) -> R) -> R {
    let mut guard = FRAME_ALLOCATOR.lock();
    let alloc = guard.as_deref_mut().expect("frame allocator not installed");
    f(alloc)
}

/// Walk the user portion of `space` (everything strictly below `UTOP`),
/// unmapping every present page and freeing every page-table frame, then
/// free the directory itself. Used by [`crate::env::table::EnvTable::destroy`].
pub fn unmap_user_space(space: &mut AddressSpace) {
    with_allocator(|alloc| {
        space.clear_user_range(frame_table(), crate::config::UTOP, alloc);
    });
}
