//! Global Descriptor Table and Task State Segment for 32-bit protected mode.
//!
//! A `lazy_static!`-built GDT and TSS, with a privilege-transition stack
//! baked into the TSS. The `x86_64` crate's `GlobalDescriptorTable`/
//! `Descriptor` types only know how to emit 64-bit long-mode descriptors;
//! since that crate is dropped (see `DESIGN.md`), the flat/granular 32-bit
//! descriptor bytes are packed by hand here.

use core::arch::asm;
use core::mem::size_of;
use lazy_static::lazy_static;
use spin::Mutex;

pub const KERNEL_CODE_SELECTOR: u16 = 0x08;
pub const KERNEL_DATA_SELECTOR: u16 = 0x10;
pub const USER_CODE_SELECTOR: u16 = 0x18 | 3;
pub const USER_DATA_SELECTOR: u16 = 0x20 | 3;
pub const TSS_SELECTOR: u16 = 0x28;

#[derive(Clone, Copy)]
#[repr(C, packed)]
struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    granularity: u8,
    base_high: u8,
}

impl GdtEntry {
    const fn null() -> Self {
        GdtEntry {
            limit_low: 0,
            base_low: 0,
            base_mid: 0,
            access: 0,
            granularity: 0,
            base_high: 0,
        }
    }

    const fn flat(access: u8, gran: u8) -> Self {
        GdtEntry {
            limit_low: 0xFFFF,
            base_low: 0,
            base_mid: 0,
            access,
            granularity: 0xC0 | gran,
            base_high: 0,
        }
    }

    fn system(base: u32, limit: u32, access: u8) -> Self {
        GdtEntry {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_mid: ((base >> 16) & 0xFF) as u8,
            access,
            granularity: (((limit >> 16) & 0x0F) as u8) | 0x40,
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }
}

#[repr(C, packed)]
struct GdtPointer {
    limit: u16,
    base: u32,
}

/// Minimal 32-bit TSS. Only `ss0`/`esp0` (the ring-0 stack used on a
/// privilege-level transition via `int`) and the I/O permission bitmap
/// offset are meaningful here; this core does not use hardware task
/// switching.
#[repr(C, packed)]
pub struct Tss {
    pub prev_task: u16,
    _r0: u16,
    pub esp0: u32,
    pub ss0: u16,
    _r1: u16,
    pub esp1: u32,
    pub ss1: u16,
    _r2: u16,
    pub esp2: u32,
    pub ss2: u16,
    _r3: u16,
    _rest: [u32; 6],
    _seg: [u16; 12],
    pub cr3: u32,
    pub iomap_base: u16,
}

impl Tss {
    const fn new() -> Self {
        // SAFETY-irrelevant: plain zeroed struct, all integer fields.
        Tss {
            prev_task: 0,
            _r0: 0,
            esp0: 0,
            ss0: 0,
            _r1: 0,
            esp1: 0,
            ss1: 0,
            _r2: 0,
            esp2: 0,
            ss2: 0,
            _r3: 0,
            _rest: [0; 6],
            _seg: [0; 12],
            cr3: 0,
            iomap_base: size_of::<Tss>() as u16,
        }
    }
}

const KERNEL_STACK_SIZE: usize = 4096 * 5;

#[repr(align(16))]
struct AlignedStack([u8; KERNEL_STACK_SIZE]);

static KERNEL_STACK: Mutex<AlignedStack> = Mutex::new(AlignedStack([0; KERNEL_STACK_SIZE]));

lazy_static! {
    static ref TSS: Mutex<Tss> = Mutex::new(Tss::new());
}

struct Gdt {
    entries: [GdtEntry; 6],
}

lazy_static! {
    static ref GDT: Gdt = Gdt {
        entries: [
            GdtEntry::null(),
            GdtEntry::flat(0x9A, 0x0F), // kernel code, ring 0
            GdtEntry::flat(0x92, 0x0F), // kernel data, ring 0
            GdtEntry::flat(0xFA, 0x0F), // user code, ring 3
            GdtEntry::flat(0xF2, 0x0F), // user data, ring 3
            GdtEntry::null(),           // patched with the TSS descriptor at init
        ],
    };
}

/// Install the GDT and TSS and reload segment registers.
pub fn init() {
    let stack_top = {
        let stack = KERNEL_STACK.lock();
        stack.0.as_ptr() as u32 + KERNEL_STACK_SIZE as u32
    };

    {
        let mut tss = TSS.lock();
        tss.ss0 = KERNEL_DATA_SELECTOR;
        tss.esp0 = stack_top;
    }

    let tss_addr = {
        let tss = TSS.lock();
        &*tss as *const Tss as u32
    };
    let tss_limit = (size_of::<Tss>() - 1) as u32;

    let mut entries = GDT.entries;
    entries[5] = GdtEntry::system(tss_addr, tss_limit, 0x89);
    *LIVE_GDT.lock() = entries;

    // SAFETY: LIVE_GDT and TSS both have 'static storage; lgdt/ltr install
    // descriptor-table base addresses the CPU reads on every segment load
    // and on every privilege-transition task switch. Standard protected-mode
    // bring-up sequence.
    unsafe {
        let live = LIVE_GDT.lock();
        let ptr = GdtPointer {
            limit: (size_of::<[GdtEntry; 6]>() - 1) as u16,
            base: &*live as *const [GdtEntry; 6] as u32,
        };
        asm!("lgdt [{0}]", in(reg) &ptr, options(readonly, nostack, preserves_flags));
        reload_segments();
        asm!("ltr {0:x}", in(reg) TSS_SELECTOR, options(nostack, preserves_flags));
    }
}

static LIVE_GDT: Mutex<[GdtEntry; 6]> = Mutex::new([GdtEntry::null(); 6]);

/// # Safety
/// Must run immediately after `lgdt` with the selectors this module defines.
unsafe fn reload_segments() {
    // SAFETY: forwarded from caller; KERNEL_CODE/DATA_SELECTOR match the GDT
    // just loaded.
    unsafe {
        asm!(
            "push {code}",
            "lea eax, [2f]",
            "push eax",
            "retf",
            "2:",
            "mov ax, {data}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "mov ss, ax",
            code = const KERNEL_CODE_SELECTOR,
            data = const KERNEL_DATA_SELECTOR,
            out("eax") _,
        );
    }
}

/// Update the ring-0 stack pointer in the TSS, called whenever the kernel
/// switches to a different environment's kernel stack.
pub fn set_kernel_stack(esp0: u32) {
    TSS.lock().esp0 = esp0;
}
