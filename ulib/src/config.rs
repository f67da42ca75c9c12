//! Layout constants shared with the kernel's ABI (mirrors
//! `kernel/src/config.rs`; see the note in `abi.rs` about why these are
//! duplicated rather than imported).

pub const PAGE_SIZE: u32 = 4096;

/// Must match `kernel/src/config.rs::UTOP` exactly, and stay on a
/// page-directory boundary (a multiple of `0x40_0000`) — see that file's
/// doc comment for why.
pub const UTOP: u32 = 0xF000_0000;
pub const UXSTACKTOP: u32 = UTOP;
pub const UVPT_SCRATCH: u32 = 0xEFFF_E000;

/// Base of the read-only page-table self-map. See the kernel's `config.rs`
/// doc comment for the recursive-mapping arithmetic.
///
/// There is no fixed address constant for the fork page-fault upcall: it is
/// registered with `sys_env_set_pgfault_upcall` using the trampoline's own
/// linked address (`trampoline::trampoline_address`), not a hardcoded VA.
pub const UVPT: u32 = 0xEF40_0000;
pub const UVPD: u32 = UVPT + ((UVPT >> 22) << 12);
