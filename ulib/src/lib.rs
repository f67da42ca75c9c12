//! User-space support library: the raw syscall ABI plus the copy-on-write
//! fork protocol built entirely on top of it. No kernel code is reachable
//! from here — only `int 0x30` and the read-only page-table self-map.

#![no_std]

pub mod abi;
pub mod config;
pub mod fork;
pub mod pfault;
pub mod syscall;
pub mod trampoline;
pub mod uvpt;

pub use fork::fork;
pub use pfault::{handle_pgfault, UTrapframe};
