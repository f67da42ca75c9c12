//! Architecture support. This core targets 32-bit protected-mode x86 only.

pub mod x86;
pub use x86::*;
