//! Assembly tail of the user page-fault upcall. The kernel's
//! upcall dispatch (`trap::upcall::dispatch_page_fault`) leaves `esp`
//! pointing at a freshly built `UTrapframe` on the exception stack and sets
//! `eip` to whatever address was registered with `sys_env_set_pgfault_upcall`
//! — `fork_trampoline`'s own address, so it runs next with no privilege
//! change. It calls into [`crate::pfault::handle_pgfault`] to do the actual
//! copy, then restores the interrupted register state and resumes on the
//! original stack, exactly mirroring the layout `_alltraps`/
//! `trap_resume_from_frame` build and unwind on the kernel side
//! (`arch::x86::entry`), the same macro-free `global_asm!` shape.
//!
//! `UTrapframe` field byte offsets this assembly hard-codes: `fault_va`=0,
//! `err`=4, `regs.{edi,esi,ebp,oesp,ebx,edx,ecx,eax}`=8,12,16,20,24,28,32,36,
//! `eip`=40, `eflags`=44, `esp`=48.

use core::arch::global_asm;

global_asm!(
    r#"
.global fork_trampoline
fork_trampoline:
    # esp -> UTrapframe. Pass its address to the Rust handler (cdecl: caller
    # cleans up the pushed argument).
    push esp
    call handle_pgfault_trampoline
    add esp, 4

    # Splice the interrupted eip onto the trap-time stack, one word below
    # its saved esp, freeing up a return address for the final `ret`.
    mov eax, [esp + 48]
    sub eax, 4
    mov ecx, [esp + 40]
    mov [eax], ecx
    mov [esp + 48], eax

    # Restore eflags while still addressing the exception stack.
    mov ecx, [esp + 44]
    push ecx
    popfd

    # Restore general registers (eax/ecx/edx last: used as scratch above).
    mov edi, [esp + 8]
    mov esi, [esp + 12]
    mov ebp, [esp + 16]
    mov ebx, [esp + 24]
    mov edx, [esp + 28]
    mov ecx, [esp + 32]
    mov eax, [esp + 36]

    # Switch to the trap-time stack and resume at the spliced-in eip.
    mov esp, [esp + 48]
    ret
"#
);

extern "C" {
    pub fn fork_trampoline();
}

/// The address to hand `sys_env_set_pgfault_upcall` — the real, linked
/// address of [`fork_trampoline`], not a fixed convention address.
pub fn trampoline_address() -> u32 {
    fork_trampoline as usize as u32
}

#[no_mangle]
extern "C" fn handle_pgfault_trampoline(utf: *const crate::pfault::UTrapframe) {
    // SAFETY: `fork_trampoline` only ever calls this with the address the
    // kernel just populated a full `UTrapframe` at.
    unsafe { crate::pfault::handle_pgfault(&*utf) }
}
