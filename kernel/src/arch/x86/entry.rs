//! Hand-written trap entry stubs for 32-bit protected mode.
//!
//! The CPU pushes a hardware error code only for a handful of exceptions
//! (8, 10-14, 17); every other vector gets a dummy zero pushed by its stub
//! so the stack layout is uniform before falling into the shared
//! `_alltraps` path, which builds exactly the layout
//! [`crate::trap::Trapframe`] expects and calls
//! [`crate::trap::trap_dispatch`]. One stub per vector is generated with
//! the `TRAPHANDLER`/`TRAPHANDLER_NOEC` assembler macros, the same shape
//! classic 32-bit protected-mode kernels use for `trapentry.S` — there is
//! no Rust-visible equivalent to generalize here, since `extern
//! "x86-interrupt" fn` stubs are an `x86_64`-crate/long-mode-only feature
//! this core cannot use (see `DESIGN.md`).
//!
//! Only the vectors this core actually dispatches get a named stub:
//! exceptions 0-19, IRQs 32-47 (PIC-remapped), and the syscall gate 0x30.
//! Every other vector is left absent in the IDT (`idt::init`): hitting one
//! raises a general-protection fault referencing the missing entry, which
//! this core already handles.

use core::arch::global_asm;

global_asm!(
    r#"
.macro TRAPHANDLER name num
.global \name
\name:
    push \num
    jmp _alltraps
.endm

.macro TRAPHANDLER_NOEC name num
.global \name
\name:
    push 0
    push \num
    jmp _alltraps
.endm

TRAPHANDLER_NOEC trapstub_0, 0
TRAPHANDLER_NOEC trapstub_1, 1
TRAPHANDLER_NOEC trapstub_2, 2
TRAPHANDLER_NOEC trapstub_3, 3
TRAPHANDLER_NOEC trapstub_4, 4
TRAPHANDLER_NOEC trapstub_5, 5
TRAPHANDLER_NOEC trapstub_6, 6
TRAPHANDLER_NOEC trapstub_7, 7
TRAPHANDLER    trapstub_8, 8
TRAPHANDLER_NOEC trapstub_9, 9
TRAPHANDLER    trapstub_10, 10
TRAPHANDLER    trapstub_11, 11
TRAPHANDLER    trapstub_12, 12
TRAPHANDLER    trapstub_13, 13
TRAPHANDLER    trapstub_14, 14
TRAPHANDLER_NOEC trapstub_15, 15
TRAPHANDLER_NOEC trapstub_16, 16
TRAPHANDLER    trapstub_17, 17
TRAPHANDLER_NOEC trapstub_18, 18
TRAPHANDLER_NOEC trapstub_19, 19

TRAPHANDLER_NOEC trapstub_32, 32
TRAPHANDLER_NOEC trapstub_33, 33
TRAPHANDLER_NOEC trapstub_34, 34
TRAPHANDLER_NOEC trapstub_35, 35
TRAPHANDLER_NOEC trapstub_36, 36
TRAPHANDLER_NOEC trapstub_37, 37
TRAPHANDLER_NOEC trapstub_38, 38
TRAPHANDLER_NOEC trapstub_39, 39
TRAPHANDLER_NOEC trapstub_40, 40
TRAPHANDLER_NOEC trapstub_41, 41
TRAPHANDLER_NOEC trapstub_42, 42
TRAPHANDLER_NOEC trapstub_43, 43
TRAPHANDLER_NOEC trapstub_44, 44
TRAPHANDLER_NOEC trapstub_45, 45
TRAPHANDLER_NOEC trapstub_46, 46
TRAPHANDLER_NOEC trapstub_47, 47

TRAPHANDLER_NOEC trapstub_48, 48

.text
_alltraps:
    push ds
    push es
    pushad
    mov ax, 0x10
    mov ds, ax
    mov es, ax
    push esp
    call trap_dispatch
    // trap_dispatch never returns: it always resumes an environment or
    // calls the scheduler, neither of which falls back through here.
    hlt

.global trap_resume_from_frame
trap_resume_from_frame:
    // esp was pointed at a Trapframe by `trap::resume` just before the
    // jump here; unwind it in exactly the reverse order `_alltraps` built.
    popad
    pop es
    pop ds
    add esp, 8
    iretd
"#
);

extern "C" {
    fn trapstub_0();
    fn trapstub_1();
    fn trapstub_2();
    fn trapstub_3();
    fn trapstub_4();
    fn trapstub_5();
    fn trapstub_6();
    fn trapstub_7();
    fn trapstub_8();
    fn trapstub_9();
    fn trapstub_10();
    fn trapstub_11();
    fn trapstub_12();
    fn trapstub_13();
    fn trapstub_14();
    fn trapstub_15();
    fn trapstub_16();
    fn trapstub_17();
    fn trapstub_18();
    fn trapstub_19();
    fn trapstub_32();
    fn trapstub_33();
    fn trapstub_34();
    fn trapstub_35();
    fn trapstub_36();
    fn trapstub_37();
    fn trapstub_38();
    fn trapstub_39();
    fn trapstub_40();
    fn trapstub_41();
    fn trapstub_42();
    fn trapstub_43();
    fn trapstub_44();
    fn trapstub_45();
    fn trapstub_46();
    fn trapstub_47();
    fn trapstub_48();
}

/// `(vector, stub address)` pairs for every vector this core dispatches.
/// [`super::idt::init`] installs a present gate only for these; every other
/// vector is left absent.
pub static KNOWN_STUBS: &[(u8, unsafe extern "C" fn())] = &[
    (0, trapstub_0),
    (1, trapstub_1),
    (2, trapstub_2),
    (3, trapstub_3),
    (4, trapstub_4),
    (5, trapstub_5),
    (6, trapstub_6),
    (7, trapstub_7),
    (8, trapstub_8),
    (9, trapstub_9),
    (10, trapstub_10),
    (11, trapstub_11),
    (12, trapstub_12),
    (13, trapstub_13),
    (14, trapstub_14),
    (15, trapstub_15),
    (16, trapstub_16),
    (17, trapstub_17),
    (18, trapstub_18),
    (19, trapstub_19),
    (32, trapstub_32),
    (33, trapstub_33),
    (34, trapstub_34),
    (35, trapstub_35),
    (36, trapstub_36),
    (37, trapstub_37),
    (38, trapstub_38),
    (39, trapstub_39),
    (40, trapstub_40),
    (41, trapstub_41),
    (42, trapstub_42),
    (43, trapstub_43),
    (44, trapstub_44),
    (45, trapstub_45),
    (46, trapstub_46),
    (47, trapstub_47),
    (48, trapstub_48),
];
