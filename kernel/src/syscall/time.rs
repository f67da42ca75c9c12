//! **time_msec()**: milliseconds since boot, read off the PIT tick counter
//! (`arch::x86::timer`).

pub fn time_msec() -> i32 {
    crate::arch::x86::timer::ticks_to_msec(crate::arch::x86::timer::ticks()) as i32
}
