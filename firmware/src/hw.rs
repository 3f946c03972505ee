// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

pub use avr_device::atmega328p as mcu;
pub use avr_device::interrupt;

/// CPU clock.
#[cfg_attr(not(feature = "debug"), allow(dead_code))]
pub const FCPU: u32 = 16_000_000;

/// Enable the watchdog with a timeout of 1 s.
pub fn wdt_init() {
    // SAFETY: The asm code only accesses the WDT registers
    //         which are not accessed from anywhere else in the program.
    //         The timed sequence must not be interrupted.
    //         It is called from init context with interrupts disabled.
    unsafe {
        core::arch::asm!(
            "wdr",
            "ldi {tmp}, 0x18", // WDCE=1, WDE=1
            "sts {WDTCSR}, {tmp}",
            "ldi {tmp}, 0x0E", // WDE=1, WDP2=1, WDP1=1, WDP0=0
            "sts {WDTCSR}, {tmp}",
            tmp = out(reg_upper) _,
            WDTCSR = const 0x60,
            options(nostack, preserves_flags)
        );
    }
}

#[inline(always)]
pub fn wdt_poke(_wp: &mcu::WDT) {
    avr_device::asm::wdr();
}

/// Cheaper Option::unwrap() alternative.
///
/// This is cheaper, because it doesn't call into the panic unwind path.
/// Therefore, it does not impose caller-saves overhead onto the calling function.
#[inline(always)]
pub fn unwrap_option<T>(value: Option<T>) -> T {
    match value {
        Some(value) => value,
        None => reset_system(),
    }
}

/// Reset the system.
#[inline(always)]
#[allow(clippy::empty_loop)]
pub fn reset_system() -> ! {
    loop {
        // Wait for the watchdog timer to trigger and reset the system.
        // We don't need to disable interrupts here.
        // No interrupt will reset the watchdog timer.
    }
}

#[inline(always)]
#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    reset_system();
}

// vim: ts=4 sw=4 expandtab
