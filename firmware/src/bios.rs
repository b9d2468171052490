//! BIOS system calls used by the main loop.

use core::arch::asm;

/// Sleep until any enabled interrupt is requested.
#[inline(always)]
pub fn halt() {
    unsafe {
        asm!(
            "swi 0x02",
            out("r0") _, out("r1") _, out("r2") _, out("r3") _,
            options(nostack),
        );
    }
}

/// Sleep until the next vertical blank has been serviced.
///
/// Returns only once the IRQ handler has OR-ed VBLANK into the BIOS check
/// flag, which [`gba_hal::InterruptController::service`] does.
#[inline(always)]
pub fn vblank_intr_wait() {
    unsafe {
        asm!(
            "swi 0x05",
            out("r0") _, out("r1") _, out("r2") _, out("r3") _,
            options(nostack),
        );
    }
}

/// Restart the cartridge from its entry point. Mask interrupts first.
pub fn soft_reset() -> ! {
    unsafe { asm!("swi 0x00", options(noreturn)) }
}
