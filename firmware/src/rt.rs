//! Cartridge entry and the IRQ vector trampoline.
//!
//! The BIOS jumps to the start of ROM in ARM state and later calls the IRQ
//! vector in ARM state too, so both live in hand-written ARM assembly and
//! hand off to Thumb Rust code with `bx`. The 192-byte cartridge header is
//! left zeroed; run the ROM through `gbafix` before loading it on hardware.

use core::arch::global_asm;

use gba_hal::regs::INT_VECTOR;

global_asm!(
    r#"
    .section .text.gba_header, "ax", %progbits
    .arm
    .align 2
    .global __start
__start:
    b __crt0
    .space 0xC0 - 4

__crt0:
    @ IRQ mode stack
    mov r0, #0x12
    msr CPSR_c, r0
    ldr sp, =0x03007FA0
    @ System mode stack
    mov r0, #0x1F
    msr CPSR_c, r0
    ldr sp, =0x03007F00

    @ Copy .data from ROM into IWRAM
    ldr r0, =__data_lma
    ldr r1, =__data_start
    ldr r2, =__data_end
1:
    cmp r1, r2
    ldrlo r3, [r0], #4
    strlo r3, [r1], #4
    blo 1b

    @ Zero .bss
    ldr r1, =__bss_start
    ldr r2, =__bss_end
    mov r3, #0
2:
    cmp r1, r2
    strlo r3, [r1], #4
    blo 2b

    ldr r0, =main
    bx r0
    .ltorg

    .section .text.__irq_entry, "ax", %progbits
    .arm
    .align 2
    .global __irq_entry
__irq_entry:
    @ BIOS already saved r0-r3, r12 and lr on the IRQ stack
    push {{r4, lr}}
    ldr r0, =irq_dispatch
    mov lr, pc
    bx r0
    pop {{r4, lr}}
    bx lr
    .ltorg
    .thumb
"#
);

extern "C" {
    fn __irq_entry();
}

/// Point the BIOS IRQ vector at [`__irq_entry`].
pub fn install_irq_vector() {
    unsafe {
        core::ptr::write_volatile(INT_VECTOR as usize as *mut u32, __irq_entry as usize as u32);
    }
}
