//! Game Boy Advance ROM driving the keypad sampler and interrupt table.
//!
//! This is a minimal but functional cartridge program:
//! - VBLANK interrupt paces the main loop (one keypad scan per frame)
//! - Keypad sampling with auto-repeat, logged to the mGBA console
//! - Keypad interrupt in AND mode soft-resets on A+B+START+SELECT

#![no_std]
#![no_main]

mod bios;
mod debug;
mod rt;

use gba_hal::irq::{InterruptController, IrqError, IrqMask};
use gba_hal::keypad::{self, KeyCondition, Keypad, Keys};
use gba_hal::regs::{Mmio, Register, RegisterBus};
use gba_hal::sync::IrqCell;

/// Frames before a held button repeats, then frames between repeats.
const REPEAT_DELAY: u16 = 20;
const REPEAT_PERIOD: u16 = 6;

/// Display status; bit 3 requests the VBLANK interrupt.
const DISPSTAT: Register = Register::io(0x004);
const DISPSTAT_VBLANK_IRQ: u16 = 1 << 3;

/// Soft-reset combo, the usual one for GBA titles.
const RESET_COMBO: Keys = Keys::A
    .union(Keys::B)
    .union(Keys::START)
    .union(Keys::SELECT);

static INTERRUPTS: InterruptController = InterruptController::new();
static FRAMES: IrqCell<u32> = IrqCell::new(0);

/// Panic handler — log if we can, then sleep forever.
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    log::error!("{}", info);
    loop {
        bios::halt();
    }
}

/// Called from the ARM trampoline in `rt` on every interrupt.
#[no_mangle]
extern "C" fn irq_dispatch() {
    let bus = unsafe { Mmio::new() };
    INTERRUPTS.service(&bus);
}

fn on_vblank() {
    let _ = FRAMES.try_with(|frames| *frames = frames.wrapping_add(1));
}

fn on_keypad() {
    let bus = unsafe { Mmio::new() };
    bus.write(Register::IME, 0);
    bios::soft_reset();
}

fn install_handlers<B: RegisterBus>(bus: &B) -> Result<(), IrqError> {
    INTERRUPTS.set(bus, IrqMask::VBLANK, on_vblank)?;
    INTERRUPTS.set(bus, IrqMask::KEYPAD, on_keypad)?;
    Ok(())
}

/// Main entry point, jumped to from `rt::__crt0`.
#[no_mangle]
pub extern "C" fn main() -> ! {
    let bus = unsafe { Mmio::new() };

    debug::init(log::LevelFilter::Debug);
    log::info!("booting");

    // Table first, then the vector, then the lines.
    INTERRUPTS.init(&bus);
    rt::install_irq_vector();
    if let Err(err) = install_handlers(&bus) {
        log::error!("interrupt setup failed: {}", err);
        loop {
            bios::halt();
        }
    }

    keypad::set_key_interrupt(&bus, RESET_COMBO, KeyCondition::All);
    bus.modify(DISPSTAT, |stat| stat | DISPSTAT_VBLANK_IRQ);
    INTERRUPTS.enable(&bus, IrqMask::VBLANK | IrqMask::KEYPAD);

    let mut keys = Keypad::new();
    keys.set_repeat(REPEAT_DELAY, REPEAT_PERIOD);

    loop {
        bios::vblank_intr_wait();
        keys.scan(&bus);

        let pressed = keys.pressed_repeat();
        let released = keys.released();
        if pressed.is_empty() && released.is_empty() {
            continue;
        }

        let frame = FRAMES.with(&bus, |frames| *frames);
        if !pressed.is_empty() {
            log::info!("frame {}: down {:?}", frame, pressed);
        }
        if !released.is_empty() {
            log::debug!("frame {}: up {:?}", frame, released);
        }
    }
}
