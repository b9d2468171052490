//! In-memory register bus for running the HAL off the console.
//!
//! Models the register behaviour the keypad and interrupt code relies on:
//! `KEYINPUT` ignores writes, `IF` is write-1-to-clear, `IME` keeps only
//! bit 0. Unmapped registers read as zero.

use core::cell::Cell;

use crate::irq::IrqMask;
use crate::keypad::Keys;
use crate::regs::{Register, RegisterBus};

pub struct SimBus {
    keyinput: Cell<u16>,
    keycnt: Cell<u16>,
    ie: Cell<u16>,
    iflags: Cell<u16>,
    ime: Cell<u16>,
    bios_if: Cell<u16>,
}

impl SimBus {
    /// A bus with no buttons down and every interrupt off.
    pub fn new() -> Self {
        Self {
            keyinput: Cell::new(Keys::empty().to_raw()),
            keycnt: Cell::new(0),
            ie: Cell::new(0),
            iflags: Cell::new(0),
            ime: Cell::new(0),
            bios_if: Cell::new(0),
        }
    }

    /// Drive `KEYINPUT` directly with a raw, active-low value.
    pub fn set_keyinput(&self, raw: u16) {
        self.keyinput.set(raw);
    }

    pub fn press(&self, keys: Keys) {
        self.keyinput.set(self.keyinput.get() & !keys.bits());
    }

    pub fn release(&self, keys: Keys) {
        self.keyinput.set(self.keyinput.get() | keys.bits());
    }

    /// Raise interrupt request lines, as the hardware would.
    pub fn raise(&self, mask: IrqMask) {
        self.iflags.set(self.iflags.get() | mask.bits());
    }

    fn cell(&self, reg: Register) -> Option<&Cell<u16>> {
        match reg {
            Register::KEYINPUT => Some(&self.keyinput),
            Register::KEYCNT => Some(&self.keycnt),
            Register::IE => Some(&self.ie),
            Register::IF => Some(&self.iflags),
            Register::IME => Some(&self.ime),
            Register::BIOS_IF => Some(&self.bios_if),
            _ => None,
        }
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBus for SimBus {
    fn read(&self, reg: Register) -> u16 {
        self.cell(reg).map_or(0, Cell::get)
    }

    fn write(&self, reg: Register, value: u16) {
        match reg {
            Register::KEYINPUT => {}
            Register::IF => self.iflags.set(self.iflags.get() & !value),
            Register::IME => self.ime.set(value & 1),
            Register::IE => self.ie.set(value & IrqMask::all().bits()),
            _ => match self.cell(reg) {
                Some(cell) => cell.set(value),
                None => log::trace!("write {:#06x} to unmapped {:#010x}", value, reg.address()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyinput_is_read_only() {
        let bus = SimBus::new();
        bus.write(Register::KEYINPUT, 0);
        assert_eq!(bus.read(Register::KEYINPUT), 0x03FF);

        bus.press(Keys::A | Keys::UP);
        assert_eq!(bus.read(Register::KEYINPUT), 0x03BE);
        bus.release(Keys::A);
        assert_eq!(bus.read(Register::KEYINPUT), 0x03BF);
    }

    #[test]
    fn test_if_write_one_to_clear() {
        let bus = SimBus::new();
        bus.raise(IrqMask::VBLANK | IrqMask::TIMER2);
        bus.write(Register::IF, IrqMask::VBLANK.bits());
        assert_eq!(bus.read(Register::IF), IrqMask::TIMER2.bits());
        bus.write(Register::IF, 0);
        assert_eq!(bus.read(Register::IF), IrqMask::TIMER2.bits());
    }

    #[test]
    fn test_unmapped_registers() {
        let bus = SimBus::new();
        let dispstat = Register::io(0x004);
        bus.write(dispstat, 0x0008);
        assert_eq!(bus.read(dispstat), 0);
    }
}
