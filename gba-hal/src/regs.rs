//! Memory-mapped register map and the bus the rest of the crate talks through.
//!
//! Everything above this module sees registers as 16-bit cells behind a
//! [`RegisterBus`]. On the console that bus is [`Mmio`]; on the host it is
//! [`crate::sim::SimBus`].

/// Base address of the I/O register block.
pub const REG_BASE: u32 = 0x0400_0000;

/// Where the BIOS loads the IRQ handler address from (32-bit word in IWRAM).
pub const INT_VECTOR: u32 = 0x0300_7FFC;

/// A 16-bit register, identified by its absolute address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register(u32);

impl Register {
    /// Keypad status. Read-only, active-low, bits 0-9 are buttons.
    pub const KEYINPUT: Register = Register::io(0x130);
    /// Keypad interrupt control.
    pub const KEYCNT: Register = Register::io(0x132);
    /// Interrupt enable.
    pub const IE: Register = Register::io(0x200);
    /// Interrupt request flags. Writing a 1 clears that bit.
    pub const IF: Register = Register::io(0x202);
    /// Interrupt master enable, bit 0.
    pub const IME: Register = Register::io(0x208);
    /// BIOS interrupt check flag, polled by `IntrWait` and `VBlankIntrWait`.
    pub const BIOS_IF: Register = Register::at(0x0300_7FF8);

    /// A register at `offset` inside the I/O block.
    pub const fn io(offset: u32) -> Self {
        Register(REG_BASE + offset)
    }

    /// A register at an absolute address.
    pub const fn at(address: u32) -> Self {
        Register(address)
    }

    pub const fn address(self) -> u32 {
        self.0
    }
}

/// Read/write access to 16-bit registers.
///
/// Methods take `&self`: the registers are shared hardware state, and an
/// interrupt handler may touch them while the main loop holds a reference.
pub trait RegisterBus {
    fn read(&self, reg: Register) -> u16;

    fn write(&self, reg: Register, value: u16);

    /// Read-modify-write. Not atomic with respect to interrupts; wrap it in
    /// [`crate::irq::masked`] when a handler may write the same register.
    fn modify(&self, reg: Register, f: impl FnOnce(u16) -> u16) {
        self.write(reg, f(self.read(reg)));
    }
}

/// Volatile access to the real registers.
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// # Safety
    ///
    /// Only valid on the console (or an emulator), where every [`Register`]
    /// address is mapped.
    pub const unsafe fn new() -> Self {
        Mmio { _private: () }
    }
}

impl RegisterBus for Mmio {
    #[inline(always)]
    fn read(&self, reg: Register) -> u16 {
        unsafe { core::ptr::read_volatile(reg.address() as usize as *const u16) }
    }

    #[inline(always)]
    fn write(&self, reg: Register, value: u16) {
        unsafe { core::ptr::write_volatile(reg.address() as usize as *mut u16, value) }
    }
}
