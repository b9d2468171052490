//! Hardware layer for the Game Boy Advance: register map, keypad sampling
//! and the interrupt handler table.
//!
//! This crate is `no_std` so it links into the ROM image, while the same
//! logic runs on the host against [`sim::SimBus`] for tests and the CLI.

#![cfg_attr(not(test), no_std)]

pub mod irq;
pub mod keypad;
pub mod regs;
pub mod sim;
pub mod sync;

pub use irq::{Handler, InterruptController, InterruptTable, IrqError, IrqMask};
pub use keypad::{KeyCondition, Keypad, Keys};
pub use regs::{Mmio, Register, RegisterBus};
