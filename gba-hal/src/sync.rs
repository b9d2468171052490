//! Sharing state between the main loop and interrupt handlers.

use core::cell::RefCell;

use crate::irq;
use crate::regs::RegisterBus;

/// A cell the main loop and IRQ handlers can both reach.
///
/// The main loop borrows it only through [`IrqCell::with`], which clears
/// `IME` for the duration, so no handler can run while that borrow is live.
/// Handlers, which already run with interrupts off, use
/// [`IrqCell::try_with`].
pub struct IrqCell<T> {
    inner: RefCell<T>,
}

// SAFETY: the console has a single core and no threads. The only other
// execution context is the IRQ handler, and every main-loop borrow happens
// with IME cleared. Host builds have threads, so the cell is not `Sync`
// there.
#[cfg(target_os = "none")]
unsafe impl<T: Send> Sync for IrqCell<T> {}

impl<T> IrqCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: RefCell::new(value),
        }
    }

    /// Borrow mutably with interrupts masked.
    ///
    /// Panics if the cell is already borrowed, i.e. when called again from
    /// inside `f`.
    pub fn with<B: RegisterBus, R>(&self, bus: &B, f: impl FnOnce(&mut T) -> R) -> R {
        irq::masked(bus, || f(&mut self.inner.borrow_mut()))
    }

    /// Borrow mutably without touching `IME`, for use from a handler.
    /// Returns `None` if the main loop holds the cell.
    pub fn try_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut value = self.inner.try_borrow_mut().ok()?;
        Some(f(&mut value))
    }
}
