//! Interrupt handler table, enable/disable protocol and the dispatch step.
//!
//! The console has a single IRQ vector. Whatever sits behind it reads `IF`,
//! calls the handlers registered for the pending lines, then writes the
//! serviced bits back to `IF` to acknowledge them. [`InterruptController`]
//! implements everything but the vector trampoline itself.

use bitflags::bitflags;
use thiserror::Error;

use crate::regs::{Register, RegisterBus};
use crate::sync::IrqCell;

/// Slots in the handler table.
pub const MAX_HANDLERS: usize = 15;

bitflags! {
    /// Interrupt lines as laid out in `IE` and `IF`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IrqMask: u16 {
        const VBLANK = 1 << 0;
        const HBLANK = 1 << 1;
        const VCOUNT = 1 << 2;
        const TIMER0 = 1 << 3;
        const TIMER1 = 1 << 4;
        const TIMER2 = 1 << 5;
        const TIMER3 = 1 << 6;
        const SERIAL = 1 << 7;
        const DMA0 = 1 << 8;
        const DMA1 = 1 << 9;
        const DMA2 = 1 << 10;
        const DMA3 = 1 << 11;
        const KEYPAD = 1 << 12;
        const GAMEPAK = 1 << 13;
    }
}

/// An interrupt handler. Runs in IRQ mode with interrupts off.
pub type Handler = fn();

/// The handler every empty slot holds.
pub fn noop() {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IrqError {
    #[error("interrupt table is full, no slot left for {mask:?}")]
    TableFull { mask: IrqMask },
    #[error("cannot install a handler for an empty mask")]
    EmptyMask,
    #[error("{mask:?} overlaps the entry installed for {existing:?}")]
    Overlap { mask: IrqMask, existing: IrqMask },
}

#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub mask: IrqMask,
    pub handler: Handler,
}

impl Entry {
    const EMPTY: Entry = Entry {
        mask: IrqMask::empty(),
        handler: noop,
    };

    fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }
}

/// Fixed table of `(mask, handler)` pairs.
///
/// No interrupt line appears in more than one entry, so each pending line
/// reaches at most one handler.
#[derive(Debug, Clone, Copy)]
pub struct InterruptTable {
    entries: [Entry; MAX_HANDLERS],
}

impl InterruptTable {
    pub const fn new() -> Self {
        Self {
            entries: [Entry::EMPTY; MAX_HANDLERS],
        }
    }

    /// Put every slot back to the empty mask and [`noop`].
    pub fn reset(&mut self) {
        self.entries = [Entry::EMPTY; MAX_HANDLERS];
    }

    /// Install `handler` for `mask`, returning the handler it replaces.
    ///
    /// An entry with exactly this mask has its handler swapped; otherwise
    /// the first empty slot is taken and [`noop`] is returned.
    ///
    /// Bits 14-15 have no interrupt line behind them. Masks using them are
    /// stored and occupy a slot, but `IE` and `IF` never carry those bits, so
    /// their handlers never run. They only serve to pad the table.
    pub fn set(&mut self, mask: IrqMask, handler: Handler) -> Result<Handler, IrqError> {
        if mask.is_empty() {
            return Err(IrqError::EmptyMask);
        }

        if let Some(entry) = self.entries.iter_mut().find(|e| e.mask == mask) {
            return Ok(core::mem::replace(&mut entry.handler, handler));
        }

        if let Some(existing) = self.entries.iter().find(|e| e.mask.intersects(mask)) {
            return Err(IrqError::Overlap {
                mask,
                existing: existing.mask,
            });
        }

        let slot = self
            .entries
            .iter_mut()
            .find(|e| e.is_empty())
            .ok_or(IrqError::TableFull { mask })?;
        *slot = Entry { mask, handler };
        Ok(noop)
    }

    /// The handler installed for exactly `mask`, or [`noop`].
    pub fn lookup(&self, mask: IrqMask) -> Handler {
        self.entries
            .iter()
            .find(|e| !e.is_empty() && e.mask == mask)
            .map_or(noop as Handler, |e| e.handler)
    }

    /// Occupied entries in table order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| !e.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call, in table order, every handler whose mask intersects `pending`.
    /// Returns the pending bits some handler covered.
    pub fn dispatch(&self, pending: IrqMask) -> IrqMask {
        let mut handled = IrqMask::empty();
        for entry in self.entries() {
            if entry.mask.intersects(pending) {
                (entry.handler)();
                handled |= entry.mask & pending;
            }
        }
        handled
    }
}

impl Default for InterruptTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `f` with `IME` cleared, restoring the previous `IME` afterwards.
pub fn masked<B: RegisterBus, R>(bus: &B, f: impl FnOnce() -> R) -> R {
    let ime = bus.read(Register::IME);
    bus.write(Register::IME, 0);
    let result = f();
    bus.write(Register::IME, ime);
    result
}

/// Set `mask` in `IE` and turn on `IME`.
///
/// Enabling any line arms the whole interrupt system; without `IME` no
/// line fires.
pub fn enable<B: RegisterBus>(bus: &B, mask: IrqMask) {
    masked(bus, || bus.modify(Register::IE, |ie| ie | mask.bits()));
    bus.write(Register::IME, 1);
    log::trace!("IE |= {:?}, IME = 1", mask);
}

/// Clear `mask` in `IE`. `IME` is left as it is.
pub fn disable<B: RegisterBus>(bus: &B, mask: IrqMask) {
    masked(bus, || bus.modify(Register::IE, |ie| ie & !mask.bits()));
    log::trace!("IE &= !{:?}", mask);
}

/// Lines pending in `IF` that are also enabled in `IE`. Bits without an
/// interrupt line are dropped.
pub fn pending<B: RegisterBus>(bus: &B) -> IrqMask {
    IrqMask::from_bits_truncate(bus.read(Register::IF) & bus.read(Register::IE))
}

/// The interrupt table plus the register protocol around it.
///
/// Methods take `&self` so one controller can live in a `static` shared by
/// the main loop and the IRQ vector. Every table mutation runs with `IME`
/// cleared.
pub struct InterruptController {
    table: IrqCell<InterruptTable>,
}

impl InterruptController {
    pub const fn new() -> Self {
        Self {
            table: IrqCell::new(InterruptTable::new()),
        }
    }

    /// Empty the table. Call before enabling any line.
    pub fn init<B: RegisterBus>(&self, bus: &B) {
        self.table.with(bus, InterruptTable::reset);
        log::debug!("interrupt table cleared");
    }

    /// Install `handler` for `mask`; see [`InterruptTable::set`].
    pub fn set<B: RegisterBus>(
        &self,
        bus: &B,
        mask: IrqMask,
        handler: Handler,
    ) -> Result<Handler, IrqError> {
        let result = self.table.with(bus, |table| table.set(mask, handler));
        match &result {
            Ok(_) => log::debug!("handler installed for {:?}", mask),
            Err(err) => log::warn!("{}", err),
        }
        result
    }

    pub fn handler<B: RegisterBus>(&self, bus: &B, mask: IrqMask) -> Handler {
        self.table.with(bus, |table| table.lookup(mask))
    }

    /// Copy of the current table.
    pub fn table<B: RegisterBus>(&self, bus: &B) -> InterruptTable {
        self.table.with(bus, |table| *table)
    }

    pub fn enable<B: RegisterBus>(&self, bus: &B, mask: IrqMask) {
        enable(bus, mask);
    }

    pub fn disable<B: RegisterBus>(&self, bus: &B, mask: IrqMask) {
        disable(bus, mask);
    }

    /// Service every enabled, pending line. Called from the IRQ vector.
    ///
    /// All pending-and-enabled bits are acknowledged in `IF`, whether or not
    /// a handler covers them, and are also OR-ed into the BIOS check flag
    /// so `IntrWait` returns. Handlers run against a copy of the table and
    /// may install other handlers. Returns the acknowledged bits.
    pub fn service<B: RegisterBus>(&self, bus: &B) -> IrqMask {
        let pending = pending(bus);
        if pending.is_empty() {
            return pending;
        }

        // Only fails if the vector fired inside a masked region; leave the
        // lines pending so they fire again once IME is restored.
        let Some(table) = self.table.try_with(|table| *table) else {
            return IrqMask::empty();
        };

        table.dispatch(pending);
        bus.write(Register::IF, pending.bits());
        bus.modify(Register::BIOS_IF, |flags| flags | pending.bits());
        pending
    }
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBus;
    use std::cell::RefCell;

    std::thread_local! {
        static CALLS: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
    }

    fn record(name: &'static str) {
        CALLS.with(|calls| calls.borrow_mut().push(name));
    }

    fn take_calls() -> Vec<&'static str> {
        CALLS.with(|calls| calls.borrow_mut().drain(..).collect())
    }

    fn on_vblank() {
        record("vblank");
    }

    fn on_vblank_alt() {
        record("vblank-alt");
    }

    fn on_timer() {
        record("timer");
    }

    fn on_serial() {
        record("serial");
    }

    fn same(a: Handler, b: Handler) -> bool {
        a as usize == b as usize
    }

    #[test]
    fn test_init_leaves_only_noop() {
        let bus = SimBus::new();
        let irq = InterruptController::new();
        irq.set(&bus, IrqMask::VBLANK, on_vblank).unwrap();

        irq.init(&bus);
        irq.init(&bus);
        assert!(irq.table(&bus).is_empty());
        for bit in 0..14 {
            let mask = IrqMask::from_bits_retain(1 << bit);
            assert!(same(irq.handler(&bus, mask), noop));
        }
    }

    #[test]
    fn test_set_replaces_and_returns_previous() {
        let bus = SimBus::new();
        let irq = InterruptController::new();
        irq.init(&bus);

        let first = irq.set(&bus, IrqMask::VBLANK, on_vblank).unwrap();
        assert!(same(first, noop));

        let second = irq.set(&bus, IrqMask::VBLANK, on_vblank_alt).unwrap();
        assert!(same(second, on_vblank));

        let table = irq.table(&bus);
        assert_eq!(table.len(), 1);
        assert!(same(table.lookup(IrqMask::VBLANK), on_vblank_alt));
    }

    #[test]
    fn test_table_full() {
        let mut table = InterruptTable::new();
        // Fifteen disjoint single-bit masks fill every slot.
        for bit in 0..MAX_HANDLERS {
            table.set(IrqMask::from_bits_retain(1 << bit), on_timer).unwrap();
        }
        let extra = IrqMask::from_bits_retain(1 << 15);
        assert_eq!(
            table.set(extra, on_serial).unwrap_err(),
            IrqError::TableFull { mask: extra }
        );
        assert_eq!(table.len(), MAX_HANDLERS);
        assert!(same(table.lookup(IrqMask::VBLANK), on_timer));

        // Replacing an existing mask still works on a full table.
        assert!(same(table.set(IrqMask::VBLANK, on_vblank).unwrap(), on_timer));
    }

    #[test]
    fn test_rejects_empty_and_overlapping_masks() {
        let mut table = InterruptTable::new();
        assert_eq!(
            table.set(IrqMask::empty(), on_vblank).unwrap_err(),
            IrqError::EmptyMask
        );

        table.set(IrqMask::TIMER0 | IrqMask::TIMER1, on_timer).unwrap();
        assert_eq!(
            table.set(IrqMask::TIMER1, on_serial).unwrap_err(),
            IrqError::Overlap {
                mask: IrqMask::TIMER1,
                existing: IrqMask::TIMER0 | IrqMask::TIMER1,
            }
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_masked_restores_ime() {
        let bus = SimBus::new();
        bus.write(Register::IME, 1);

        let inside = masked(&bus, || bus.read(Register::IME));
        assert_eq!(inside, 0);
        assert_eq!(bus.read(Register::IME), 1);

        bus.write(Register::IME, 0);
        masked(&bus, || ());
        assert_eq!(bus.read(Register::IME), 0);
    }

    #[test]
    fn test_enable_arms_ime_and_disable_does_not_touch_it() {
        let bus = SimBus::new();
        let irq = InterruptController::new();
        irq.init(&bus);

        irq.enable(&bus, IrqMask::VBLANK | IrqMask::TIMER0);
        assert_eq!(bus.read(Register::IE), 0x0009);
        assert_eq!(bus.read(Register::IME), 1);

        irq.disable(&bus, IrqMask::VBLANK);
        assert_eq!(bus.read(Register::IE), 0x0008);
        assert_eq!(bus.read(Register::IME), 1);

        bus.write(Register::IME, 0);
        irq.disable(&bus, IrqMask::TIMER0);
        assert_eq!(bus.read(Register::IE), 0);
        assert_eq!(bus.read(Register::IME), 0);
        assert!(irq.table(&bus).is_empty());
    }

    #[test]
    fn test_service_dispatches_in_table_order_and_acknowledges() {
        take_calls();
        let bus = SimBus::new();
        let irq = InterruptController::new();
        irq.init(&bus);
        irq.set(&bus, IrqMask::SERIAL, on_serial).unwrap();
        irq.set(&bus, IrqMask::VBLANK, on_vblank).unwrap();
        irq.set(&bus, IrqMask::TIMER0 | IrqMask::TIMER1, on_timer).unwrap();
        irq.enable(&bus, IrqMask::SERIAL | IrqMask::VBLANK | IrqMask::TIMER1);

        bus.raise(IrqMask::VBLANK | IrqMask::SERIAL | IrqMask::TIMER0 | IrqMask::TIMER1);
        let acked = irq.service(&bus);

        assert_eq!(take_calls(), vec!["serial", "vblank", "timer"]);
        assert_eq!(acked, IrqMask::VBLANK | IrqMask::SERIAL | IrqMask::TIMER1);
        // TIMER0 is not enabled, so it stays pending.
        assert_eq!(bus.read(Register::IF), IrqMask::TIMER0.bits());
        assert_eq!(bus.read(Register::BIOS_IF), acked.bits());
    }

    #[test]
    fn test_service_acknowledges_lines_without_handler() {
        take_calls();
        let bus = SimBus::new();
        let irq = InterruptController::new();
        irq.init(&bus);
        irq.enable(&bus, IrqMask::HBLANK);

        bus.raise(IrqMask::HBLANK);
        assert_eq!(irq.service(&bus), IrqMask::HBLANK);
        assert!(take_calls().is_empty());
        assert_eq!(bus.read(Register::IF), 0);
    }

    #[test]
    fn test_service_with_nothing_pending() {
        let bus = SimBus::new();
        let irq = InterruptController::new();
        irq.init(&bus);
        irq.enable(&bus, IrqMask::VBLANK);
        bus.write(Register::BIOS_IF, 0);

        assert!(irq.service(&bus).is_empty());
        assert_eq!(bus.read(Register::BIOS_IF), 0);
    }

    #[test]
    fn test_spare_bits_take_a_slot_but_never_fire() {
        take_calls();
        let bus = SimBus::new();
        let irq = InterruptController::new();
        irq.init(&bus);
        let spare = IrqMask::from_bits_retain(1 << 14);
        irq.set(&bus, spare, on_serial).unwrap();
        assert_eq!(irq.table(&bus).len(), 1);

        irq.enable(&bus, spare);
        assert_eq!(bus.read(Register::IE), 0);
        bus.raise(spare);
        assert!(irq.service(&bus).is_empty());
        assert!(take_calls().is_empty());
    }

    std::thread_local! {
        static CHAINED: InterruptController = const { InterruptController::new() };
        static CHAINED_BUS: SimBus = SimBus::new();
    }

    /// Installs a TIMER3 handler from inside dispatch.
    fn on_vblank_installs_timer() {
        record("install");
        CHAINED.with(|irq| {
            CHAINED_BUS.with(|bus| {
                assert!(same(irq.set(bus, IrqMask::TIMER3, on_timer).unwrap(), noop));
            })
        });
    }

    #[test]
    fn test_handler_can_install_handler() {
        take_calls();
        CHAINED.with(|irq| {
            CHAINED_BUS.with(|bus| {
                irq.init(bus);
                irq.set(bus, IrqMask::VBLANK, on_vblank_installs_timer).unwrap();
                irq.enable(bus, IrqMask::VBLANK | IrqMask::TIMER3);

                bus.raise(IrqMask::VBLANK);
                assert_eq!(irq.service(bus), IrqMask::VBLANK);
                assert_eq!(take_calls(), vec!["install"]);
                assert!(same(irq.handler(bus, IrqMask::TIMER3), on_timer));
                assert_eq!(bus.read(Register::IME), 1);

                bus.raise(IrqMask::TIMER3);
                assert_eq!(irq.service(bus), IrqMask::TIMER3);
                assert_eq!(take_calls(), vec!["timer"]);
            })
        });
    }

    #[test]
    fn test_dispatch_calls_each_handler_once() {
        take_calls();
        let mut table = InterruptTable::new();
        table.set(IrqMask::TIMER0 | IrqMask::TIMER1, on_timer).unwrap();

        let handled = table.dispatch(IrqMask::TIMER0 | IrqMask::TIMER1 | IrqMask::DMA0);
        assert_eq!(take_calls(), vec!["timer"]);
        assert_eq!(handled, IrqMask::TIMER0 | IrqMask::TIMER1);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            IrqError::EmptyMask.to_string(),
            "cannot install a handler for an empty mask"
        );
        assert!(IrqError::TableFull { mask: IrqMask::VBLANK }
            .to_string()
            .starts_with("interrupt table is full"));
    }
}
