//! Interrupt dispatch against the simulated bus.

use std::cell::RefCell;

use anyhow::{Context, Result};
use gba_hal::irq::{noop, Handler, IrqError, IrqMask};
use gba_hal::sim::SimBus;
use gba_hal::{InterruptController, Register, RegisterBus};

thread_local! {
    static FIRED: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
}

/// One recording handler per interrupt line, indexed by bit number.
macro_rules! line_handlers {
    ($($name:ident),* $(,)?) => {
        const HANDLERS: &[(&str, Handler)] = &[
            $((stringify!($name), {
                fn handler() {
                    FIRED.with(|fired| fired.borrow_mut().push(stringify!($name)));
                }
                handler
            }),)*
        ];
    };
}

line_handlers!(
    VBLANK, HBLANK, VCOUNT, TIMER0, TIMER1, TIMER2, TIMER3, SERIAL, DMA0, DMA1, DMA2, DMA3,
    KEYPAD, GAMEPAK,
);

/// Parse interrupt line names (case-insensitive) into a mask.
pub fn parse_lines(names: &[String]) -> Result<IrqMask> {
    names.iter().try_fold(IrqMask::empty(), |mask, name| {
        let line = IrqMask::from_name(&name.to_ascii_uppercase())
            .with_context(|| format!("unknown interrupt line '{}'", name))?;
        Ok(mask | line)
    })
}

fn handler_for(line: IrqMask) -> Handler {
    let bit = line.bits().trailing_zeros() as usize;
    HANDLERS[bit].1
}

/// Outcome of one simulated interrupt.
#[derive(Debug, PartialEq, Eq)]
pub struct Report {
    pub fired: Vec<&'static str>,
    pub acknowledged: IrqMask,
    pub still_pending: IrqMask,
    /// Error from the extra install attempted once the table was filled.
    pub fill_error: Option<IrqError>,
}

/// Install one single-bit entry per free bit until the table runs out of
/// slots, then return the error from the first install it rejects.
///
/// Lines come first, then the spare bits 14-15, which only pad the table.
fn fill_table(bus: &SimBus, irq: &InterruptController) -> Option<IrqError> {
    for bit in 0..u16::BITS as usize {
        let mask = IrqMask::from_bits_retain(1 << bit);
        if irq.table(bus).entries().any(|e| e.mask.intersects(mask)) {
            continue;
        }
        let handler = HANDLERS.get(bit).map_or(noop as Handler, |(_, h)| *h);
        if let Err(err) = irq.set(bus, mask, handler) {
            return Some(err);
        }
    }
    None
}

/// Install a recording handler for each line in `install`, enable `enable`,
/// raise `raise`, then run one dispatch. With `fill`, the remaining slots
/// are taken before anything is raised.
pub fn simulate(install: IrqMask, enable: IrqMask, raise: IrqMask, fill: bool) -> Result<Report> {
    let bus = SimBus::new();
    let irq = InterruptController::new();
    irq.init(&bus);

    for line in install.iter() {
        irq.set(&bus, line, handler_for(line))
            .with_context(|| format!("installing handler for {:?}", line))?;
    }
    let fill_error = if fill { fill_table(&bus, &irq) } else { None };
    irq.enable(&bus, enable);

    FIRED.with(|fired| fired.borrow_mut().clear());
    bus.raise(raise);
    let acknowledged = irq.service(&bus);

    Ok(Report {
        fired: FIRED.with(|fired| fired.borrow_mut().drain(..).collect()),
        acknowledged,
        still_pending: IrqMask::from_bits_truncate(bus.read(Register::IF)),
        fill_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_table_matches_bits() {
        for (bit, (name, _)) in HANDLERS.iter().enumerate() {
            assert_eq!(IrqMask::from_name(name).unwrap().bits(), 1 << bit);
        }
    }

    #[test]
    fn test_parse_lines() {
        let names = vec!["vblank".to_string(), "Timer2".to_string()];
        assert_eq!(parse_lines(&names).unwrap(), IrqMask::VBLANK | IrqMask::TIMER2);
        assert!(parse_lines(&["vsync".to_string()]).is_err());
    }

    #[test]
    fn test_simulate() {
        let report = simulate(
            IrqMask::VBLANK | IrqMask::TIMER0,
            IrqMask::VBLANK | IrqMask::HBLANK,
            IrqMask::VBLANK | IrqMask::HBLANK | IrqMask::TIMER0,
            false,
        )
        .unwrap();

        assert_eq!(report.fired, vec!["VBLANK"]);
        assert_eq!(report.acknowledged, IrqMask::VBLANK | IrqMask::HBLANK);
        assert_eq!(report.still_pending, IrqMask::TIMER0);
        assert_eq!(report.fill_error, None);
    }

    #[test]
    fn test_simulate_full_table() {
        let report = simulate(
            IrqMask::VBLANK | IrqMask::KEYPAD,
            IrqMask::VBLANK | IrqMask::TIMER1,
            IrqMask::VBLANK | IrqMask::TIMER1,
            true,
        )
        .unwrap();

        // 14 lines plus bit 14 take all 15 slots, so bit 15 has nowhere to go.
        assert_eq!(
            report.fill_error,
            Some(IrqError::TableFull {
                mask: IrqMask::from_bits_retain(1 << 15)
            })
        );
        assert_eq!(report.fired, vec!["VBLANK", "TIMER1"]);
        assert_eq!(report.acknowledged, IrqMask::VBLANK | IrqMask::TIMER1);
        assert_eq!(report.still_pending, IrqMask::empty());
    }
}
