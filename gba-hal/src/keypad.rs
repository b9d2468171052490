//! Keypad sampling with press/release edges and auto-repeat.
//!
//! The keypad register is active-low: a 0 bit means the button is down.
//! [`Keypad::scan`] inverts each sample once, so every view it hands out
//! uses pressed = 1. Call it exactly once per frame; the edge and repeat
//! timing is counted in calls, not in wall time.

use bitflags::bitflags;

use crate::regs::{Register, RegisterBus};

/// Number of physical buttons.
pub const KEY_COUNT: usize = 10;

/// Ticks before a held button starts repeating.
pub const DEFAULT_REPEAT_DELAY: u16 = 60;
/// Ticks between repeats once repeating.
pub const DEFAULT_REPEAT_PERIOD: u16 = 30;

/// KEYCNT bit that raises IRQ_KEYPAD when the condition matches.
const KEYCNT_IRQ_ENABLE: u16 = 1 << 14;
/// KEYCNT bit selecting AND mode (all selected keys) over OR mode.
const KEYCNT_AND: u16 = 1 << 15;

bitflags! {
    /// Button bits, pressed = 1.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Keys: u16 {
        const A = 1 << 0;
        const B = 1 << 1;
        const SELECT = 1 << 2;
        const START = 1 << 3;
        const RIGHT = 1 << 4;
        const LEFT = 1 << 5;
        const UP = 1 << 6;
        const DOWN = 1 << 7;
        const R = 1 << 8;
        const L = 1 << 9;
    }
}

impl Keys {
    /// All four directions.
    pub const DPAD: Keys = Keys::UP
        .union(Keys::DOWN)
        .union(Keys::LEFT)
        .union(Keys::RIGHT);

    /// Decode a raw, active-low `KEYINPUT` value. Bits above the ten
    /// buttons are dropped.
    pub const fn from_raw(raw: u16) -> Keys {
        Keys::from_bits_truncate(!raw)
    }

    /// The raw `KEYINPUT` value the hardware would report with exactly
    /// these buttons down.
    pub const fn to_raw(self) -> u16 {
        !self.bits() & Keys::all().bits()
    }
}

/// Per-button repeat countdowns.
///
/// A countdown is armed with `delay` on the tick a button goes down, or on
/// the first tick it is seen held without one (repeat switched on mid-hold).
/// It is decremented on every later tick the button stays down. When it
/// reaches zero the button fires for that tick and the countdown reloads
/// with `period`. `period == 0` parks the button after the first fire, so it
/// fires once per press.
#[derive(Debug, Clone)]
struct RepeatState {
    delay: u16,
    period: u16,
    countdown: [Option<u16>; KEY_COUNT],
    parked: Keys,
    fired: Keys,
}

impl RepeatState {
    const fn new(delay: u16, period: u16) -> Self {
        Self {
            delay,
            period,
            countdown: [None; KEY_COUNT],
            parked: Keys::empty(),
            fired: Keys::empty(),
        }
    }

    fn configure(&mut self, delay: u16, period: u16) {
        self.delay = delay;
        self.period = period;
        if delay == 0 {
            self.countdown = [None; KEY_COUNT];
            self.parked = Keys::empty();
            self.fired = Keys::empty();
        }
    }

    fn step(&mut self, pressed: Keys, held: Keys) {
        self.fired = Keys::empty();
        if self.delay == 0 {
            return;
        }

        for (bit, countdown) in self.countdown.iter_mut().enumerate() {
            let key = Keys::from_bits_retain(1 << bit);

            if pressed.contains(key) {
                *countdown = Some(self.delay);
                self.parked.remove(key);
            } else if held.contains(key) {
                if self.parked.contains(key) {
                    continue;
                }
                let Some(remaining) = *countdown else {
                    *countdown = Some(self.delay);
                    continue;
                };
                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    self.fired |= key;
                    if self.period == 0 {
                        *countdown = None;
                        self.parked |= key;
                    } else {
                        *countdown = Some(self.period);
                    }
                } else {
                    *countdown = Some(remaining);
                }
            } else {
                *countdown = None;
                self.parked.remove(key);
            }
        }
    }
}

/// Two consecutive keypad snapshots plus the repeat state derived from them.
///
/// Before the first scan both snapshots are empty, so nothing reads as
/// pressed, held or released.
#[derive(Debug, Clone)]
pub struct Keypad {
    previous: Keys,
    current: Keys,
    repeat: RepeatState,
}

impl Keypad {
    pub const fn new() -> Self {
        Self {
            previous: Keys::empty(),
            current: Keys::empty(),
            repeat: RepeatState::new(DEFAULT_REPEAT_DELAY, DEFAULT_REPEAT_PERIOD),
        }
    }

    /// Sample `KEYINPUT` and advance one tick.
    pub fn scan<B: RegisterBus>(&mut self, bus: &B) {
        self.update(bus.read(Register::KEYINPUT));
    }

    /// Advance one tick with an already-read raw `KEYINPUT` value.
    pub fn update(&mut self, raw: u16) {
        self.previous = self.current;
        self.current = Keys::from_raw(raw);
        self.repeat.step(self.pressed(), self.held());
    }

    /// Buttons that went down this tick.
    pub fn pressed(&self) -> Keys {
        self.current & !self.previous
    }

    /// Buttons that went down this tick, plus held buttons whose repeat
    /// fired this tick.
    pub fn pressed_repeat(&self) -> Keys {
        self.pressed() | (self.held() & self.repeat.fired)
    }

    /// Buttons that came up this tick.
    pub fn released(&self) -> Keys {
        self.previous & !self.current
    }

    /// Buttons down on both this tick and the last.
    pub fn held(&self) -> Keys {
        self.current & self.previous
    }

    /// Buttons down right now, whether or not they just went down.
    pub fn current(&self) -> Keys {
        self.current
    }

    /// Set the repeat timing in ticks. `delay == 0` turns repeat off.
    ///
    /// Buttons already counting down keep their current countdown. Buttons
    /// held without one, e.g. because repeat was off, arm with the new delay
    /// on the next tick.
    pub fn set_repeat(&mut self, delay: u16, period: u16) {
        self.repeat.configure(delay, period);
    }

    pub fn repeat(&self) -> (u16, u16) {
        (self.repeat.delay, self.repeat.period)
    }
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}

/// How the selected keys combine into a keypad interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCondition {
    /// Any selected key is down.
    Any,
    /// Every selected key is down at once.
    All,
}

/// Arm the keypad interrupt for `keys` under `condition`.
///
/// Only writes `KEYCNT`; IRQ_KEYPAD still has to be enabled in `IE`.
pub fn set_key_interrupt<B: RegisterBus>(bus: &B, keys: Keys, condition: KeyCondition) {
    let mut value = keys.bits() | KEYCNT_IRQ_ENABLE;
    if condition == KeyCondition::All {
        value |= KEYCNT_AND;
    }
    log::debug!("KEYCNT <- {:#06x}", value);
    bus.write(Register::KEYCNT, value);
}

pub fn disable_key_interrupt<B: RegisterBus>(bus: &B) {
    bus.write(Register::KEYCNT, 0);
}
