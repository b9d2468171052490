//! `log` backend writing to the mGBA debug console.
//!
//! Real hardware has nothing at these addresses; [`init`] detects that and
//! leaves logging off.

use core::fmt::{self, Write};
use core::ptr::{read_volatile, write_volatile};

use log::{LevelFilter, Log, Metadata, Record};

const MGBA_ENABLE: usize = 0x04FF_F780;
const MGBA_FLAGS: usize = 0x04FF_F700;
const MGBA_BUFFER: usize = 0x04FF_F600;
const MGBA_BUFFER_LEN: usize = 256;

const MGBA_ENABLE_REQUEST: u16 = 0xC0DE;
const MGBA_ENABLE_ACK: u16 = 0x1DEA;
/// Flag bit that makes mGBA emit the buffer.
const MGBA_SEND: u16 = 0x100;

struct MgbaLogger;

static LOGGER: MgbaLogger = MgbaLogger;

/// Install the logger if running under mGBA. Returns whether it did.
pub fn init(level: LevelFilter) -> bool {
    unsafe {
        write_volatile(MGBA_ENABLE as *mut u16, MGBA_ENABLE_REQUEST);
        if read_volatile(MGBA_ENABLE as *const u16) != MGBA_ENABLE_ACK {
            return false;
        }
        if log::set_logger_racy(&LOGGER).is_err() {
            return false;
        }
        log::set_max_level_racy(level);
    }
    true
}

/// Writes into the mGBA message buffer, dropping anything past its end.
struct MessageBuffer {
    len: usize,
}

impl Write for MessageBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            // Keep the last byte for the terminator.
            if self.len == MGBA_BUFFER_LEN - 1 {
                break;
            }
            unsafe { write_volatile((MGBA_BUFFER + self.len) as *mut u8, byte) };
            self.len += 1;
        }
        Ok(())
    }
}

fn mgba_level(level: log::Level) -> u16 {
    match level {
        log::Level::Error => 1,
        log::Level::Warn => 2,
        log::Level::Info => 3,
        log::Level::Debug | log::Level::Trace => 4,
    }
}

impl Log for MgbaLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut buffer = MessageBuffer { len: 0 };
        let _ = write!(buffer, "[{}] {}", record.target(), record.args());
        unsafe {
            write_volatile((MGBA_BUFFER + buffer.len) as *mut u8, 0);
            write_volatile(MGBA_FLAGS as *mut u16, mgba_level(record.level()) | MGBA_SEND);
        }
    }

    fn flush(&self) {}
}
