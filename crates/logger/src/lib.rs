//! Hypervisor logging
//!
//! Formats `log` records and forwards them to a platform-provided console. The console is
//! registered once during single-threaded bring-up, before other cores are released.

#![cfg_attr(not(test), no_std)]

use core::fmt;
use core::fmt::Write;
use core::sync::atomic::{AtomicBool, Ordering};

use log::{LevelFilter, Metadata, Record};
use spin::{Mutex, Once};

/// A byte-oriented diagnostic sink, typically a serial port.
///
/// Implementations must tolerate being called from any context, including with interrupts
/// disabled.
pub trait Console: Sync {
    fn write_bytes(&self, bytes: &[u8]);
}

static CONSOLE: Once<&'static dyn Console> = Once::new();
static LOGGER: LockedLogger = LockedLogger(Mutex::new(Logger {}));
static IS_INITIALIZED: AtomicBool = AtomicBool::new(false);

struct LockedLogger(Mutex<Logger>);

struct Logger {}

impl log::Log for LockedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.0.lock().enabled(metadata)
    }

    fn log(&self, record: &Record) {
        self.0.lock().log(record)
    }

    fn flush(&self) {}
}

impl Logger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            if let Some(console) = CONSOLE.get() {
                let mut writer = ConsoleWriter(*console);
                let _ = writer.write_fmt(core::format_args!(
                    "[{} | {}] {}\n",
                    record.level(),
                    record.target(),
                    record.args()
                ));
            }
        }
    }
}

struct ConsoleWriter<'a>(&'a dyn Console);

impl<'a> fmt::Write for ConsoleWriter<'a> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_bytes(s.as_bytes());
        Ok(())
    }
}

/// Registers the console and installs the logger.
pub fn init(level: LevelFilter, console: &'static dyn Console) {
    CONSOLE.call_once(|| console);
    match IS_INITIALIZED.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst) {
        Ok(_) => {
            log::set_logger(&LOGGER).unwrap();
            log::set_max_level(level);
        }
        Err(_) => {
            log::warn!("Logger is already initialized, skipping init");
        }
    };
}

/// Writes raw bytes straight to the console, bypassing the formatting machinery and the logger
/// lock.
///
/// This is the emission path for the fatal halt service: it must stay usable when the stack is
/// suspect, so it takes no lock and builds no format state.
pub fn emit_raw(bytes: &[u8]) {
    if let Some(console) = CONSOLE.get() {
        console.write_bytes(bytes);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;

    struct RecordingConsole {
        buffer: StdMutex<Vec<u8>>,
    }

    impl Console for RecordingConsole {
        fn write_bytes(&self, bytes: &[u8]) {
            self.buffer.lock().unwrap().extend_from_slice(bytes);
        }
    }

    static TEST_CONSOLE: RecordingConsole = RecordingConsole {
        buffer: StdMutex::new(Vec::new()),
    };

    #[test]
    fn raw_emission_reaches_console() {
        init(LevelFilter::Info, &TEST_CONSOLE);
        emit_raw(b"boot failure\n");
        let buffer = TEST_CONSOLE.buffer.lock().unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.contains("boot failure"));
    }
}
