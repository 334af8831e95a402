//! Browser console logger
//!
//! Routes the `log` macros to `console.log`/`console.warn`/`console.error`
//! with a `[module]` prefix, e.g. `[scheduler] dispatched #3 to CPU 1`.

use log::{Level, LevelFilter, Log, Metadata, Record};
use wasm_bindgen::JsValue;
use web_sys::console;

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let module = record.target().rsplit("::").next().unwrap_or("deferlab");
        let line = JsValue::from_str(&format!("[{}] {}", module, record.args()));
        match record.level() {
            Level::Error => console::error_1(&line),
            Level::Warn => console::warn_1(&line),
            _ => console::log_1(&line),
        }
    }

    fn flush(&self) {}
}

/// Install the console logger. Later calls only change the level.
pub fn init(level: LevelFilter) {
    // A second set_logger fails; the installed logger is the same one
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}
