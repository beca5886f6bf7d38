//! Simple logging module.
//!
//! Diagnostics go to stderr so they never mix with guest output on stdout.
//! The process-wide level is set once at startup, usually from the
//! `OWL_LOG` environment variable via [`init_from_env`].

use std::sync::atomic::{AtomicU8, Ordering};

/// Log level for filtering messages.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

/// Initialize the logger with the given level.
pub fn init(level: Level) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Initialize the logger from the `OWL_LOG` environment variable.
///
/// Accepts `info`, `warn`, or `error`; anything else (or an unset variable)
/// leaves the default in place.
pub fn init_from_env() {
    match std::env::var("OWL_LOG").as_deref() {
        Ok("info") => init(Level::Info),
        Ok("warn") => init(Level::Warn),
        Ok("error") => init(Level::Error),
        _ => {}
    }
}

/// Returns true if the given level should be logged.
#[inline]
fn enabled(level: Level) -> bool {
    level as u8 >= LOG_LEVEL.load(Ordering::Relaxed)
}

fn log(level: Level, message: &str) {
    if enabled(level) {
        eprintln!("[{:5}] {}", level.tag(), message);
    }
}

/// Logs an info-level message.
pub fn info(message: &str) {
    log(Level::Info, message);
}

/// Logs a warning-level message.
pub fn warn(message: &str) {
    log(Level::Warn, message);
}

/// Logs an error-level message.
pub fn error(message: &str) {
    log(Level::Error, message);
}
