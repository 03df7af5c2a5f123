//! Leveled, subsystem-tagged logging
//!
//! Every record names the calling task and a subsystem:
//! `[pid=X][subsys][LEVEL] message`. A global severity filter drops
//! records before any formatting work happens.

use crate::task;
use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

/// Record severity, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Failures that threaten system stability
    Error,
    /// Unexpected conditions worth surfacing
    Warn,
    /// Notable events in normal operation
    Info,
    /// Detail useful while diagnosing a subsystem
    Debug,
    /// Step-by-step protocol tracing
    Trace,
}

impl LogLevel {
    const LABELS: [&'static str; 5] = ["ERROR", "WARN", "INFO", "DEBUG", "TRACE"];

    /// The level's tag as it appears in the log line
    pub const fn label(self) -> &'static str {
        Self::LABELS[self as usize]
    }

    fn from_raw(raw: u8) -> LogLevel {
        match raw {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            3 => LogLevel::Debug,
            4 => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Severity cutoff; records numerically above it are dropped
static FILTER: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Change the severity cutoff
pub fn set_log_level(level: LogLevel) {
    FILTER.store(level as u8, Ordering::Relaxed);
}

/// The severity cutoff currently in effect
pub fn get_log_level() -> LogLevel {
    LogLevel::from_raw(FILTER.load(Ordering::Relaxed))
}

/// Whether a record at `level` would currently be emitted
#[inline]
pub fn enabled(level: LogLevel) -> bool {
    level as u8 <= FILTER.load(Ordering::Relaxed)
}

/// Emit one record; use the level macros instead of calling this directly
#[doc(hidden)]
pub fn _log(level: LogLevel, subsys: &str, args: fmt::Arguments) {
    if !enabled(level) {
        return;
    }

    crate::kprintln!(
        "[pid={}][{}][{}] {}",
        task::current_task_id(),
        subsys,
        level.label(),
        args
    );
}

/// Emit a record at an explicit level: `log!(LogLevel::Info, "port", ...)`
#[macro_export]
macro_rules! log {
    ($level:expr, $subsys:expr, $($arg:tt)*) => {
        $crate::log::_log($level, $subsys, format_args!($($arg)*))
    };
}

/// Record an error-level message
#[macro_export]
macro_rules! log_error {
    ($subsys:expr, $($arg:tt)*) => {
        $crate::log!($crate::log::LogLevel::Error, $subsys, $($arg)*)
    };
}

/// Record a warning-level message
#[macro_export]
macro_rules! log_warn {
    ($subsys:expr, $($arg:tt)*) => {
        $crate::log!($crate::log::LogLevel::Warn, $subsys, $($arg)*)
    };
}

/// Record an info-level message
#[macro_export]
macro_rules! log_info {
    ($subsys:expr, $($arg:tt)*) => {
        $crate::log!($crate::log::LogLevel::Info, $subsys, $($arg)*)
    };
}

/// Record a debug-level message
#[macro_export]
macro_rules! log_debug {
    ($subsys:expr, $($arg:tt)*) => {
        $crate::log!($crate::log::LogLevel::Debug, $subsys, $($arg)*)
    };
}

/// Record a trace-level message
#[macro_export]
macro_rules! log_trace {
    ($subsys:expr, $($arg:tt)*) => {
        $crate::log!($crate::log::LogLevel::Trace, $subsys, $($arg)*)
    };
}
