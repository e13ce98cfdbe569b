//! Logging facilities.
//!
//! Every record is prefixed with the simulation time, the level and the name of the allocation component
//! which emitted it. The component name is also used as the log target, so output can be filtered per
//! datacenter or per policy, e.g. `RUST_LOG=allocation_policy_0=debug`.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};
use log::Level;

/// Returns a fixed-width label of the level, colored if stderr (log) goes to console.
pub fn level_label(level: Level) -> ColoredString {
    let (label, color) = match level {
        Level::Error => ("ERROR", Color::Red),
        Level::Warn => ("WARN ", Color::Yellow),
        Level::Info => ("INFO ", Color::Green),
        Level::Debug => ("DEBUG", Color::Blue),
        Level::Trace => ("TRACE", Color::Cyan),
    };
    if atty::is(Stream::Stderr) {
        label.color(color)
    } else {
        label.normal()
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_with_context {
    ($level:expr, $ctx:expr, $($arg:tt)+) => (
        log::log!(
            target: $ctx.name(),
            $level,
            "[{:.3} {} {}] {}",
            $ctx.time(), $crate::log::level_label($level), $ctx.name(), format_args!($($arg)+)
        )
    );
}

/// Logs a message at the info level.
///
/// The first argument is a context providing `time()` and `name()`,
/// see [`AllocationContext`](crate::core::context::AllocationContext).
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_context!(log::Level::Info, $ctx, $($arg)+));
}

/// Logs a message at the debug level.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_context!(log::Level::Debug, $ctx, $($arg)+));
}

/// Logs a message at the warn level.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_context!(log::Level::Warn, $ctx, $($arg)+));
}

/// Logs a message at the error level.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_context!(log::Level::Error, $ctx, $($arg)+));
}

/// Logs a message at the trace level.
#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_context!(log::Level::Trace, $ctx, $($arg)+));
}
