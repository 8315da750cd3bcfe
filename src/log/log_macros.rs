//! Leveled logging macros over any [`LogSink`](crate::log::log_sink::LogSink).
//!
//! The relay logs connection and room lifecycle at info, rejected joins and
//! transport faults at warn, dropped messages at debug and every forwarded
//! signal at trace.
//!
//! # Feature Flags
//! Levels are controlled by cargo features:
//! `log-trace`, `log-debug`, `log-info`, `log-warn`, `log-error`.
//!
//! If a feature is disabled, the corresponding macro still type-checks its
//! sink and arguments but never formats or allocates, so a relay built with
//! the default `log-info` keeps the debug-only bindings in the engine, the
//! router and the transports warning-free.

#[macro_export]
macro_rules! sink_log {
    ($sink:expr, $lvl:expr, $($arg:tt)*) => {{
        let __msg = format!($($arg)*);
        $sink.log($lvl, &__msg, module_path!());
    }};
}

/// Expansion of a level that is compiled out.
#[doc(hidden)]
#[macro_export]
macro_rules! sink_disabled {
    ($sink:expr, $($arg:tt)*) => {{
        let _ = &$sink;
        if false {
            let _ = format_args!($($arg)*);
        }
    }};
}

// ---------------------- TRACE ----------------------
#[cfg(feature = "log-trace")]
#[macro_export]
macro_rules! sink_trace { ($sink:expr, $($arg:tt)*) => { $crate::sink_log!($sink, $crate::log::log_level::LogLevel::Trace, $($arg)*) } }

#[cfg(not(feature = "log-trace"))]
#[macro_export]
macro_rules! sink_trace {
    ($sink:expr, $($arg:tt)*) => {
        $crate::sink_disabled!($sink, $($arg)*)
    };
}

// ---------------------- DEBUG ----------------------
#[cfg(feature = "log-debug")]
#[macro_export]
macro_rules! sink_debug { ($sink:expr, $($arg:tt)*) => { $crate::sink_log!($sink, $crate::log::log_level::LogLevel::Debug, $($arg)*) } }

#[cfg(not(feature = "log-debug"))]
#[macro_export]
macro_rules! sink_debug {
    ($sink:expr, $($arg:tt)*) => {
        $crate::sink_disabled!($sink, $($arg)*)
    };
}

// ---------------------- INFO ----------------------
#[cfg(feature = "log-info")]
#[macro_export]
macro_rules! sink_info { ($sink:expr, $($arg:tt)*) => { $crate::sink_log!($sink, $crate::log::log_level::LogLevel::Info, $($arg)*) } }

#[cfg(not(feature = "log-info"))]
#[macro_export]
macro_rules! sink_info {
    ($sink:expr, $($arg:tt)*) => {
        $crate::sink_disabled!($sink, $($arg)*)
    };
}

// ---------------------- WARN ----------------------
#[cfg(feature = "log-warn")]
#[macro_export]
macro_rules! sink_warn { ($sink:expr, $($arg:tt)*) => { $crate::sink_log!($sink, $crate::log::log_level::LogLevel::Warn, $($arg)*) } }

#[cfg(not(feature = "log-warn"))]
#[macro_export]
macro_rules! sink_warn {
    ($sink:expr, $($arg:tt)*) => {
        $crate::sink_disabled!($sink, $($arg)*)
    };
}

// ---------------------- ERROR ----------------------
// Generally always enabled, but consistent structure allows user to disable if really needed.
#[cfg(feature = "log-error")]
#[macro_export]
macro_rules! sink_error { ($sink:expr, $($arg:tt)*) => { $crate::sink_log!($sink, $crate::log::log_level::LogLevel::Error, $($arg)*) } }

#[cfg(not(feature = "log-error"))]
#[macro_export]
macro_rules! sink_error {
    ($sink:expr, $($arg:tt)*) => {
        $crate::sink_disabled!($sink, $($arg)*)
    };
}
