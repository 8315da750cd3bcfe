use std::fmt;

/// Severity of a relay log line.
///
/// Ordered from most to least verbose, so `level >= LogLevel::Warn` selects
/// the lines worth echoing to an operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Per-frame chatter (pings, raw frame sizes).
    Trace,
    /// Dropped chat/signal messages and other silent no-ops.
    Debug,
    /// Room lifecycle: joins, departures, room creation and deletion.
    Info,
    /// Misbehaving clients and failed deliveries.
    Warn,
    /// Failures that end a connection or the listener.
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
