use std::sync::Mutex;

use crate::log::{log_level::LogLevel, log_msg::LogMsg, log_sink::LogSink, now_millis};

#[derive(Debug, Clone, Default)]
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    #[inline]
    fn log(&self, _level: LogLevel, _msg: &str, _target: &'static str) {}
}

/// Keeps every line in memory. Handy in tests that assert a drop was logged.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<LogMsg>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far.
    pub fn lines(&self) -> Vec<LogMsg> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// True if any line at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|m| m.level == level && m.text.contains(needle))
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, level: LogLevel, msg: &str, target: &'static str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(LogMsg::new(level, msg, target, now_millis()));
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn memory_sink_records_level_and_target() {
        let sink = MemoryLogSink::new();
        sink.log(LogLevel::Debug, "dropped chat from abc", "roomrelay::relay");
        sink.log(LogLevel::Info, "room r1 created", "roomrelay::relay");

        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].target, "roomrelay::relay");
        assert!(sink.contains(LogLevel::Debug, "dropped chat"));
        assert!(!sink.contains(LogLevel::Warn, "dropped chat"));
    }
}
