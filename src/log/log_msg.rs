use crate::log::log_level::LogLevel;

/// One log line on its way to a sink.
#[derive(Debug, Clone)]
pub struct LogMsg {
    pub level: LogLevel,
    /// Milliseconds since the UNIX epoch.
    pub ts_ms: u128,
    pub text: String,
    /// Module path of the call site.
    pub target: &'static str,
}

impl LogMsg {
    /// Creates a new `LogMsg`.
    ///
    /// ```rust,ignore
    /// let msg = LogMsg::new(
    ///     LogLevel::Info,
    ///     "conn Xy3 joined room r1 (2 members)",
    ///     module_path!(),
    ///     1678900000000
    /// );
    /// ```
    pub fn new(
        level: LogLevel,
        text: impl Into<String>,
        target: &'static str,
        ts_ms: u128,
    ) -> Self {
        Self {
            level,
            ts_ms,
            text: text.into(),
            target,
        }
    }

    /// Line as written to the log file: `[LEVEL] ts | target | text`.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "[{}] {} | {} | {}",
            self.level, self.ts_ms, self.target, self.text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_line_includes_level_target_and_text() {
        let m = LogMsg::new(LogLevel::Warn, "no outbox", "roomrelay::relay::runtime", 42);
        assert_eq!(m.to_line(), "[WARN] 42 | roomrelay::relay::runtime | no outbox");
    }
}
