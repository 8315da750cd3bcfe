use std::sync::mpsc;

use crate::log::{log_level::LogLevel, log_msg::LogMsg, log_sink::LogSink, now_millis};

/// Cloneable handle to the process [`Logger`](super::logger::Logger).
///
/// `relay_server` wraps one handle in an `Arc<dyn LogSink>` and hands it to
/// the accept loop, which shares it with the server loop and every
/// connection thread. Enqueues into a bounded `SyncSender`: a full queue
/// drops the line instead of stalling the server loop, so a burst of
/// join and leave lines never delays message delivery.
#[derive(Clone)]
pub struct LoggerHandle {
    pub(super) tx: mpsc::SyncSender<LogMsg>,
}

impl LogSink for LoggerHandle {
    #[inline]
    fn log(&self, level: LogLevel, msg: &str, target: &'static str) {
        let _ = self.try_log(level, msg, target);
    }
}

impl LoggerHandle {
    /// Attempts to enqueue a log message without blocking.
    ///
    /// # Errors
    /// - `TrySendError::Full` when the bounded queue is at capacity.
    /// - `TrySendError::Disconnected` when the logger worker is gone.
    pub fn try_log<S: Into<String>>(
        &self,
        level: LogLevel,
        text: S,
        target: &'static str,
    ) -> Result<(), mpsc::TrySendError<LogMsg>> {
        let msg = LogMsg {
            level,
            ts_ms: now_millis(),
            text: text.into(),
            target,
        };
        self.tx.try_send(msg)
    }
}
