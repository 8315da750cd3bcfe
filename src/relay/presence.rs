use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::relay::protocol::ConnId;

/// Remembers when each connection joined its room. Only used for the
/// "time online" line logged at departure.
pub trait PresenceTracker: Send {
    fn record_join(&mut self, conn: &ConnId);

    /// Time since the recorded join; `None` if nothing was recorded.
    fn duration_since(&self, conn: &ConnId) -> Option<Duration>;

    fn clear(&mut self, conn: &ConnId);
}

#[derive(Debug, Default)]
pub struct InMemoryPresence {
    joined_at: HashMap<ConnId, Instant>,
}

impl InMemoryPresence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresenceTracker for InMemoryPresence {
    fn record_join(&mut self, conn: &ConnId) {
        self.joined_at.insert(conn.clone(), Instant::now());
    }

    fn duration_since(&self, conn: &ConnId) -> Option<Duration> {
        self.joined_at.get(conn).map(Instant::elapsed)
    }

    fn clear(&mut self, conn: &ConnId) {
        self.joined_at.remove(conn);
    }
}

/// `1h 02m 03s` style rendering for log lines.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{}.{:03}s", s, d.subsec_millis())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn record_then_clear() {
        let mut p = InMemoryPresence::new();
        let a = ConnId::from("a");

        assert_eq!(p.duration_since(&a), None);
        p.record_join(&a);
        assert!(p.duration_since(&a).is_some());
        p.clear(&a);
        assert_eq!(p.duration_since(&a), None);
    }

    #[test]
    fn durations_render_compactly() {
        assert_eq!(format_duration(Duration::from_millis(1_250)), "1.250s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 05s");
        assert_eq!(format_duration(Duration::from_secs(3_723)), "1h 02m 03s");
    }
}
