use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::relay::protocol::{ConnId, RoomId};

/// Live connections known to the relay, and the room each one is in.
pub trait ConnectionRegistry: Send {
    /// Create (or reset) the entry for `conn`: no room, fresh timestamp.
    fn register(&mut self, conn: ConnId);

    /// Forget `conn`. No-op if it was never registered.
    fn unregister(&mut self, conn: &ConnId);

    fn is_registered(&self, conn: &ConnId) -> bool;

    /// Room recorded for `conn`, if it is registered and has joined one.
    fn room_of(&self, conn: &ConnId) -> Option<RoomId>;

    /// Record (or clear) the room of a registered connection.
    ///
    /// Returns false if `conn` is unknown.
    fn set_room(&mut self, conn: &ConnId, room: Option<RoomId>) -> bool;

    /// How long ago `conn` was registered.
    fn connected_for(&self, conn: &ConnId) -> Option<Duration>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct ConnectionEntry {
    room: Option<RoomId>,
    connected_at: Instant,
}

#[derive(Debug, Default)]
pub struct InMemoryConnections {
    entries: HashMap<ConnId, ConnectionEntry>,
}

impl InMemoryConnections {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConnectionRegistry for InMemoryConnections {
    fn register(&mut self, conn: ConnId) {
        self.entries.insert(
            conn,
            ConnectionEntry {
                room: None,
                connected_at: Instant::now(),
            },
        );
    }

    fn unregister(&mut self, conn: &ConnId) {
        self.entries.remove(conn);
    }

    fn is_registered(&self, conn: &ConnId) -> bool {
        self.entries.contains_key(conn)
    }

    fn room_of(&self, conn: &ConnId) -> Option<RoomId> {
        self.entries.get(conn).and_then(|e| e.room.clone())
    }

    fn set_room(&mut self, conn: &ConnId, room: Option<RoomId>) -> bool {
        match self.entries.get_mut(conn) {
            Some(entry) => {
                entry.room = room;
                true
            }
            None => false,
        }
    }

    fn connected_for(&self, conn: &ConnId) -> Option<Duration> {
        self.entries.get(conn).map(|e| e.connected_at.elapsed())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
