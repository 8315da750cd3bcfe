use std::collections::HashMap;

use crate::relay::protocol::{ConnId, RoomId};

/// Room membership. Members are kept in join order.
pub trait SessionRegistry: Send {
    /// Add `conn` to `room`, creating the room on first join.
    ///
    /// Joining a room twice is idempotent. Returns the member list after the
    /// join.
    fn join(&mut self, room: &RoomId, conn: &ConnId) -> Vec<ConnId>;

    /// Remove `conn` from the room holding it. Deletes the room when it
    /// empties.
    ///
    /// Returns the room and its remaining members (empty if the room was
    /// deleted), or `None` if `conn` was in no room.
    fn leave(&mut self, conn: &ConnId) -> Option<(RoomId, Vec<ConnId>)>;

    /// Current members; empty for an unknown room.
    fn members_of(&self, room: &RoomId) -> Vec<ConnId>;

    /// Reverse lookup: the room that contains `conn`.
    fn room_of(&self, conn: &ConnId) -> Option<RoomId>;

    fn share_room(&self, a: &ConnId, b: &ConnId) -> bool;

    fn contains_room(&self, room: &RoomId) -> bool;

    fn room_count(&self) -> usize;
}

#[derive(Debug, Default)]
pub struct InMemoryRooms {
    rooms: HashMap<RoomId, Vec<ConnId>>,
}

impl InMemoryRooms {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionRegistry for InMemoryRooms {
    fn join(&mut self, room: &RoomId, conn: &ConnId) -> Vec<ConnId> {
        let members = self.rooms.entry(room.clone()).or_default();
        if !members.contains(conn) {
            members.push(conn.clone());
        }
        members.clone()
    }

    fn leave(&mut self, conn: &ConnId) -> Option<(RoomId, Vec<ConnId>)> {
        let room = self.room_of(conn)?;
        let members = self.rooms.get_mut(&room)?;

        if let Some(pos) = members.iter().position(|m| m == conn) {
            members.remove(pos);
        }
        let remaining = members.clone();
        if remaining.is_empty() {
            self.rooms.remove(&room);
        }
        Some((room, remaining))
    }

    fn members_of(&self, room: &RoomId) -> Vec<ConnId> {
        self.rooms.get(room).cloned().unwrap_or_default()
    }

    fn room_of(&self, conn: &ConnId) -> Option<RoomId> {
        // Linear scan; room counts per relay are small.
        self.rooms
            .iter()
            .find(|(_, members)| members.contains(conn))
            .map(|(room, _)| room.clone())
    }

    fn share_room(&self, a: &ConnId, b: &ConnId) -> bool {
        self.rooms
            .values()
            .any(|members| members.contains(a) && members.contains(b))
    }

    fn contains_room(&self, room: &RoomId) -> bool {
        self.rooms.contains_key(room)
    }

    fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
