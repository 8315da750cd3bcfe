use std::collections::{HashMap, VecDeque};

use crate::relay::errors::DropReason;
use crate::relay::protocol::{ConnId, DisplayName, RelayMsg, RoomId};
use crate::relay::rooms::SessionRegistry;
use crate::relay::types::{OutgoingMsg, fan_out};

/// One line of room chat as stored for replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender_name: DisplayName,
    pub text: String,
    pub sender_conn: ConnId,
}

impl ChatMessage {
    pub fn to_msg(&self) -> RelayMsg {
        RelayMsg::ChatMessage {
            text: self.text.clone(),
            sender_name: self.sender_name.clone(),
            sender_conn: Some(self.sender_conn.clone()),
        }
    }
}

/// Per-room chat history, in append order.
pub trait ChatLog: Send {
    fn append(&mut self, room: &RoomId, msg: ChatMessage);

    /// Everything kept for `room`, oldest first. Empty if none.
    fn replay(&self, room: &RoomId) -> Vec<ChatMessage>;

    /// Drop the whole history of `room`.
    fn clear(&mut self, room: &RoomId);

    fn len(&self, room: &RoomId) -> usize;
}

/// History bounded per room; `limit == 0` keeps everything.
#[derive(Debug, Default)]
pub struct InMemoryChatLog {
    logs: HashMap<RoomId, VecDeque<ChatMessage>>,
    limit: usize,
}

impl InMemoryChatLog {
    pub fn new(limit: usize) -> Self {
        Self {
            logs: HashMap::new(),
            limit,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }
}

impl ChatLog for InMemoryChatLog {
    fn append(&mut self, room: &RoomId, msg: ChatMessage) {
        let log = self.logs.entry(room.clone()).or_default();
        log.push_back(msg);
        if self.limit > 0 {
            while log.len() > self.limit {
                log.pop_front();
            }
        }
    }

    fn replay(&self, room: &RoomId) -> Vec<ChatMessage> {
        self.logs
            .get(room)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn clear(&mut self, room: &RoomId) {
        self.logs.remove(room);
    }

    fn len(&self, room: &RoomId) -> usize {
        self.logs.get(room).map_or(0, VecDeque::len)
    }
}

/// Store a chat line from `from` and broadcast it to its whole room,
/// sender included.
///
/// The room comes from a reverse lookup, so a connection that never joined
/// cannot talk.
pub fn relay_chat(
    rooms: &dyn SessionRegistry,
    log: &mut dyn ChatLog,
    from: &ConnId,
    sender_name: DisplayName,
    text: String,
) -> Result<Vec<OutgoingMsg>, DropReason> {
    let room = rooms.room_of(from).ok_or(DropReason::NotInRoom)?;

    let entry = ChatMessage {
        sender_name,
        text,
        sender_conn: from.clone(),
    };
    let out = fan_out(&rooms.members_of(&room), &entry.to_msg());
    log.append(&room, entry);
    Ok(out)
}

/// Room history addressed to `conn` only.
pub fn replay_to(log: &dyn ChatLog, room: &RoomId, conn: &ConnId) -> Vec<OutgoingMsg> {
    log.replay(room)
        .iter()
        .map(|m| OutgoingMsg::new(conn.clone(), m.to_msg()))
        .collect()
}
