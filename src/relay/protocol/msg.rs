// ---- Public message enum --------------------------------------------------

use crate::relay::protocol::{ConnId, DisplayName, RoomId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMsg {
    // Connection handshake (server → client)
    Welcome {
        conn_id: ConnId,
    },

    // Room membership
    JoinCall {
        room_id: RoomId,
    },
    UserJoined {
        conn_id: ConnId,
        members: Vec<ConnId>, // join order
    },
    UserLeft {
        conn_id: ConnId,
    },

    // WebRTC negotiation. Client → server: `peer` is the target.
    // Server → client: `peer` is the sender.
    Signal {
        peer: ConnId,
        payload: Vec<u8>, // opaque SDP / ICE blob
    },

    // Chat. `sender_conn` is stamped by the server; whatever a client puts
    // there is ignored.
    ChatMessage {
        text: String,
        sender_name: DisplayName,
        sender_conn: Option<ConnId>,
    },

    // Keepalive
    Ping {
        nonce: u64,
    },
    Pong {
        nonce: u64,
    },
}

impl RelayMsg {
    /// Short variant name for logging.
    /// We avoid logging signal payloads or chat text.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "Welcome",
            Self::JoinCall { .. } => "JoinCall",
            Self::UserJoined { .. } => "UserJoined",
            Self::UserLeft { .. } => "UserLeft",
            Self::Signal { .. } => "Signal",
            Self::ChatMessage { .. } => "ChatMessage",
            Self::Ping { .. } => "Ping",
            Self::Pong { .. } => "Pong",
        }
    }
}
