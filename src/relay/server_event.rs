use std::sync::mpsc::Sender;

use crate::relay::protocol::{ConnId, RelayMsg};

/// Events sent *to* the central server thread.
#[derive(Debug)]
pub enum ServerEvent {
    /// A new connection is registered with its outgoing channel.
    RegisterClient {
        conn_id: ConnId,
        to_client: Sender<RelayMsg>,
    },

    /// A connection sent a relay message.
    MsgFromClient { conn_id: ConnId, msg: RelayMsg },

    /// A connection went away (TCP/TLS closed, errored or sent garbage).
    Disconnected { conn_id: ConnId },
}
