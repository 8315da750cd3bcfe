use crate::relay::protocol::{ConnId, RelayMsg};

/// A message the relay wants to send to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMsg {
    pub conn_target: ConnId,
    pub msg: RelayMsg,
}

impl OutgoingMsg {
    pub fn new(conn_target: ConnId, msg: RelayMsg) -> Self {
        Self { conn_target, msg }
    }
}

/// Same message to every member, in member order.
pub fn fan_out(members: &[ConnId], msg: &RelayMsg) -> Vec<OutgoingMsg> {
    members
        .iter()
        .map(|m| OutgoingMsg::new(m.clone(), msg.clone()))
        .collect()
}
