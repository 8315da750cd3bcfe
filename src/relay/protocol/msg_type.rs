// ---- Message type byte ----------------------------------------------------

use crate::relay::protocol::ProtoError;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum MsgType {
    Welcome = 0x01,

    JoinCall = 0x10,
    UserJoined = 0x11,
    UserLeft = 0x12,

    Signal = 0x20,

    ChatMessage = 0x30,

    Ping = 0x40,
    Pong = 0x41,
}

impl MsgType {
    pub fn from_u8(v: u8) -> Result<MsgType, ProtoError> {
        use MsgType::*;
        match v {
            0x01 => Ok(Welcome),
            0x10 => Ok(JoinCall),
            0x11 => Ok(UserJoined),
            0x12 => Ok(UserLeft),
            0x20 => Ok(Signal),
            0x30 => Ok(ChatMessage),
            0x40 => Ok(Ping),
            0x41 => Ok(Pong),
            other => Err(ProtoError::UnknownType(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
