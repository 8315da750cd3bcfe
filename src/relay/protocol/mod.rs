//! Binary wire protocol spoken between meeting clients and the relay.
//!
//! Every message is one frame: an 8-byte header (version, type, flags, body
//! length) followed by a type-specific body built from `str16`, `bytes32`
//! and member-list fields. See [`constants`] for the header layout.

pub mod codec;
pub mod constants;
pub mod errors;
pub mod framing;
pub mod msg;
pub mod msg_type;
pub mod types;

pub use codec::{decode_msg, encode_msg};
pub use constants::*;
pub use errors::{FrameError, ProtoError};
pub use framing::{FrameDecoder, read_frame, write_frame};
pub use msg::RelayMsg;
pub use msg_type::MsgType;
pub use types::{CONN_ID_LEN, ConnId, DisplayName, RoomId};

use std::io::{Read, Write};

/// Encode `msg` and write it as one frame.
pub fn write_msg<W: Write>(w: &mut W, msg: &RelayMsg) -> Result<(), FrameError> {
    let (msg_type, body) = encode_msg(msg)?;
    write_frame(w, msg_type, &body)?;
    Ok(())
}

/// Block until one full frame arrives and decode it.
pub fn read_msg<R: Read>(r: &mut R) -> Result<RelayMsg, FrameError> {
    let (msg_type, body) = read_frame(r, MAX_BODY_LEN)?;
    Ok(decode_msg(msg_type, &body)?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn messages_survive_a_stream() {
        let sent = vec![
            RelayMsg::Welcome {
                conn_id: "me".into(),
            },
            RelayMsg::JoinCall {
                room_id: "https://meet.example/room-1".into(),
            },
            RelayMsg::ChatMessage {
                text: "hello".into(),
                sender_name: "Ana".into(),
                sender_conn: Some("me".into()),
            },
        ];

        let mut wire = Vec::new();
        for m in &sent {
            write_msg(&mut wire, m).unwrap();
        }

        let mut r = wire.as_slice();
        for m in &sent {
            assert_eq!(&read_msg(&mut r).unwrap(), m);
        }
        assert!(read_msg(&mut r).unwrap_err().is_disconnect());
    }
}
