use super::{ConnId, MAX_MEMBERS, MsgType, ProtoError, RelayMsg};
use byteorder::{BigEndian, ByteOrder};
use std::str;

// ---- Encode to body bytes -------------------------------------------------

pub fn encode_msg(msg: &RelayMsg) -> Result<(MsgType, Vec<u8>), ProtoError> {
    use RelayMsg::*;
    let mut body = Vec::new();

    let msg_type = match msg {
        Welcome { conn_id } => {
            put_str16(&mut body, conn_id.as_str())?;
            MsgType::Welcome
        }

        JoinCall { room_id } => {
            put_str16(&mut body, room_id)?;
            MsgType::JoinCall
        }
        UserJoined { conn_id, members } => {
            put_str16(&mut body, conn_id.as_str())?;
            put_members(&mut body, members)?;
            MsgType::UserJoined
        }
        UserLeft { conn_id } => {
            put_str16(&mut body, conn_id.as_str())?;
            MsgType::UserLeft
        }

        Signal { peer, payload } => {
            put_str16(&mut body, peer.as_str())?;
            put_bytes32(&mut body, payload)?;
            MsgType::Signal
        }

        ChatMessage {
            text,
            sender_name,
            sender_conn,
        } => {
            put_str16(&mut body, text)?;
            put_str16(&mut body, sender_name)?;
            match sender_conn {
                Some(c) => put_str16(&mut body, c.as_str())?,
                None => put_u16(&mut body, 0), // len=0 string
            }
            MsgType::ChatMessage
        }

        Ping { nonce } => {
            put_u64(&mut body, *nonce);
            MsgType::Ping
        }
        Pong { nonce } => {
            put_u64(&mut body, *nonce);
            MsgType::Pong
        }
    };

    Ok((msg_type, body))
}

// ---- Decode from body bytes ----------------------------------------------

pub fn decode_msg(msg_type: MsgType, body: &[u8]) -> Result<RelayMsg, ProtoError> {
    use RelayMsg::*;
    let mut cursor = Cursor::new(body);

    let msg = match msg_type {
        MsgType::Welcome => Welcome {
            conn_id: cursor.get_conn_id()?,
        },

        MsgType::JoinCall => JoinCall {
            room_id: cursor.get_str16()?.to_owned(),
        },
        MsgType::UserJoined => {
            let conn_id = cursor.get_conn_id()?;
            let count = cursor.get_u16()? as usize;
            let mut members = Vec::with_capacity(count.min(cursor.remaining() / 2));
            for _ in 0..count {
                members.push(cursor.get_conn_id()?);
            }
            UserJoined { conn_id, members }
        }
        MsgType::UserLeft => UserLeft {
            conn_id: cursor.get_conn_id()?,
        },

        MsgType::Signal => {
            let peer = cursor.get_conn_id()?;
            let len = cursor.get_u32()? as usize;
            let payload = cursor.get_bytes(len)?.to_vec();
            Signal { peer, payload }
        }

        MsgType::ChatMessage => {
            let text = cursor.get_str16()?.to_owned();
            let sender_name = cursor.get_str16()?.to_owned();
            let conn = cursor.get_str16()?;
            let sender_conn = if conn.is_empty() {
                None
            } else {
                Some(ConnId::from(conn))
            };
            ChatMessage {
                text,
                sender_name,
                sender_conn,
            }
        }

        MsgType::Ping => Ping {
            nonce: cursor.get_u64()?,
        },
        MsgType::Pong => Pong {
            nonce: cursor.get_u64()?,
        },
    };

    cursor.finish()?;
    Ok(msg)
}

// ---- Primitive write helpers ---------------------------------------------

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    let mut b = [0u8; 2];
    BigEndian::write_u16(&mut b, v);
    buf.extend_from_slice(&b);
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    let mut b = [0u8; 4];
    BigEndian::write_u32(&mut b, v);
    buf.extend_from_slice(&b);
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    let mut b = [0u8; 8];
    BigEndian::write_u64(&mut b, v);
    buf.extend_from_slice(&b);
}

/// str16 = u16 length + UTF-8 bytes
fn put_str16(buf: &mut Vec<u8>, s: &str) -> Result<(), ProtoError> {
    let bytes = s.as_bytes();
    let len = bytes.len();

    if len > u16::MAX as usize {
        return Err(ProtoError::StringTooLong {
            max: u16::MAX as usize,
            actual: len,
        });
    }

    put_u16(buf, len as u16);
    buf.extend_from_slice(bytes);
    Ok(())
}

/// bytes32 = u32 length + raw bytes
fn put_bytes32(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<(), ProtoError> {
    let len = u32::try_from(bytes.len()).map_err(|_| ProtoError::TooLarge)?;
    put_u32(buf, len);
    buf.extend_from_slice(bytes);
    Ok(())
}

/// u16 count + str16 per member
fn put_members(buf: &mut Vec<u8>, members: &[ConnId]) -> Result<(), ProtoError> {
    if members.len() > MAX_MEMBERS {
        return Err(ProtoError::TooManyMembers {
            max: MAX_MEMBERS,
            actual: members.len(),
        });
    }
    put_u16(buf, members.len() as u16);
    for m in members {
        put_str16(buf, m.as_str())?;
    }
    Ok(())
}

// ---- Cursor for decoding --------------------------------------------------

#[derive(Debug)]
struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn get_u16(&mut self) -> Result<u16, ProtoError> {
        Ok(BigEndian::read_u16(self.get_bytes(2)?))
    }

    fn get_u32(&mut self) -> Result<u32, ProtoError> {
        Ok(BigEndian::read_u32(self.get_bytes(4)?))
    }

    fn get_u64(&mut self) -> Result<u64, ProtoError> {
        Ok(BigEndian::read_u64(self.get_bytes(8)?))
    }

    fn get_bytes(&mut self, len: usize) -> Result<&'a [u8], ProtoError> {
        if self.buf.len() < len {
            return Err(ProtoError::Truncated);
        }
        let (head, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(head)
    }

    /// Read str16 = u16 length + UTF-8 bytes
    fn get_str16(&mut self) -> Result<&'a str, ProtoError> {
        let len = self.get_u16()? as usize;
        let bytes = self.get_bytes(len)?;
        str::from_utf8(bytes).map_err(|_| ProtoError::InvalidUtf8)
    }

    /// Connection ids are never empty on the wire.
    fn get_conn_id(&mut self) -> Result<ConnId, ProtoError> {
        let s = self.get_str16()?;
        if s.is_empty() {
            return Err(ProtoError::InvalidFormat("empty connection id"));
        }
        Ok(ConnId::from(s))
    }

    /// Enforce that we've consumed the whole body.
    fn finish(self) -> Result<(), ProtoError> {
        if !self.buf.is_empty() {
            Err(ProtoError::InvalidFormat("trailing bytes in message body"))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn roundtrip(msg: RelayMsg) -> RelayMsg {
        let (t, body) = encode_msg(&msg).unwrap();
        decode_msg(t, &body).unwrap()
    }

    #[test]
    fn user_joined_keeps_member_order() {
        let msg = RelayMsg::UserJoined {
            conn_id: "c".into(),
            members: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(roundtrip(msg.clone()), msg);
    }

    #[test]
    fn chat_without_sender_conn_encodes_empty_string() {
        let msg = RelayMsg::ChatMessage {
            text: "hi".into(),
            sender_name: "Ana".into(),
            sender_conn: None,
        };
        let (t, body) = encode_msg(&msg).unwrap();
        assert_eq!(t, MsgType::ChatMessage);
        // "hi" + "Ana" + empty conn id
        assert_eq!(body.len(), 2 + 2 + 2 + 3 + 2);
        assert_eq!(&body[body.len() - 2..], &[0, 0]);
        assert_eq!(decode_msg(t, &body).unwrap(), msg);
    }

    #[test]
    fn signal_payload_is_passed_through_verbatim() {
        // Not valid UTF-8 and not JSON: the relay must not care.
        let payload = vec![0xff, 0x00, 0xfe, b'{'];
        let msg = RelayMsg::Signal {
            peer: "peer1".into(),
            payload: payload.clone(),
        };
        match roundtrip(msg) {
            RelayMsg::Signal { peer, payload: p } => {
                assert_eq!(peer.as_str(), "peer1");
                assert_eq!(p, payload);
            }
            other => panic!("expected Signal, got {:?}", other),
        }
    }

    #[test]
    fn truncated_body_is_rejected() {
        let (t, body) = encode_msg(&RelayMsg::JoinCall {
            room_id: "https://meet.example/abc".into(),
        })
        .unwrap();
        assert_eq!(
            decode_msg(t, &body[..body.len() - 1]),
            Err(ProtoError::Truncated)
        );
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let (t, mut body) = encode_msg(&RelayMsg::Ping { nonce: 7 }).unwrap();
        body.push(0);
        assert_eq!(
            decode_msg(t, &body),
            Err(ProtoError::InvalidFormat("trailing bytes in message body"))
        );
    }

    #[test]
    fn empty_conn_id_is_rejected() {
        let body = [0u8, 0u8];
        assert_eq!(
            decode_msg(MsgType::UserLeft, &body),
            Err(ProtoError::InvalidFormat("empty connection id"))
        );
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let body = [0u8, 2, 0xc3, 0x28];
        assert_eq!(
            decode_msg(MsgType::JoinCall, &body),
            Err(ProtoError::InvalidUtf8)
        );
    }

    #[test]
    fn oversized_string_is_refused_on_encode() {
        let msg = RelayMsg::JoinCall {
            room_id: "x".repeat(u16::MAX as usize + 1),
        };
        match encode_msg(&msg) {
            Err(ProtoError::StringTooLong { max, actual }) => {
                assert_eq!(max, u16::MAX as usize);
                assert_eq!(actual, u16::MAX as usize + 1);
            }
            other => panic!("expected StringTooLong, got {:?}", other),
        }
    }

    #[test]
    fn member_count_larger_than_body_is_truncated_not_oom() {
        // conn id "a", then claims 65535 members with no data behind it.
        let body = [0u8, 1, b'a', 0xff, 0xff];
        assert_eq!(
            decode_msg(MsgType::UserJoined, &body),
            Err(ProtoError::Truncated)
        );
    }
}
