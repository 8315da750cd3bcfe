use crate::relay::connections::ConnectionRegistry;
use crate::relay::errors::DropReason;
use crate::relay::protocol::{ConnId, RelayMsg};
use crate::relay::rooms::SessionRegistry;
use crate::relay::types::OutgoingMsg;

/// Forward an opaque negotiation payload from `from` to `to`.
///
/// The payload is never inspected. The delivered message carries `from` as
/// its peer so the target knows who to answer. With `require_shared_room`
/// both ends must currently be in the same room.
pub fn forward(
    connections: &dyn ConnectionRegistry,
    rooms: &dyn SessionRegistry,
    require_shared_room: bool,
    from: &ConnId,
    to: ConnId,
    payload: Vec<u8>,
) -> Result<OutgoingMsg, DropReason> {
    if !connections.is_registered(&to) {
        return Err(DropReason::UnknownTarget);
    }
    if require_shared_room && !rooms.share_room(from, &to) {
        return Err(DropReason::NoSharedRoom);
    }

    Ok(OutgoingMsg::new(
        to,
        RelayMsg::Signal {
            peer: from.clone(),
            payload,
        },
    ))
}
