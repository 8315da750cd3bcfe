use std::fmt;

/// Why an inbound event produced no delivery.
///
/// Clients never see these; the sender just observes that nothing arrived.
/// They exist so drops show up in debug logs and in [`RelayStats`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The sending connection was never registered (or already left).
    NotRegistered,
    /// Chat from a connection that is in no room.
    NotInRoom,
    /// Signal addressed to a connection the relay does not know.
    UnknownTarget,
    /// Signal between connections that are not in the same room.
    NoSharedRoom,
    /// Join with an empty room id.
    EmptyRoomId,
    /// Join for a second room while still a member of the first.
    AlreadyInOtherRoom,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotRegistered => "sender not registered",
            Self::NotInRoom => "sender not in any room",
            Self::UnknownTarget => "unknown target connection",
            Self::NoSharedRoom => "sender and target share no room",
            Self::EmptyRoomId => "empty room id",
            Self::AlreadyInOtherRoom => "already joined another room",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for events the relay swallowed, plus current sizes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub dropped_chat: u64,
    pub dropped_signals: u64,
    pub rejected_joins: u64,
    pub rooms: usize,
    pub connections: usize,
}
