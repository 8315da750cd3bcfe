use std::sync::Arc;

use crate::config::RelayOptions;
use crate::log::NoopLogSink;
use crate::log::log_sink::LogSink;
use crate::relay::chat::{ChatLog, InMemoryChatLog, relay_chat, replay_to};
use crate::relay::connections::{ConnectionRegistry, InMemoryConnections};
use crate::relay::errors::{DropReason, RelayStats};
use crate::relay::presence::{InMemoryPresence, PresenceTracker, format_duration};
use crate::relay::protocol::{ConnId, RelayMsg, RoomId};
use crate::relay::rooms::{InMemoryRooms, SessionRegistry};
use crate::relay::signal;
use crate::relay::types::{OutgoingMsg, fan_out};
use crate::{sink_debug, sink_info, sink_trace, sink_warn};

/// The stores a [`RelayEngine`] works on.
pub struct RelayStores {
    pub connections: Box<dyn ConnectionRegistry>,
    pub rooms: Box<dyn SessionRegistry>,
    pub presence: Box<dyn PresenceTracker>,
    pub chat: Box<dyn ChatLog>,
}

impl RelayStores {
    pub fn in_memory(options: &RelayOptions) -> Self {
        Self {
            connections: Box::new(InMemoryConnections::new()),
            rooms: Box::new(InMemoryRooms::new()),
            presence: Box::new(InMemoryPresence::new()),
            chat: Box::new(InMemoryChatLog::new(options.chat_history_limit)),
        }
    }
}

/// Connection lifecycle state machine: Connected → Joined → Disconnected.
///
/// Pure: every entry point takes one event and returns the messages to send.
/// The caller owns delivery.
pub struct RelayEngine {
    connections: Box<dyn ConnectionRegistry>,
    rooms: Box<dyn SessionRegistry>,
    presence: Box<dyn PresenceTracker>,
    chat: Box<dyn ChatLog>,
    options: RelayOptions,
    stats: RelayStats,
    log: Arc<dyn LogSink>,
}

impl Default for RelayEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayEngine {
    pub fn new() -> Self {
        Self::with_log(Arc::new(NoopLogSink))
    }

    pub fn with_log(log: Arc<dyn LogSink>) -> Self {
        Self::with_options(log, RelayOptions::default())
    }

    pub fn with_options(log: Arc<dyn LogSink>, options: RelayOptions) -> Self {
        let stores = RelayStores::in_memory(&options);
        Self::with_parts(log, options, stores)
    }

    /// Fully explicit constructor: custom logger, options and stores.
    pub fn with_parts(log: Arc<dyn LogSink>, options: RelayOptions, stores: RelayStores) -> Self {
        let RelayStores {
            connections,
            rooms,
            presence,
            chat,
        } = stores;
        Self {
            connections,
            rooms,
            presence,
            chat,
            options,
            stats: RelayStats::default(),
            log,
        }
    }

    pub fn options(&self) -> &RelayOptions {
        &self.options
    }

    pub fn rooms(&self) -> &dyn SessionRegistry {
        self.rooms.as_ref()
    }

    pub fn connections(&self) -> &dyn ConnectionRegistry {
        self.connections.as_ref()
    }

    pub fn presence(&self) -> &dyn PresenceTracker {
        self.presence.as_ref()
    }

    pub fn chat_log(&self) -> &dyn ChatLog {
        self.chat.as_ref()
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            rooms: self.rooms.room_count(),
            connections: self.connections.len(),
            ..self.stats
        }
    }

    /// A transport accepted `conn`. Greets it with its id.
    pub fn handle_connect(&mut self, conn: ConnId) -> Vec<OutgoingMsg> {
        self.connections.register(conn.clone());
        sink_info!(
            self.log,
            "connection {} registered ({} live)",
            conn,
            self.connections.len()
        );
        vec![OutgoingMsg::new(
            conn.clone(),
            RelayMsg::Welcome { conn_id: conn },
        )]
    }

    /// Main entrypoint: handle a message from a client.
    ///
    /// Returns a list of (target_conn, msg) to send.
    pub fn handle(&mut self, from: ConnId, msg: RelayMsg) -> Vec<OutgoingMsg> {
        if !self.connections.is_registered(&from) {
            self.drop_event(&from, msg.kind(), DropReason::NotRegistered);
            return Vec::new();
        }

        match msg {
            RelayMsg::JoinCall { room_id } => self.handle_join(from, room_id),

            RelayMsg::Signal { peer, payload } => {
                match signal::forward(
                    self.connections.as_ref(),
                    self.rooms.as_ref(),
                    self.options.require_shared_room,
                    &from,
                    peer,
                    payload,
                ) {
                    Ok(out) => {
                        sink_trace!(self.log, "signal {} -> {}", from, out.conn_target);
                        vec![out]
                    }
                    Err(reason) => {
                        self.drop_event(&from, "Signal", reason);
                        Vec::new()
                    }
                }
            }

            // Any sender_conn the client filled in is replaced by `from`.
            RelayMsg::ChatMessage {
                text, sender_name, ..
            } => match relay_chat(
                self.rooms.as_ref(),
                self.chat.as_mut(),
                &from,
                sender_name,
                text,
            ) {
                Ok(out) => out,
                Err(reason) => {
                    self.drop_event(&from, "ChatMessage", reason);
                    Vec::new()
                }
            },

            RelayMsg::Ping { nonce } => vec![OutgoingMsg::new(from, RelayMsg::Pong { nonce })],
            RelayMsg::Pong { .. } => Vec::new(),

            RelayMsg::Welcome { .. } | RelayMsg::UserJoined { .. } | RelayMsg::UserLeft { .. } => {
                sink_warn!(
                    self.log,
                    "ignoring server-only {} from client {}",
                    msg.kind(),
                    from
                );
                Vec::new()
            }
        }
    }

    fn handle_join(&mut self, from: ConnId, room_id: RoomId) -> Vec<OutgoingMsg> {
        if room_id.is_empty() {
            self.drop_event(&from, "JoinCall", DropReason::EmptyRoomId);
            return Vec::new();
        }

        // The registry mirrors the room each connection joined.
        match self.connections.room_of(&from) {
            Some(current) if current == room_id => {
                sink_debug!(self.log, "{} re-joined {}; nothing to do", from, room_id);
                return Vec::new();
            }
            Some(current) => {
                sink_warn!(
                    self.log,
                    "{} asked to join {} while in {}; rejected",
                    from,
                    room_id,
                    current
                );
                self.drop_event(&from, "JoinCall", DropReason::AlreadyInOtherRoom);
                return Vec::new();
            }
            None => {}
        }

        let created = !self.rooms.contains_room(&room_id);
        let members = self.rooms.join(&room_id, &from);
        self.connections.set_room(&from, Some(room_id.clone()));
        self.presence.record_join(&from);

        if created {
            sink_info!(self.log, "room {} created by {}", room_id, from);
        }
        sink_info!(
            self.log,
            "{} joined {} ({} members)",
            from,
            room_id,
            members.len()
        );

        let mut out = fan_out(
            &members,
            &RelayMsg::UserJoined {
                conn_id: from.clone(),
                members: members.clone(),
            },
        );
        out.extend(replay_to(self.chat.as_ref(), &room_id, &from));
        out
    }

    /// A transport lost `conn`. Tells the rest of its room and forgets it.
    pub fn handle_disconnect(&mut self, conn: ConnId) -> Vec<OutgoingMsg> {
        let mut out = Vec::new();

        if let Some((room, remaining)) = self.rooms.leave(&conn) {
            out = fan_out(
                &remaining,
                &RelayMsg::UserLeft {
                    conn_id: conn.clone(),
                },
            );
            if remaining.is_empty() {
                self.chat.clear(&room);
                sink_info!(self.log, "room {} is empty; deleted", room);
            }
        }

        match self.presence.duration_since(&conn) {
            Some(online) => sink_info!(
                self.log,
                "{} left after {} in room",
                conn,
                format_duration(online)
            ),
            None => sink_info!(
                self.log,
                "{} disconnected after {} without joining a room",
                conn,
                format_duration(self.connections.connected_for(&conn).unwrap_or_default())
            ),
        }
        self.presence.clear(&conn);
        self.connections.unregister(&conn);

        out
    }

    fn drop_event(&mut self, from: &ConnId, kind: &str, reason: DropReason) {
        match reason {
            DropReason::NotInRoom => self.stats.dropped_chat += 1,
            DropReason::UnknownTarget | DropReason::NoSharedRoom => {
                self.stats.dropped_signals += 1
            }
            DropReason::EmptyRoomId | DropReason::AlreadyInOtherRoom => {
                self.stats.rejected_joins += 1
            }
            DropReason::NotRegistered => {}
        }
        sink_debug!(self.log, "dropped {} from {}: {}", kind, from, reason);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::MemoryLogSink;
    use crate::log::log_level::LogLevel;

    fn targets(out: &[OutgoingMsg]) -> Vec<&str> {
        out.iter().map(|o| o.conn_target.as_str()).collect()
    }

    fn connected(engine: &mut RelayEngine, ids: &[&str]) {
        for id in ids {
            engine.handle_connect((*id).into());
        }
    }

    fn join(engine: &mut RelayEngine, who: &str, room: &str) -> Vec<OutgoingMsg> {
        engine.handle(
            who.into(),
            RelayMsg::JoinCall {
                room_id: room.into(),
            },
        )
    }

    fn chat(engine: &mut RelayEngine, who: &str, text: &str) -> Vec<OutgoingMsg> {
        engine.handle(
            who.into(),
            RelayMsg::ChatMessage {
                text: text.into(),
                sender_name: who.to_uppercase(),
                sender_conn: None,
            },
        )
    }

    #[test]
    fn connect_sends_welcome_with_own_id() {
        let mut engine = RelayEngine::new();
        let out = engine.handle_connect("abc".into());

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].conn_target.as_str(), "abc");
        match &out[0].msg {
            RelayMsg::Welcome { conn_id } => assert_eq!(conn_id.as_str(), "abc"),
            other => panic!("expected Welcome, got {:?}", other),
        }
    }

    #[test]
    fn join_announces_to_all_members_including_joiner() {
        let mut engine = RelayEngine::new();
        connected(&mut engine, &["a", "b"]);
        join(&mut engine, "a", "r1");

        let out = join(&mut engine, "b", "r1");
        assert_eq!(targets(&out), vec!["a", "b"]);
        for o in &out {
            match &o.msg {
                RelayMsg::UserJoined { conn_id, members } => {
                    assert_eq!(conn_id.as_str(), "b");
                    let names: Vec<_> = members.iter().map(ConnId::as_str).collect();
                    assert_eq!(names, vec!["a", "b"]);
                }
                other => panic!("expected UserJoined, got {:?}", other),
            }
        }
        assert_eq!(engine.connections().room_of(&"b".into()).as_deref(), Some("r1"));
    }

    #[test]
    fn late_joiner_gets_history_after_user_joined() {
        let mut engine = RelayEngine::new();
        connected(&mut engine, &["a", "b"]);
        join(&mut engine, "a", "r1");
        chat(&mut engine, "a", "first");
        chat(&mut engine, "a", "second");

        let out = join(&mut engine, "b", "r1");
        // UserJoined to a and b, then two replays to b only.
        assert_eq!(targets(&out), vec!["a", "b", "b", "b"]);
        let replayed: Vec<_> = out[2..]
            .iter()
            .map(|o| match &o.msg {
                RelayMsg::ChatMessage { text, .. } => text.as_str(),
                other => panic!("expected ChatMessage, got {:?}", other),
            })
            .collect();
        assert_eq!(replayed, vec!["first", "second"]);
    }

    #[test]
    fn repeated_join_is_silent() {
        let mut engine = RelayEngine::new();
        connected(&mut engine, &["a"]);
        join(&mut engine, "a", "r1");

        assert!(join(&mut engine, "a", "r1").is_empty());
        assert_eq!(engine.rooms().members_of(&"r1".into()).len(), 1);
    }

    #[test]
    fn join_to_a_second_room_is_rejected_and_logged() {
        let log = Arc::new(MemoryLogSink::new());
        let mut engine = RelayEngine::with_log(log.clone());
        connected(&mut engine, &["a"]);
        join(&mut engine, "a", "r1");

        assert!(join(&mut engine, "a", "r2").is_empty());
        assert!(!engine.rooms().contains_room(&"r2".into()));
        assert_eq!(engine.stats().rejected_joins, 1);
        assert!(log.contains(LogLevel::Warn, "rejected"));
    }

    #[test]
    fn empty_room_id_is_rejected() {
        let mut engine = RelayEngine::new();
        connected(&mut engine, &["a"]);

        assert!(join(&mut engine, "a", "").is_empty());
        assert_eq!(engine.stats().rooms, 0);
        assert_eq!(engine.stats().rejected_joins, 1);
    }

    #[test]
    fn unregistered_sender_is_ignored() {
        let mut engine = RelayEngine::new();
        assert!(join(&mut engine, "ghost", "r1").is_empty());
        assert_eq!(engine.stats().rooms, 0);
    }

    #[test]
    fn chat_stamps_sender_conn_and_reaches_everyone() {
        let mut engine = RelayEngine::new();
        connected(&mut engine, &["a", "b"]);
        join(&mut engine, "a", "r1");
        join(&mut engine, "b", "r1");

        let out = engine.handle(
            "b".into(),
            RelayMsg::ChatMessage {
                text: "hello".into(),
                sender_name: "Bo".into(),
                sender_conn: Some("a".into()), // spoof attempt
            },
        );
        assert_eq!(targets(&out), vec!["a", "b"]);
        match &out[0].msg {
            RelayMsg::ChatMessage { sender_conn, .. } => {
                assert_eq!(sender_conn.as_ref().map(ConnId::as_str), Some("b"))
            }
            other => panic!("expected ChatMessage, got {:?}", other),
        }
    }

    #[test]
    fn chat_outside_room_is_counted() {
        let mut engine = RelayEngine::new();
        connected(&mut engine, &["a"]);
        assert!(chat(&mut engine, "a", "anyone?").is_empty());
        assert_eq!(engine.stats().dropped_chat, 1);
    }

    #[test]
    fn signal_goes_to_target_only() {
        let mut engine = RelayEngine::new();
        connected(&mut engine, &["a", "b", "c"]);
        for c in ["a", "b", "c"] {
            join(&mut engine, c, "r1");
        }

        let out = engine.handle(
            "a".into(),
            RelayMsg::Signal {
                peer: "c".into(),
                payload: b"offer".to_vec(),
            },
        );
        assert_eq!(targets(&out), vec!["c"]);
        match &out[0].msg {
            RelayMsg::Signal { peer, .. } => assert_eq!(peer.as_str(), "a"),
            other => panic!("expected Signal, got {:?}", other),
        }
    }

    #[test]
    fn signal_across_rooms_follows_option() {
        let mut strict = RelayEngine::new();
        connected(&mut strict, &["a", "b"]);
        join(&mut strict, "a", "r1");
        join(&mut strict, "b", "r2");
        let sig = RelayMsg::Signal {
            peer: "b".into(),
            payload: vec![],
        };
        assert!(strict.handle("a".into(), sig.clone()).is_empty());
        assert_eq!(strict.stats().dropped_signals, 1);

        let mut lax = RelayEngine::with_options(
            Arc::new(NoopLogSink),
            RelayOptions {
                require_shared_room: false,
                ..RelayOptions::default()
            },
        );
        connected(&mut lax, &["a", "b"]);
        assert_eq!(targets(&lax.handle("a".into(), sig)), vec!["b"]);
    }

    #[test]
    fn ping_gets_pong() {
        let mut engine = RelayEngine::new();
        connected(&mut engine, &["a"]);
        let out = engine.handle("a".into(), RelayMsg::Ping { nonce: 9 });
        assert_eq!(out, vec![OutgoingMsg::new("a".into(), RelayMsg::Pong { nonce: 9 })]);
    }

    #[test]
    fn disconnect_notifies_remaining_members_once_each() {
        let mut engine = RelayEngine::new();
        connected(&mut engine, &["a", "b", "c"]);
        for c in ["a", "b", "c"] {
            join(&mut engine, c, "r1");
        }

        let out = engine.handle_disconnect("b".into());
        assert_eq!(targets(&out), vec!["a", "c"]);
        assert!(out.iter().all(|o| matches!(
            &o.msg,
            RelayMsg::UserLeft { conn_id } if conn_id.as_str() == "b"
        )));
        assert!(!engine.connections().is_registered(&"b".into()));

        // A second disconnect finds nothing.
        assert!(engine.handle_disconnect("b".into()).is_empty());
    }

    #[test]
    fn disconnect_forgets_presence_and_registration() {
        let log = Arc::new(MemoryLogSink::new());
        let mut engine = RelayEngine::with_log(log.clone());
        connected(&mut engine, &["joined", "lurker"]);
        join(&mut engine, "joined", "r1");

        assert!(engine.presence().duration_since(&"joined".into()).is_some());
        assert!(engine.presence().duration_since(&"lurker".into()).is_none());

        for conn in ["joined", "lurker"] {
            engine.handle_disconnect(conn.into());
            let conn: ConnId = conn.into();
            assert!(engine.presence().duration_since(&conn).is_none());
            assert!(!engine.connections().is_registered(&conn));
            assert_eq!(engine.rooms().room_of(&conn), None);
        }
        assert_eq!(engine.stats(), RelayStats::default());
        assert!(log.contains(LogLevel::Info, "joined left after"));
        assert!(log.contains(LogLevel::Info, "lurker disconnected after"));
    }

    #[test]
    fn last_leaver_deletes_room_and_history() {
        let mut engine = RelayEngine::new();
        connected(&mut engine, &["a"]);
        join(&mut engine, "a", "r1");
        chat(&mut engine, "a", "bye");

        assert!(engine.handle_disconnect("a".into()).is_empty());
        let r1: RoomId = "r1".into();
        assert!(!engine.rooms().contains_room(&r1));
        assert_eq!(engine.chat_log().len(&r1), 0);
        assert_eq!(engine.stats(), RelayStats::default());

        // Re-creating the room starts with no history.
        connected(&mut engine, &["b"]);
        let out = join(&mut engine, "b", "r1");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn history_is_capped_by_option() {
        let mut engine = RelayEngine::with_options(
            Arc::new(NoopLogSink),
            RelayOptions {
                chat_history_limit: 2,
                ..RelayOptions::default()
            },
        );
        connected(&mut engine, &["a", "b"]);
        join(&mut engine, "a", "r1");
        for t in ["1", "2", "3"] {
            chat(&mut engine, "a", t);
        }
        let out = join(&mut engine, "b", "r1");
        // 2 UserJoined + 2 replays.
        assert_eq!(out.len(), 4);
    }
}
