use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RelayOptions;
use crate::log::NoopLogSink;
use crate::log::log_sink::LogSink;
use crate::relay::coordinator::RelayEngine;
use crate::relay::protocol::{ConnId, RelayMsg};
use crate::relay::types::OutgoingMsg;
use crate::sink_debug;

/// Router glues the relay state machine to per-connection outboxes.
pub struct Router {
    engine: RelayEngine,
    outboxes: HashMap<ConnId, Vec<RelayMsg>>,
    log: Arc<dyn LogSink>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::with_log(Arc::new(NoopLogSink))
    }

    pub fn with_log(log: Arc<dyn LogSink>) -> Self {
        Self::with_engine(log.clone(), RelayEngine::with_log(log))
    }

    pub fn with_options(log: Arc<dyn LogSink>, options: RelayOptions) -> Self {
        Self::with_engine(log.clone(), RelayEngine::with_options(log, options))
    }

    pub fn with_engine(log: Arc<dyn LogSink>, engine: RelayEngine) -> Self {
        Self {
            engine,
            outboxes: HashMap::new(),
            log,
        }
    }

    pub fn is_registered(&self, conn: &ConnId) -> bool {
        self.outboxes.contains_key(conn)
    }

    /// Register a new connection: create its outbox and queue its `Welcome`.
    pub fn register_client(&mut self, conn: ConnId) {
        self.outboxes.entry(conn.clone()).or_default();
        let out_msgs = self.engine.handle_connect(conn);
        self.enqueue_all(out_msgs);
    }

    /// Unregister a connection:
    /// - removes its outbox
    /// - lets the engine clean up rooms/presence and emit `UserLeft`.
    pub fn unregister_client(&mut self, conn: ConnId) {
        self.outboxes.remove(&conn);
        let out_msgs = self.engine.handle_disconnect(conn);
        self.enqueue_all(out_msgs);
    }

    /// Main entrypoint: handle a message coming *from* a connection.
    pub fn handle_from_client(&mut self, from: ConnId, msg: RelayMsg) {
        let out_msgs = self.engine.handle(from, msg);
        self.enqueue_all(out_msgs);
    }

    /// Drain and return all outgoing messages for a given connection.
    ///
    /// The outbox stays registered (empty) afterwards.
    pub fn take_outgoing_for(&mut self, conn: &ConnId) -> Vec<RelayMsg> {
        self.outboxes
            .get_mut(conn)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Peek (non-destructive) at outgoing messages for a connection.
    pub fn outgoing_for(&self, conn: &ConnId) -> &[RelayMsg] {
        self.outboxes.get(conn).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drain all pending outgoing messages for all connections.
    ///
    /// Per-connection order is preserved; order across connections is not.
    pub fn drain_all_outgoing(&mut self) -> Vec<(ConnId, RelayMsg)> {
        let mut result = Vec::new();
        for (conn, queue) in self.outboxes.iter_mut() {
            for m in queue.drain(..) {
                result.push((conn.clone(), m));
            }
        }
        result
    }

    pub fn engine(&self) -> &RelayEngine {
        &self.engine
    }

    fn enqueue_all(&mut self, out_msgs: Vec<OutgoingMsg>) {
        for out_msg in out_msgs {
            self.enqueue(out_msg);
        }
    }

    fn enqueue(&mut self, out_msg: OutgoingMsg) {
        match self.outboxes.get_mut(&out_msg.conn_target) {
            Some(queue) => queue.push(out_msg.msg),
            None => sink_debug!(
                self.log,
                "no outbox for {}; dropping {}",
                out_msg.conn_target,
                out_msg.msg.kind()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn join(router: &mut Router, who: &ConnId, room: &str) {
        router.handle_from_client(
            who.clone(),
            RelayMsg::JoinCall {
                room_id: room.into(),
            },
        );
    }

    #[test]
    fn register_queues_welcome() {
        let mut router = Router::new();
        let a = ConnId::from("a");
        router.register_client(a.clone());

        assert!(router.is_registered(&a));
        match router.take_outgoing_for(&a).as_slice() {
            [RelayMsg::Welcome { conn_id }] => assert_eq!(conn_id, &a),
            other => panic!("expected one Welcome, got {:?}", other),
        }
        assert!(router.outgoing_for(&a).is_empty());
    }

    #[test]
    fn join_chat_and_signal_are_routed() {
        let mut router = Router::new();
        let a = ConnId::from("a");
        let b = ConnId::from("b");
        router.register_client(a.clone());
        router.register_client(b.clone());
        router.drain_all_outgoing();

        join(&mut router, &a, "r1");
        join(&mut router, &b, "r1");
        assert_eq!(router.take_outgoing_for(&a).len(), 2);
        assert_eq!(router.take_outgoing_for(&b).len(), 1);

        router.handle_from_client(
            a.clone(),
            RelayMsg::Signal {
                peer: b.clone(),
                payload: b"v=0\r\n".to_vec(),
            },
        );
        assert!(router.take_outgoing_for(&a).is_empty());
        match router.take_outgoing_for(&b).as_slice() {
            [RelayMsg::Signal { peer, payload }] => {
                assert_eq!(peer, &a);
                assert_eq!(payload, b"v=0\r\n");
            }
            other => panic!("expected forwarded Signal, got {:?}", other),
        }
    }

    #[test]
    fn unregister_drops_outbox_and_notifies_room() {
        let mut router = Router::new();
        let a = ConnId::from("a");
        let b = ConnId::from("b");
        router.register_client(a.clone());
        router.register_client(b.clone());
        join(&mut router, &a, "r1");
        join(&mut router, &b, "r1");
        router.drain_all_outgoing();

        router.unregister_client(b.clone());
        assert!(!router.is_registered(&b));
        match router.take_outgoing_for(&a).as_slice() {
            [RelayMsg::UserLeft { conn_id }] => assert_eq!(conn_id, &b),
            other => panic!("expected UserLeft, got {:?}", other),
        }
        assert!(router.take_outgoing_for(&b).is_empty());
    }

    #[test]
    fn drain_all_outgoing_collects_every_outbox() {
        let mut router = Router::new();
        router.register_client("a".into());
        router.register_client("b".into());

        let mut outgoing = router.drain_all_outgoing();
        outgoing.sort_by(|(x, _), (y, _)| x.cmp(y));

        assert_eq!(outgoing.len(), 2);
        assert_eq!(outgoing[0].0.as_str(), "a");
        assert_eq!(outgoing[1].0.as_str(), "b");
        assert!(router.drain_all_outgoing().is_empty());
    }
}
