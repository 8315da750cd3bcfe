use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};

use crate::log::log_sink::LogSink;
use crate::relay::conn_ids::ConnIdAllocator;
use crate::relay::protocol::{ConnId, RelayMsg};
use crate::relay::router::Router;
use crate::relay::server_event::ServerEvent;
use crate::{sink_debug, sink_error, sink_info, sink_warn};

/// Central server loop: owns the Router and maps conn_id -> Sender<RelayMsg>.
///
/// Runs until every `Sender<ServerEvent>` is dropped.
pub fn run_server_loop(
    mut router: Router,
    log: Arc<dyn LogSink>,
    rx: Receiver<ServerEvent>,
    conn_ids: ConnIdAllocator,
) {
    use ServerEvent::*;

    let mut clients: HashMap<ConnId, Sender<RelayMsg>> = HashMap::new();

    while let Ok(ev) = rx.recv() {
        match ev {
            RegisterClient { conn_id, to_client } => {
                if clients.contains_key(&conn_id) {
                    // Dropping `to_client` closes the newcomer's writer.
                    sink_error!(log, "duplicate registration for {}; refusing", conn_id);
                    continue;
                }
                clients.insert(conn_id.clone(), to_client);
                router.register_client(conn_id.clone());

                sink_info!(
                    log,
                    "registered {} in server loop (now {} clients)",
                    conn_id,
                    clients.len()
                );
            }

            MsgFromClient { conn_id, msg } => {
                sink_debug!(log, "MsgFromClient from {}: {}", conn_id, msg.kind());
                router.handle_from_client(conn_id, msg);
            }

            Disconnected { conn_id } => {
                // Release first: a failed TLS handshake reports an id that
                // never registered. Reader and writer may both report the
                // same loss; release is idempotent.
                conn_ids.release(&conn_id);
                if clients.remove(&conn_id).is_none() {
                    sink_debug!(log, "{} gone before registering", conn_id);
                    continue;
                }
                sink_info!(log, "{} disconnected (transport)", conn_id);
                router.unregister_client(conn_id);
            }
        }

        deliver(&mut router, &clients, log.as_ref());
    }

    sink_info!(
        log,
        "ServerEvent channel closed; server loop shutting down ({} clients left)",
        clients.len()
    );
}

fn deliver(router: &mut Router, clients: &HashMap<ConnId, Sender<RelayMsg>>, log: &dyn LogSink) {
    for (target, out_msg) in router.drain_all_outgoing() {
        match clients.get(&target) {
            Some(tx) => {
                if tx.send(out_msg).is_err() {
                    sink_warn!(
                        log,
                        "failed to deliver message to {} (channel closed)",
                        target
                    );
                }
            }
            None => sink_warn!(log, "no client {} to deliver outgoing message", target),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use crate::log::NoopLogSink;

    fn spawn_loop() -> Sender<ServerEvent> {
        let (ev_tx, ev_rx) = mpsc::channel::<ServerEvent>();
        let log: Arc<dyn LogSink> = Arc::new(NoopLogSink);
        thread::spawn(move || {
            run_server_loop(Router::new(), log, ev_rx, ConnIdAllocator::new());
        });
        ev_tx
    }

    fn recv(rx: &mpsc::Receiver<RelayMsg>) -> RelayMsg {
        rx.recv_timeout(Duration::from_millis(500))
            .expect("expected a message from server")
    }

    #[test]
    fn server_loop_welcomes_and_answers_ping() {
        let ev_tx = spawn_loop();
        let (to_client_tx, to_client_rx) = mpsc::channel::<RelayMsg>();
        let conn_id = ConnId::from("c1");

        ev_tx
            .send(ServerEvent::RegisterClient {
                conn_id: conn_id.clone(),
                to_client: to_client_tx,
            })
            .unwrap();
        match recv(&to_client_rx) {
            RelayMsg::Welcome { conn_id: id } => assert_eq!(id, conn_id),
            other => panic!("expected Welcome, got {:?}", other),
        }

        ev_tx
            .send(ServerEvent::MsgFromClient {
                conn_id,
                msg: RelayMsg::Ping { nonce: 5 },
            })
            .unwrap();
        assert_eq!(recv(&to_client_rx), RelayMsg::Pong { nonce: 5 });
    }

    #[test]
    fn duplicate_registration_is_refused() {
        let ev_tx = spawn_loop();
        let (first_tx, first_rx) = mpsc::channel::<RelayMsg>();
        let (second_tx, second_rx) = mpsc::channel::<RelayMsg>();

        for tx in [first_tx, second_tx] {
            ev_tx
                .send(ServerEvent::RegisterClient {
                    conn_id: "same".into(),
                    to_client: tx,
                })
                .unwrap();
        }

        assert!(matches!(recv(&first_rx), RelayMsg::Welcome { .. }));
        // The second sender was dropped by the loop.
        assert!(matches!(
            second_rx.recv_timeout(Duration::from_millis(500)),
            Err(mpsc::RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn ids_are_released_even_without_registration() {
        let conn_ids = ConnIdAllocator::new();
        let failed_handshake = conn_ids.allocate();
        let served = conn_ids.allocate();
        assert_eq!(conn_ids.live_count(), 2);

        let (ev_tx, ev_rx) = mpsc::channel::<ServerEvent>();
        let log: Arc<dyn LogSink> = Arc::new(NoopLogSink);
        let loop_ids = conn_ids.clone();
        let server = thread::spawn(move || {
            run_server_loop(Router::new(), log, ev_rx, loop_ids);
        });

        let (to_client, _client_rx) = mpsc::channel::<RelayMsg>();
        ev_tx
            .send(ServerEvent::RegisterClient {
                conn_id: served.clone(),
                to_client,
            })
            .unwrap();
        for conn_id in [failed_handshake, served.clone(), served] {
            ev_tx.send(ServerEvent::Disconnected { conn_id }).unwrap();
        }
        drop(ev_tx);
        server.join().unwrap();

        assert_eq!(conn_ids.live_count(), 0);
    }

    #[test]
    fn disconnect_is_announced_to_room() {
        let ev_tx = spawn_loop();
        let (a_tx, a_rx) = mpsc::channel::<RelayMsg>();
        let (b_tx, b_rx) = mpsc::channel::<RelayMsg>();

        for (id, tx) in [("a", a_tx), ("b", b_tx)] {
            ev_tx
                .send(ServerEvent::RegisterClient {
                    conn_id: id.into(),
                    to_client: tx,
                })
                .unwrap();
            ev_tx
                .send(ServerEvent::MsgFromClient {
                    conn_id: id.into(),
                    msg: RelayMsg::JoinCall {
                        room_id: "r1".into(),
                    },
                })
                .unwrap();
        }

        // a: Welcome, UserJoined(a), UserJoined(b)
        for _ in 0..3 {
            recv(&a_rx);
        }
        ev_tx
            .send(ServerEvent::Disconnected {
                conn_id: "b".into(),
            })
            .unwrap();
        ev_tx
            .send(ServerEvent::Disconnected {
                conn_id: "b".into(),
            })
            .unwrap();

        match recv(&a_rx) {
            RelayMsg::UserLeft { conn_id } => assert_eq!(conn_id.as_str(), "b"),
            other => panic!("expected UserLeft, got {:?}", other),
        }
        assert!(a_rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(b_rx);
    }
}
