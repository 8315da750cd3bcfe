use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, mpsc};
use std::thread;

use rustls::ServerConfig;

use crate::config::RelayOptions;
use crate::log::log_sink::LogSink;
use crate::relay::conn_ids::ConnIdAllocator;
use crate::relay::router::Router;
use crate::relay::runtime::run_server_loop;
use crate::relay::server_event::ServerEvent;
use crate::relay::transport::{spawn_connection_threads, spawn_tls_connection};
use crate::{sink_info, sink_warn};

/// Top-level runtime object for the relay service.
///
/// Owns the bound listener, logging sink, relay options and optional TLS
/// config, and knows how to spin up the central server loop plus
/// per-connection threads.
pub struct RelayServer {
    listener: TcpListener,
    log: Arc<dyn LogSink>,
    options: RelayOptions,
    tls: Option<Arc<ServerConfig>>,
}

impl RelayServer {
    /// Bind `addr` now so callers learn bind errors (and the real port when
    /// binding to `:0`) before `run`.
    pub fn bind(addr: &str, log: Arc<dyn LogSink>, options: RelayOptions) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| io::Error::new(e.kind(), format!("binding {addr}: {e}")))?;
        Ok(Self {
            listener,
            log,
            options,
            tls: None,
        })
    }

    /// Serve every connection over TLS with `config`.
    pub fn with_tls(mut self, config: Arc<ServerConfig>) -> Self {
        self.tls = Some(config);
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Blocking main loop: spawn the central server loop, accept clients.
    pub fn run(self) -> io::Result<()> {
        let Self {
            listener,
            log,
            options,
            tls,
        } = self;

        let conn_ids = ConnIdAllocator::new();

        // Events from all connections → central server loop
        let (server_tx, server_rx) = mpsc::channel::<ServerEvent>();

        {
            let log_for_loop = log.clone();
            let router = Router::with_options(log.clone(), options);
            let conn_ids = conn_ids.clone();
            thread::Builder::new()
                .name("relay-loop".into())
                .spawn(move || {
                    sink_info!(log_for_loop, "[relay] server loop started");
                    run_server_loop(router, log_for_loop, server_rx, conn_ids);
                })?;
        }

        sink_info!(
            log,
            "relay listening on {} ({})",
            listener.local_addr()?,
            if tls.is_some() { "tls" } else { "plain tcp" }
        );

        for stream in listener.incoming() {
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    sink_warn!(
                        log,
                        "incoming TCP accept failed: {:?} (continuing to accept)",
                        e
                    );
                    continue;
                }
            };

            let conn_id = conn_ids.allocate();
            let peer = stream
                .peer_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "?".into());
            sink_info!(log, "accepted {} as {}", peer, conn_id);

            let spawned = match &tls {
                Some(config) => spawn_tls_connection(
                    conn_id.clone(),
                    stream,
                    config.clone(),
                    server_tx.clone(),
                    log.clone(),
                ),
                None => {
                    spawn_connection_threads(conn_id.clone(), stream, server_tx.clone(), log.clone())
                }
            };

            if let Err(e) = spawned {
                sink_warn!(log, "failed to start connection {}: {:?}", conn_id, e);
                conn_ids.release(&conn_id);
            }
        }

        Ok(())
    }
}
