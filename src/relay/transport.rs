use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use rustls::{ServerConfig, ServerConnection, StreamOwned};

use crate::log::log_sink::LogSink;
use crate::relay::protocol::{
    ConnId, FrameDecoder, FrameError, MAX_BODY_LEN, RelayMsg, decode_msg,
    read_msg as proto_read_msg, write_msg as proto_write_msg,
};
use crate::relay::server_event::ServerEvent;
use crate::{sink_debug, sink_info, sink_warn};

/// How long a TLS connection thread waits for inbound bytes before checking
/// its outbound queue again.
pub const TLS_POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Upper bound for a client to finish the TLS handshake.
pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin wrapper over a blocking stream that speaks in `RelayMsg`.
pub struct Connection<S> {
    pub conn_id: ConnId,
    stream: S,
}

impl<S> Connection<S>
where
    S: Read + Write,
{
    pub fn new(conn_id: ConnId, stream: S) -> Self {
        Self { conn_id, stream }
    }

    pub fn recv(&mut self) -> Result<RelayMsg, FrameError> {
        proto_read_msg(&mut self.stream)
    }

    pub fn send(&mut self, msg: &RelayMsg) -> Result<(), FrameError> {
        proto_write_msg(&mut self.stream, msg)
    }
}

impl Connection<TcpStream> {
    /// Close both directions so the peer (and our other thread) notice.
    fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

fn log_read_error(log: &dyn LogSink, conn_id: &ConnId, err: &FrameError) {
    if err.is_disconnect() {
        sink_debug!(log, "[conn {}] closed by peer", conn_id);
    } else {
        match err {
            FrameError::Io(io_e) => sink_warn!(
                log,
                "[conn {}] IO error in reader: {} (kind={:?})",
                conn_id,
                io_e,
                io_e.kind()
            ),
            FrameError::Proto(p) => {
                sink_warn!(log, "[conn {}] malformed frame, closing: {}", conn_id, p)
            }
        }
    }
}

/// Spawn reader + writer threads for a single plain TCP client.
///
/// `server_tx` is the Sender<ServerEvent> that talks to the central server loop.
pub fn spawn_connection_threads(
    conn_id: ConnId,
    stream: TcpStream,
    server_tx: Sender<ServerEvent>,
    log: Arc<dyn LogSink>,
) -> io::Result<()> {
    let (to_client_tx, to_client_rx) = mpsc::channel::<RelayMsg>();

    let read_stream = stream.try_clone()?;
    let write_stream = stream;

    server_tx
        .send(ServerEvent::RegisterClient {
            conn_id: conn_id.clone(),
            to_client: to_client_tx,
        })
        .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "server loop is gone"))?;

    // READER THREAD: socket -> ServerEvent::MsgFromClient
    {
        let server_tx = server_tx.clone();
        let log = log.clone();
        let conn_id = conn_id.clone();
        thread::spawn(move || {
            let mut conn = Connection::new(conn_id.clone(), read_stream);

            loop {
                match conn.recv() {
                    Ok(msg) => {
                        let ev = ServerEvent::MsgFromClient {
                            conn_id: conn_id.clone(),
                            msg,
                        };
                        if server_tx.send(ev).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log_read_error(log.as_ref(), &conn_id, &e);
                        conn.shutdown();
                        let _ = server_tx.send(ServerEvent::Disconnected { conn_id });
                        break;
                    }
                }
            }
        });
    }

    // WRITER THREAD: to_client_rx -> socket
    thread::spawn(move || {
        let mut conn = Connection::new(conn_id.clone(), write_stream);

        // Ends when the server loop drops our sender.
        while let Ok(msg) = to_client_rx.recv() {
            if let Err(e) = conn.send(&msg) {
                sink_warn!(log, "[conn {}] error sending {}: {}", conn_id, msg.kind(), e);
                conn.shutdown();
                let _ = server_tx.send(ServerEvent::Disconnected { conn_id });
                return;
            }
        }
        conn.shutdown();
    });

    Ok(())
}

/// Spawn the single thread serving one TLS client.
///
/// A rustls session cannot be split into independent read and write halves,
/// so one thread owns it: it completes the handshake, registers with the
/// server loop, then alternates between flushing queued outbound messages
/// and polling the socket with a short read timeout.
pub fn spawn_tls_connection(
    conn_id: ConnId,
    stream: TcpStream,
    tls: Arc<ServerConfig>,
    server_tx: Sender<ServerEvent>,
    log: Arc<dyn LogSink>,
) -> io::Result<()> {
    let session = ServerConnection::new(tls)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("TLS session: {e}")))?;

    thread::spawn(move || {
        let mut tls_stream = StreamOwned::new(session, stream);

        // Reported even though nothing registered, so the loop releases the id.
        if let Err(e) = complete_handshake(&mut tls_stream) {
            sink_warn!(log, "[conn {}] TLS handshake failed: {}", conn_id, e);
            let _ = tls_stream.sock.shutdown(Shutdown::Both);
            let _ = server_tx.send(ServerEvent::Disconnected { conn_id });
            return;
        }
        sink_debug!(log, "[conn {}] TLS handshake complete", conn_id);

        let (to_client_tx, to_client_rx) = mpsc::channel::<RelayMsg>();
        let registered = server_tx.send(ServerEvent::RegisterClient {
            conn_id: conn_id.clone(),
            to_client: to_client_tx,
        });
        if registered.is_err() {
            let _ = tls_stream.sock.shutdown(Shutdown::Both);
            return;
        }

        match serve_tls(&mut tls_stream, &conn_id, &to_client_rx, &server_tx) {
            Ok(()) => sink_info!(log, "[conn {}] TLS session ended", conn_id),
            Err(e) => log_read_error(log.as_ref(), &conn_id, &e),
        }

        tls_stream.conn.send_close_notify();
        let _ = tls_stream.flush();
        let _ = tls_stream.sock.shutdown(Shutdown::Both);
        let _ = server_tx.send(ServerEvent::Disconnected { conn_id });
    });

    Ok(())
}

fn complete_handshake(tls: &mut StreamOwned<ServerConnection, TcpStream>) -> io::Result<()> {
    tls.sock.set_read_timeout(Some(TLS_HANDSHAKE_TIMEOUT))?;
    while tls.conn.is_handshaking() {
        tls.conn.complete_io(&mut tls.sock)?;
    }
    tls.sock.set_read_timeout(Some(TLS_POLL_INTERVAL))?;
    Ok(())
}

/// Returns `Ok(())` when either side closed cleanly.
fn serve_tls(
    tls: &mut StreamOwned<ServerConnection, TcpStream>,
    conn_id: &ConnId,
    outbound: &Receiver<RelayMsg>,
    server_tx: &Sender<ServerEvent>,
) -> Result<(), FrameError> {
    let mut decoder = FrameDecoder::new(MAX_BODY_LEN);
    let mut buf = [0u8; 4096];

    loop {
        loop {
            match outbound.try_recv() {
                Ok(msg) => proto_write_msg(tls, &msg)?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }

        let n = match tls.read(&mut buf) {
            Ok(0) if decoder.buffered() > 0 => {
                let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "closed mid-frame");
                return Err(eof.into());
            }
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        decoder.push(&buf[..n]);
        while let Some((msg_type, body)) = decoder.next_frame()? {
            let msg = decode_msg(msg_type, &body)?;
            let ev = ServerEvent::MsgFromClient {
                conn_id: conn_id.clone(),
                msg,
            };
            if server_tx.send(ev).is_err() {
                return Ok(());
            }
        }
    }
}
