//! Meeting-room relay: connection lifecycle, room membership, chat history
//! and WebRTC signal forwarding.
//!
//! The core ([`coordinator::RelayEngine`]) is a pure state machine that turns
//! one inbound event into a list of [`types::OutgoingMsg`]. [`router`] keeps
//! per-connection outboxes, [`runtime`] runs the single server loop, and
//! [`transport`] / [`relay_server`] put it on TCP or TLS sockets.

pub mod chat;
pub mod conn_ids;
pub mod connections;
pub mod coordinator;
pub mod errors;
pub mod presence;
pub mod protocol;
pub mod relay_server;
pub mod rooms;
pub mod router;
pub mod run;
pub mod runtime;
pub mod server_event;
pub mod signal;
pub mod tls;
pub mod transport;
pub mod types;

pub use chat::{ChatLog, ChatMessage, InMemoryChatLog};
pub use connections::{ConnectionRegistry, InMemoryConnections};
pub use coordinator::{RelayEngine, RelayStores};
pub use errors::{DropReason, RelayStats};
pub use presence::{InMemoryPresence, PresenceTracker};
pub use rooms::{InMemoryRooms, SessionRegistry};
pub use router::Router;
pub use types::OutgoingMsg;
