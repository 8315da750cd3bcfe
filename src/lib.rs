//! roomrelay is the signaling and session-relay core behind browser video
//! meetings.
//!
//! Clients connect over TCP (optionally TLS), join a room named by the
//! meeting URL, and the relay then:
//! - announces joins and departures to the room,
//! - forwards opaque WebRTC negotiation blobs between two peers,
//! - broadcasts chat and replays the room's history to late joiners.
//!
//! The crate ships one binary, `relay_server`.

/// Handles configuration loading and typed relay settings.
pub mod config;
/// Logging utilities: sinks, the file logger and `sink_*!` macros.
pub mod log;
/// Relay core, wire protocol and socket runtime.
pub mod relay;
