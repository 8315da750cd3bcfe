use std::fmt;

use rand::Rng;
use rand::distributions::Alphanumeric;

// ---- Basic types ----------------------------------------------------------

/// Room identifier, supplied by the client (usually the meeting URL).
pub type RoomId = String;
/// Display name attached to a chat message by its sender.
pub type DisplayName = String;

/// Length of server-assigned connection tokens.
pub const CONN_ID_LEN: usize = 20;

/// Opaque token identifying one live connection.
///
/// Assigned by the server at accept time and announced to the client in a
/// `Welcome`. Peers use it to address signals to each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(String);

impl ConnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random alphanumeric token of [`CONN_ID_LEN`] characters.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let id: String = rng
            .sample_iter(&Alphanumeric)
            .take(CONN_ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ConnId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
