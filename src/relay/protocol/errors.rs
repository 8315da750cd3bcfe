use std::{error::Error, fmt, io};

/// Protocol-level errors (body parsing/format issues, etc.).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    UnknownType(u8),
    Truncated,
    InvalidUtf8,
    TooLarge,
    InvalidFormat(&'static str),
    StringTooLong { max: usize, actual: usize },
    TooManyMembers { max: usize, actual: usize },
}

impl fmt::Display for ProtoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType(t) => write!(f, "unknown message type 0x{t:02x}"),
            Self::Truncated => f.write_str("message body truncated"),
            Self::InvalidUtf8 => f.write_str("string field is not valid UTF-8"),
            Self::TooLarge => f.write_str("frame body exceeds maximum length"),
            Self::InvalidFormat(why) => write!(f, "invalid format: {why}"),
            Self::StringTooLong { max, actual } => {
                write!(f, "string of {actual} bytes exceeds {max}")
            }
            Self::TooManyMembers { max, actual } => {
                write!(f, "member list of {actual} exceeds {max}")
            }
        }
    }
}

impl Error for ProtoError {}

/// Frame-level error wrapper: IO vs protocol.
#[derive(Debug)]
pub enum FrameError {
    Io(io::Error),
    Proto(ProtoError),
}

impl FrameError {
    /// True when the peer simply went away (EOF / reset), as opposed to
    /// sending garbage.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            Self::Proto(_) => false,
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Proto(e) => write!(f, "protocol: {e}"),
        }
    }
}

impl Error for FrameError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Proto(e) => Some(e),
        }
    }
}

impl From<io::Error> for FrameError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ProtoError> for FrameError {
    fn from(e: ProtoError) -> Self {
        Self::Proto(e)
    }
}
