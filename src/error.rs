//! Error types.

// All lovingly made without thiserror, same as the rest of the crate.

/// Errors from tokenizing an IRC message.
#[derive(Clone, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum ParseError {
    /// The line exceeds permissible length limits.
    TooLong,
    /// The line is empty or consists only of whitespace.
    Empty,
    /// Tags were introduced with `@` but none followed.
    NoTags,
    /// A source was introduced with `:` but none followed.
    NoSource,
    /// There was no command or numeric in the line.
    NoKind,
    /// The command is neither alphabetic nor a three-digit numeric.
    InvalidKind(String),
    /// The line contains a byte that may not appear in a message.
    InvalidByte(u8),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::TooLong => write!(f, "invalid msg: length limits exceeded"),
            ParseError::Empty => write!(f, "invalid msg: empty line"),
            ParseError::NoTags => write!(f, "invalid msg: no tags after @"),
            ParseError::NoSource => write!(f, "invalid msg: no source after :"),
            ParseError::NoKind => write!(f, "invalid msg: missing command"),
            ParseError::InvalidKind(k) => write!(f, "invalid msg: bad command \"{k}\""),
            ParseError::InvalidByte(b) => {
                write!(f, "invalid msg: forbidden byte '{}'", b.escape_ascii())
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for std::io::Error {
    fn from(value: ParseError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, value)
    }
}

/// Errors from handling one message after it has been tokenized.
///
/// These never end a session. The dispatcher logs them and moves on to the next line.
#[derive(Clone, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum HandlerError {
    /// A required argument is missing.
    MissingArg(&'static str),
    /// A required source (prefix) is missing.
    MissingSource,
    /// An argument has an invalid value.
    InvalidArg(&'static str, String),
    /// The message refers to a channel that isn't in the state store.
    UnknownChannel(String),
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerError::MissingArg(a) => write!(f, "missing argument {a}"),
            HandlerError::MissingSource => write!(f, "missing source"),
            HandlerError::InvalidArg(a, v) => write!(f, "invalid argument {a}: got \"{v}\""),
            HandlerError::UnknownChannel(c) => write!(f, "unknown channel {c}"),
        }
    }
}

impl std::error::Error for HandlerError {}

/// Errors that end a session.
///
/// Every one of these is answered by tearing the session down and,
/// if a reconnect loop is driving it, building a fresh one after a backoff.
#[derive(Debug)]
#[non_exhaustive]
pub enum SessionError {
    /// The transport failed (connect, TLS, read, or write).
    Io(std::io::Error),
    /// Nothing was received from the server within the read timeout.
    Timeout,
    /// The server closed the link with an `ERROR` message.
    Closed(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Io(e) => write!(f, "transport error: {e}"),
            SessionError::Timeout => write!(f, "read timed out"),
            SessionError::Closed(reason) => write!(f, "closed by server: {reason}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let SessionError::Io(e) = self {
            Some(e)
        } else {
            None
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(value: std::io::Error) -> Self {
        SessionError::Io(value)
    }
}

impl From<SessionError> for std::io::Error {
    fn from(value: SessionError) -> Self {
        use std::io::{Error, ErrorKind};
        match value {
            SessionError::Io(e) => e,
            SessionError::Timeout => Error::new(ErrorKind::TimedOut, SessionError::Timeout),
            v => Error::new(ErrorKind::ConnectionAborted, v),
        }
    }
}
