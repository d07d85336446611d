//! Error types for SMTP sessions.

use std::io;
use std::time::Duration;

use crate::types::Reply;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No target host was configured.
    #[error("No SMTP host configured")]
    MissingHost,

    /// I/O error on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transport did not connect in time.
    #[error("Connection timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// A correlated command received a 4xx/5xx reply.
    #[error("SMTP error {}: {}", .0.code, .0.message_text())]
    Rejected(Reply),

    /// The server greeting was not a 220.
    #[error("Server rejected connection: {}", .0.as_str().trim_end())]
    GreetingRejected(Reply),

    /// Both EHLO and the HELO fallback were rejected.
    #[error("Server rejected HELO: {}", .0.as_str().trim_end())]
    HeloRejected(Reply),

    /// AUTH PLAIN was rejected.
    #[error("Authentication failed: {}", .0.as_str().trim_end())]
    AuthRejected(Reply),

    /// A negative reply arrived while no command was awaiting one.
    #[error("Unsolicited negative reply: {}", .0.as_str().trim_end())]
    UnsolicitedReply(Reply),

    /// A reply grew past the configured limit without terminating.
    #[error("Reply exceeds {0} bytes without a terminal line")]
    ReplyTooLong(usize),

    /// The session ended before the command completed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),
}

impl Error {
    /// Returns the server reply attached to this error, if any.
    #[must_use]
    pub const fn reply(&self) -> Option<&Reply> {
        match self {
            Self::Rejected(reply)
            | Self::GreetingRejected(reply)
            | Self::HeloRejected(reply)
            | Self::AuthRejected(reply)
            | Self::UnsolicitedReply(reply) => Some(reply),
            _ => None,
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.reply().is_some_and(Reply::is_permanent_error)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.reply().is_some_and(Reply::is_transient_error)
    }

    /// Returns true if this error tears down the whole session rather than
    /// failing a single command.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Rejected(_) | Self::MissingHost | Self::InvalidState(_)
        )
    }
}
