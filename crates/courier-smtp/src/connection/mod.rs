//! SMTP connection lifecycle.
//!
//! A live connection is owned by a session task; [`Client`] is the handle
//! callers use to talk to it.

mod client;
mod session;
mod stream;

use std::fmt;
use std::sync::Arc;

pub use client::{Client, PendingReply};
pub use stream::{Connector, TcpConnector};

use crate::error::Error;
use crate::types::{Capabilities, Reply};

/// Lifecycle state of a session.
///
/// ```text
/// Disconnected → Connecting → Greeting → Handshaking → [Authenticating] → Ready
///       ↑______________________________________________________________________|
/// ```
///
/// `Disconnected` is reachable from every state on error or close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No live connection.
    Disconnected,
    /// Transport connect in progress.
    Connecting,
    /// Waiting for the 220 greeting.
    Greeting,
    /// EHLO/HELO in flight.
    Handshaking,
    /// AUTH PLAIN in flight.
    Authenticating,
    /// Caller commands are written as they arrive.
    Ready,
}

/// What a session does with a caller request in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Write,
    Defer,
    Reject,
}

impl State {
    /// Returns true once the handshake has completed.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns true while a connection is being set up.
    #[must_use]
    pub const fn is_establishing(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Greeting | Self::Handshaking | Self::Authenticating
        )
    }

    pub(crate) const fn admission(self) -> Admission {
        match self {
            Self::Ready => Admission::Write,
            Self::Connecting | Self::Greeting | Self::Handshaking | Self::Authenticating => {
                Admission::Defer
            }
            Self::Disconnected => Admission::Reject,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Greeting => "awaiting greeting",
            Self::Handshaking => "handshaking",
            Self::Authenticating => "authenticating",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Session notifications for the embedding application.
#[derive(Debug, Clone)]
pub enum Event {
    /// The server greeting was accepted.
    Connected,
    /// A session-level failure; the connection is closed afterwards.
    Error(Arc<Error>),
    /// A positive reply arrived with no command awaiting it. It is dropped.
    UnsolicitedReply(Reply),
    /// The transport was closed.
    Closed,
}

/// Snapshot published by the session task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Status {
    pub(crate) state: State,
    pub(crate) capabilities: Capabilities,
}
