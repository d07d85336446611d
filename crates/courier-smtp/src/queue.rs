//! Reply correlation for pipelined commands.
//!
//! SMTP servers answer commands strictly in the order they were issued, so
//! the client only needs a FIFO of completion handles: each reply unit
//! completes the oldest outstanding entry. No command text is stored.

use std::collections::VecDeque;

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::types::Reply;

/// Handshake command awaiting its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Ehlo,
    Helo,
    Auth,
}

/// One outstanding correlated command.
#[derive(Debug)]
pub(crate) enum Pending {
    /// Sent by a caller; completed through its channel.
    Caller(oneshot::Sender<Result<Reply>>),
    /// Sent by the session itself while negotiating.
    Handshake(Step),
}

impl Pending {
    /// Delivers a reply, failing the caller if the reply class is negative.
    ///
    /// Returns the handshake step instead when the entry belongs to the
    /// session.
    pub(crate) fn complete(self, reply: Reply) -> Option<(Step, Reply)> {
        match self {
            Self::Caller(tx) => {
                let result = if reply.is_negative() {
                    Err(Error::Rejected(reply))
                } else {
                    Ok(reply)
                };
                if tx.send(result).is_err() {
                    tracing::trace!("reply receiver dropped");
                }
                None
            }
            Self::Handshake(step) => Some((step, reply)),
        }
    }
}

/// FIFO of pending completions.
#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
    entries: VecDeque<Pending>,
}

impl PendingQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, pending: Pending) {
        self.entries.push_back(pending);
    }

    /// Removes the oldest entry.
    pub(crate) fn pop(&mut self) -> Option<Pending> {
        self.entries.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fails every caller entry with [`Error::ConnectionClosed`] and empties
    /// the queue.
    pub(crate) fn close(&mut self) {
        for pending in self.entries.drain(..) {
            if let Pending::Caller(tx) = pending {
                let _ = tx.send(Err(Error::ConnectionClosed));
            }
        }
    }
}
