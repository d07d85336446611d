//! Caller-facing SMTP client.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::session::{self, Channels, Message, Request};
use super::{Connector, Event, State, Status, TcpConnector};
use crate::command::Command;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::{Capabilities, Reply};

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 64;

/// SMTP client over a single lazily-opened connection.
///
/// The first [`send`](Self::send) or [`send_raw`](Self::send_raw) on a
/// disconnected client opens the connection and runs the greeting,
/// EHLO/HELO and optional AUTH PLAIN exchange. Requests issued while that is
/// in progress wait inside the same session and go out, in order, once it
/// is ready. Only one connection is ever opened per setup.
///
/// Replies are matched to commands in issue order, so several commands may
/// be sent before awaiting any of them (pipelining).
#[derive(Debug)]
pub struct Client<C: Connector = TcpConnector> {
    config: Arc<ClientConfig>,
    connector: Arc<C>,
    events: broadcast::Sender<Event>,
    session: Option<SessionHandle>,
}

#[derive(Debug)]
struct SessionHandle {
    messages: mpsc::UnboundedSender<Message>,
    status: watch::Receiver<Status>,
}

impl SessionHandle {
    fn is_live(&self) -> bool {
        !self.messages.is_closed() && self.status.borrow().state != State::Disconnected
    }
}

impl Client<TcpConnector> {
    /// Creates a client that connects over plain TCP.
    ///
    /// No connection is made until the first command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHost`] if the configuration has no host.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> Client<C> {
    /// Creates a client that opens its transport through `connector`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHost`] if the configuration has no host.
    pub fn with_connector(config: ClientConfig, connector: C) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            config: Arc::new(config),
            connector: Arc::new(connector),
            events,
            session: None,
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Subscribes to session events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Returns the state of the current session.
    #[must_use]
    pub fn state(&self) -> State {
        self.session
            .as_ref()
            .map_or(State::Disconnected, |session| session.status.borrow().state)
    }

    /// Returns the capabilities discovered by the current session.
    ///
    /// Before any handshake this is [`Capabilities::default`].
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.session
            .as_ref()
            .map_or_else(Capabilities::default, |session| {
                session.status.borrow().capabilities
            })
    }

    /// Sends a correlated command.
    ///
    /// `\r\n` is appended. The returned future resolves with the matching
    /// reply, or [`Error::Rejected`] for a 4xx/5xx reply. Dropping it does
    /// not cancel the command.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime while no session is live.
    pub fn send(&mut self, command: impl Into<Command>) -> PendingReply {
        let (reply, rx) = oneshot::channel();
        let request = Request::Command {
            command: command.into(),
            reply,
        };
        // On failure the request (and its sender) is dropped, which resolves
        // the receiver as closed.
        let _ = self.submit(request);
        PendingReply { rx }
    }

    /// Sends a correlated command and waits for its reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] for a 4xx/5xx reply and
    /// [`Error::ConnectionClosed`] if the session ends first.
    pub async fn command(&mut self, command: impl Into<Command>) -> Result<Reply> {
        self.send(command).await
    }

    /// Writes payload bytes verbatim, with no terminator and no reply.
    ///
    /// The caller frames the payload, including the final `.\r\n` of a
    /// DATA section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the session is gone.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime while no session is live.
    pub fn send_raw(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.submit(Request::Raw(data.into()))
    }

    /// Closes the connection without a QUIT exchange.
    ///
    /// The client is disconnected as soon as this returns; commands still
    /// awaiting replies fail with [`Error::ConnectionClosed`].
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::debug!("closing session");
            let _ = session.messages.send(Message::Close);
        }
    }

    fn submit(&mut self, request: Request) -> Result<()> {
        if !self.session.as_ref().is_some_and(SessionHandle::is_live) {
            self.session = None;
        }
        let session = self
            .session
            .get_or_insert_with(|| spawn_session(&self.config, &self.connector, &self.events));

        session
            .messages
            .send(Message::Send(request))
            .map_err(|_| Error::ConnectionClosed)
    }
}

fn spawn_session<C: Connector>(
    config: &Arc<ClientConfig>,
    connector: &Arc<C>,
    events: &broadcast::Sender<Event>,
) -> SessionHandle {
    let (messages_tx, messages) = mpsc::unbounded_channel();
    let (status_tx, status) = watch::channel(Status {
        state: State::Connecting,
        capabilities: Capabilities::default(),
    });

    tokio::spawn(session::run(
        Arc::clone(connector),
        Arc::clone(config),
        Channels {
            messages,
            status: status_tx,
            events: events.clone(),
        },
    ));

    SessionHandle {
        messages: messages_tx,
        status,
    }
}

/// Reply to a command sent with [`Client::send`].
#[derive(Debug)]
#[must_use = "the reply is lost unless awaited"]
pub struct PendingReply {
    rx: oneshot::Receiver<Result<Reply>>,
}

impl Future for PendingReply {
    type Output = Result<Reply>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(Error::ConnectionClosed)))
    }
}
