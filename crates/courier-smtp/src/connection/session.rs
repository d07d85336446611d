//! Session task: owns one transport connection.
//!
//! Transport events drive the reassembler, every reply unit is routed by
//! the current [`State`], and caller requests are either written, deferred
//! until the handshake completes, or rejected.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::{Admission, Connector, Event, State, Status};
use crate::command::Command;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::parser::Reassembler;
use crate::queue::{Pending, PendingQueue, Step};
use crate::types::{Capabilities, Reply, ReplyCode};

/// Read buffer size.
const READ_BUFFER_SIZE: usize = 8192;

/// Caller request carried to the session task.
#[derive(Debug)]
pub(crate) enum Request {
    /// Correlated command; completed by the matching reply.
    Command {
        command: Command,
        reply: oneshot::Sender<Result<Reply>>,
    },
    /// Payload written verbatim, no reply expected.
    Raw(Bytes),
}

impl Request {
    fn reject(self, err: Error) {
        if let Self::Command { reply, .. } = self {
            let _ = reply.send(Err(err));
        }
    }
}

/// Message on the client → session channel.
#[derive(Debug)]
pub(crate) enum Message {
    Send(Request),
    Close,
}

/// Channels a session shares with its client.
pub(crate) struct Channels {
    pub(crate) messages: mpsc::UnboundedReceiver<Message>,
    pub(crate) status: watch::Sender<Status>,
    pub(crate) events: broadcast::Sender<Event>,
}

/// Connects and runs a session until it closes.
pub(crate) async fn run<C: Connector>(
    connector: Arc<C>,
    config: Arc<ClientConfig>,
    mut channels: Channels,
) {
    tracing::debug!(host = %config.host, port = config.port, "connecting");

    let Some((stream, deferred)) = establish(connector.as_ref(), &config, &mut channels).await
    else {
        return;
    };

    let mut session = Session::new(stream, config, channels, deferred);
    session.transition(State::Greeting);
    session.drive().await;
}

/// Opens the transport, holding back requests that arrive meanwhile.
///
/// A close request cancels the connect. Returns `None` if the transport
/// never opened; every held or queued request has been failed by then.
async fn establish<C: Connector>(
    connector: &C,
    config: &ClientConfig,
    channels: &mut Channels,
) -> Option<(C::Stream, VecDeque<Request>)> {
    let mut deferred = VecDeque::new();

    let outcome = {
        let connect = tokio::time::timeout(
            config.connect_timeout,
            connector.connect(&config.host, config.port),
        );
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => break match result {
                    Ok(Ok(stream)) => Ok(stream),
                    Ok(Err(e)) => Err(Some(Error::Io(e))),
                    Err(_) => Err(Some(Error::ConnectTimeout(config.connect_timeout))),
                },
                message = channels.messages.recv() => match message {
                    Some(Message::Send(request)) => deferred.push_back(request),
                    Some(Message::Close) | None => break Err(None),
                },
            }
        }
    };

    match outcome {
        Ok(stream) => Some((stream, deferred)),
        Err(err) => {
            abandon(channels, deferred, err);
            None
        }
    }
}

/// Gives up on a connection that never opened.
///
/// `err` is `None` when the client closed before the connect finished.
fn abandon(channels: &mut Channels, deferred: VecDeque<Request>, err: Option<Error>) {
    match err {
        Some(err) => {
            tracing::warn!(error = %err, "connection failed");
            let _ = channels.events.send(Event::Error(Arc::new(err)));
        }
        None => tracing::debug!("connect cancelled"),
    }
    channels
        .status
        .send_modify(|status| status.state = State::Disconnected);
    for request in deferred {
        request.reject(Error::ConnectionClosed);
    }
    reject_queued(&mut channels.messages, || Error::ConnectionClosed);
}

/// Rejects every message still sitting in the channel.
fn reject_queued(messages: &mut mpsc::UnboundedReceiver<Message>, err: impl Fn() -> Error) {
    messages.close();
    while let Ok(message) = messages.try_recv() {
        if let Message::Send(request) = message {
            request.reject(err());
        }
    }
}

async fn idle(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

struct Session<S> {
    stream: S,
    config: Arc<ClientConfig>,
    state: State,
    reassembler: Reassembler,
    pending: PendingQueue,
    deferred: VecDeque<Request>,
    channels: Channels,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(
        stream: S,
        config: Arc<ClientConfig>,
        channels: Channels,
        deferred: VecDeque<Request>,
    ) -> Self {
        let reassembler = Reassembler::new(config.max_reply_length);
        Self {
            stream,
            config,
            state: State::Connecting,
            reassembler,
            pending: PendingQueue::new(),
            deferred,
            channels,
        }
    }

    async fn drive(mut self) {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        let outcome = loop {
            tokio::select! {
                read = self.stream.read(&mut buf) => match read {
                    Ok(0) => {
                        tracing::debug!("server closed the connection");
                        break Ok(());
                    }
                    Ok(n) => {
                        if let Err(e) = self.on_bytes(&buf[..n]).await {
                            break Err(e);
                        }
                    }
                    Err(e) => break Err(Error::Io(e)),
                },
                message = self.channels.messages.recv() => match message {
                    Some(Message::Send(request)) => {
                        if let Err(e) = self.on_request(request).await {
                            break Err(e);
                        }
                    }
                    Some(Message::Close) | None => {
                        tracing::debug!("close requested");
                        break Ok(());
                    }
                },
                () = idle(self.config.idle_timeout) => {
                    tracing::debug!("idle timeout");
                    break Ok(());
                }
            }
        };

        self.shutdown(outcome).await;
    }

    async fn shutdown(mut self, outcome: Result<()>) {
        if let Err(err) = outcome {
            tracing::warn!(error = %err, state = %self.state, "session failed");
            let _ = self.channels.events.send(Event::Error(Arc::new(err)));
        }

        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!(?e, "transport shutdown failed");
        }
        self.transition(State::Disconnected);

        if !self.pending.is_empty() || !self.deferred.is_empty() {
            tracing::debug!(
                pending = self.pending.len(),
                deferred = self.deferred.len(),
                "failing outstanding commands"
            );
        }
        self.pending.close();
        for request in self.deferred.drain(..) {
            request.reject(Error::ConnectionClosed);
        }
        reject_queued(&mut self.channels.messages, || Error::ConnectionClosed);

        let _ = self.channels.events.send(Event::Closed);
    }

    fn transition(&mut self, state: State) {
        tracing::trace!(from = %self.state, to = %state, "state transition");
        self.channels.status.send_modify(|status| status.state = state);
        self.state = state;
    }

    fn set_capabilities(&self, capabilities: Capabilities) {
        self.channels
            .status
            .send_modify(|status| status.capabilities = capabilities);
    }

    async fn on_bytes(&mut self, chunk: &[u8]) -> Result<()> {
        self.reassembler.push(chunk);
        while let Some(unit) = self.reassembler.next_unit()? {
            let reply = Reply::parse(unit);
            tracing::trace!(%reply, "reply");
            self.dispatch(reply).await?;
        }
        Ok(())
    }

    async fn dispatch(&mut self, reply: Reply) -> Result<()> {
        match self.state {
            State::Greeting => self.on_greeting(reply).await,
            State::Handshaking | State::Authenticating | State::Ready => self.on_reply(reply).await,
            State::Connecting | State::Disconnected => {
                tracing::warn!(%reply, state = %self.state, "reply outside a session, dropped");
                Ok(())
            }
        }
    }

    async fn on_greeting(&mut self, reply: Reply) -> Result<()> {
        if reply.code != ReplyCode::SERVICE_READY {
            return Err(Error::GreetingRejected(reply));
        }

        tracing::info!(greeting = %reply, "connected");
        self.transition(State::Handshaking);
        let _ = self.channels.events.send(Event::Connected);

        let ehlo = Command::Ehlo {
            hostname: self.config.local_hostname.clone(),
        };
        self.send_handshake(ehlo, Step::Ehlo).await
    }

    async fn on_reply(&mut self, reply: Reply) -> Result<()> {
        match self.pending.pop() {
            Some(pending) => match pending.complete(reply) {
                Some((step, reply)) => self.on_handshake(step, reply).await,
                None => Ok(()),
            },
            None if reply.is_negative() => Err(Error::UnsolicitedReply(reply)),
            None => {
                tracing::warn!(%reply, "reply with no pending command");
                let _ = self.channels.events.send(Event::UnsolicitedReply(reply));
                Ok(())
            }
        }
    }

    async fn on_handshake(&mut self, step: Step, reply: Reply) -> Result<()> {
        match (step, reply.is_negative()) {
            (Step::Ehlo, false) => {
                let capabilities = Capabilities::from_ehlo(reply.as_str());
                tracing::debug!(?capabilities, "EHLO accepted");
                self.set_capabilities(capabilities);
                self.authenticate().await
            }
            (Step::Ehlo, true) => {
                tracing::debug!(%reply, "EHLO rejected, falling back to HELO");
                let helo = Command::Helo {
                    hostname: self.config.local_hostname.clone(),
                };
                self.send_handshake(helo, Step::Helo).await
            }
            (Step::Helo, false) => {
                self.set_capabilities(Capabilities::helo_only());
                self.authenticate().await
            }
            (Step::Helo, true) => Err(Error::HeloRejected(reply)),
            (Step::Auth, false) => self.become_ready().await,
            (Step::Auth, true) => Err(Error::AuthRejected(reply)),
        }
    }

    async fn authenticate(&mut self) -> Result<()> {
        let config = Arc::clone(&self.config);
        let Some(credentials) = &config.credentials else {
            return self.become_ready().await;
        };

        self.transition(State::Authenticating);
        let auth = Command::auth_plain(&credentials.username, &credentials.password);
        self.send_handshake(auth, Step::Auth).await
    }

    async fn become_ready(&mut self) -> Result<()> {
        self.transition(State::Ready);
        tracing::debug!(deferred = self.deferred.len(), "session ready");

        while let Some(request) = self.deferred.pop_front() {
            self.execute(request).await?;
        }
        Ok(())
    }

    async fn on_request(&mut self, request: Request) -> Result<()> {
        match self.state.admission() {
            Admission::Write => self.execute(request).await,
            Admission::Defer => {
                self.deferred.push_back(request);
                Ok(())
            }
            Admission::Reject => {
                request.reject(Error::InvalidState(format!("session is {}", self.state)));
                Ok(())
            }
        }
    }

    async fn execute(&mut self, request: Request) -> Result<()> {
        match request {
            Request::Command { command, reply } => {
                tracing::debug!(?command, "command");
                self.pending.push(Pending::Caller(reply));
                self.write(&command.serialize()).await
            }
            Request::Raw(data) => {
                tracing::trace!(len = data.len(), "raw payload");
                self.write(&data).await
            }
        }
    }

    async fn send_handshake(&mut self, command: Command, step: Step) -> Result<()> {
        tracing::debug!(?command, "handshake");
        self.pending.push(Pending::Handshake(step));
        self.write(&command.serialize()).await
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    /// Hands out one pre-built stream.
    struct OnceConnector<S>(Mutex<Option<S>>);

    impl<S> Connector for OnceConnector<S>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        type Stream = S;

        async fn connect(&self, _host: &str, _port: u16) -> io::Result<S> {
            self.0
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "used"))
        }
    }

    struct Harness {
        messages: mpsc::UnboundedSender<Message>,
        status: watch::Receiver<Status>,
        events: broadcast::Receiver<Event>,
        channels: Option<Channels>,
    }

    fn harness() -> Harness {
        let (messages_tx, messages) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(Status {
            state: State::Connecting,
            capabilities: Capabilities::default(),
        });
        let (events_tx, events) = broadcast::channel(16);
        Harness {
            messages: messages_tx,
            status,
            events,
            channels: Some(Channels {
                messages,
                status: status_tx,
                events: events_tx,
            }),
        }
    }

    #[tokio::test]
    async fn rejected_greeting_closes_without_writing() {
        let mock = tokio_test::io::Builder::new().read(b"421 busy\r\n").build();
        let mut h = harness();

        run(
            Arc::new(OnceConnector(Mutex::new(Some(mock)))),
            Arc::new(ClientConfig::new("mx.example.com")),
            h.channels.take().unwrap(),
        )
        .await;

        match h.events.recv().await.unwrap() {
            Event::Error(err) => {
                assert!(matches!(*err, Error::GreetingRejected(ref reply) if reply.code.as_u16() == 421));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(h.events.recv().await.unwrap(), Event::Closed));
        assert_eq!(h.status.borrow().state, State::Disconnected);
    }

    #[tokio::test]
    async fn deferred_command_runs_after_handshake() {
        let mock = tokio_test::io::Builder::new()
            .read(b"220 mx.example.com ESMTP\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250-mx.example.com\r\n250 PIPELINING\r\n")
            .write(b"NOOP\r\n")
            .read(b"250 OK\r\n")
            .build();
        let mut h = harness();

        let (reply_tx, reply_rx) = oneshot::channel();
        h.messages
            .send(Message::Send(Request::Command {
                command: Command::Noop,
                reply: reply_tx,
            }))
            .unwrap();

        let task = tokio::spawn(run(
            Arc::new(OnceConnector(Mutex::new(Some(mock)))),
            Arc::new(ClientConfig::new("mx.example.com")),
            h.channels.take().unwrap(),
        ));

        let reply = reply_rx.await.unwrap().unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert!(matches!(h.events.recv().await.unwrap(), Event::Connected));

        // The scripted stream hits EOF after the last reply.
        let _ = h.messages.send(Message::Close);
        task.await.unwrap();

        let status = *h.status.borrow();
        assert_eq!(status.state, State::Disconnected);
        assert!(status.capabilities.pipelining);
        assert!(status.capabilities.extended_hello);
        assert!(matches!(h.events.recv().await.unwrap(), Event::Closed));
    }

    #[tokio::test]
    async fn connect_failure_rejects_queued_commands() {
        let mut h = harness();
        let (reply_tx, reply_rx) = oneshot::channel();
        h.messages
            .send(Message::Send(Request::Command {
                command: Command::Noop,
                reply: reply_tx,
            }))
            .unwrap();

        run(
            Arc::new(OnceConnector::<tokio::io::DuplexStream>(Mutex::new(None))),
            Arc::new(ClientConfig::new("mx.example.com")),
            h.channels.take().unwrap(),
        )
        .await;

        assert!(matches!(reply_rx.await.unwrap(), Err(Error::ConnectionClosed)));
        match h.events.recv().await.unwrap() {
            Event::Error(err) => assert!(matches!(*err, Error::Io(_))),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(h.status.borrow().state, State::Disconnected);
    }
}
