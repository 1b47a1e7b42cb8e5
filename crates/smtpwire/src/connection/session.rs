//! SMTP session state machine.
//!
//! A [`Session`] drives one conversation with one server:
//!
//! 1. open the transport and wait for the 220 greeting
//! 2. announce itself with EHLO, falling back to HELO once
//! 3. upgrade with STARTTLS when offered and allowed, then EHLO again
//! 4. exchange commands and replies, one at a time
//! 5. close the transport
//!
//! Every suspending call runs under a [`Deadline`]. A timed-out command
//! leaves its reply outstanding: further commands fail with
//! [`Error::OperationInProgress`] until [`Session::resume`] collects the late
//! reply or the session is closed.
//!
//! ## Example
//!
//! ```ignore
//! use smtpwire::{Command, Config, Session, TcpConnector, TlsMode};
//!
//! let config = Config::builder("smtp.example.com")
//!     .identity("client.example.org")
//!     .tls(TlsMode::Mandatory)
//!     .build();
//!
//! let mut session = Session::new(config, TcpConnector::new());
//! session.connect().await?;
//!
//! session.send(Command::MailFrom { from: "a@example.org".into(), size: None, smtputf8: false }).await?;
//! session.send(Command::RcptTo { to: "b@example.com".into() }).await?;
//! let reply = session.send_message(b"Subject: hi\r\n\r\nHello\r\n").await?;
//!
//! session.quit().await?;
//! ```

use std::collections::VecDeque;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use super::deadline::Deadline;
use super::framer::{DEFAULT_BUFFER_SIZE, LineFramer};
use super::observer::{SessionObserver, TracingObserver};
use super::stream::Connector;
use super::{Config, ServerInfo, SessionState, TlsMode};
use crate::command::Command;
use crate::data::DataEncoder;
use crate::error::{Error, Result};
use crate::parser::{ReplyAccumulator, parse_line};
use crate::types::{Extensions, Reply};

/// The operation whose final reply has not arrived yet.
#[derive(Debug)]
struct Pending {
    /// What the reply answers (command verb or "greeting").
    label: String,
    /// Deadline applied when waiting for the reply.
    deadline: Deadline,
    /// False while the request is still being written.
    request_complete: bool,
    accumulator: ReplyAccumulator,
}

impl Pending {
    fn new(label: impl Into<String>, deadline: Deadline) -> Self {
        Self {
            label: label.into(),
            deadline,
            request_complete: false,
            accumulator: ReplyAccumulator::new(),
        }
    }
}

/// One SMTP conversation with one server.
pub struct Session<C: Connector, O: SessionObserver = TracingObserver> {
    config: Config,
    connector: C,
    observer: O,
    stream: Option<C::Stream>,
    framer: LineFramer,
    /// Framed lines not yet consumed by an operation.
    lines: VecDeque<String>,
    read_buf: Vec<u8>,
    state: SessionState,
    /// Ready state of the current epoch (plaintext or encrypted).
    ready_state: SessionState,
    server_info: ServerInfo,
    greeting: Option<Reply>,
    pending: Option<Pending>,
}

impl<C: Connector> Session<C> {
    /// Creates an idle session that logs through `tracing`.
    #[must_use]
    pub fn new(config: Config, connector: C) -> Self {
        Self::with_observer(config, connector, TracingObserver)
    }
}

impl<C: Connector, O: SessionObserver> Session<C, O> {
    /// Creates an idle session reporting to `observer`.
    #[must_use]
    pub fn with_observer(config: Config, connector: C, observer: O) -> Self {
        let framer = LineFramer::with_max_line_length(config.max_line_length);
        Self {
            config,
            connector,
            observer,
            stream: None,
            framer,
            lines: VecDeque::new(),
            read_buf: vec![0u8; DEFAULT_BUFFER_SIZE],
            state: SessionState::Idle,
            ready_state: SessionState::PlainReady,
            server_info: ServerInfo::default(),
            greeting: None,
            pending: None,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the server information gathered during negotiation.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns the extensions negotiated for the current epoch.
    #[must_use]
    pub const fn extensions(&self) -> &Extensions {
        &self.server_info.extensions
    }

    /// Returns the server greeting, once received.
    #[must_use]
    pub const fn greeting(&self) -> Option<&Reply> {
        self.greeting.as_ref()
    }

    /// Returns true if the transport is encrypted.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.ready_state == SessionState::SecureReady
    }

    /// Returns true if an operation is still waiting for its reply.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns the observer.
    #[must_use]
    pub const fn observer(&self) -> &O {
        &self.observer
    }

    /// Returns the observer mutably.
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Opens the transport and runs the handshake: greeting, EHLO (or HELO)
    /// and, if configured and offered, STARTTLS followed by a fresh EHLO.
    ///
    /// Returns the server greeting. Any failure leaves the session
    /// [`SessionState::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::SmtpError`] if the greeting or both EHLO and HELO are
    /// rejected, or a mandatory STARTTLS is rejected; [`Error::NotSupported`]
    /// if TLS is mandatory but not offered; transport, parse and timeout
    /// errors as they occur.
    pub async fn connect(&mut self) -> Result<Reply> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Closing | SessionState::Closed => return Err(Error::Closed),
            other => {
                return Err(Error::InvalidState(format!("connect called in state {other}")));
            }
        }

        match self.handshake().await {
            Ok(greeting) => Ok(greeting),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Sends a command and returns the server's reply.
    ///
    /// A negative reply (4xx/5xx) is a valid outcome and is returned as
    /// `Ok`; check [`Reply::is_success`]. Commands that open a message body
    /// belong in [`send_data`](Self::send_data).
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationInProgress`] if an earlier command is still
    /// awaiting its reply, [`Error::Closed`] after close,
    /// [`Error::InvalidCommand`] for a command containing line breaks,
    /// [`Error::Timeout`] if the reply does not arrive in time, and transport
    /// or parse errors, which also fail the session. A 3xx reply fails the
    /// session with [`Error::InvalidState`], since the server would read
    /// every later command as message content.
    pub async fn send(&mut self, command: impl Into<Command>) -> Result<Reply> {
        let command = command.into();
        self.ensure_ready()?;

        self.transition(SessionState::InCommand);
        let result = self.exchange(&command).await;
        self.settle(result, false)
    }

    /// Sends a data-initiation command (usually `DATA`) and, if the server
    /// answers 3xx, streams `payload` as the message body.
    ///
    /// The body is dot-stuffed, line endings are normalized to CRLF and the
    /// end-of-data marker is appended. Returns the reply to the body, or the
    /// reply to the command if it was not 3xx.
    ///
    /// # Errors
    ///
    /// As for [`send`](Self::send). A failure to read `payload` fails the
    /// session, since the body has been partially transmitted.
    pub async fn send_data<R>(&mut self, command: impl Into<Command>, payload: R) -> Result<Reply>
    where
        R: AsyncRead + Unpin + Send,
    {
        let command = command.into();
        self.ensure_ready()?;

        self.transition(SessionState::InCommand);
        let result = self.exchange(&command).await;
        let reply = self.settle(result, true)?;
        if !reply.is_intermediate() {
            return Ok(reply);
        }

        self.transition(SessionState::InCommand);
        let deadline = Deadline::after(self.config.data_timeout);
        let result = deadline.run(self.transfer(payload, deadline)).await;
        self.settle(result, false)
    }

    /// Sends `DATA` followed by `message` as the body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`] without sending anything if the
    /// server advertised a smaller SIZE limit; otherwise as for
    /// [`send_data`](Self::send_data).
    pub async fn send_message(&mut self, message: &[u8]) -> Result<Reply> {
        if let Some(limit) = self.extensions().max_size() {
            if message.len() > limit {
                return Err(Error::MessageTooLarge(message.len()));
            }
        }
        self.send_data(Command::Data, message).await
    }

    /// Waits again for the reply to a command that timed out.
    ///
    /// The body of a timed-out [`send_data`](Self::send_data) is not sent
    /// later: a 3xx reply collected here fails the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if nothing is outstanding or the
    /// request was cut off while being written, [`Error::Closed`] after
    /// close, and otherwise as for [`send`](Self::send).
    pub async fn resume(&mut self) -> Result<Reply> {
        match self.state {
            SessionState::Closing | SessionState::Closed => return Err(Error::Closed),
            SessionState::Failed => return Err(Error::InvalidState("session has failed".into())),
            _ => {}
        }
        let deadline = match &self.pending {
            None => {
                return Err(Error::InvalidState("no operation awaiting a reply".into()));
            }
            Some(pending) if !pending.request_complete => {
                return Err(Error::InvalidState(format!(
                    "{} was only partially written",
                    pending.label
                )));
            }
            Some(pending) => pending.deadline,
        };

        let result = deadline.run(self.read_reply()).await;
        self.settle(result, false)
    }

    /// Sends `QUIT` and closes the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails or is rejected; the
    /// transport is closed in either case once QUIT was answered.
    pub async fn quit(&mut self) -> Result<Reply> {
        let reply = self.send(Command::Quit).await?;
        self.close().await?;

        if !reply.is_success() {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }
        Ok(reply)
    }

    /// Shuts the transport down. No further I/O happens on this session.
    ///
    /// An operation still awaiting its reply is abandoned; a later
    /// [`resume`](Self::resume) fails with [`Error::Closed`]. Closing a
    /// closed or failed session does nothing; a failed session has already
    /// dropped its transport and stays [`SessionState::Failed`].
    ///
    /// # Errors
    ///
    /// Returns the shutdown error or [`Error::Timeout`]. The session ends up
    /// [`SessionState::Closed`] regardless.
    pub async fn close(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Ok(());
        }

        if let Some(pending) = self.pending.take() {
            tracing::warn!(operation = %pending.label, "closing with a reply still outstanding");
        }
        self.transition(SessionState::Closing);
        self.framer.drain();
        self.lines.clear();

        let result = match self.stream.take() {
            Some(mut stream) => {
                Deadline::after(self.config.close_timeout)
                    .run(async move { stream.shutdown().await.map_err(Error::from) })
                    .await
            }
            None => Ok(()),
        };

        self.transition(SessionState::Closed);
        result
    }

    async fn handshake(&mut self) -> Result<Reply> {
        self.transition(SessionState::Connecting);
        let implicit = self.config.tls == TlsMode::Implicit;
        let stream = Deadline::after(self.config.connect_timeout)
            .run(
                self.connector
                    .connect(&self.config.host, self.config.port, implicit),
            )
            .await?;
        self.stream = Some(stream);
        self.ready_state = if implicit {
            SessionState::SecureReady
        } else {
            SessionState::PlainReady
        };

        self.transition(SessionState::AwaitingGreeting);
        let deadline = Deadline::after(self.config.command_timeout);
        let mut pending = Pending::new("greeting", deadline);
        pending.request_complete = true;
        self.pending = Some(pending);
        let greeting = deadline.run(self.read_reply()).await?;
        if !greeting.is_success() {
            return Err(Error::smtp_error(
                greeting.code.as_u16(),
                greeting.message_text(),
            ));
        }

        self.server_info.hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        self.greeting = Some(greeting.clone());

        self.negotiate().await?;

        if self.config.tls.wants_starttls() {
            if self.extensions().supports_starttls() {
                self.starttls().await?;
            } else if self.config.tls == TlsMode::Mandatory {
                return Err(Error::NotSupported("STARTTLS".into()));
            } else {
                tracing::debug!("server does not offer STARTTLS, continuing in plaintext");
            }
        }

        self.transition(self.ready_state);
        tracing::info!(
            host = %self.config.host,
            secure = self.is_secure(),
            extensions = self.extensions().len(),
            "session ready"
        );
        Ok(greeting)
    }

    /// EHLO, with a single HELO fallback.
    async fn negotiate(&mut self) -> Result<()> {
        self.transition(SessionState::NegotiatingCapabilities);
        self.server_info.extensions.clear();

        let hostname = self.config.identity.clone();
        let reply = self
            .exchange(&Command::Ehlo {
                hostname: hostname.clone(),
            })
            .await?;
        if reply.is_success() {
            self.server_info.extensions = Extensions::from_ehlo(&reply);
            tracing::debug!(extensions = ?self.server_info.extensions, "EHLO accepted");
            return Ok(());
        }

        tracing::warn!(code = reply.code.as_u16(), "EHLO rejected, falling back to HELO");
        let reply = self.exchange(&Command::Helo { hostname }).await?;
        if reply.is_success() {
            return Ok(());
        }
        Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()))
    }

    async fn starttls(&mut self) -> Result<()> {
        let reply = self.exchange(&Command::StartTls).await?;
        if !reply.is_success() {
            if self.config.tls == TlsMode::Mandatory {
                return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
            }
            tracing::warn!(
                code = reply.code.as_u16(),
                "STARTTLS rejected, continuing in plaintext"
            );
            return Ok(());
        }

        self.transition(SessionState::Upgrading);

        // Nothing received in plaintext may be read as if it came over TLS.
        let discarded = self.framer.drain() + self.lines.iter().map(String::len).sum::<usize>();
        self.lines.clear();
        if discarded > 0 {
            tracing::warn!(discarded, "discarding plaintext data received before TLS upgrade");
        }
        self.server_info.extensions.clear();

        let stream = self.stream.take().ok_or(Error::Closed)?;
        let stream = Deadline::after(self.config.connect_timeout)
            .run(self.connector.upgrade(stream, &self.config.host))
            .await?;
        self.stream = Some(stream);
        self.ready_state = SessionState::SecureReady;
        tracing::debug!("transport upgraded to TLS");

        self.negotiate().await
    }

    /// Writes one command and reads its reply under the command deadline.
    async fn exchange(&mut self, command: &Command) -> Result<Reply> {
        let data = command.to_wire()?;
        self.discard_unsolicited();

        let deadline = Deadline::after(self.config.command_timeout);
        self.pending = Some(Pending::new(command.verb(), deadline));

        deadline
            .run(async {
                self.write_all(&data).await?;
                self.observer
                    .on_command(&String::from_utf8_lossy(&data[..data.len() - 2]));
                if let Some(pending) = self.pending.as_mut() {
                    pending.request_complete = true;
                }
                self.read_reply().await
            })
            .await
    }

    /// Streams the message body and reads the reply to it.
    async fn transfer<R>(&mut self, mut payload: R, deadline: Deadline) -> Result<Reply>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.pending = Some(Pending::new("message body", deadline));

        let mut encoder = DataEncoder::new();
        let mut chunk = vec![0u8; DEFAULT_BUFFER_SIZE];
        loop {
            let n = payload.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            let encoded = encoder.encode(&chunk[..n]);
            self.write_all(&encoded).await?;
        }
        let tail = encoder.finish();
        self.write_all(&tail).await?;

        if let Some(pending) = self.pending.as_mut() {
            pending.request_complete = true;
        }
        tracing::debug!(
            bytes_in = encoder.bytes_in(),
            bytes_out = encoder.bytes_out(),
            "message body sent"
        );
        self.read_reply().await
    }

    /// Folds incoming lines into the pending operation until its final line.
    async fn read_reply(&mut self) -> Result<Reply> {
        loop {
            let line = self.next_line().await?;
            let parsed = parse_line(&line)?;
            self.observer.on_reply_line(&parsed);

            let pending = self
                .pending
                .as_mut()
                .ok_or_else(|| Error::InvalidState("no operation awaiting a reply".into()))?;
            if let Some(reply) = pending.accumulator.push(parsed)? {
                self.pending = None;
                return Ok(reply);
            }
        }
    }

    async fn next_line(&mut self) -> Result<String> {
        loop {
            if let Some(line) = self.lines.pop_front() {
                return Ok(line);
            }

            let stream = self.stream.as_mut().ok_or(Error::Closed)?;
            let n = stream.read(&mut self.read_buf).await?;
            if n == 0 {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }
            let lines = self.framer.feed(&self.read_buf[..n])?;
            self.lines.extend(lines);
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::Closed)?;
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    fn discard_unsolicited(&mut self) {
        while let Some(line) = self.lines.pop_front() {
            self.observer.on_unsolicited(&line);
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            SessionState::Closing | SessionState::Closed => Err(Error::Closed),
            SessionState::Failed => Err(Error::InvalidState("session has failed".into())),
            _ if self.pending.is_some() => Err(Error::OperationInProgress),
            state if state.is_ready() => Ok(()),
            other => Err(Error::InvalidState(format!(
                "cannot send commands in state {other}"
            ))),
        }
    }

    /// Applies the outcome of a command to the session state.
    ///
    /// Success returns to the ready state, fatal errors fail the session,
    /// anything else (a timeout) leaves the command outstanding. A 3xx reply
    /// is only acceptable when the caller streams a body next.
    fn settle(&mut self, result: Result<Reply>, body_follows: bool) -> Result<Reply> {
        match &result {
            Ok(reply) if reply.is_intermediate() && !body_follows => {
                let error = Error::InvalidState(format!(
                    "{} reply leaves the server waiting for a message body",
                    reply.code
                ));
                self.fail(&error);
                return Err(error);
            }
            Ok(_) => self.transition(self.ready_state),
            Err(e) if e.is_fatal() => self.fail(e),
            Err(e) if self.pending.is_none() => {
                tracing::debug!(error = %e, "command failed before it was sent");
                self.transition(self.ready_state);
            }
            Err(e) => tracing::warn!(error = %e, "reply still outstanding"),
        }
        result
    }

    fn fail(&mut self, error: &Error) {
        tracing::error!(%error, state = %self.state, "session failed");
        self.stream = None;
        self.pending = None;
        self.framer.drain();
        self.lines.clear();
        self.transition(SessionState::Failed);
    }

    fn transition(&mut self, to: SessionState) {
        if self.state != to {
            let from = std::mem::replace(&mut self.state, to);
            self.observer.on_state_change(from, to);
        }
    }
}

impl<C: Connector, O: SessionObserver> std::fmt::Debug for Session<C, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("state", &self.state)
            .field("server_info", &self.server_info)
            .field("pending", &self.pending.as_ref().map(|p| &p.label))
            .finish_non_exhaustive()
    }
}
