//! Connection supervisor.
//!
//! [`Client`] owns the connection lifecycle: it opens a transport, queues the
//! registration handshake, runs the receive loop, answers keepalives and
//! hands every other line to the registered callback as a [`ParsedEvent`].
//! Transport failures put the client into [`ConnectionState::Failed`]; after
//! the configured cooldown it connects again, forever, until [`Client::stop`].
//!
//! ```text
//!  Disconnected ─► Connecting ─► Authenticating ─► Ready
//!                     ▲                │             │
//!                     └─── Failed ◄────┴─────────────┘
//!
//!  any state ── stop() ──► Disconnecting (terminal)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use slirc_client::{Client, Config};
//!
//! # async fn demo() -> Result<(), slirc_client::ClientError> {
//! let client = Client::new(Config::new("irc.example.net", "slircbot"))?;
//! client.set_callback(|event| println!("{}", event));
//! client.join("#rust");
//! client.run().await
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::admin::AdminCommand;
use crate::command::Command;
use crate::config::Config;
use crate::error::{ClientError, TransportError};
use crate::flood::{DrainTask, FloodPolicy, OutputScheduler};
use crate::line::LineReader;
use crate::message::{parse_line, ParsedEvent};
use crate::transport::{Connector, TcpConnector, TransportReader};

/// QUIT message sent when a reconnect is requested.
pub const RECONNECT_MESSAGE: &str = "Reconnecting";

/// How long a closing drain task may spend flushing urgent lines.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Current state of the connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Initial state, not yet connected.
    #[default]
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Transport open, registration sent, awaiting welcome (001).
    Authenticating,
    /// Registered with the server.
    Ready,
    /// Stopped. Terminal.
    Disconnecting,
    /// The transport failed; a reconnect follows after the cooldown.
    Failed,
}

type Callback = Arc<dyn Fn(ParsedEvent) + Send + Sync>;

struct Session {
    reader: LineReader<TransportReader>,
    output: OutputScheduler,
    drain: DrainTask,
}

/// Why a receive loop ended.
enum Cycle {
    Stopped,
    Requested,
    Failed(TransportError),
}

struct Inner {
    config: Config,
    connector: Box<dyn Connector>,
    state: watch::Sender<ConnectionState>,
    policy: watch::Sender<FloodPolicy>,
    output: Mutex<Option<OutputScheduler>>,
    /// Opened by [`Client::connect`] and not yet picked up by `run`.
    session: Mutex<Option<Session>>,
    callback: Mutex<Option<Callback>>,
    shutdown: CancellationToken,
    reconnect: Notify,
}

/// Handle to a supervised IRC connection. Cheap to clone.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Create a client connecting over TCP (and TLS, if configured).
    pub fn new(config: Config) -> Result<Self, ClientError> {
        Self::with_connector(config, TcpConnector)
    }

    /// Create a client that opens transports through `connector`.
    pub fn with_connector<C>(config: Config, connector: C) -> Result<Self, ClientError>
    where
        C: Connector + 'static,
    {
        let policy = config.flood_policy()?;
        let (state, _) = watch::channel(ConnectionState::default());
        let (policy, _) = watch::channel(policy);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                connector: Box::new(connector),
                state,
                policy,
                output: Mutex::new(None),
                session: Mutex::new(None),
                callback: Mutex::new(None),
                shutdown: CancellationToken::new(),
                reconnect: Notify::new(),
            }),
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Open the transport and queue the registration handshake.
    ///
    /// Calling this before [`run`](Self::run) is optional; `run` connects on
    /// its own when no connection is open.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let session = self.open_session().await?;
        let previous = self.inner.session.lock().replace(session);
        drop(previous);

        if self.inner.shutdown.is_cancelled() {
            self.inner.output.lock().take();
            self.inner.session.lock().take();
            return Err(ClientError::Stopped);
        }
        Ok(())
    }

    /// Drive the connection until [`stop`](Self::stop) is called.
    ///
    /// Connection failures are retried after the configured cooldown and
    /// are only visible through logging and [`state`](Self::state).
    pub async fn run(&self) -> Result<(), ClientError> {
        let shutdown = self.inner.shutdown.clone();

        loop {
            let pending = self.inner.session.lock().take();
            let mut session = match pending {
                Some(session) => session,
                None => {
                    let opened = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        opened = self.open_session() => opened,
                    };
                    match opened {
                        Ok(session) => session,
                        Err(ClientError::Stopped) => break,
                        Err(e) => {
                            warn!(error = %e, "connection attempt failed");
                            if !self.cool_down().await {
                                break;
                            }
                            continue;
                        }
                    }
                }
            };

            let cycle = self.receive(&mut session, &shutdown).await;
            self.teardown(session).await;

            match cycle {
                Cycle::Stopped => break,
                Cycle::Requested => info!("reconnect requested"),
                Cycle::Failed(e) => {
                    warn!(error = %e, "connection lost");
                    self.set_state(ConnectionState::Failed);
                }
            }

            if !self.cool_down().await {
                break;
            }
        }

        debug!("client stopped");
        Ok(())
    }

    /// Ask the running loop to quit the current connection and reconnect.
    ///
    /// Only a live connection can be cycled: a request made while no
    /// connection is open is ignored, and a new connection never inherits
    /// one made against its predecessor.
    pub fn reconnect(&self) {
        if self.inner.output.lock().is_none() {
            debug!("no connection, ignoring reconnect request");
            return;
        }
        self.inner.reconnect.notify_one();
    }

    /// Stop the client for good. The state becomes
    /// [`ConnectionState::Disconnecting`] and stays there.
    pub fn stop(&self) {
        self.inner.shutdown.cancel();
        self.set_state(ConnectionState::Disconnecting);
        self.inner.output.lock().take();
        if let Some(session) = self.inner.session.lock().take() {
            session.drain.abort();
        }
    }

    // === Callback ===

    /// Register the event callback, replacing any previous one.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(ParsedEvent) + Send + Sync + 'static,
    {
        *self.inner.callback.lock() = Some(Arc::new(callback));
    }

    /// Remove the event callback; events are dropped until a new one is set.
    pub fn clear_callback(&self) {
        self.inner.callback.lock().take();
    }

    // === Observers ===

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// The flood policy applied to queued output.
    pub fn flood_policy(&self) -> FloodPolicy {
        *self.inner.policy.borrow()
    }

    /// Change the flood policy. Takes effect at the drain task's next
    /// scheduling decision.
    pub fn set_flood_policy(&self, policy: FloodPolicy) {
        info!(
            max_messages = policy.max_messages(),
            per_seconds = policy.per_seconds(),
            "flood policy updated"
        );
        self.inner.policy.send_replace(policy);
    }

    /// Returns `true` if the current connection's output has failed.
    pub fn is_in_error_state(&self) -> bool {
        self.inner
            .output
            .lock()
            .as_ref()
            .is_some_and(OutputScheduler::is_in_error_state)
    }

    // === Commands ===

    pub fn join(&self, channel: &str) {
        self.send(Command::join(channel));
    }

    pub fn part(&self, channel: &str, message: Option<&str>) {
        self.send(Command::PART(channel.to_owned(), message.map(str::to_owned)));
    }

    pub fn topic(&self, channel: &str, topic: &str) {
        self.send(Command::TOPIC(channel.to_owned(), topic.to_owned()));
    }

    /// `MODE <channel> +b <mask>`
    ///
    /// A ban carries no reason on the wire. Use [`kickban`](Self::kickban)
    /// to give one; it goes out with the kick.
    pub fn ban(&self, channel: &str, mask: &str) {
        self.send(Command::ban(channel, mask));
    }

    /// `MODE <channel> -b <mask>`
    pub fn unban(&self, channel: &str, mask: &str) {
        self.send(Command::unban(channel, mask));
    }

    pub fn kick(&self, channel: &str, nick: &str, reason: Option<&str>) {
        self.send(Command::KICK(
            channel.to_owned(),
            nick.to_owned(),
            reason.map(str::to_owned),
        ));
    }

    /// Ban `nick!*@*`, then kick.
    pub fn kickban(&self, channel: &str, nick: &str, reason: Option<&str>) {
        self.ban(channel, &format!("{}!*@*", nick));
        self.kick(channel, nick, reason);
    }

    /// Queue a pre-formatted line.
    pub fn raw(&self, line: &str) {
        self.send(Command::Raw(line.to_owned()));
    }

    pub fn say(&self, target: &str, text: &str) {
        self.send(Command::privmsg(target, text));
    }

    /// Send a `/me` action.
    pub fn act(&self, target: &str, text: &str) {
        self.send(Command::action(target, text));
    }

    pub fn notice(&self, target: &str, text: &str) {
        self.send(Command::notice(target, text));
    }

    /// Send a notice ahead of the queue, ignoring the flood policy.
    pub fn notice_now(&self, target: &str, text: &str) {
        self.send_urgent(Command::notice(target, text));
    }

    /// Send `QUIT` ahead of the queue, then [`stop`](Self::stop).
    pub fn quit(&self, message: Option<&str>) {
        self.send_urgent(Command::QUIT(message.map(str::to_owned)));
        self.stop();
    }

    /// Run an admin command against this client.
    pub fn execute(&self, command: AdminCommand) {
        debug!(?command, "admin command");
        match command {
            AdminCommand::Quit(message) => self.quit(message.as_deref()),
            AdminCommand::Reconnect => self.reconnect(),
            AdminCommand::Join(channel) => self.join(&channel),
            AdminCommand::Part(channel, message) => self.part(&channel, message.as_deref()),
            AdminCommand::Kick {
                channel,
                nick,
                reason,
            } => self.kick(&channel, &nick, reason.as_deref()),
            AdminCommand::Ban { channel, mask } => self.ban(&channel, &mask),
            AdminCommand::Unban { channel, mask } => self.unban(&channel, &mask),
            AdminCommand::KickBan {
                channel,
                nick,
                reason,
            } => self.kickban(&channel, &nick, reason.as_deref()),
            AdminCommand::Say { target, text } => self.say(&target, &text),
            AdminCommand::Do { target, text } => self.act(&target, &text),
        }
    }

    fn send(&self, command: Command) {
        match self.inner.output.lock().as_ref() {
            Some(output) => output.send_queued(command.to_string()),
            None => debug!(command = command.name(), "not connected, dropping"),
        }
    }

    fn send_urgent(&self, command: Command) {
        match self.inner.output.lock().as_ref() {
            Some(output) => output.send_now(command.to_string()),
            None => debug!(command = command.name(), "not connected, dropping"),
        }
    }

    // === Internals ===

    async fn open_session(&self) -> Result<Session, ClientError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(ClientError::Stopped);
        }
        let server = &self.inner.config.server;

        self.set_state(ConnectionState::Connecting);
        info!(host = %server.hostname, port = server.port, tls = server.tls, "connecting");
        let transport = match self.inner.connector.connect(server).await {
            Ok(transport) => transport,
            Err(e) => {
                self.set_state(ConnectionState::Failed);
                return Err(e.into());
            }
        };

        let (reader, writer) = transport.into_split();
        let (output, drain) = OutputScheduler::spawn(writer, self.inner.policy.subscribe());

        if let Some(password) = &server.password {
            output.send_queued(Command::PASS(password.clone()).to_string());
        }
        output.send_queued(Command::NICK(server.nick.clone()).to_string());
        output.send_queued(Command::USER(server.nick.clone(), server.realname.clone()).to_string());

        // a request that outlived the previous connection
        if self.inner.reconnect.notified().now_or_never().is_some() {
            debug!("discarding stale reconnect request");
        }
        *self.inner.output.lock() = Some(output.clone());
        self.set_state(ConnectionState::Authenticating);

        Ok(Session {
            reader: LineReader::new(reader),
            output,
            drain,
        })
    }

    async fn receive(&self, session: &mut Session, shutdown: &CancellationToken) -> Cycle {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Cycle::Stopped,
                _ = self.inner.reconnect.notified() => {
                    session
                        .output
                        .send_now(Command::QUIT(Some(RECONNECT_MESSAGE.to_owned())).to_string());
                    return Cycle::Requested;
                }
                err = session.output.failed() => return Cycle::Failed(err),
                line = session.reader.next_line() => match line {
                    Ok(line) => self.dispatch(&session.output, &line),
                    Err(e) => return Cycle::Failed(e),
                },
            }
        }
    }

    fn dispatch(&self, output: &OutputScheduler, line: &str) {
        trace!(line, "<-");
        if line.is_empty() {
            return;
        }
        if let Some(arg) = ping_argument(line) {
            output.send_now(Command::PONG(arg.to_owned()).to_string());
            return;
        }

        let event = match parse_line(line) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, line, "ignoring unparseable line");
                return;
            }
        };

        if event.is_welcome() || event.origin.is_user() {
            self.mark_ready();
        }

        let callback = self.inner.callback.lock().clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    async fn teardown(&self, session: Session) {
        self.inner.output.lock().take();
        let Session {
            reader,
            output,
            drain,
        } = session;
        drop(reader);
        drop(output);
        drain.close(CLOSE_GRACE).await;
    }

    /// Wait out the reconnect delay. Returns `false` if stopped meanwhile.
    async fn cool_down(&self) -> bool {
        let delay = self.inner.config.server.reconnect_delay();
        debug!(?delay, "waiting before reconnect");
        tokio::select! {
            biased;
            _ = self.inner.shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn set_state(&self, next: ConnectionState) {
        self.inner.state.send_if_modified(|state| {
            if *state == next || *state == ConnectionState::Disconnecting {
                return false;
            }
            info!(from = ?*state, to = ?next, "connection state");
            *state = next;
            true
        });
    }

    fn mark_ready(&self) {
        self.inner.state.send_if_modified(|state| {
            if *state != ConnectionState::Authenticating {
                return false;
            }
            info!("registered with server");
            *state = ConnectionState::Ready;
            true
        });
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server", &self.inner.config.server.hostname)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// The first token after an unprefixed `PING`, without its `:` marker.
fn ping_argument(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("PING")?;
    if !(rest.is_empty() || rest.starts_with(' ')) {
        return None;
    }
    let arg = rest.trim_start();
    let arg = arg.strip_prefix(':').unwrap_or(arg);
    Some(arg.split_whitespace().next().unwrap_or(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_argument() {
        assert_eq!(
            ping_argument("PING :server.example.com"),
            Some("server.example.com")
        );
        assert_eq!(ping_argument("PING token"), Some("token"));
        assert_eq!(ping_argument("PING"), Some(""));
        assert_eq!(ping_argument("PING tok1 tok2"), Some("tok1"));
        assert_eq!(ping_argument("PING :a b"), Some("a"));
        assert_eq!(ping_argument("PING :"), Some(""));
        assert_eq!(ping_argument("PINGER :x"), None);
        assert_eq!(ping_argument(":server PONG :x"), None);
    }

    #[test]
    fn test_default_state() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_stop_is_terminal() {
        let client = Client::new(Config::new("irc.example.net", "bot")).unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnected);

        client.stop();
        assert_eq!(client.state(), ConnectionState::Disconnecting);

        client.set_state(ConnectionState::Connecting);
        assert_eq!(client.state(), ConnectionState::Disconnecting);
    }

    #[test]
    fn test_commands_without_connection_are_dropped() {
        let client = Client::new(Config::new("irc.example.net", "bot")).unwrap();
        client.say("#test", "nobody hears this");
        assert!(!client.is_in_error_state());
    }

    #[tokio::test]
    async fn test_connect_after_stop() {
        let client = Client::new(Config::new("irc.example.net", "bot")).unwrap();
        client.stop();
        assert!(matches!(client.connect().await, Err(ClientError::Stopped)));
        assert!(client.run().await.is_ok());
    }
}
