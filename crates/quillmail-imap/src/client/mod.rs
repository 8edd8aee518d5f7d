//! Resilient IMAP client.
//!
//! [`Client`] drives one connection. It tags and sends commands, reads up
//! to the tagged completion under the command timeout, and recovers from a
//! broken link by reconnecting, authenticating again and selecting the
//! previously selected mailbox.
//!
//! Commands never overlap on one client: every operation takes `&mut self`
//! and reads responses until its own tag, consuming untagged lines on the
//! way. Sharing a client between tasks therefore needs an external lock.
//! An in-flight command can still be failed from elsewhere through an
//! [`AbortHandle`].

#![allow(clippy::missing_errors_doc)]

mod auth;
mod events;
mod mailbox;
mod message;
mod reconnect;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;

use self::events::Listeners;
pub use self::events::{Event, EventKind, ListenerId};
use crate::cancellable::{CancellableOperation, Outcome};
use crate::command::{Command, TagGenerator};
use crate::connection::{Config, Connection, Connector, TcpConnector};
use crate::parser::{find_capabilities, response_code};
use crate::types::{Capabilities, MailboxSnapshot};
use crate::{Error, Result};

/// How many times one command is re-issued after a successful reconnection.
pub const MAX_COMMAND_RETRIES: u32 = 1;

/// A command waiting for its tagged completion.
struct PendingCommand {
    command: String,
    cancel: Box<dyn Fn(Error) -> bool + Send>,
}

type PendingMap = Arc<Mutex<HashMap<String, PendingCommand>>>;

fn pending_lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<String, PendingCommand>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fails in-flight commands of a [`Client`] from another task.
#[derive(Clone)]
pub struct AbortHandle {
    pending: PendingMap,
}

impl AbortHandle {
    /// Fails every pending command with a connection error.
    ///
    /// Returns how many commands this call cancelled. The connection of a
    /// cancelled command is dropped; the client reconnects on its next
    /// command if auto-reconnect is enabled.
    pub fn abort_all(&self, reason: &str) -> usize {
        let drained: Vec<_> = pending_lock(&self.pending).drain().collect();
        let mut cancelled = 0;
        for (tag, pending) in drained {
            if (pending.cancel)(Error::connection(reason)) {
                tracing::debug!(%tag, command = %pending.command, reason, "Command aborted");
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Number of commands waiting for completion.
    #[must_use]
    pub fn pending(&self) -> usize {
        pending_lock(&self.pending).len()
    }
}

impl std::fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortHandle")
            .field("pending", &self.pending())
            .finish()
    }
}

/// What one exchange does on the wire.
enum Script {
    /// Read the server greeting.
    Greeting,
    /// Send a tagged line; write `continuation` once the server sends `+`.
    Command {
        line: String,
        continuation: Option<Bytes>,
    },
}

/// Runs `script` and returns every line read, ending with the tagged one.
async fn drive<C: Connector>(
    conn: &mut Connection<C>,
    tag: &str,
    script: Script,
) -> Result<Vec<Bytes>> {
    let (line, continuation) = match script {
        Script::Greeting => return Ok(vec![conn.read_raw_line().await?]),
        Script::Command { line, continuation } => (line, continuation),
    };

    conn.write_line(&line).await?;
    let mut lines = Vec::new();

    if let Some(payload) = continuation {
        loop {
            let line = conn.read_raw_line().await?;
            if line.starts_with(b"+") {
                break;
            }
            // Rejected before the continuation.
            let done = is_tagged(&line, tag);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
        conn.write_raw(&payload).await?;
    }

    lines.extend(conn.read_until(|line, _| is_tagged(line, tag)).await?);
    Ok(lines)
}

fn is_tagged(line: &[u8], tag: &str) -> bool {
    line.strip_prefix(tag.as_bytes())
        .is_some_and(|rest| rest.first() == Some(&b' '))
}

/// Response text of raw lines. Literal bytes that are not UTF-8 are
/// replaced, so byte-exact callers parse the raw lines instead.
fn decode(lines: Vec<Bytes>) -> Vec<String> {
    lines
        .iter()
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect()
}

/// Turns the lines of an exchange into a result by its tagged status.
fn completion(command: &str, tag: &str, lines: Vec<Bytes>) -> Result<Vec<Bytes>> {
    let response = lines
        .last()
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .unwrap_or_default();
    let status = response
        .strip_prefix(tag)
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or_default();
    if status.eq_ignore_ascii_case("OK") {
        return Ok(lines);
    }

    Err(Error::Command {
        command: command.to_string(),
        code: response_code(&response),
        response,
    })
}

/// Commands that must not be sent twice.
const fn is_retryable(command: &Command) -> bool {
    !matches!(
        command,
        Command::Login { .. } | Command::Authenticate { .. } | Command::Logout | Command::Append { .. }
    )
}

type Exchanged<C> = (Connection<C>, Result<Vec<Bytes>>);

/// IMAP client with timeouts and automatic reconnection.
///
/// # Example
///
/// ```no_run
/// use quillmail_imap::{Client, Config, FetchItems};
///
/// # async fn example() -> quillmail_imap::Result<()> {
/// let config = Config::builder("imap.example.com")
///     .credentials("user@example.com", "password")
///     .build();
///
/// let mut client = Client::new(config);
/// client.connect().await?;
/// client.authenticate().await?;
///
/// let inbox = client.select("INBOX").await?;
/// println!("{} messages, {:?} unseen", inbox.exists, inbox.unseen);
///
/// let messages = client.fetch("1:10", &FetchItems::All).await?;
/// for message in messages {
///     println!("{:?}", message.envelope.map(|e| e.subject));
/// }
///
/// client.disconnect().await;
/// # Ok(())
/// # }
/// ```
pub struct Client<C: Connector = TcpConnector> {
    config: Config,
    connector: C,
    connection: Connection<C>,
    tags: TagGenerator,
    capabilities: Capabilities,
    authenticated: bool,
    mailbox: Option<MailboxSnapshot>,
    delimiter: Option<String>,
    /// Set by `connect`, cleared by `disconnect`; a dropped link of an
    /// active session is recovered rather than reported as not connected.
    active: bool,
    aborted: bool,
    reconnecting: bool,
    reconnect_attempts: u32,
    pending: PendingMap,
    listeners: Listeners,
}

impl Client<TcpConnector> {
    /// Creates a client that connects over TCP.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> Client<C> {
    /// Creates a client that opens transports through `connector`.
    #[must_use]
    pub fn with_connector(config: Config, connector: C) -> Self {
        let connection = Connection::new(connector.clone(), &config);
        Self {
            config,
            connector,
            connection,
            tags: TagGenerator::default(),
            capabilities: Capabilities::new(),
            authenticated: false,
            mailbox: None,
            delimiter: None,
            active: false,
            aborted: false,
            reconnecting: false,
            reconnect_attempts: 0,
            pending: Arc::new(Mutex::new(HashMap::new())),
            listeners: Listeners::default(),
        }
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns true while the transport is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Returns true once authenticated on the current connection.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Capabilities last advertised by the server.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// The selected mailbox, if any.
    #[must_use]
    pub const fn selected_mailbox(&self) -> Option<&MailboxSnapshot> {
        self.mailbox.as_ref()
    }

    /// Hierarchy delimiter learned from the last LIST.
    #[must_use]
    pub fn delimiter(&self) -> Option<&str> {
        self.delimiter.as_deref()
    }

    /// Returns true while a reconnection is running.
    #[must_use]
    pub const fn is_reconnecting(&self) -> bool {
        self.reconnecting
    }

    /// Attempts made by the running or last failed reconnection; 0 after a
    /// successful one.
    #[must_use]
    pub const fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// A handle that can fail in-flight commands from another task.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            pending: Arc::clone(&self.pending),
        }
    }

    /// Registers `listener` for events of `kind`.
    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.listeners.add(kind, Arc::new(listener))
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn off(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Connects, reads the greeting and learns the capabilities.
    ///
    /// A no-op when already connected.
    pub async fn connect(&mut self) -> Result<()> {
        if self.connection.is_connected() {
            return Ok(());
        }
        self.open().await?;
        self.active = true;
        Ok(())
    }

    /// Logs out under the logout timeout, then tears the session down.
    /// Listeners stay registered.
    pub async fn disconnect(&mut self) {
        if self.connection.is_connected() {
            let timeout = self.config.logout_timeout;
            if let Err(e) = self.exchange_with(&Command::Logout, None, timeout).await {
                tracing::debug!(error = %e, "LOGOUT failed");
            }
        }
        self.teardown().await;
        self.active = false;
        self.listeners.emit(&Event::Close);
    }

    /// Tears the session down immediately: pending commands fail, no
    /// LOGOUT is sent and every listener is removed.
    pub async fn force_close(&mut self) {
        let aborted = self.abort_handle().abort_all("client closed");
        self.teardown().await;
        self.active = false;
        self.aborted = false;
        self.reconnecting = false;
        self.reconnect_attempts = 0;
        self.delimiter = None;
        tracing::debug!(aborted, "Client closed");
        self.listeners.emit(&Event::Close);
        self.listeners.clear();
    }

    /// Sends NOOP.
    pub async fn noop(&mut self) -> Result<()> {
        self.execute_command(&Command::Noop).await.map(|_| ())
    }

    /// Asks the server for its capabilities again.
    pub async fn capability(&mut self) -> Result<&Capabilities> {
        let lines = self.execute_command(&Command::Capability).await?;
        self.capabilities = find_capabilities(&lines)
            .ok_or_else(|| Error::parse("CAPABILITY response", lines.join("\r\n")))?;
        Ok(&self.capabilities)
    }

    /// Sends `command` and returns every response line, the tagged
    /// completion last.
    ///
    /// After a connection-level failure with auto-reconnect enabled, the
    /// client reconnects and re-issues the command up to
    /// [`MAX_COMMAND_RETRIES`] times. A timed-out command is not re-issued:
    /// its error is returned once reconnection has finished. LOGIN,
    /// AUTHENTICATE, LOGOUT and APPEND are never re-issued; use
    /// [`append`](Self::append) for APPEND.
    pub async fn execute_command(&mut self, command: &Command) -> Result<Vec<String>> {
        self.execute_raw(command).await.map(decode)
    }

    /// [`execute_command`](Self::execute_command) returning the raw lines.
    async fn execute_raw(&mut self, command: &Command) -> Result<Vec<Bytes>> {
        self.ensure_session()?;

        let timeout = self.config.command_timeout;
        let mut retries = 0;
        loop {
            let error = match self.exchange_raw(command, None, timeout).await {
                Ok(lines) => return Ok(lines),
                Err(e) => e,
            };

            let reconnected = self.recover_after(&error).await;
            if !reconnected
                || error.is_timeout()
                || retries >= MAX_COMMAND_RETRIES
                || !is_retryable(command)
            {
                return Err(error);
            }
            retries += 1;
            tracing::info!(command = command.name(), "Retrying command after reconnect");
        }
    }

    /// Runs the recovery policy after a failed exchange. Returns true if the
    /// link was re-established.
    async fn recover_after(&mut self, error: &Error) -> bool {
        let aborted = std::mem::take(&mut self.aborted);
        if !error.is_connection_level() || aborted || self.reconnecting {
            return false;
        }

        self.listeners.emit(&Event::Error(error.to_string()));
        if !self.config.auto_reconnect {
            return false;
        }

        match self.recover().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Reconnection failed");
                false
            }
        }
    }

    /// Boxed so that reconnection may select a mailbox through
    /// [`execute_command`](Self::execute_command).
    fn recover(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.reconnect())
    }

    /// One tagged exchange under the command timeout, without recovery.
    async fn exchange(&mut self, command: &Command) -> Result<Vec<String>> {
        let timeout = self.config.command_timeout;
        self.exchange_with(command, None, timeout).await
    }

    async fn exchange_with(
        &mut self,
        command: &Command,
        continuation: Option<Bytes>,
        timeout: Duration,
    ) -> Result<Vec<String>> {
        self.exchange_raw(command, continuation, timeout)
            .await
            .map(decode)
    }

    async fn exchange_raw(
        &mut self,
        command: &Command,
        continuation: Option<Bytes>,
        timeout: Duration,
    ) -> Result<Vec<Bytes>> {
        let text = command.to_line()?;
        if !self.connection.is_connected() {
            return Err(Error::NotConnected);
        }

        let tag = self.tags.next_tag();
        let label = command.redacted();
        let line = format!("{tag} {text}");
        tracing::debug!(%tag, command = %label, "Sending command");

        let lines = self
            .round_trip(&tag, &label, Script::Command { line, continuation }, timeout)
            .await?;
        tracing::debug!(%tag, lines = lines.len(), "Command completed");
        completion(&label, &tag, lines)
    }

    /// Runs `script` on the connection as a cancellable operation.
    ///
    /// The connection moves into the operation. If the operation times out
    /// or is cancelled it stays with the abandoned work and its transport
    /// is closed, which ends that work; the client keeps a fresh one.
    async fn round_trip(
        &mut self,
        tag: &str,
        label: &str,
        script: Script,
        timeout: Duration,
    ) -> Result<Vec<Bytes>> {
        let fresh = Connection::new(self.connector.clone(), &self.config);
        let mut conn = std::mem::replace(&mut self.connection, fresh);
        let handle = conn.handle();

        let owned_tag = tag.to_string();
        let operation: CancellableOperation<Exchanged<C>> = CancellableOperation::start(
            move || async move {
                let result = drive(&mut conn, &owned_tag, script).await;
                Ok((conn, result))
            },
            timeout,
            label,
        );

        let canceller = operation.canceller();
        pending_lock(&self.pending).insert(
            tag.to_string(),
            PendingCommand {
                command: label.to_string(),
                cancel: Box::new(move |reason| canceller.cancel(reason)),
            },
        );
        let outcome = operation.outcome().await;
        pending_lock(&self.pending).remove(tag);

        match outcome {
            Outcome::Completed(Ok((conn, result))) => {
                self.connection = conn;
                result
            }
            Outcome::Completed(Err(e)) => Err(e),
            Outcome::Cancelled(reason) => {
                handle.close().await;
                self.aborted = true;
                Err(reason)
            }
            Outcome::TimedOut {
                operation,
                duration,
            } => {
                handle.close().await;
                tracing::warn!(%tag, command = label, ?duration, "Command timed out");
                Err(Error::timeout(operation, duration))
            }
        }
    }

    /// Opens the transport and reads the greeting and capabilities.
    async fn open(&mut self) -> Result<()> {
        self.connection.connect().await?;
        if let Err(e) = self.greet().await {
            self.connection.disconnect().await;
            return Err(e);
        }
        Ok(())
    }

    async fn greet(&mut self) -> Result<()> {
        let timeout = self.config.connection_timeout;
        let lines = self
            .round_trip("*", "greeting", Script::Greeting, timeout)
            .await?;
        let greeting = decode(lines).into_iter().next().unwrap_or_default();
        let status = greeting
            .strip_prefix("* ")
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or_default()
            .to_ascii_uppercase();

        match status.as_str() {
            "OK" => {}
            "PREAUTH" => self.authenticated = true,
            "BYE" => {
                return Err(Error::connection(format!(
                    "server refused connection: {greeting}"
                )));
            }
            _ => return Err(Error::parse("server greeting", greeting)),
        }

        match find_capabilities(std::slice::from_ref(&greeting)) {
            Some(capabilities) => self.capabilities = capabilities,
            None => self.refresh_capabilities().await?,
        }
        tracing::info!(
            endpoint = %self.connection.endpoint(),
            capabilities = self.capabilities.len(),
            "Server ready"
        );
        Ok(())
    }

    /// CAPABILITY without recovery.
    async fn refresh_capabilities(&mut self) -> Result<()> {
        let lines = self.exchange(&Command::Capability).await?;
        self.capabilities = find_capabilities(&lines)
            .ok_or_else(|| Error::parse("CAPABILITY response", lines.join("\r\n")))?;
        Ok(())
    }

    /// Closes the transport and forgets per-connection state.
    async fn teardown(&mut self) {
        self.connection.disconnect().await;
        self.authenticated = false;
        self.capabilities.clear();
        self.mailbox = None;
    }

    const fn ensure_session(&self) -> Result<()> {
        if self.active {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    /// Session checks shared by every high-level operation: connected, then
    /// authenticated (lazily).
    async fn ready(&mut self) -> Result<()> {
        self.ensure_session()?;
        if !self.authenticated {
            self.authenticate().await?;
        }
        Ok(())
    }

    fn require_mailbox(&self) -> Result<&MailboxSnapshot> {
        self.mailbox.as_ref().ok_or(Error::NoMailboxSelected)
    }
}

impl<C: Connector> std::fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("connection", &self.connection)
            .field("authenticated", &self.authenticated)
            .field("capabilities", &self.capabilities)
            .field("mailbox", &self.mailbox)
            .field("reconnecting", &self.reconnecting)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}
