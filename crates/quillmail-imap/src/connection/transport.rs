//! Line-framed transport with read and inactivity deadlines.
//!
//! A [`Connection`] owns one transport opened through a [`Connector`]. Lines
//! are CRLF-terminated and handed out as raw bytes, so literal payloads keep
//! their exact length; a read-ahead buffer holds bytes received past the
//! current line. Every raw read runs as a [`CancellableOperation`] bounded
//! by the socket timeout, and a separate inactivity monitor closes the
//! transport once nothing has been read or written for the same duration.
//!
//! Each opened transport lives in its own link. Closing a link, from the
//! connection itself, the inactivity monitor or a [`ConnectionHandle`],
//! drops both halves of the socket, including a half lent to a read or
//! write that is still running.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{oneshot, watch};

use super::config::{Config, Endpoint};
use super::stream::Connector;
use crate::cancellable::{CancellableOperation, Canceller};
use crate::{Error, Result};

/// Bytes requested per raw read.
const READ_CHUNK: usize = 8 * 1024;

/// Bound on flushing and shutting down the write half.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport.
    Disconnected,
    /// A transport is being opened.
    Connecting,
    /// The transport is open.
    Connected,
}

fn slot<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One opened transport. Once disconnected a link stays disconnected;
/// reconnecting creates a new one.
struct Link<S> {
    state: watch::Sender<ConnectionState>,
    reader: Mutex<Option<ReadHalf<S>>>,
    writer: Mutex<Option<WriteHalf<S>>>,
}

impl<S: AsyncRead + AsyncWrite + Send + 'static> Link<S> {
    fn new(state: ConnectionState) -> Self {
        Self {
            state: watch::channel(state).0,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn attach(&self, stream: S) {
        let (reader, writer) = tokio::io::split(stream);
        *slot(&self.reader) = Some(reader);
        *slot(&self.writer) = Some(writer);
        self.state.send_replace(ConnectionState::Connected);
    }

    /// Resolves once the link is disconnected.
    fn closed(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut state = self.state.subscribe();
        async move {
            let _ = state
                .wait_for(|s| *s == ConnectionState::Disconnected)
                .await;
        }
    }

    /// Marks the link disconnected and releases the halves it holds.
    /// Lent halves are dropped by their borrower.
    async fn close(&self) -> bool {
        let was_connected = self.state.send_replace(ConnectionState::Disconnected)
            == ConnectionState::Connected;
        let reader = slot(&self.reader).take();
        drop(reader);
        let writer = slot(&self.writer).take();
        if let Some(mut writer) = writer {
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, writer.shutdown()).await;
        }
        was_connected
    }
}

/// Fires once the connection has been idle for the socket timeout.
///
/// The monitored operation resolves only when the monitor is dropped, so a
/// replaced monitor never leaves a task behind.
struct InactivityMonitor {
    canceller: Canceller<()>,
    _stop: oneshot::Sender<()>,
}

impl InactivityMonitor {
    fn start<S>(timeout: Duration, link: Arc<Link<S>>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (stop, stopped) = oneshot::channel::<()>();
        let idle = CancellableOperation::start(
            move || async move {
                let _ = stopped.await;
                Ok(())
            },
            timeout,
            "connection idle",
        );
        let canceller = idle.canceller();

        tokio::spawn(async move {
            if idle.outcome().await.is_timed_out() && link.close().await {
                tracing::warn!(?timeout, "Connection idle, disconnected");
            }
        });

        Self {
            canceller,
            _stop: stop,
        }
    }
}

impl Drop for InactivityMonitor {
    fn drop(&mut self) {
        self.canceller
            .cancel(Error::connection("inactivity monitor reset"));
    }
}

/// Closes one transport from outside its [`Connection`], for example after
/// the connection was moved into work that was then abandoned.
pub struct ConnectionHandle<S>(Arc<Link<S>>);

impl<S: AsyncRead + AsyncWrite + Send + 'static> ConnectionHandle<S> {
    /// Closes the transport. A read or write still running on it fails
    /// with a connection error. Idempotent.
    pub async fn close(&self) {
        self.0.close().await;
    }

    /// Returns true while the transport is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.0.state() == ConnectionState::Connected
    }
}

impl<S> Clone for ConnectionHandle<S> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<S> std::fmt::Debug for ConnectionHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ConnectionHandle")
            .field(&*self.0.state.borrow())
            .finish()
    }
}

/// One transport session to one endpoint.
pub struct Connection<C: Connector> {
    connector: C,
    endpoint: Endpoint,
    connection_timeout: Duration,
    socket_timeout: Duration,
    link: Arc<Link<C::Stream>>,
    buffer: BytesMut,
    monitor: Option<InactivityMonitor>,
}

impl<C: Connector> Connection<C> {
    /// Creates a disconnected connection for `config`'s endpoint.
    #[must_use]
    pub fn new(connector: C, config: &Config) -> Self {
        Self {
            connector,
            endpoint: config.endpoint(),
            connection_timeout: config.connection_timeout,
            socket_timeout: config.socket_timeout,
            link: Arc::new(Link::new(ConnectionState::Disconnected)),
            buffer: BytesMut::with_capacity(READ_CHUNK),
            monitor: None,
        }
    }

    /// Current state, read at call time.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    /// Returns true while the transport is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// A handle that can close the current transport.
    #[must_use]
    pub fn handle(&self) -> ConnectionHandle<C::Stream> {
        ConnectionHandle(Arc::clone(&self.link))
    }

    /// The endpoint this connection opens.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Opens the transport. A no-op when already connected.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if the connection timeout elapses first, otherwise
    /// [`Error::Connection`] wrapping the cause.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.release().await;
        let link = Arc::new(Link::new(ConnectionState::Connecting));
        self.link = Arc::clone(&link);

        let opening = self.connector.clone().open(self.endpoint.clone());
        let opening = CancellableOperation::start(
            move || opening,
            self.connection_timeout,
            format!("connect to {}", self.endpoint),
        );

        match opening.wait().await {
            Ok(stream) => {
                link.attach(stream);
                self.touch();
                tracing::info!(endpoint = %self.endpoint, "Connected");
                Ok(())
            }
            Err(e) => {
                self.release().await;
                tracing::warn!(endpoint = %self.endpoint, error = %e, "Connect failed");
                if e.is_timeout() {
                    Err(e)
                } else {
                    Err(Error::connection_caused_by(
                        format!("failed to connect to {}", self.endpoint),
                        e,
                    ))
                }
            }
        }
    }

    /// Closes the transport, ignoring close errors. Idempotent.
    pub async fn disconnect(&mut self) {
        if self.release().await {
            tracing::debug!(endpoint = %self.endpoint, "Disconnected");
        }
    }

    /// Returns true if the transport was open.
    async fn release(&mut self) -> bool {
        self.monitor = None;
        self.buffer.clear();
        self.link.close().await
    }

    /// Restarts the inactivity monitor.
    fn touch(&mut self) {
        self.monitor = None;
        self.monitor = Some(InactivityMonitor::start(
            self.socket_timeout,
            Arc::clone(&self.link),
        ));
    }

    /// Fails with [`Error::NotConnected`] unless connected right now.
    async fn ensure_connected(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.release().await;
        Err(Error::NotConnected)
    }

    /// Writes `line` followed by CRLF.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] or [`Error::Connection`].
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(b"\r\n");
        self.write_raw(&data).await
    }

    /// Writes `data` as-is (literal payloads).
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] or [`Error::Connection`].
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_connected().await?;
        let writer = slot(&self.link.writer).take();
        let Some(mut writer) = writer else {
            return Err(Error::NotConnected);
        };

        let closed = self.link.closed();
        let written = tokio::select! {
            result = async {
                writer.write_all(data).await?;
                writer.flush().await
            } => result.map_err(Error::Io),
            () = closed => Err(Error::connection("connection closed")),
        };

        match written {
            Ok(()) => {
                *slot(&self.link.writer) = Some(writer);
                self.touch();
                Ok(())
            }
            Err(e) => {
                drop(writer);
                self.release().await;
                Err(Error::connection_caused_by("write failed", e))
            }
        }
    }

    /// Reads one line, without its CRLF, as raw bytes.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`], [`Error::Connection`] (including a peer
    /// close) or [`Error::Timeout`]. The connection is disconnected before
    /// either of the latter two is returned.
    pub async fn read_raw_line(&mut self) -> Result<Bytes> {
        loop {
            self.ensure_connected().await?;
            if let Some(line) = self.take_line() {
                return Ok(line);
            }
            self.fill().await?;
        }
    }

    /// Reads one line as text. Invalid UTF-8 is replaced rather than
    /// rejected.
    ///
    /// # Errors
    ///
    /// See [`read_raw_line`](Self::read_raw_line).
    pub async fn read_line(&mut self) -> Result<String> {
        let line = self.read_raw_line().await?;
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Reads lines until `done(line, lines_so_far)` returns true.
    ///
    /// `lines_so_far` already includes `line`.
    ///
    /// # Errors
    ///
    /// See [`read_raw_line`](Self::read_raw_line).
    pub async fn read_until<P>(&mut self, mut done: P) -> Result<Vec<Bytes>>
    where
        P: FnMut(&[u8], &[Bytes]) -> bool,
    {
        let mut lines = Vec::new();
        loop {
            let line = self.read_raw_line().await?;
            lines.push(line);
            if let Some(last) = lines.last()
                && done(last, &lines)
            {
                return Ok(lines);
            }
        }
    }

    fn take_line(&mut self) -> Option<Bytes> {
        let pos = self.buffer.windows(2).position(|w| w == b"\r\n")?;
        let mut line = self.buffer.split_to(pos + 2);
        line.truncate(pos);
        Some(line.freeze())
    }

    /// Performs one raw read into the buffer under the socket timeout.
    ///
    /// The inactivity monitor is paused while the read is outstanding; the
    /// read's own deadline applies instead.
    async fn fill(&mut self) -> Result<()> {
        self.monitor = None;
        let reader = slot(&self.link.reader).take();
        let Some(mut reader) = reader else {
            return Err(Error::NotConnected);
        };

        let closed = self.link.closed();
        let read = CancellableOperation::start(
            move || async move {
                let mut chunk = vec![0u8; READ_CHUNK];
                let n = tokio::select! {
                    n = reader.read(&mut chunk) => n?,
                    () = closed => return Err(Error::connection("connection closed")),
                };
                chunk.truncate(n);
                Ok((reader, chunk))
            },
            self.socket_timeout,
            "socket read",
        );

        match read.wait().await {
            Ok((_, chunk)) if chunk.is_empty() => {
                self.release().await;
                Err(Error::connection("connection closed by peer"))
            }
            Ok((reader, chunk)) => {
                *slot(&self.link.reader) = Some(reader);
                self.buffer.extend_from_slice(&chunk);
                self.touch();
                Ok(())
            }
            // Closing the link ends the abandoned read.
            Err(e) if e.is_timeout() => {
                self.release().await;
                Err(e)
            }
            Err(e) => {
                self.release().await;
                Err(Error::connection_caused_by("read failed", e))
            }
        }
    }
}

impl<C: Connector> std::fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}
