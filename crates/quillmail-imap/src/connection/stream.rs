//! Transport streams and connectors.

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::config::{Endpoint, Security, TlsOptions};
use crate::Result;

/// Opens transports for a [`Connection`](super::Connection).
///
/// A clone of the connector is consumed on every connect and reconnect. The
/// returned future runs on its own task and may outlive a connect timeout.
pub trait Connector: Clone + Send + Sync + 'static {
    /// The byte stream produced.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Opens a fresh transport to `endpoint`.
    fn open(self, endpoint: Endpoint) -> impl Future<Output = Result<Self::Stream>> + Send + 'static;
}

/// Connects over TCP, with TLS for [`Security::Implicit`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = ImapStream;

    fn open(self, endpoint: Endpoint) -> impl Future<Output = Result<ImapStream>> + Send + 'static {
        async move {
            match endpoint.security {
                Security::None => connect_plain(&endpoint.host, endpoint.port).await,
                Security::Implicit => connect_tls(&endpoint).await,
            }
        }
    }
}

/// Byte stream to the server, plaintext or TLS.
pub enum ImapStream {
    /// Plain TCP.
    Plain(TcpStream),
    /// TLS over TCP.
    Tls(Box<TlsStream<TcpStream>>),
}

/// What both variants have in common.
trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

impl ImapStream {
    /// Returns true for a TLS stream.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    fn io(self: Pin<&mut Self>) -> Pin<&mut dyn Io> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp),
            Self::Tls(tls) => Pin::new(tls.as_mut()),
        }
    }
}

impl std::fmt::Debug for ImapStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapStream")
            .field("tls", &self.is_tls())
            .finish_non_exhaustive()
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.io().poll_read(cx, buf)
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.io().poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.io().poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.io().poll_shutdown(cx)
    }
}

/// Creates a TLS connector trusting the Mozilla roots plus any extra roots.
pub fn create_tls_connector(options: &TlsOptions) -> Result<TlsConnector> {
    let mut root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    for cert in &options.extra_roots {
        root_store.add(cert.clone())?;
    }

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Connects to a server with TLS from the start.
pub async fn connect_tls(endpoint: &Endpoint) -> Result<ImapStream> {
    let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;

    let connector = create_tls_connector(&endpoint.tls)?;
    let name = endpoint
        .tls
        .server_name
        .clone()
        .unwrap_or_else(|| endpoint.host.clone());
    let server_name = ServerName::try_from(name)?;
    let tls = connector.connect(server_name, tcp).await?;

    tracing::debug!(%endpoint, "TLS session established");
    Ok(ImapStream::Tls(Box::new(tls)))
}

/// Connects to a server without TLS.
pub async fn connect_plain(host: &str, port: u16) -> Result<ImapStream> {
    let tcp = TcpStream::connect((host, port)).await?;
    Ok(ImapStream::Plain(tcp))
}
