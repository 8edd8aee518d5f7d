//! IMAP connection management.
//!
//! This module provides the transport layer of the client:
//! - Configuration (host, port, security mode, credentials, timeouts)
//! - TLS/plaintext stream abstraction and the [`Connector`] seam
//! - Line-framed I/O with read and inactivity deadlines

mod config;
mod stream;
mod transport;

pub use config::{AuthMechanism, Config, ConfigBuilder, Endpoint, Security, TlsOptions};
pub use stream::{Connector, ImapStream, TcpConnector, connect_plain, connect_tls, create_tls_connector};
pub use transport::{Connection, ConnectionHandle, ConnectionState};
