//! Error types for the IMAP engine.
//!
//! [`Error::is_connection_level`] separates failures of the link, which the
//! client recovers from, from failures the server reported over it.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation was attempted while the transport is not connected.
    #[error("Not connected")]
    NotConnected,

    /// A message-scoped operation was attempted without a selected mailbox.
    #[error("No mailbox selected")]
    NoMailboxSelected,

    /// Transport-level failure (socket, TLS, peer closed the connection).
    #[error("Connection error: {message}")]
    Connection {
        /// Description of what went wrong.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<Box<Error>>,
    },

    /// A connect, read, command or inactivity deadline elapsed.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// The bound that elapsed.
        duration: Duration,
    },

    /// The server completed a command with NO or BAD.
    #[error("Command {command} failed: {response}")]
    Command {
        /// The command text, with credentials redacted.
        command: String,
        /// The tagged completion line sent by the server.
        response: String,
        /// Response code from the completion line (e.g. `TRYCREATE`).
        code: Option<String>,
    },

    /// Authentication was rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The server lacks a capability the operation needs.
    #[error("Server does not advertise {0}")]
    Capability(String),

    /// A command argument cannot be sent on a command line.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A response could not be parsed.
    #[error("Failed to parse {context}: {raw}")]
    Parse {
        /// What was being parsed.
        context: String,
        /// The offending input.
        raw: String,
    },

    /// Transport-level I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS configuration error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),
}

impl Error {
    /// Creates a connection error without an underlying cause.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a connection error wrapping `cause`.
    ///
    /// A cause that already is a connection error is returned unchanged.
    pub fn connection_caused_by(message: impl Into<String>, cause: Self) -> Self {
        match cause {
            Self::Connection { .. } => cause,
            other => Self::Connection {
                message: message.into(),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Creates a parse error.
    pub fn parse(context: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Parse {
            context: context.into(),
            raw: raw.into(),
        }
    }

    /// Returns true for failures of the link itself, as opposed to failures
    /// reported by the server over a healthy link.
    #[must_use]
    pub const fn is_connection_level(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::Timeout { .. }
                | Self::NotConnected
                | Self::Io(_)
                | Self::Tls(_)
        )
    }

    /// Returns true if this is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_cause_is_not_double_wrapped() {
        let inner = Error::connection("peer closed");
        let wrapped = Error::connection_caused_by("connect failed", inner);
        assert!(matches!(wrapped, Error::Connection { ref message, .. } if message == "peer closed"));
    }

    #[test]
    fn test_io_cause_is_wrapped() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let wrapped = Error::connection_caused_by("connect failed", Error::Io(io));
        match wrapped {
            Error::Connection { message, source } => {
                assert_eq!(message, "connect failed");
                assert!(matches!(source.as_deref(), Some(Error::Io(_))));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_classification() {
        assert!(Error::timeout("read", Duration::from_secs(1)).is_connection_level());
        assert!(Error::timeout("read", Duration::from_secs(1)).is_timeout());
        assert!(Error::NotConnected.is_connection_level());
        assert!(!Error::Auth("bad".into()).is_connection_level());
        assert!(!Error::NoMailboxSelected.is_connection_level());
    }

    #[test]
    fn test_timeout_display() {
        let e = Error::timeout("command SELECT", Duration::from_millis(1500));
        assert_eq!(e.to_string(), "command SELECT timed out after 1.5s");
    }
}
