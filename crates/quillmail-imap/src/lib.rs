//! # quillmail-imap
//!
//! An IMAP client engine built to survive unreliable links.
//!
//! ## Features
//!
//! - **Bounded waits**: connect, socket reads, commands and idle links all
//!   have deadlines; nothing blocks forever on a silent server
//! - **Automatic recovery**: a broken connection is re-established with
//!   exponential backoff, re-authenticated, and the previously selected
//!   mailbox is selected again
//! - **Tolerant parsing**: FETCH envelopes, body structures and headers are
//!   parsed leniently; malformed input degrades to partial records
//! - **Attachment discovery**: body structures are walked to find
//!   attachments together with their fetchable section numbers
//! - **TLS via rustls**: secure connections without OpenSSL
//!
//! ## Quick Start
//!
//! ```no_run
//! use quillmail_imap::{Client, Config, EventKind, FetchItems, Security};
//!
//! #[tokio::main]
//! async fn main() -> quillmail_imap::Result<()> {
//!     let config = Config::builder("imap.example.com")
//!         .security(Security::Implicit)
//!         .credentials("user@example.com", "password")
//!         .build();
//!
//!     let mut client = Client::new(config);
//!     client.on(EventKind::Reconnected, |event| println!("{event:?}"));
//!
//!     client.connect().await?;
//!     client.authenticate().await?;
//!
//!     for mailbox in client.list("", "*").await? {
//!         println!("Folder: {}", mailbox.name);
//!     }
//!
//!     let inbox = client.select("INBOX").await?;
//!     println!("Messages: {}", inbox.exists);
//!
//!     for message in client.fetch("1:10", &FetchItems::Fast).await? {
//!         println!("#{} {:?}", message.seq, message.flags);
//!     }
//!
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Layers
//!
//! ```text
//! Client        commands, session state, retry and reconnection
//!   │
//! Connection    line framing, socket and inactivity deadlines
//!   │
//! Connector     TCP or TLS stream (replaceable, e.g. in tests)
//! ```
//!
//! Every wait in these layers is a [`CancellableOperation`]: it settles
//! exactly once, as completed, cancelled or timed out.
//!
//! ## Modules
//!
//! - [`cancellable`]: Deadline- and cancel-aware operations
//! - [`command`]: IMAP command builders and types
//! - [`connection`]: Configuration, streams and the line transport
//! - [`parser`]: Response parsers
//! - [`types`]: Records produced by the parsers

#![forbid(unsafe_code)]

pub mod cancellable;
mod client;
pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use cancellable::{CancellableOperation, Canceller, Outcome};
pub use client::{AbortHandle, Client, Event, EventKind, ListenerId, MAX_COMMAND_RETRIES};
pub use command::{
    Command, FetchAttribute, FetchItems, SearchCriteria, StatusItem, StoreMode, TagGenerator,
};
pub use connection::{
    AuthMechanism, Config, ConfigBuilder, Connector, Security, TcpConnector, TlsOptions,
};
pub use error::{Error, Result};
pub use types::{
    Address, Attachment, BodySection, BodyStructure, Capabilities, Envelope, FetchedMessage,
    MailboxEntry, MailboxSnapshot, MailboxStatus,
};
