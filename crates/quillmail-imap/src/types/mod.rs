//! Core IMAP types.
//!
//! Plain data records produced by the parsers and owned by callers or by the
//! client's session state.

mod body;
mod capability;
mod envelope;
mod mailbox;
mod message;

pub use body::{Attachment, BodyExtension, BodyFields, BodyStructure, Disposition};
pub use capability::Capabilities;
pub use envelope::{Address, Envelope};
pub use mailbox::{MailboxEntry, MailboxSnapshot, MailboxStatus};
pub use message::{BodySection, FetchedMessage, HeaderValue};
