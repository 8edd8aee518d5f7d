//! IMAP command builder.
//!
//! A [`Command`] serializes to the text that follows the tag on the wire.
//! The client prefixes the tag and appends CRLF.

mod serialize;
mod tag_generator;
mod types;

pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, FetchItems, SearchCriteria, StatusItem, StoreMode};

use serialize::{write_astring, write_fetch_items, write_flag_list, write_search_criteria};

use crate::{Error, Result};

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE command.
    Authenticate {
        /// Authentication mechanism.
        mechanism: String,
        /// Initial response (SASL-IR).
        initial_response: Option<String>,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// LSUB command.
    Lsub {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// STATUS command.
    Status {
        /// Mailbox name.
        mailbox: String,
        /// Status items to request.
        items: Vec<StatusItem>,
    },
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: String,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: String,
    },
    /// CREATE command.
    Create {
        /// Mailbox to create.
        mailbox: String,
    },
    /// DELETE command.
    Delete {
        /// Mailbox to delete.
        mailbox: String,
    },
    /// RENAME command.
    Rename {
        /// Current mailbox name.
        from: String,
        /// New mailbox name.
        to: String,
    },
    /// SUBSCRIBE command.
    Subscribe {
        /// Mailbox to subscribe.
        mailbox: String,
    },
    /// UNSUBSCRIBE command.
    Unsubscribe {
        /// Mailbox to unsubscribe.
        mailbox: String,
    },
    /// APPEND command line; the message follows as a literal.
    Append {
        /// Target mailbox.
        mailbox: String,
        /// Flags to set.
        flags: Vec<String>,
        /// Literal size in bytes.
        size: usize,
    },
    /// CLOSE command.
    Close,
    /// EXPUNGE command.
    Expunge,
    /// SEARCH command.
    Search {
        /// Search criteria.
        criteria: SearchCriteria,
        /// Use UIDs.
        uid: bool,
    },
    /// FETCH command.
    Fetch {
        /// Sequence set (`1:10`, `4,7`, `*`).
        sequence: String,
        /// Items to fetch.
        items: FetchItems,
        /// Use UIDs.
        uid: bool,
    },
    /// STORE command, always `.SILENT`.
    Store {
        /// Sequence set.
        sequence: String,
        /// How to combine the flags.
        mode: StoreMode,
        /// Flags.
        flags: Vec<String>,
        /// Use UIDs.
        uid: bool,
    },
    /// COPY command.
    Copy {
        /// Sequence set.
        sequence: String,
        /// Target mailbox.
        mailbox: String,
        /// Use UIDs.
        uid: bool,
    },
    /// MOVE command.
    Move {
        /// Sequence set.
        sequence: String,
        /// Target mailbox.
        mailbox: String,
        /// Use UIDs.
        uid: bool,
    },
}

impl Command {
    /// Builds the APPEND line for `message`, sizing the literal in bytes.
    #[must_use]
    pub fn append(mailbox: &str, flags: &[String], message: &[u8]) -> Self {
        Self::Append {
            mailbox: mailbox.to_string(),
            flags: flags.to_vec(),
            size: message.len(),
        }
    }

    /// The command verb, with a `UID ` prefix where one applies.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::List { .. } => "LIST",
            Self::Lsub { .. } => "LSUB",
            Self::Status { .. } => "STATUS",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::Rename { .. } => "RENAME",
            Self::Subscribe { .. } => "SUBSCRIBE",
            Self::Unsubscribe { .. } => "UNSUBSCRIBE",
            Self::Append { .. } => "APPEND",
            Self::Close => "CLOSE",
            Self::Expunge => "EXPUNGE",
            Self::Search { uid: true, .. } => "UID SEARCH",
            Self::Search { .. } => "SEARCH",
            Self::Fetch { uid: true, .. } => "UID FETCH",
            Self::Fetch { .. } => "FETCH",
            Self::Store { uid: true, .. } => "UID STORE",
            Self::Store { .. } => "STORE",
            Self::Copy { uid: true, .. } => "UID COPY",
            Self::Copy { .. } => "COPY",
            Self::Move { uid: true, .. } => "UID MOVE",
            Self::Move { .. } => "MOVE",
        }
    }

    /// Returns true if the command carries credentials.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        matches!(self, Self::Login { .. } | Self::Authenticate { .. })
    }

    /// Text safe to log or keep in an error: credentials are cut away.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::Login { .. } => "LOGIN".to_string(),
            Self::Authenticate { mechanism, .. } => format!("AUTHENTICATE {mechanism}"),
            _ => self.serialize(),
        }
    }

    /// Serializes the command after checking that it fits on one line.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if an argument holds CR, LF or NUL. A
    /// quoted string cannot carry them, and sent raw they would end the
    /// line early.
    pub fn to_line(&self) -> Result<String> {
        let line = self.serialize();
        if line.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0)) {
            return Err(Error::InvalidArgument(format!(
                "{} argument contains CR, LF or NUL",
                self.name()
            )));
        }
        Ok(line)
    }

    /// Serializes the command to the text that follows the tag.
    ///
    /// No checks are made; [`to_line`](Self::to_line) is what goes on the
    /// wire.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut buf = String::new();

        match self {
            Self::Capability
            | Self::Noop
            | Self::Logout
            | Self::Close
            | Self::Expunge => buf.push_str(self.name()),

            Self::Login { username, password } => {
                buf.push_str("LOGIN ");
                write_astring(&mut buf, username);
                buf.push(' ');
                write_astring(&mut buf, password);
            }

            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                buf.push_str("AUTHENTICATE ");
                buf.push_str(mechanism);
                if let Some(resp) = initial_response {
                    buf.push(' ');
                    buf.push_str(resp);
                }
            }

            Self::List { reference, pattern } | Self::Lsub { reference, pattern } => {
                buf.push_str(self.name());
                buf.push(' ');
                write_astring(&mut buf, reference);
                buf.push(' ');
                write_astring(&mut buf, pattern);
            }

            Self::Status { mailbox, items } => {
                buf.push_str("STATUS ");
                write_astring(&mut buf, mailbox);
                buf.push(' ');
                let items: Vec<_> = items.iter().map(|i| i.as_str()).collect();
                write_flag_list(&mut buf, &items);
            }

            Self::Select { mailbox }
            | Self::Examine { mailbox }
            | Self::Create { mailbox }
            | Self::Delete { mailbox }
            | Self::Subscribe { mailbox }
            | Self::Unsubscribe { mailbox } => {
                buf.push_str(self.name());
                buf.push(' ');
                write_astring(&mut buf, mailbox);
            }

            Self::Rename { from, to } => {
                buf.push_str("RENAME ");
                write_astring(&mut buf, from);
                buf.push(' ');
                write_astring(&mut buf, to);
            }

            Self::Append {
                mailbox,
                flags,
                size,
            } => {
                buf.push_str("APPEND ");
                write_astring(&mut buf, mailbox);
                if !flags.is_empty() {
                    buf.push(' ');
                    write_flag_list(&mut buf, flags);
                }
                buf.push_str(&format!(" {{{size}}}"));
            }

            Self::Search { criteria, .. } => {
                buf.push_str(self.name());
                buf.push(' ');
                write_search_criteria(&mut buf, criteria);
            }

            Self::Fetch {
                sequence, items, ..
            } => {
                buf.push_str(self.name());
                buf.push(' ');
                buf.push_str(sequence);
                buf.push(' ');
                write_fetch_items(&mut buf, items);
            }

            Self::Store {
                sequence,
                mode,
                flags,
                ..
            } => {
                buf.push_str(self.name());
                buf.push(' ');
                buf.push_str(sequence);
                buf.push(' ');
                buf.push_str(mode.as_str());
                buf.push(' ');
                write_flag_list(&mut buf, flags);
            }

            Self::Copy {
                sequence, mailbox, ..
            }
            | Self::Move {
                sequence, mailbox, ..
            } => {
                buf.push_str(self.name());
                buf.push(' ');
                buf.push_str(sequence);
                buf.push(' ');
                write_astring(&mut buf, mailbox);
            }
        }

        buf
    }
}
