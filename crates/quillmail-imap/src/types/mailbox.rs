//! Mailbox types.

use std::collections::BTreeSet;

/// State of the currently selected mailbox, built from a SELECT or EXAMINE
/// response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxSnapshot {
    /// Mailbox name.
    pub name: String,
    /// Hierarchy delimiter, when known from a LIST response.
    pub delimiter: Option<String>,
    /// Flags defined for this mailbox.
    pub flags: BTreeSet<String>,
    /// Flags the client may store permanently.
    pub permanent_flags: BTreeSet<String>,
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// Number of recent messages.
    pub recent: u32,
    /// Number of unseen messages (from STATUS, not from SELECT).
    pub unseen: Option<u32>,
    /// Sequence number of the first unseen message (`[UNSEEN n]`).
    pub first_unseen: Option<u32>,
    /// Next UID to be assigned.
    pub uid_next: Option<u32>,
    /// UIDVALIDITY value.
    pub uid_validity: Option<u32>,
    /// Whether the mailbox was opened read-only.
    pub read_only: bool,
}

impl MailboxSnapshot {
    /// Creates an empty snapshot for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// One entry of a LIST or LSUB response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxEntry {
    /// Mailbox name, unquoted.
    pub name: String,
    /// Hierarchy delimiter (`None` for a flat namespace).
    pub delimiter: Option<String>,
    /// Name attributes such as `\HasNoChildren` or `\Trash`.
    pub flags: BTreeSet<String>,
}

impl MailboxEntry {
    /// Returns true if the mailbox can be selected.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self
            .flags
            .iter()
            .any(|f| f.eq_ignore_ascii_case("\\Noselect") || f.eq_ignore_ascii_case("\\NonExistent"))
    }
}

/// Result of a STATUS command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Mailbox name.
    pub name: String,
    /// Number of messages.
    pub messages: Option<u32>,
    /// Number of recent messages.
    pub recent: Option<u32>,
    /// Number of unseen messages.
    pub unseen: Option<u32>,
    /// Next UID.
    pub uid_next: Option<u32>,
    /// UIDVALIDITY value.
    pub uid_validity: Option<u32>,
}
