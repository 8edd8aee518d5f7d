//! ENVELOPE records.

/// The summary headers a server reports in `ENVELOPE`.
///
/// Strings are kept as sent (no RFC 2047 decoding); absent fields are
/// `None` or empty lists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    /// `Date:` as sent.
    pub date: Option<String>,
    /// `Subject:`
    pub subject: Option<String>,
    /// `From:`
    pub from: Vec<Address>,
    /// `Sender:`
    pub sender: Vec<Address>,
    /// `Reply-To:`
    pub reply_to: Vec<Address>,
    /// `To:`
    pub to: Vec<Address>,
    /// `Cc:`
    pub cc: Vec<Address>,
    /// `Bcc:`
    pub bcc: Vec<Address>,
    /// `In-Reply-To:`
    pub in_reply_to: Option<String>,
    /// `Message-ID:`
    pub message_id: Option<String>,
}

impl Envelope {
    /// Subject of [`Envelope::placeholder`].
    pub const PLACEHOLDER_SUBJECT: &'static str = "parse failed";

    /// Stands in for an envelope that could not be parsed, so that one bad
    /// message does not sink a whole FETCH. Carries a single synthetic
    /// sender.
    #[must_use]
    pub fn placeholder() -> Self {
        let unknown = Address {
            name: Some("Unknown".to_string()),
            adl: None,
            mailbox: Some("unknown".to_string()),
            host: Some("unknown".to_string()),
        };
        Self {
            subject: Some(Self::PLACEHOLDER_SUBJECT.to_string()),
            from: vec![unknown],
            ..Self::default()
        }
    }

    /// Returns true for the record built by [`Envelope::placeholder`].
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.message_id.is_none() && self.subject.as_deref() == Some(Self::PLACEHOLDER_SUBJECT)
    }
}

/// One `(name adl mailbox host)` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Source route; obsolete and almost always `NIL`.
    pub adl: Option<String>,
    /// Local part.
    pub mailbox: Option<String>,
    /// Domain. `None` marks a group start or end.
    pub host: Option<String>,
}

impl Address {
    /// `mailbox@host`, when both parts are present.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        let (Some(mailbox), Some(host)) = (&self.mailbox, &self.host) else {
            return None;
        };
        Some(format!("{mailbox}@{host}"))
    }
}
