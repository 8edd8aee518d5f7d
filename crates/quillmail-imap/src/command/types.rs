//! Command argument types.

/// A counter requested by STATUS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusItem {
    /// `MESSAGES`
    Messages,
    /// `RECENT`
    Recent,
    /// `UIDNEXT`
    UidNext,
    /// `UIDVALIDITY`
    UidValidity,
    /// `UNSEEN`, the unseen *count*.
    Unseen,
}

impl StatusItem {
    /// Every counter, in the order servers usually echo them.
    pub const ALL: [Self; 5] = [
        Self::Messages,
        Self::Recent,
        Self::UidNext,
        Self::UidValidity,
        Self::Unseen,
    ];

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Recent => "RECENT",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
        }
    }
}

/// What a FETCH asks for: one of the standard macros or an explicit list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItems {
    /// The `ALL` macro (flags, date, size, envelope).
    All,
    /// The `FULL` macro (`ALL` plus the non-extensible body structure).
    Full,
    /// The `FAST` macro (flags, date, size).
    Fast,
    /// An explicit attribute list.
    Items(Vec<FetchAttribute>),
}

/// One requested FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// `FLAGS`
    Flags,
    /// `INTERNALDATE`
    InternalDate,
    /// `RFC822.SIZE`
    Rfc822Size,
    /// `ENVELOPE`
    Envelope,
    /// `BODYSTRUCTURE`
    BodyStructure,
    /// `UID`
    Uid,
    /// `BODY.PEEK[HEADER]`, decoded into the header map.
    Header,
    /// `BODY[section]`, or `BODY.PEEK[section]` when `peek` is set.
    Body {
        /// Section path such as `2.1` or `TEXT`; `None` fetches everything.
        section: Option<String>,
        /// Leave `\Seen` untouched.
        peek: bool,
    },
    /// `RFC822`, the complete message.
    Rfc822,
}

/// How STORE combines the given flags with the existing ones.
///
/// Every mode is sent `.SILENT`; callers fetch flags again when they need
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Add to the existing flags.
    Add,
    /// Take away from the existing flags.
    Remove,
    /// Overwrite the existing flags.
    Replace,
}

impl StoreMode {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+FLAGS.SILENT",
            Self::Remove => "-FLAGS.SILENT",
            Self::Replace => "FLAGS.SILENT",
        }
    }
}

/// A SEARCH key. Compound keys nest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// Every message.
    All,
    /// `ANSWERED`
    Answered,
    /// `DELETED`
    Deleted,
    /// `FLAGGED`
    Flagged,
    /// `UNSEEN`
    Unseen,
    /// `SEEN`
    Seen,
    /// `UID <set>`
    Uid(String),
    /// `SUBJECT <text>`
    Subject(String),
    /// `FROM <text>`
    From(String),
    /// `TO <text>`
    To(String),
    /// `BODY <text>`
    Body(String),
    /// `TEXT <text>`, matching headers or body.
    Text(String),
    /// `SINCE <date>`, with the date as `1-Feb-2026`.
    Since(String),
    /// `BEFORE <date>`
    Before(String),
    /// `LARGER <octets>`
    Larger(u32),
    /// `SMALLER <octets>`
    Smaller(u32),
    /// `HEADER <field> <text>`
    Header(String, String),
    /// Every key must match.
    And(Vec<Self>),
    /// `OR <a> <b>`
    Or(Box<Self>, Box<Self>),
    /// `NOT <key>`
    Not(Box<Self>),
}
