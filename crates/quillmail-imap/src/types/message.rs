//! Fetched message records.

use std::collections::{BTreeMap, BTreeSet};

use super::{BodyStructure, Envelope};

/// Value of a header that may appear more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// The header appeared once.
    Single(String),
    /// The header appeared several times, in order.
    Multiple(Vec<String>),
}

impl HeaderValue {
    /// First occurrence.
    #[must_use]
    pub fn first(&self) -> &str {
        match self {
            Self::Single(value) => value,
            Self::Multiple(values) => values.first().map_or("", String::as_str),
        }
    }

    /// All occurrences, in order.
    #[must_use]
    pub fn all(&self) -> Vec<&str> {
        match self {
            Self::Single(value) => vec![value.as_str()],
            Self::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Adds another occurrence.
    pub fn push(&mut self, value: String) {
        match self {
            Self::Single(existing) => {
                let first = std::mem::take(existing);
                *self = Self::Multiple(vec![first, value]);
            }
            Self::Multiple(values) => values.push(value),
        }
    }
}

/// A `BODY[section]` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodySection {
    /// Raw bytes as sent by the server.
    pub data: Vec<u8>,
    /// Size declared by the server (the literal length).
    pub size: usize,
}

/// One message from a FETCH response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedMessage {
    /// Message sequence number.
    pub seq: u32,
    /// UID, if requested.
    pub uid: Option<u32>,
    /// Flags.
    pub flags: BTreeSet<String>,
    /// RFC822.SIZE.
    pub size: Option<u64>,
    /// INTERNALDATE, as sent.
    pub internal_date: Option<String>,
    /// ENVELOPE.
    pub envelope: Option<Envelope>,
    /// BODYSTRUCTURE.
    pub body_structure: Option<BodyStructure>,
    /// Decoded header section; names are lower-cased.
    pub headers: BTreeMap<String, HeaderValue>,
    /// Other body sections, keyed by section label (`TEXT`, `1`, `2.MIME`).
    pub sections: BTreeMap<String, BodySection>,
    /// Full message (`BODY[]` / `RFC822`).
    pub raw: Option<Vec<u8>>,
}

impl FetchedMessage {
    /// Creates an empty record for `seq`.
    #[must_use]
    pub fn new(seq: u32) -> Self {
        Self {
            seq,
            ..Self::default()
        }
    }

    /// Returns true if the message carries the `\Seen` flag.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case("\\Seen"))
    }

    /// Looks up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(&name.to_ascii_lowercase())
    }
}
