//! BODYSTRUCTURE data.
//!
//! A body structure is a tree: multipart nodes own their children, and a
//! MESSAGE/RFC822 leaf owns the structure of the message it encapsulates.
//! Trees are built bottom-up by the parser and never modified afterwards.

use std::collections::BTreeMap;

use super::Envelope;

/// Fields shared by every non-multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyFields {
    /// MIME type, upper-cased (`TEXT`, `IMAGE`, ...).
    pub media_type: String,
    /// MIME subtype, upper-cased (`PLAIN`, `JPEG`, ...).
    pub subtype: String,
    /// Content-Type parameters, keys upper-cased.
    pub params: BTreeMap<String, String>,
    /// Content-ID.
    pub id: Option<String>,
    /// Content-Description.
    pub description: Option<String>,
    /// Content-Transfer-Encoding, upper-cased.
    pub encoding: String,
    /// Size of the encoded body in bytes.
    pub size: u64,
}

impl Default for BodyFields {
    fn default() -> Self {
        Self {
            media_type: "TEXT".to_string(),
            subtype: "PLAIN".to_string(),
            params: BTreeMap::new(),
            id: None,
            description: None,
            encoding: "7BIT".to_string(),
            size: 0,
        }
    }
}

/// Content-Disposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    /// Disposition type, upper-cased (`ATTACHMENT`, `INLINE`).
    pub kind: String,
    /// Disposition parameters, keys upper-cased.
    pub params: BTreeMap<String, String>,
}

/// Optional extension data carried by every node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyExtension {
    /// Content-MD5.
    pub md5: Option<String>,
    /// Content-Disposition.
    pub disposition: Option<Disposition>,
    /// Content-Language tags (empty when absent).
    pub language: Vec<String>,
    /// Content-Location.
    pub location: Option<String>,
}

/// A node of a message's MIME structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    /// Any single part that is neither TEXT nor MESSAGE/RFC822.
    Basic {
        /// Part fields.
        fields: BodyFields,
        /// Extension data.
        extension: BodyExtension,
    },
    /// A TEXT/* part.
    Text {
        /// Part fields.
        fields: BodyFields,
        /// Size in lines.
        lines: u32,
        /// Extension data.
        extension: BodyExtension,
    },
    /// An encapsulated MESSAGE/RFC822 part.
    Message {
        /// Part fields.
        fields: BodyFields,
        /// Envelope of the nested message, if it could be read.
        envelope: Option<Box<Envelope>>,
        /// Structure of the nested message.
        body: Box<Self>,
        /// Size in lines.
        lines: u32,
        /// Extension data.
        extension: BodyExtension,
    },
    /// A MULTIPART/* node.
    Multipart {
        /// Child parts, in order.
        parts: Vec<Self>,
        /// Multipart subtype, upper-cased (`MIXED`, `ALTERNATIVE`, ...).
        subtype: String,
        /// Content-Type parameters, keys upper-cased.
        params: BTreeMap<String, String>,
        /// Extension data.
        extension: BodyExtension,
    },
}

impl BodyStructure {
    /// MIME type; `MULTIPART` for multipart nodes.
    #[must_use]
    pub fn media_type(&self) -> &str {
        match self {
            Self::Multipart { .. } => "MULTIPART",
            Self::Basic { fields, .. } | Self::Text { fields, .. } | Self::Message { fields, .. } => {
                &fields.media_type
            }
        }
    }

    /// MIME subtype.
    #[must_use]
    pub fn subtype(&self) -> &str {
        match self {
            Self::Multipart { subtype, .. } => subtype,
            Self::Basic { fields, .. } | Self::Text { fields, .. } | Self::Message { fields, .. } => {
                &fields.subtype
            }
        }
    }

    /// Part fields, or `None` for multipart nodes.
    #[must_use]
    pub const fn fields(&self) -> Option<&BodyFields> {
        match self {
            Self::Multipart { .. } => None,
            Self::Basic { fields, .. } | Self::Text { fields, .. } | Self::Message { fields, .. } => {
                Some(fields)
            }
        }
    }

    /// Content-Type parameters.
    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, String> {
        match self {
            Self::Multipart { params, .. } => params,
            Self::Basic { fields, .. } | Self::Text { fields, .. } | Self::Message { fields, .. } => {
                &fields.params
            }
        }
    }

    /// Extension data.
    #[must_use]
    pub const fn extension(&self) -> &BodyExtension {
        match self {
            Self::Basic { extension, .. }
            | Self::Text { extension, .. }
            | Self::Message { extension, .. }
            | Self::Multipart { extension, .. } => extension,
        }
    }

    /// Size in bytes. For multipart nodes this is the sum of the children.
    #[must_use]
    pub fn size(&self) -> u64 {
        match self {
            Self::Multipart { parts, .. } => parts.iter().map(Self::size).sum(),
            Self::Basic { fields, .. } | Self::Text { fields, .. } | Self::Message { fields, .. } => {
                fields.size
            }
        }
    }

    /// Returns true for multipart nodes.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart { .. })
    }
}

impl Default for BodyStructure {
    fn default() -> Self {
        Self::Basic {
            fields: BodyFields::default(),
            extension: BodyExtension::default(),
        }
    }
}

/// A part classified as an attachment, addressed by its section path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name from the disposition, the NAME parameter, or `unnamed`.
    pub filename: String,
    /// MIME type.
    pub media_type: String,
    /// MIME subtype.
    pub subtype: String,
    /// Encoded size in bytes.
    pub size: u64,
    /// Content-Transfer-Encoding.
    pub encoding: String,
    /// Section path (`2`, `1.3`, `2.1`) for `BODY[section]`.
    pub section: String,
    /// Content-ID, if any.
    pub content_id: Option<String>,
}
