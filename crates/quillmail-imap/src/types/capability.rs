//! Server capabilities.

use std::collections::BTreeSet;

/// The set of capabilities advertised by a server.
///
/// Tokens are stored upper-cased; lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(BTreeSet<String>);

impl Capabilities {
    /// Creates an empty capability set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a capability token.
    pub fn insert(&mut self, token: &str) {
        self.0.insert(token.to_ascii_uppercase());
    }

    /// Returns true if the server advertises `token`.
    #[must_use]
    pub fn has(&self, token: &str) -> bool {
        self.0.contains(&token.to_ascii_uppercase())
    }

    /// Returns true if the server advertises `AUTH={mechanism}`.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.has(&format!("AUTH={mechanism}"))
    }

    /// Returns true if the server supports MOVE (RFC 6851).
    #[must_use]
    pub fn supports_move(&self) -> bool {
        self.has("MOVE")
    }

    /// Returns true if the server accepts an initial SASL response.
    #[must_use]
    pub fn supports_sasl_ir(&self) -> bool {
        self.has("SASL-IR")
    }

    /// Number of advertised tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing is advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the upper-cased tokens.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Removes every token.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl<'a> FromIterator<&'a str> for Capabilities {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut caps = Self::new();
        for token in iter {
            caps.insert(token);
        }
        caps
    }
}
