//! Command tags.

/// Hands out the tags that pair commands with their completions.
///
/// Tags read `A0001`, `A0002` and so on, zero-padded to four digits and
/// wider once past 9999. One generator never repeats a tag, so a client
/// keeps the same generator across reconnections.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    prefix: char,
    issued: u32,
}

impl TagGenerator {
    /// A generator whose tags start with `prefix`.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { prefix, issued: 0 }
    }

    /// The next unused tag.
    pub fn next_tag(&mut self) -> String {
        self.issued = self.issued.wrapping_add(1);
        format!("{}{:04}", self.prefix, self.issued)
    }

    /// How many tags have been handed out.
    #[must_use]
    pub const fn issued(&self) -> u32 {
        self.issued
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}
