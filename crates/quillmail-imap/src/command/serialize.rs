//! Command serialization helpers.

use super::types::{FetchAttribute, FetchItems, SearchCriteria};

/// Writes an astring (atom or quoted string).
pub fn write_astring(buf: &mut String, s: &str) {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        buf.push('"');
        for c in s.chars() {
            if c == '"' || c == '\\' {
                buf.push('\\');
            }
            buf.push(c);
        }
        buf.push('"');
    } else {
        buf.push_str(s);
    }
}

/// Returns true if the byte needs quoting.
const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'
    ) || b < 0x20
        || b >= 0x7F
}

/// Writes a parenthesized, space-separated flag list.
pub fn write_flag_list<S: AsRef<str>>(buf: &mut String, flags: &[S]) {
    buf.push('(');
    for (i, flag) in flags.iter().enumerate() {
        if i > 0 {
            buf.push(' ');
        }
        buf.push_str(flag.as_ref());
    }
    buf.push(')');
}

/// Writes FETCH items.
pub fn write_fetch_items(buf: &mut String, items: &FetchItems) {
    match items {
        FetchItems::All => buf.push_str("ALL"),
        FetchItems::Full => buf.push_str("FULL"),
        FetchItems::Fast => buf.push_str("FAST"),
        FetchItems::Items(attrs) => {
            if let [attr] = attrs.as_slice() {
                write_fetch_attribute(buf, attr);
            } else {
                buf.push('(');
                for (i, attr) in attrs.iter().enumerate() {
                    if i > 0 {
                        buf.push(' ');
                    }
                    write_fetch_attribute(buf, attr);
                }
                buf.push(')');
            }
        }
    }
}

/// Writes a single FETCH attribute.
pub fn write_fetch_attribute(buf: &mut String, attr: &FetchAttribute) {
    match attr {
        FetchAttribute::Flags => buf.push_str("FLAGS"),
        FetchAttribute::InternalDate => buf.push_str("INTERNALDATE"),
        FetchAttribute::Rfc822Size => buf.push_str("RFC822.SIZE"),
        FetchAttribute::Envelope => buf.push_str("ENVELOPE"),
        FetchAttribute::BodyStructure => buf.push_str("BODYSTRUCTURE"),
        FetchAttribute::Uid => buf.push_str("UID"),
        FetchAttribute::Header => buf.push_str("BODY.PEEK[HEADER]"),
        FetchAttribute::Rfc822 => buf.push_str("RFC822"),
        FetchAttribute::Body { section, peek } => {
            buf.push_str(if *peek { "BODY.PEEK[" } else { "BODY[" });
            if let Some(s) = section {
                buf.push_str(s);
            }
            buf.push(']');
        }
    }
}

/// Writes SEARCH criteria.
pub fn write_search_criteria(buf: &mut String, criteria: &SearchCriteria) {
    match criteria {
        SearchCriteria::All => buf.push_str("ALL"),
        SearchCriteria::Answered => buf.push_str("ANSWERED"),
        SearchCriteria::Deleted => buf.push_str("DELETED"),
        SearchCriteria::Flagged => buf.push_str("FLAGGED"),
        SearchCriteria::Unseen => buf.push_str("UNSEEN"),
        SearchCriteria::Seen => buf.push_str("SEEN"),
        SearchCriteria::Uid(set) => {
            buf.push_str("UID ");
            buf.push_str(set);
        }
        SearchCriteria::Subject(s) => write_keyed(buf, "SUBJECT", s),
        SearchCriteria::From(s) => write_keyed(buf, "FROM", s),
        SearchCriteria::To(s) => write_keyed(buf, "TO", s),
        SearchCriteria::Body(s) => write_keyed(buf, "BODY", s),
        SearchCriteria::Text(s) => write_keyed(buf, "TEXT", s),
        SearchCriteria::Since(date) => write_keyed(buf, "SINCE", date),
        SearchCriteria::Before(date) => write_keyed(buf, "BEFORE", date),
        SearchCriteria::Larger(n) => buf.push_str(&format!("LARGER {n}")),
        SearchCriteria::Smaller(n) => buf.push_str(&format!("SMALLER {n}")),
        SearchCriteria::Header(name, value) => {
            buf.push_str("HEADER ");
            write_astring(buf, name);
            buf.push(' ');
            write_astring(buf, value);
        }
        SearchCriteria::And(criteria) => {
            if criteria.is_empty() {
                buf.push_str("ALL");
            }
            for (i, c) in criteria.iter().enumerate() {
                if i > 0 {
                    buf.push(' ');
                }
                let nested = matches!(c, SearchCriteria::And(_));
                if nested {
                    buf.push('(');
                }
                write_search_criteria(buf, c);
                if nested {
                    buf.push(')');
                }
            }
        }
        SearchCriteria::Or(a, b) => {
            buf.push_str("OR ");
            write_search_operand(buf, a);
            buf.push(' ');
            write_search_operand(buf, b);
        }
        SearchCriteria::Not(c) => {
            buf.push_str("NOT ");
            write_search_operand(buf, c);
        }
    }
}

fn write_keyed(buf: &mut String, key: &str, value: &str) {
    buf.push_str(key);
    buf.push(' ');
    write_astring(buf, value);
}

/// OR and NOT take a single search key; a conjunction must be grouped.
fn write_search_operand(buf: &mut String, criteria: &SearchCriteria) {
    if matches!(criteria, SearchCriteria::And(c) if c.len() > 1) {
        buf.push('(');
        write_search_criteria(buf, criteria);
        buf.push(')');
    } else {
        write_search_criteria(buf, criteria);
    }
}
