//! Top-level item splitting for parenthesized IMAP data.
//!
//! Every structured parser in this crate is built on [`split_items`]: it
//! splits on spaces that are neither inside a quoted string nor inside a
//! nested `( )` or `[ ]` group. Quoted strings may contain backslash-escaped
//! quotes.

/// Splits `input` into its top-level items.
///
/// Consecutive spaces never produce empty items. Unbalanced input is split
/// as far as it goes; the remainder becomes the last item.
#[must_use]
pub fn split_items(input: &str) -> Vec<&str> {
    let bytes = input.as_bytes();
    let mut items = Vec::new();
    let mut start: Option<usize> = None;
    let mut paren_depth = 0usize;
    let mut bracket_depth = 0usize;
    let mut in_quote = false;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];

        if in_quote {
            match c {
                b'\\' => i += 1,
                b'"' => in_quote = false,
                _ => {}
            }
            i += 1;
            continue;
        }

        match c {
            b' ' if paren_depth == 0 && bracket_depth == 0 => {
                if let Some(s) = start.take() {
                    items.push(&input[s..i]);
                }
                i += 1;
                continue;
            }
            b'"' => in_quote = true,
            b'(' => paren_depth += 1,
            b')' => paren_depth = paren_depth.saturating_sub(1),
            b'[' => bracket_depth += 1,
            b']' => bracket_depth = bracket_depth.saturating_sub(1),
            _ => {}
        }

        if start.is_none() {
            start = Some(i);
        }
        i += 1;
    }

    if let Some(s) = start {
        items.push(&input[s..]);
    }
    items
}

/// Splits a run of parenthesized groups, with or without spaces between
/// them: `(a)(b) (c)` gives `(a)`, `(b)`, `(c)`.
///
/// Anything that is not a group is returned as its own item so that the
/// caller can reject it.
#[must_use]
pub fn split_groups(input: &str) -> Vec<&str> {
    let bytes = input.as_bytes();
    let mut groups = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b' ' => i += 1,
            b'(' => {
                let end = matching_paren(input, i).unwrap_or(bytes.len() - 1);
                groups.push(&input[i..=end]);
                i = end + 1;
            }
            _ => {
                let end = input[i..]
                    .find([' ', '('])
                    .map_or(bytes.len(), |offset| i + offset);
                groups.push(&input[i..end]);
                i = end;
            }
        }
    }
    groups
}

/// Finds the `)` that closes the `(` at byte offset `open`.
///
/// Parentheses inside quoted strings are ignored.
#[must_use]
pub fn matching_paren(input: &str, open: usize) -> Option<usize> {
    let bytes = input.as_bytes();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_quote = false;
    let mut i = open;
    while i < bytes.len() {
        let c = bytes[i];
        if in_quote {
            match c {
                b'\\' => i += 1,
                b'"' => in_quote = false,
                _ => {}
            }
        } else {
            match c {
                b'"' => in_quote = true,
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Removes one pair of enclosing parentheses.
///
/// Returns `None` unless the opening paren at the start is closed by the
/// paren at the very end.
#[must_use]
pub fn strip_parens(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if !trimmed.starts_with('(') {
        return None;
    }
    match matching_paren(trimmed, 0) {
        Some(end) if end == trimmed.len() - 1 => Some(&trimmed[1..end]),
        _ => None,
    }
}

/// Splits a parenthesized list into its items.
#[must_use]
pub fn parse_list(input: &str) -> Option<Vec<&str>> {
    strip_parens(input).map(split_items)
}

/// Returns true for the `NIL` atom.
#[must_use]
pub fn is_nil(item: &str) -> bool {
    item.eq_ignore_ascii_case("NIL")
}

/// Removes surrounding quotes and resolves `\"` and `\\` escapes.
///
/// Unquoted input is returned as is.
#[must_use]
pub fn unquote(item: &str) -> String {
    let Some(inner) = item
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return item.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Reads an nstring: `NIL` becomes `None`, anything else is unquoted.
#[must_use]
pub fn nstring(item: &str) -> Option<String> {
    if is_nil(item) { None } else { Some(unquote(item)) }
}

/// Quotes `value` as an IMAP quoted string.
#[must_use]
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Parses the `{N}` literal announcement at the end of a line.
///
/// Accepts the non-synchronizing `{N+}` form too.
#[must_use]
pub fn trailing_literal(line: &str) -> Option<usize> {
    let body = line.strip_suffix('}')?;
    let open = body.rfind('{')?;
    let digits = body[open + 1..].trim_end_matches('+');
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
