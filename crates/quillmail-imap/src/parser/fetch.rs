//! FETCH response grouping and parsing.
//!
//! A FETCH response arrives as lines, but a `{N}` literal can carry CRLFs
//! of its own, so a line inside a message body may look exactly like the
//! start of the next `* n FETCH`. [`group_fetch_lines`] counts literal bytes
//! to keep such payloads in their message. [`parse_fetch_group`] then
//! reads the key/value list of one message.

use std::collections::BTreeMap;

use crate::types::{BodySection, FetchedMessage, HeaderValue};

use super::body_structure::parse_body_structure;
use super::envelope::parse_envelope;
use super::tokenizer::{nstring, parse_list, quote, split_items, strip_parens, trailing_literal};

/// Prefix of the placeholder that stands for an extracted literal.
const LITERAL_MARKER: char = '\0';

/// The lines that make up one message of a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchGroup {
    /// Message sequence number from the `* n FETCH` line.
    pub seq: u32,
    /// The raw lines, literal payload lines included.
    pub lines: Vec<Vec<u8>>,
}

impl FetchGroup {
    /// The group's bytes with its lines joined by CRLF.
    #[must_use]
    pub fn raw(&self) -> Vec<u8> {
        self.lines.join(&b"\r\n"[..])
    }
}

/// Returns the sequence number if `line` starts a FETCH response.
#[must_use]
pub fn fetch_header_seq(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("* ")?;
    let (seq, rest) = rest.split_once(' ')?;
    let seq = seq.parse().ok()?;
    let keyword = rest.get(..5)?;
    if !keyword.eq_ignore_ascii_case("FETCH") {
        return None;
    }
    match rest.as_bytes().get(5) {
        None | Some(b' ' | b'(') => Some(seq),
        Some(_) => None,
    }
}

/// Groups the lines of a FETCH response into one group per message.
///
/// Lines are raw bytes. A line only starts a new group when no literal is
/// still collecting bytes; literal payload is counted as each line's byte
/// length plus the CRLF the line reader removed. Other untagged responses
/// and the tagged completion end the current group.
#[must_use]
pub fn group_fetch_lines<L: AsRef<[u8]>>(lines: &[L]) -> Vec<FetchGroup> {
    let mut groups = Vec::new();
    let mut current: Option<FetchGroup> = None;
    let mut pending = 0usize;

    for line in lines.iter().map(AsRef::as_ref) {
        if pending > 0 {
            if let Some(group) = current.as_mut() {
                group.lines.push(line.to_vec());
                let consumed = line.len() + 2;
                if consumed <= pending {
                    pending -= consumed;
                } else {
                    // The literal ends inside this line; what follows is
                    // response text again and may announce another literal.
                    let rest = line.get(pending..).unwrap_or_default();
                    pending = trailing_literal(&String::from_utf8_lossy(rest)).unwrap_or(0);
                }
                continue;
            }
            pending = 0;
        }

        let text = String::from_utf8_lossy(line);
        if let Some(seq) = fetch_header_seq(&text) {
            groups.extend(current.take());
            current = Some(FetchGroup {
                seq,
                lines: vec![line.to_vec()],
            });
            pending = trailing_literal(&text).unwrap_or(0);
            continue;
        }

        if text.starts_with("* ") {
            groups.extend(current.take());
            continue;
        }

        if is_tagged_completion(&text) {
            groups.extend(current.take());
        } else if let Some(group) = current.as_mut() {
            group.lines.push(line.to_vec());
            pending = trailing_literal(&text).unwrap_or(0);
        }
    }

    groups.extend(current);
    groups
}

/// `TAG OK|NO|BAD ...`
fn is_tagged_completion(line: &str) -> bool {
    let mut words = line.split(' ');
    let (Some(tag), Some(status)) = (words.next(), words.next()) else {
        return false;
    };
    !tag.is_empty()
        && tag.bytes().all(|b| b.is_ascii_alphanumeric())
        && ["OK", "NO", "BAD"]
            .iter()
            .any(|s| status.eq_ignore_ascii_case(s))
}

/// Groups and parses a whole FETCH response.
#[must_use]
pub fn parse_fetch_response<L: AsRef<[u8]>>(lines: &[L]) -> Vec<FetchedMessage> {
    group_fetch_lines(lines)
        .iter()
        .map(parse_fetch_group)
        .collect()
}

/// Parses one message group.
///
/// Unknown items are ignored. A list cut short (a literal shorter than
/// announced swallows the closing paren) is read as far as it goes. A
/// group without an item list yields a record with only its sequence
/// number.
#[must_use]
pub fn parse_fetch_group(group: &FetchGroup) -> FetchedMessage {
    let mut message = FetchedMessage::new(group.seq);
    let (text, literals) = extract_literals(&group.raw());

    let Some(open) = text.find('(') else {
        tracing::warn!(seq = group.seq, "FETCH response without item list");
        return message;
    };
    let list = match strip_parens(&text[open..]) {
        Some(list) => list,
        None => {
            tracing::debug!(seq = group.seq, "FETCH item list not terminated");
            &text[open + 1..]
        }
    };

    let items = split_items(list);
    for pair in items.chunks(2) {
        let [key, value] = pair else {
            tracing::debug!(seq = group.seq, item = pair[0], "FETCH item without value");
            continue;
        };
        apply_item(&mut message, key, value, &literals);
    }
    message
}

fn apply_item(message: &mut FetchedMessage, key: &str, value: &str, literals: &[BodySection]) {
    let upper = key.to_ascii_uppercase();
    match upper.as_str() {
        "FLAGS" => {
            message.flags = parse_list(value)
                .unwrap_or_default()
                .into_iter()
                .map(str::to_string)
                .collect();
        }
        "UID" => message.uid = value.parse().ok(),
        "RFC822.SIZE" => message.size = value.parse().ok(),
        "INTERNALDATE" => message.internal_date = nstring(value),
        "ENVELOPE" => message.envelope = Some(parse_envelope(value)),
        "BODYSTRUCTURE" | "BODY" => message.body_structure = Some(parse_body_structure(value)),
        "RFC822" => message.raw = payload(value, literals).map(|p| p.data),
        "RFC822.HEADER" => {
            if let Some(p) = payload(value, literals) {
                message.headers = parse_headers(&String::from_utf8_lossy(&p.data));
            }
        }
        "RFC822.TEXT" => {
            if let Some(p) = payload(value, literals) {
                message.sections.insert("TEXT".to_string(), p);
            }
        }
        _ if upper.starts_with("BODY[") || upper.starts_with("BINARY[") => {
            let Some(section) = section_label(key) else {
                return;
            };
            let Some(p) = payload(value, literals) else {
                return;
            };
            if section.is_empty() {
                message.raw = Some(p.data);
            } else if section.to_ascii_uppercase().starts_with("HEADER") {
                let headers = parse_headers(&String::from_utf8_lossy(&p.data));
                for (name, value) in headers {
                    merge_header(&mut message.headers, name, value);
                }
            } else {
                message.sections.insert(section.to_string(), p);
            }
        }
        _ => tracing::debug!(item = key, "ignoring FETCH item"),
    }
}

/// `BODY[1.2]<0>` gives `1.2`; `BODY[]` gives the empty label.
fn section_label(key: &str) -> Option<&str> {
    let open = key.find('[')?;
    let close = key.rfind(']')?;
    key.get(open + 1..close)
}

/// Resolves a section value: a literal marker, a quoted string or `NIL`.
fn payload(value: &str, literals: &[BodySection]) -> Option<BodySection> {
    if let Some(index) = value.strip_prefix(LITERAL_MARKER) {
        return literals.get(index.parse::<usize>().ok()?).cloned();
    }
    let data = nstring(value)?.into_bytes();
    Some(BodySection {
        size: data.len(),
        data,
    })
}

/// Pulls literals out of a group's raw bytes.
///
/// A literal that is the value of a top-level item (a body section) is
/// replaced by a marker token and returned separately, with the size the
/// server announced. A literal nested inside a structure (an ENVELOPE
/// subject, say) is inlined as a quoted string so that the structure
/// parsers see ordinary tokens. Only the remaining response text is
/// decoded.
fn extract_literals(raw: &[u8]) -> (String, Vec<BodySection>) {
    let mut out = Vec::with_capacity(raw.len());
    let mut literals = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut i = 0;

    while i < raw.len() {
        let c = raw[i];
        if in_quote {
            out.push(c);
            match c {
                b'\\' if i + 1 < raw.len() => {
                    out.push(raw[i + 1]);
                    i += 1;
                }
                b'"' => in_quote = false,
                _ => {}
            }
            i += 1;
            continue;
        }

        match c {
            b'"' => in_quote = true,
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'{' => {
                if let Some((size, header_len)) = literal_header(&raw[i..]) {
                    let start = i + header_len;
                    let end = start.saturating_add(size).min(raw.len());
                    let data = &raw[start..end];
                    if depth <= 1 {
                        out.extend_from_slice(format!("{LITERAL_MARKER}{}", literals.len()).as_bytes());
                        literals.push(BodySection {
                            data: data.to_vec(),
                            size,
                        });
                    } else {
                        out.extend_from_slice(quote(&String::from_utf8_lossy(data)).as_bytes());
                    }
                    i = end;
                    continue;
                }
            }
            _ => {}
        }
        out.push(c);
        i += 1;
    }

    (String::from_utf8_lossy(&out).into_owned(), literals)
}

/// Matches `{N}\r\n` (or `{N+}\r\n`) at the start of `bytes`.
///
/// Returns the literal size and the length of the announcement.
fn literal_header(bytes: &[u8]) -> Option<(usize, usize)> {
    let close = bytes.iter().position(|&b| b == b'}')?;
    let digits = std::str::from_utf8(&bytes[1..close]).ok()?;
    let digits = digits.strip_suffix('+').unwrap_or(digits);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if bytes.get(close + 1..close + 3) != Some(&b"\r\n"[..]) {
        return None;
    }
    Some((digits.parse().ok()?, close + 3))
}

/// Decodes a header block into lower-cased names and unfolded values.
///
/// Continuation lines are joined to the previous header with a single
/// space; repeated names collect into [`HeaderValue::Multiple`]. Parsing
/// stops at the first empty line.
#[must_use]
pub fn parse_headers(block: &str) -> BTreeMap<String, HeaderValue> {
    let mut unfolded: Vec<(String, String)> = Vec::new();

    for line in block.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)) {
        if line.is_empty() {
            if unfolded.is_empty() {
                continue;
            }
            break;
        }
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = unfolded.last_mut() {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            unfolded.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    let mut headers = BTreeMap::new();
    for (name, value) in unfolded {
        merge_header(&mut headers, name, HeaderValue::Single(value));
    }
    headers
}

fn merge_header(headers: &mut BTreeMap<String, HeaderValue>, name: String, value: HeaderValue) {
    match headers.get_mut(&name) {
        Some(existing) => {
            for v in value.all() {
                existing.push(v.to_string());
            }
        }
        None => {
            headers.insert(name, value);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_header_seq() {
        assert_eq!(fetch_header_seq("* 12 FETCH (FLAGS ())"), Some(12));
        assert_eq!(fetch_header_seq("* 3 fetch (UID 9)"), Some(3));
        assert_eq!(fetch_header_seq("* 3 EXISTS"), None);
        assert_eq!(fetch_header_seq("* 3 FETCHED"), None);
        assert_eq!(fetch_header_seq("A1 OK FETCH done"), None);
    }

    #[test]
    fn test_literal_spanning_lines_stays_in_one_group() {
        // "Subject: test\r\n" (15) + "hello\r\n" (7) = 22 bytes.
        let lines = [
            "* 1 FETCH (UID 7 BODY[] {22}",
            "Subject: test",
            "hello",
            ")",
            "A0004 OK FETCH completed",
        ];
        let groups = group_fetch_lines(&lines);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].lines.len(), 4);

        let messages = parse_fetch_response(&lines);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].uid, Some(7));
        assert_eq!(messages[0].raw.as_deref(), Some(&b"Subject: test\r\nhello\r\n"[..]));
    }

    #[test]
    fn test_fetch_lookalike_inside_literal() {
        // "* 2 FETCH (FLAGS ())\r\n" is 22 bytes of payload.
        let lines = [
            "* 1 FETCH (BODY[TEXT] {22}",
            "* 2 FETCH (FLAGS ())",
            ")",
            "* 2 FETCH (FLAGS (\\Seen))",
        ];
        let groups = group_fetch_lines(&lines);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].seq, 1);
        assert_eq!(groups[1].seq, 2);

        let messages = parse_fetch_response(&lines);
        let text = messages[0].sections.get("TEXT").unwrap();
        assert_eq!(text.size, 22);
        assert!(messages[1].is_seen());
    }

    #[test]
    fn test_literal_ending_mid_line() {
        let lines = [
            "* 1 FETCH (BODY[1] {5}",
            "hello BODY[2] {3}",
            "abc)",
            "* 2 FETCH (UID 3)",
        ];
        let messages = parse_fetch_response(&lines);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sections.get("1").unwrap().data, b"hello");
        assert_eq!(messages[0].sections.get("2").unwrap().data, b"abc");
        assert_eq!(messages[1].uid, Some(3));
    }

    #[test]
    fn test_eight_bit_literal_is_counted_in_bytes() {
        let lines: [&[u8]; 3] = [
            b"* 1 FETCH (BODY[1] {5}",
            b"caf\xE9! UID 7)",
            b"A0005 OK FETCH completed",
        ];
        let messages = parse_fetch_response(&lines);
        assert_eq!(messages.len(), 1);
        let section = messages[0].sections.get("1").unwrap();
        assert_eq!(section.data, b"caf\xE9!");
        assert_eq!(section.size, 5);
        assert_eq!(messages[0].uid, Some(7));
    }

    #[test]
    fn test_truncated_literal_keeps_declared_size() {
        let lines = ["* 1 FETCH (UID 4 BODY[TEXT] {10}", "abc"];
        let messages = parse_fetch_response(&lines);
        assert_eq!(messages[0].uid, Some(4));
        let text = messages[0].sections.get("TEXT").unwrap();
        assert_eq!(text.data, b"abc");
        assert_eq!(text.size, 10);
    }

    #[test]
    fn test_other_untagged_line_ends_group() {
        let lines = ["* 1 FETCH (UID 1)", "* 5 EXISTS", "* 2 FETCH (UID 2)"];
        let groups = group_fetch_lines(&lines);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_inline_items() {
        let lines = [concat!(
            r#"* 4 FETCH (UID 44 FLAGS (\Seen \Flagged) RFC822.SIZE 2048 "#,
            r#"INTERNALDATE "17-Jul-1996 02:44:25 -0700" "#,
            r#"ENVELOPE (NIL "Hi" (("A" NIL "a" "x.org")) NIL NIL NIL NIL NIL NIL "<m1@x.org>") "#,
            r#"BODYSTRUCTURE ("TEXT" "PLAIN" NIL NIL NIL "7BIT" 12 1))"#
        )];
        let messages = parse_fetch_response(&lines);
        let msg = &messages[0];
        assert_eq!(msg.seq, 4);
        assert_eq!(msg.uid, Some(44));
        assert!(msg.flags.contains("\\Flagged"));
        assert_eq!(msg.size, Some(2048));
        assert_eq!(msg.internal_date.as_deref(), Some("17-Jul-1996 02:44:25 -0700"));
        let envelope = msg.envelope.as_ref().unwrap();
        assert_eq!(envelope.subject.as_deref(), Some("Hi"));
        assert_eq!(envelope.message_id.as_deref(), Some("<m1@x.org>"));
        assert_eq!(msg.body_structure.as_ref().unwrap().size(), 12);
    }

    #[test]
    fn test_nested_literal_is_inlined() {
        // Subject sent as a literal inside the envelope.
        let lines = [
            "* 1 FETCH (ENVELOPE (NIL {7}",
            "a \"b\" c NIL NIL NIL NIL NIL NIL NIL NIL))",
        ];
        let messages = parse_fetch_response(&lines);
        let envelope = messages[0].envelope.as_ref().unwrap();
        assert_eq!(envelope.subject.as_deref(), Some("a \"b\" c"));
    }

    #[test]
    fn test_bad_envelope_gets_placeholder() {
        let messages = parse_fetch_response(&["* 1 FETCH (UID 2 ENVELOPE (NIL))"]);
        assert!(messages[0].envelope.as_ref().unwrap().is_placeholder());
        assert_eq!(messages[0].uid, Some(2));
    }

    #[test]
    fn test_header_section() {
        let header = "Subject: Hello\r\n world\r\nReceived: a\r\nReceived: b\r\nX-Empty:\r\n\r\n";
        let first = format!("* 9 FETCH (BODY[HEADER] {{{}}}", header.len());
        let mut lines = vec![first];
        lines.extend(header.split("\r\n").map(str::to_string));
        // The payload ends with an empty line; the closing paren follows.
        lines.pop();
        lines.push(")".to_string());

        let messages = parse_fetch_response(&lines);
        let msg = &messages[0];
        assert_eq!(msg.header("SUBJECT").unwrap().first(), "Hello world");
        assert_eq!(msg.header("received").unwrap().all(), vec!["a", "b"]);
        assert_eq!(msg.header("x-empty").unwrap().first(), "");
    }

    #[test]
    fn test_quoted_section_and_nil() {
        let messages =
            parse_fetch_response(&[r#"* 1 FETCH (BODY[1.MIME] "abc" BODY[2] NIL BODY[]<0> "x")"#]);
        let msg = &messages[0];
        assert_eq!(msg.sections.get("1.MIME").unwrap().size, 3);
        assert!(!msg.sections.contains_key("2"));
        assert_eq!(msg.raw.as_deref(), Some(&b"x"[..]));
    }

    #[test]
    fn test_parse_headers_folding() {
        let headers = parse_headers("To: a@x.org,\r\n\tb@x.org\r\nSubject: s\r\n\r\nbody: no");
        assert_eq!(headers.get("to").unwrap().first(), "a@x.org, b@x.org");
        assert!(!headers.contains_key("body"));
    }
}
