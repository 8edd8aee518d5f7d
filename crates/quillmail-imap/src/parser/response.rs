//! Parsers for flat, line-oriented responses.
//!
//! CAPABILITY, LIST/LSUB, STATUS, SELECT/EXAMINE and SEARCH responses are
//! made of independent untagged lines. The single-line parsers are strict
//! and return [`Error::Parse`]; the batch parsers log and skip lines they
//! cannot read.

use std::collections::BTreeSet;

use crate::types::{Capabilities, MailboxEntry, MailboxSnapshot, MailboxStatus};
use crate::{Error, Result};

use super::tokenizer::{nstring, parse_list, quote, split_items, trailing_literal, unquote};

/// Strips `* KEYWORD ` from an untagged line, case-insensitively.
///
/// Returns the text after the keyword (possibly empty).
#[must_use]
pub fn untagged_payload<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix("* ")?;
    let head = rest.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let tail = &rest[keyword.len()..];
    if tail.is_empty() {
        Some(tail)
    } else {
        tail.strip_prefix(' ')
    }
}

/// Extracts the bracketed response code of a status line, without its
/// arguments (`"* OK [UIDNEXT 4] ..."` gives `UIDNEXT`).
#[must_use]
pub fn response_code(line: &str) -> Option<String> {
    let open = line.find('[')?;
    let close = open + line[open..].find(']')?;
    let inner = &line[open + 1..close];
    inner
        .split(' ')
        .next()
        .filter(|code| !code.is_empty())
        .map(str::to_ascii_uppercase)
}

/// Returns the full text inside the brackets of a response code, if the
/// code matches `name`.
fn response_code_args<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let open = line.find('[')?;
    let close = open + line[open..].find(']')?;
    let inner = &line[open + 1..close];
    let head = inner.get(..name.len())?;
    if !head.eq_ignore_ascii_case(name) {
        return None;
    }
    Some(inner[name.len()..].trim_start())
}

/// Parses a `* CAPABILITY ...` line.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the line is not a CAPABILITY response.
pub fn parse_capability_line(line: &str) -> Result<Capabilities> {
    let payload = untagged_payload(line, "CAPABILITY")
        .ok_or_else(|| Error::parse("capability response", line))?;
    Ok(payload.split_whitespace().collect())
}

/// Finds capabilities in a set of response lines.
///
/// Looks for an untagged CAPABILITY response first, then for a
/// `[CAPABILITY ...]` response code (greetings, tagged OK after login).
#[must_use]
pub fn find_capabilities<S: AsRef<str>>(lines: &[S]) -> Option<Capabilities> {
    lines
        .iter()
        .find_map(|line| parse_capability_line(line.as_ref()).ok())
        .or_else(|| {
            lines.iter().find_map(|line| {
                response_code_args(line.as_ref(), "CAPABILITY")
                    .map(|args| args.split_whitespace().collect())
            })
        })
}

/// Parses one `* LIST` or `* LSUB` line.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the line is not a LIST/LSUB response or is
/// missing its attribute list, delimiter or name.
pub fn parse_list_line(line: &str) -> Result<MailboxEntry> {
    let payload = untagged_payload(line, "LIST")
        .or_else(|| untagged_payload(line, "LSUB"))
        .ok_or_else(|| Error::parse("list response", line))?;

    let items = split_items(payload);
    let [flags, delimiter, name, ..] = items.as_slice() else {
        return Err(Error::parse("list response", line));
    };

    let flags = parse_list(flags)
        .ok_or_else(|| Error::parse("list attributes", line))?
        .into_iter()
        .map(str::to_string)
        .collect();

    Ok(MailboxEntry {
        name: unquote(name),
        delimiter: nstring(delimiter),
        flags,
    })
}

/// Parses all LIST/LSUB lines of a response.
///
/// A name sent as a literal (`{N}` at the end of the line, the name on the
/// next line) is joined back before parsing. Unreadable lines are skipped.
#[must_use]
pub fn parse_list_response<S: AsRef<str>>(lines: &[S]) -> Vec<MailboxEntry> {
    let mut entries = Vec::new();
    let mut iter = lines.iter().map(AsRef::as_ref);

    while let Some(line) = iter.next() {
        if untagged_payload(line, "LIST").is_none() && untagged_payload(line, "LSUB").is_none() {
            continue;
        }

        let joined;
        let line = match trailing_literal(line) {
            Some(_) => {
                let open = line.rfind('{').unwrap_or(line.len());
                let name = iter.next().unwrap_or_default();
                joined = format!("{}{}", &line[..open], quote(name));
                joined.as_str()
            }
            None => line,
        };

        match parse_list_line(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::warn!(?e, "skipping unreadable LIST line"),
        }
    }
    entries
}

/// Parses one `* STATUS name (KEY value ...)` line.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the line is not a STATUS response or its
/// attribute list is malformed.
pub fn parse_status_line(line: &str) -> Result<MailboxStatus> {
    let payload =
        untagged_payload(line, "STATUS").ok_or_else(|| Error::parse("status response", line))?;

    let items = split_items(payload);
    let [name, attributes, ..] = items.as_slice() else {
        return Err(Error::parse("status response", line));
    };
    let attributes = parse_list(attributes).ok_or_else(|| Error::parse("status items", line))?;

    let mut status = MailboxStatus {
        name: unquote(name),
        ..MailboxStatus::default()
    };
    for pair in attributes.chunks(2) {
        let [key, value] = pair else {
            return Err(Error::parse("status items", line));
        };
        let value: u32 = value
            .parse()
            .map_err(|_| Error::parse("status value", line))?;
        match key.to_ascii_uppercase().as_str() {
            "MESSAGES" => status.messages = Some(value),
            "RECENT" => status.recent = Some(value),
            "UNSEEN" => status.unseen = Some(value),
            "UIDNEXT" => status.uid_next = Some(value),
            "UIDVALIDITY" => status.uid_validity = Some(value),
            other => tracing::debug!(item = other, "ignoring unknown STATUS item"),
        }
    }
    Ok(status)
}

/// Finds and parses the STATUS line of a response, skipping bad lines.
#[must_use]
pub fn parse_status_response<S: AsRef<str>>(lines: &[S]) -> Option<MailboxStatus> {
    lines.iter().map(AsRef::as_ref).find_map(|line| {
        untagged_payload(line, "STATUS")?;
        match parse_status_line(line) {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::warn!(?e, "skipping unreadable STATUS line");
                None
            }
        }
    })
}

/// Builds a mailbox snapshot from the lines of a SELECT or EXAMINE response.
///
/// Each line is read independently and any of them may be missing. The
/// tagged completion line may be included; its `[READ-ONLY]` code marks the
/// snapshot read-only.
#[must_use]
pub fn parse_select_response<S: AsRef<str>>(name: &str, lines: &[S]) -> MailboxSnapshot {
    let mut snapshot = MailboxSnapshot::new(name);

    for line in lines.iter().map(AsRef::as_ref) {
        if let Some(flags) = untagged_payload(line, "FLAGS") {
            snapshot.flags = flag_set(flags);
            continue;
        }

        if let Some(rest) = line.strip_prefix("* ") {
            let mut words = rest.split(' ');
            if let (Some(count), Some(kind)) = (words.next(), words.next()) {
                if let Ok(count) = count.parse::<u32>() {
                    if kind.eq_ignore_ascii_case("EXISTS") {
                        snapshot.exists = count;
                    } else if kind.eq_ignore_ascii_case("RECENT") {
                        snapshot.recent = count;
                    }
                    continue;
                }
            }
        }

        match response_code(line).as_deref() {
            Some("UNSEEN") => snapshot.first_unseen = code_number(line, "UNSEEN"),
            Some("UIDNEXT") => snapshot.uid_next = code_number(line, "UIDNEXT"),
            Some("UIDVALIDITY") => snapshot.uid_validity = code_number(line, "UIDVALIDITY"),
            Some("PERMANENTFLAGS") => {
                if let Some(args) = response_code_args(line, "PERMANENTFLAGS") {
                    snapshot.permanent_flags = flag_set(args);
                }
            }
            Some("READ-ONLY") => snapshot.read_only = true,
            Some("READ-WRITE") => snapshot.read_only = false,
            _ => {}
        }
    }
    snapshot
}

fn code_number(line: &str, name: &str) -> Option<u32> {
    let args = response_code_args(line, name)?;
    args.split(' ').next()?.trim_end_matches(']').parse().ok()
}

fn flag_set(list: &str) -> BTreeSet<String> {
    parse_list(list)
        .unwrap_or_default()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Parses the `* SEARCH` lines of a response into message numbers.
///
/// # Errors
///
/// Returns [`Error::Parse`] if a SEARCH line holds something other than
/// numbers.
pub fn parse_search_response<S: AsRef<str>>(lines: &[S]) -> Result<Vec<u32>> {
    let mut ids = Vec::new();
    for line in lines.iter().map(AsRef::as_ref) {
        let Some(payload) = untagged_payload(line, "SEARCH") else {
            continue;
        };
        for word in payload.split_whitespace() {
            let id = word
                .parse()
                .map_err(|_| Error::parse("search response", line))?;
            ids.push(id);
        }
    }
    Ok(ids)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_line() {
        let caps = parse_capability_line("* CAPABILITY IMAP4rev1 AUTH=PLAIN IDLE").unwrap();
        assert!(caps.has("IMAP4REV1"));
        assert!(caps.supports_auth("PLAIN"));
        assert_eq!(caps.len(), 3);
        assert!(parse_capability_line("* OK ready").is_err());
    }

    #[test]
    fn test_capabilities_from_response_code() {
        let lines = ["* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=PLAIN] ready"];
        let caps = find_capabilities(&lines).unwrap();
        assert!(caps.supports_sasl_ir());
        assert!(caps.supports_auth("plain"));
    }

    #[test]
    fn test_list_line() {
        let entry = parse_list_line(r#"* LIST (\HasNoChildren \Sent) "/" "Sent Items""#).unwrap();
        assert_eq!(entry.name, "Sent Items");
        assert_eq!(entry.delimiter.as_deref(), Some("/"));
        assert!(entry.flags.contains("\\Sent"));
    }

    #[test]
    fn test_list_nil_delimiter() {
        let entry = parse_list_line("* LSUB () NIL INBOX").unwrap();
        assert_eq!(entry.name, "INBOX");
        assert!(entry.delimiter.is_none());
    }

    #[test]
    fn test_list_response_skips_bad_lines_and_joins_literals() {
        let lines = [
            r#"* LIST (\HasNoChildren) "." INBOX"#,
            "* LIST garbage",
            r#"* LIST () "." {9}"#,
            "Odd \"Box\"",
            "A0002 OK LIST completed",
        ];
        let entries = parse_list_response(&lines);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name, "Odd \"Box\"");
    }

    #[test]
    fn test_status_line() {
        let status = parse_status_line(r#"* STATUS "INBOX" (MESSAGES 3 UNSEEN 1 UIDNEXT 4)"#).unwrap();
        assert_eq!(status.name, "INBOX");
        assert_eq!(status.messages, Some(3));
        assert_eq!(status.unseen, Some(1));
        assert_eq!(status.uid_next, Some(4));
        assert_eq!(status.recent, None);
        assert!(parse_status_line("* STATUS INBOX (MESSAGES x)").is_err());
    }

    #[test]
    fn test_select_response() {
        let lines = [
            r"* FLAGS (\Answered \Flagged \Deleted \Seen \Draft)",
            r"* OK [PERMANENTFLAGS (\Deleted \Seen \*)] Limited",
            "* 3 EXISTS",
            "* 0 RECENT",
            "* OK [UNSEEN 3] First unseen",
            "* OK [UIDNEXT 4] Predicted next UID",
            "* OK [UIDVALIDITY 1740855787] UIDs valid",
            "A0003 OK [READ-ONLY] EXAMINE completed",
        ];
        let snapshot = parse_select_response("INBOX", &lines);
        assert_eq!(snapshot.exists, 3);
        assert_eq!(snapshot.recent, 0);
        assert_eq!(snapshot.first_unseen, Some(3));
        assert_eq!(snapshot.uid_next, Some(4));
        assert_eq!(snapshot.uid_validity, Some(1_740_855_787));
        assert_eq!(snapshot.flags.len(), 5);
        assert!(snapshot.permanent_flags.contains("\\*"));
        assert!(snapshot.read_only);
        assert!(snapshot.unseen.is_none());
    }

    #[test]
    fn test_select_response_partial() {
        let snapshot = parse_select_response("Archive", &["* 7 EXISTS"]);
        assert_eq!(snapshot.exists, 7);
        assert!(snapshot.uid_validity.is_none());
        assert!(snapshot.flags.is_empty());
    }

    #[test]
    fn test_search() {
        let lines = ["* SEARCH 2 84 882", "* SEARCH", "A0005 OK SEARCH completed"];
        assert_eq!(parse_search_response(&lines).unwrap(), vec![2, 84, 882]);
        assert!(parse_search_response(&["* SEARCH 1 x"]).is_err());
    }

    #[test]
    fn test_response_code() {
        assert_eq!(
            response_code("A0001 NO [TRYCREATE] No such mailbox").as_deref(),
            Some("TRYCREATE")
        );
        assert_eq!(response_code("A0001 NO failed"), None);
    }

    #[test]
    fn test_code_arguments_stop_at_first_bracket() {
        let lines = [
            "* OK [PERMANENTFLAGS (\\Deleted \\Seen)] Limited [see admin]",
            "* OK [UIDVALIDITY 7] UIDs valid [v2]",
            "A0002 OK SELECT completed",
        ];
        let snapshot = parse_select_response("INBOX", &lines);
        assert_eq!(snapshot.permanent_flags.len(), 2);
        assert!(snapshot.permanent_flags.contains("\\Deleted"));
        assert_eq!(snapshot.uid_validity, Some(7));
    }
}
