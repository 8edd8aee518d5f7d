//! BODYSTRUCTURE parsing and attachment discovery.
//!
//! Parsing is tolerant: missing or malformed leaf fields fall back to
//! `TEXT/PLAIN`, `7BIT`, size 0, and each extension field (MD5,
//! disposition, language, location) degrades to absent on its own. A
//! malformed structure therefore never fails a whole FETCH.

use std::collections::BTreeMap;

use crate::types::{Attachment, BodyExtension, BodyFields, BodyStructure, Disposition};

use super::envelope::try_parse_envelope;
use super::tokenizer::{is_nil, matching_paren, nstring, parse_list, split_items, strip_parens};

/// Parses a body structure.
///
/// `input` is one parenthesized expression; the enclosing parentheses may
/// already be stripped.
#[must_use]
pub fn parse_body_structure(input: &str) -> BodyStructure {
    let trimmed = input.trim();
    let inner = match strip_parens(trimmed) {
        Some(inner) => inner,
        // Truncated input: drop the unclosed opening paren.
        None if trimmed.starts_with('(') && matching_paren(trimmed, 0).is_none() => &trimmed[1..],
        None => trimmed,
    };

    // A leaf starts with its quoted type; a multipart with its first child.
    if inner.starts_with('(') {
        parse_multipart(inner)
    } else {
        parse_leaf(inner)
    }
}

fn parse_multipart(input: &str) -> BodyStructure {
    let mut parts = Vec::new();
    let mut rest = input.trim_start();

    while rest.starts_with('(') {
        let Some(end) = matching_paren(rest, 0) else {
            tracing::warn!(part = rest, "unbalanced multipart child");
            parts.push(parse_body_structure(&rest[1..]));
            rest = "";
            break;
        };
        parts.push(parse_body_structure(&rest[..=end]));
        rest = rest[end + 1..].trim_start();
    }

    let tail = split_items(rest);
    let subtype = tail
        .first()
        .and_then(|s| nstring(s))
        .map_or_else(|| "MIXED".to_string(), |s| s.to_ascii_uppercase());
    let params = tail.get(1).map(|s| parse_params(s)).unwrap_or_default();

    let mut extension = BodyExtension::default();
    parse_trailing_extension(tail.get(2..).unwrap_or_default(), &mut extension);

    BodyStructure::Multipart {
        parts,
        subtype,
        params,
        extension,
    }
}

fn parse_leaf(input: &str) -> BodyStructure {
    let items = split_items(input);
    let text = |index: usize| items.get(index).and_then(|s| nstring(s));

    let fields = BodyFields {
        media_type: text(0).map_or_else(|| "TEXT".to_string(), |s| s.to_ascii_uppercase()),
        subtype: text(1).map_or_else(|| "PLAIN".to_string(), |s| s.to_ascii_uppercase()),
        params: items.get(2).map(|s| parse_params(s)).unwrap_or_default(),
        id: text(3),
        description: text(4),
        encoding: text(5).map_or_else(|| "7BIT".to_string(), |s| s.to_ascii_uppercase()),
        size: items.get(6).and_then(|s| s.parse().ok()).unwrap_or(0),
    };
    let number = |index: usize| items.get(index).and_then(|s| s.parse().ok()).unwrap_or(0);
    let extension_from = |index: usize| parse_leaf_extension(items.get(index..).unwrap_or_default());

    match (fields.media_type.as_str(), fields.subtype.as_str()) {
        ("TEXT", _) => BodyStructure::Text {
            lines: number(7),
            extension: extension_from(8),
            fields,
        },
        ("MESSAGE", "RFC822") => {
            let envelope = items.get(7).and_then(|s| match try_parse_envelope(s) {
                Ok(envelope) => Some(Box::new(envelope)),
                Err(e) => {
                    tracing::warn!(?e, "nested envelope unreadable");
                    None
                }
            });
            BodyStructure::Message {
                envelope,
                body: Box::new(items.get(8).map(|s| parse_body_structure(s)).unwrap_or_default()),
                lines: number(9),
                extension: extension_from(10),
                fields,
            }
        }
        _ => BodyStructure::Basic {
            extension: extension_from(7),
            fields,
        },
    }
}

fn parse_leaf_extension(tail: &[&str]) -> BodyExtension {
    let mut extension = BodyExtension {
        md5: tail.first().and_then(|s| nstring(s)),
        ..BodyExtension::default()
    };
    parse_trailing_extension(tail.get(1..).unwrap_or_default(), &mut extension);
    extension
}

/// Disposition, language and location, in that order.
fn parse_trailing_extension(tail: &[&str], extension: &mut BodyExtension) {
    extension.disposition = tail.first().and_then(|s| parse_disposition(s));
    extension.language = tail.get(1).map(|s| parse_language(s)).unwrap_or_default();
    extension.location = tail.get(2).and_then(|s| nstring(s));
}

/// Parses `("key" "value" ...)` into a map with upper-cased keys.
fn parse_params(input: &str) -> BTreeMap<String, String> {
    if is_nil(input) {
        return BTreeMap::new();
    }
    let Some(items) = parse_list(input) else {
        tracing::debug!(params = input, "ignoring malformed parameter list");
        return BTreeMap::new();
    };
    items
        .chunks_exact(2)
        .filter_map(|pair| {
            let key = nstring(pair[0])?.to_ascii_uppercase();
            let value = nstring(pair[1]).unwrap_or_default();
            Some((key, value))
        })
        .collect()
}

fn parse_disposition(input: &str) -> Option<Disposition> {
    if is_nil(input) {
        return None;
    }
    let items = parse_list(input)?;
    let kind = nstring(items.first()?)?.to_ascii_uppercase();
    let params = items.get(1).map(|s| parse_params(s)).unwrap_or_default();
    Some(Disposition { kind, params })
}

fn parse_language(input: &str) -> Vec<String> {
    if is_nil(input) {
        return Vec::new();
    }
    match parse_list(input) {
        Some(items) => items.into_iter().filter_map(nstring).collect(),
        None => nstring(input).into_iter().collect(),
    }
}

/// Returns true if `tree` or any part below it is an attachment.
#[must_use]
pub fn has_attachments(tree: &BodyStructure) -> bool {
    match tree {
        BodyStructure::Multipart { parts, .. } => parts.iter().any(has_attachments),
        BodyStructure::Message { body, .. } => is_attachment(tree) || has_attachments(body),
        BodyStructure::Basic { .. } | BodyStructure::Text { .. } => is_attachment(tree),
    }
}

/// Lists every attachment in `tree` with the section path that fetches it.
#[must_use]
pub fn find_attachments(tree: &BodyStructure) -> Vec<Attachment> {
    let mut found = Vec::new();
    collect_attachments(tree, "", &mut found);
    found
}

fn collect_attachments(node: &BodyStructure, path: &str, found: &mut Vec<Attachment>) {
    match node {
        BodyStructure::Multipart { parts, .. } => {
            for (index, part) in parts.iter().enumerate() {
                let child = child_path(path, index + 1);
                collect_attachments(part, &child, found);
            }
        }
        BodyStructure::Message { body, .. } => {
            let own = leaf_path(path);
            if is_attachment(node) {
                found.push(attachment_record(node, &own));
            }
            // The parts of an encapsulated multipart are numbered directly
            // under the message part; a single-part body is `.1`.
            if body.is_multipart() {
                collect_attachments(body, &own, found);
            } else {
                collect_attachments(body, &child_path(&own, 1), found);
            }
        }
        BodyStructure::Basic { .. } | BodyStructure::Text { .. } => {
            if is_attachment(node) {
                found.push(attachment_record(node, &leaf_path(path)));
            }
        }
    }
}

fn child_path(parent: &str, number: usize) -> String {
    if parent.is_empty() {
        number.to_string()
    } else {
        format!("{parent}.{number}")
    }
}

/// A single-part message is section `1`.
fn leaf_path(path: &str) -> String {
    if path.is_empty() {
        "1".to_string()
    } else {
        path.to_string()
    }
}

fn is_attachment(node: &BodyStructure) -> bool {
    let Some(fields) = node.fields() else {
        return false;
    };
    let disposition = node.extension().disposition.as_ref();

    if let Some(disposition) = disposition {
        if disposition.kind == "ATTACHMENT" {
            return true;
        }
        if disposition.kind == "INLINE" && disposition.params.contains_key("FILENAME") {
            return true;
        }
    }

    matches!(
        fields.media_type.as_str(),
        "APPLICATION" | "IMAGE" | "AUDIO" | "VIDEO"
    ) || fields.params.contains_key("NAME")
        || (matches!(node, BodyStructure::Message { .. }) && disposition.is_none())
}

fn attachment_record(node: &BodyStructure, section: &str) -> Attachment {
    let fields = node.fields().cloned().unwrap_or_default();
    let filename = node
        .extension()
        .disposition
        .as_ref()
        .and_then(|d| d.params.get("FILENAME"))
        .or_else(|| fields.params.get("NAME"))
        .cloned()
        .unwrap_or_else(|| "unnamed".to_string());

    Attachment {
        filename,
        media_type: fields.media_type,
        subtype: fields.subtype,
        size: fields.size,
        encoding: fields.encoding,
        section: section.to_string(),
        content_id: fields.id,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const TEXT_PLAIN: &str = r#"("TEXT" "PLAIN" ("CHARSET" "US-ASCII") NIL NIL "7BIT" 3028 92)"#;

    #[test]
    fn test_text_leaf() {
        let body = parse_body_structure(TEXT_PLAIN);
        let BodyStructure::Text { fields, lines, .. } = &body else {
            panic!("expected text leaf, got {body:?}");
        };
        assert_eq!(fields.subtype, "PLAIN");
        assert_eq!(fields.params.get("CHARSET").map(String::as_str), Some("US-ASCII"));
        assert_eq!(fields.size, 3028);
        assert_eq!(*lines, 92);
        assert!(!has_attachments(&body));
    }

    #[test]
    fn test_short_leaf_uses_defaults() {
        let body = parse_body_structure("()");
        let fields = body.fields().unwrap();
        assert_eq!(fields.media_type, "TEXT");
        assert_eq!(fields.subtype, "PLAIN");
        assert_eq!(fields.encoding, "7BIT");
        assert_eq!(fields.size, 0);
        assert!(fields.params.is_empty());

        let body = parse_body_structure(r#"("IMAGE" "PNG" garbage"#);
        assert_eq!(body.media_type(), "IMAGE");
        assert_eq!(body.size(), 0);
    }

    #[test]
    fn test_leaf_extension_fields() {
        let body = parse_body_structure(
            r#"("APPLICATION" "PDF" ("NAME" "r.pdf") "<id1>" NIL "BASE64" 4096 "md5sum" ("ATTACHMENT" ("FILENAME" "report.pdf")) ("en" "de") "http://x")"#,
        );
        let ext = body.extension();
        assert_eq!(ext.md5.as_deref(), Some("md5sum"));
        let disposition = ext.disposition.as_ref().unwrap();
        assert_eq!(disposition.kind, "ATTACHMENT");
        assert_eq!(
            disposition.params.get("FILENAME").map(String::as_str),
            Some("report.pdf")
        );
        assert_eq!(ext.language, vec!["en", "de"]);
        assert_eq!(ext.location.as_deref(), Some("http://x"));

        let found = find_attachments(&body);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].filename, "report.pdf");
        assert_eq!(found[0].section, "1");
        assert_eq!(found[0].content_id.as_deref(), Some("<id1>"));
    }

    #[test]
    fn test_bad_extension_degrades_alone() {
        let body = parse_body_structure(
            r#"("TEXT" "HTML" NIL NIL NIL "QUOTED-PRINTABLE" 120 4 NIL "not-a-disposition" "fr" NIL)"#,
        );
        let ext = body.extension();
        assert!(ext.disposition.is_none());
        assert_eq!(ext.language, vec!["fr"]);
        assert_eq!(body.size(), 120);
    }

    #[test]
    fn test_multipart_alternative_with_image() {
        let input = r#"(("TEXT" "PLAIN" ("CHARSET" "UTF-8") NIL NIL "7BIT" 100 5)("TEXT" "HTML" ("CHARSET" "UTF-8") NIL NIL "7BIT" 200 8) "ALTERNATIVE")("IMAGE" "JPEG" ("NAME" "cat.jpg") NIL NIL "BASE64" 5000 NIL ("INLINE" ("FILENAME" "cat.jpg")) NIL NIL) "MIXED" ("BOUNDARY" "xyz"))"#;
        let body = parse_body_structure(input);

        let BodyStructure::Multipart {
            parts,
            subtype,
            params,
            ..
        } = &body
        else {
            panic!("expected multipart, got {body:?}");
        };
        assert_eq!(subtype, "MIXED");
        assert_eq!(params.get("BOUNDARY").map(String::as_str), Some("xyz"));
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].subtype(), "ALTERNATIVE");
        assert_eq!(body.size(), 5300);

        // IMAP numbering: the alternative is part 1 as a whole, so the
        // image is part 2 rather than following its two text leaves.
        let found = find_attachments(&body);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].filename, "cat.jpg");
        assert_eq!(found[0].section, "2");
    }

    #[test]
    fn test_multipart_without_subtype() {
        let body = parse_body_structure(r#"(("TEXT" "PLAIN" NIL NIL NIL "7BIT" 1 1))"#);
        assert_eq!(body.subtype(), "MIXED");
        assert_eq!(body.size(), 1);
    }

    #[test]
    fn test_nested_message_sections() {
        let input = r#"(("TEXT" "PLAIN" NIL NIL NIL "7BIT" 10 1)("MESSAGE" "RFC822" NIL NIL NIL "7BIT" 900 (NIL "Fwd" NIL NIL NIL NIL NIL NIL NIL NIL) (("TEXT" "PLAIN" NIL NIL NIL "7BIT" 20 2)("APPLICATION" "ZIP" ("NAME" "a.zip") NIL NIL "BASE64" 700) "MIXED") 30) "MIXED")"#;
        let body = parse_body_structure(input);
        let sections: Vec<_> = find_attachments(&body)
            .into_iter()
            .map(|a| a.section)
            .collect();
        assert_eq!(sections, vec!["2", "2.2"]);

        let BodyStructure::Multipart { parts, .. } = &body else {
            panic!("expected multipart");
        };
        let BodyStructure::Message {
            envelope, lines, ..
        } = &parts[1]
        else {
            panic!("expected message part");
        };
        assert_eq!(envelope.as_ref().unwrap().subject.as_deref(), Some("Fwd"));
        assert_eq!(*lines, 30);
    }

    #[test]
    fn test_nested_single_part_message_is_dot_one() {
        let input = r#"(("TEXT" "PLAIN" NIL NIL NIL "7BIT" 10 1)("MESSAGE" "RFC822" NIL NIL NIL "7BIT" 900 NIL ("IMAGE" "GIF" NIL NIL NIL "BASE64" 400) 30 NIL ("ATTACHMENT" NIL) NIL NIL) "MIXED")"#;
        let body = parse_body_structure(input);
        let sections: Vec<_> = find_attachments(&body)
            .into_iter()
            .map(|a| a.section)
            .collect();
        assert_eq!(sections, vec!["2", "2.1"]);
    }

    fn leaf_strategy() -> impl Strategy<Value = BodyStructure> {
        (
            prop::sample::select(vec!["TEXT", "IMAGE", "APPLICATION", "MESSAGE"]),
            0u64..100_000,
            prop::option::of(prop::sample::select(vec!["ATTACHMENT", "INLINE"])),
            any::<bool>(),
        )
            .prop_map(|(media_type, size, disposition, named)| {
                let mut params = BTreeMap::new();
                if named {
                    params.insert("NAME".to_string(), "file.bin".to_string());
                }
                let fields = BodyFields {
                    media_type: media_type.to_string(),
                    subtype: if media_type == "MESSAGE" { "RFC822" } else { "X" }.to_string(),
                    params,
                    size,
                    ..BodyFields::default()
                };
                let extension = BodyExtension {
                    disposition: disposition.map(|kind| Disposition {
                        kind: kind.to_string(),
                        params: BTreeMap::new(),
                    }),
                    ..BodyExtension::default()
                };
                match media_type {
                    "TEXT" => BodyStructure::Text {
                        fields,
                        lines: 1,
                        extension,
                    },
                    "MESSAGE" => BodyStructure::Message {
                        fields,
                        envelope: None,
                        body: Box::default(),
                        lines: 1,
                        extension,
                    },
                    _ => BodyStructure::Basic { fields, extension },
                }
            })
    }

    fn tree_strategy() -> impl Strategy<Value = BodyStructure> {
        leaf_strategy().prop_recursive(3, 24, 4, |inner| {
            prop::collection::vec(inner, 1..4).prop_map(|parts| BodyStructure::Multipart {
                parts,
                subtype: "MIXED".to_string(),
                params: BTreeMap::new(),
                extension: BodyExtension::default(),
            })
        })
    }

    fn render(node: &BodyStructure) -> String {
        match node {
            BodyStructure::Multipart { parts, subtype, .. } => {
                let children: String = parts.iter().map(render).collect();
                format!("({children} \"{subtype}\")")
            }
            _ => {
                let fields = node.fields().unwrap();
                format!(
                    "(\"{}\" \"{}\" NIL NIL NIL \"BASE64\" {})",
                    fields.media_type, fields.subtype, fields.size
                )
            }
        }
    }

    proptest! {
        #[test]
        fn prop_has_attachments_matches_find(tree in tree_strategy()) {
            prop_assert_eq!(has_attachments(&tree), !find_attachments(&tree).is_empty());
        }

        #[test]
        fn prop_multipart_size_is_sum_of_children(tree in tree_strategy()) {
            if let BodyStructure::Multipart { parts, .. } = &tree {
                let sum: u64 = parts.iter().map(BodyStructure::size).sum();
                prop_assert_eq!(tree.size(), sum);
            }
        }

        #[test]
        fn prop_parsed_size_matches_declared(
            media_type in prop::sample::select(vec!["IMAGE", "APPLICATION", "AUDIO"]),
            size in 0u64..10_000_000,
        ) {
            let input = format!("(\"{media_type}\" \"X\" NIL NIL NIL \"BASE64\" {size})");
            prop_assert_eq!(parse_body_structure(&input).size(), size);
        }

        #[test]
        fn prop_rendered_tree_keeps_sizes(tree in tree_strategy()) {
            prop_assert_eq!(parse_body_structure(&render(&tree)).size(), tree.size());
        }
    }
}
