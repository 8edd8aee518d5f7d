//! Integration tests for the public parsing and operation APIs.
//!
//! These exercise complete server responses as a caller would see them,
//! without a connection.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use proptest::prelude::*;

use quillmail_imap::parser::{
    find_attachments, group_fetch_lines, has_attachments, parse_fetch_response,
    parse_list_response, parse_select_response,
};
use quillmail_imap::{CancellableOperation, Command, Error, FetchItems, Outcome, SearchCriteria};

const ENVELOPE: &str = r#"ENVELOPE ("Mon, 2 Mar 2026 10:00:00 +0000" "Quarterly report" (("Alice" NIL "alice" "example.com")) (("Alice" NIL "alice" "example.com")) (("Alice" NIL "alice" "example.com")) ((NIL NIL "bob" "example.com")) NIL NIL NIL "<r1@example.com>")"#;

const BODYSTRUCTURE: &str = r#"BODYSTRUCTURE ((("TEXT" "PLAIN" ("CHARSET" "UTF-8") NIL NIL "7BIT" 12 1 NIL NIL NIL NIL)("TEXT" "HTML" ("CHARSET" "UTF-8") NIL NIL "7BIT" 40 1 NIL NIL NIL NIL) "ALTERNATIVE" ("BOUNDARY" "b2") NIL NIL NIL)("APPLICATION" "PDF" ("NAME" "report.pdf") NIL NIL "BASE64" 1024 NIL ("ATTACHMENT" ("FILENAME" "report.pdf")) NIL NIL) "MIXED" ("BOUNDARY" "b1") NIL NIL NIL)"#;

#[test]
fn test_full_fetch_response() {
    let lines = vec![
        format!("* 12 FETCH (UID 4821 FLAGS (\\Seen \\Flagged) RFC822.SIZE 2048 {ENVELOPE} {BODYSTRUCTURE})"),
        "* 13 FETCH (UID 4822 FLAGS () RFC822.SIZE 310)".to_string(),
        "A0007 OK FETCH completed".to_string(),
    ];

    let messages = parse_fetch_response(&lines);
    assert_eq!(messages.len(), 2);

    let first = &messages[0];
    assert_eq!(first.seq, 12);
    assert_eq!(first.uid, Some(4821));
    assert_eq!(first.size, Some(2048));
    assert!(first.flags.contains("\\Flagged"));

    let envelope = first.envelope.as_ref().unwrap();
    assert_eq!(envelope.subject.as_deref(), Some("Quarterly report"));
    assert_eq!(envelope.from[0].name.as_deref(), Some("Alice"));
    assert_eq!(envelope.to[0].email().as_deref(), Some("bob@example.com"));
    assert_eq!(envelope.message_id.as_deref(), Some("<r1@example.com>"));

    let body = first.body_structure.as_ref().unwrap();
    assert!(has_attachments(body));
    let attachments = find_attachments(body);
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].filename, "report.pdf");
    assert_eq!(attachments[0].section, "2");
    assert_eq!(attachments[0].size, 1024);

    assert_eq!(messages[1].uid, Some(4822));
    assert!(messages[1].flags.is_empty());
    assert!(messages[1].envelope.is_none());
}

#[test]
fn test_fetch_with_body_literal() {
    let lines = [
        "* 1 FETCH (UID 9 BODY[TEXT] {12}",
        "Hello",
        "World FLAGS (\\Seen))",
        "A0003 OK done",
    ];

    let groups = group_fetch_lines(&lines);
    assert_eq!(groups.len(), 1);

    let messages = parse_fetch_response(&lines);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].uid, Some(9));
    assert_eq!(messages[0].sections["TEXT"].data, b"Hello\r\nWorld");
    assert!(messages[0].flags.contains("\\Seen"));
}

#[test]
fn test_select_and_list_responses() {
    let select = [
        "* FLAGS (\\Answered \\Seen)",
        "* 172 EXISTS",
        "* 1 RECENT",
        "* OK [UNSEEN 12] Message 12 is first unseen",
        "* OK [UIDVALIDITY 3857529045] UIDs valid",
        "* OK [UIDNEXT 4392] Predicted next UID",
        "A0002 OK [READ-WRITE] SELECT completed",
    ];
    let snapshot = parse_select_response("INBOX", &select);
    assert_eq!(snapshot.exists, 172);
    assert_eq!(snapshot.recent, 1);
    assert_eq!(snapshot.first_unseen, Some(12));
    assert_eq!(snapshot.uid_validity, Some(3_857_529_045));
    assert_eq!(snapshot.uid_next, Some(4392));
    assert_eq!(snapshot.unseen, None);

    let list = [
        "* LIST (\\HasNoChildren) \".\" INBOX",
        "* LIST (\\HasNoChildren \\Sent) \".\" \"Sent Items\"",
        "A0003 OK LIST completed",
    ];
    let entries = parse_list_response(&list);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].name, "Sent Items");
    assert_eq!(entries[1].delimiter.as_deref(), Some("."));
}

#[test]
fn test_command_lines() {
    let fetch = Command::Fetch {
        sequence: "1:*".to_string(),
        items: FetchItems::Fast,
        uid: false,
    };
    assert_eq!(fetch.serialize(), "FETCH 1:* FAST");

    let search = Command::Search {
        criteria: SearchCriteria::Unseen,
        uid: true,
    };
    assert_eq!(search.serialize(), "UID SEARCH UNSEEN");

    let login = Command::Login {
        username: "user".to_string(),
        password: "hunter2".to_string(),
    };
    assert!(!login.redacted().contains("hunter2"));
}

#[tokio::test(start_paused = true)]
async fn test_operation_times_out() {
    let operation = CancellableOperation::<u32>::start(
        || async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(1)
        },
        Duration::from_secs(5),
        "slow read",
    );

    let outcome = operation.outcome().await;
    assert!(outcome.is_timed_out());
    assert!(matches!(
        outcome.into_result(),
        Err(Error::Timeout { duration, .. }) if duration == Duration::from_secs(5)
    ));
}

#[tokio::test]
async fn test_operation_cancel_wins_once() {
    let operation = CancellableOperation::<()>::start(
        || std::future::pending::<quillmail_imap::Result<()>>(),
        Duration::from_secs(60),
        "stuck",
    );
    let canceller = operation.canceller();

    assert!(canceller.cancel(Error::connection("closing")));
    assert!(!operation.cancel(Error::connection("again")));
    assert!(operation.is_settled());
    assert!(!operation.is_timer_active());
    assert!(matches!(operation.outcome().await, Outcome::Cancelled(_)));
}

proptest! {
    #[test]
    fn prop_fetch_parsing_never_panics(lines in prop::collection::vec("[ -~]{0,80}", 0..12)) {
        let messages = parse_fetch_response(&lines);
        prop_assert!(messages.len() <= lines.len());
    }

    #[test]
    fn prop_fetch_groups_follow_headers(count in 1u32..20) {
        let lines: Vec<String> = (1..=count)
            .map(|seq| format!("* {seq} FETCH (UID {} FLAGS ())", seq * 10))
            .collect();
        let messages = parse_fetch_response(&lines);
        prop_assert_eq!(messages.len(), count as usize);
        for (message, seq) in messages.iter().zip(1..) {
            prop_assert_eq!(message.seq, seq);
            prop_assert_eq!(message.uid, Some(seq * 10));
        }
    }
}
