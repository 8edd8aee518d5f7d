//! IMAP response parsers.
//!
//! Pure functions from response text to the records in [`crate::types`].
//! They hold no state and never touch the connection.
//!
//! # Example
//!
//! ```
//! use quillmail_imap::parser::{find_attachments, parse_body_structure};
//!
//! let body = parse_body_structure(
//!     r#"(("TEXT" "PLAIN" NIL NIL NIL "7BIT" 10 1)("IMAGE" "PNG" ("NAME" "a.png") NIL NIL "BASE64" 99) "MIXED")"#,
//! );
//! let attachments = find_attachments(&body);
//! assert_eq!(attachments[0].section, "2");
//! assert_eq!(attachments[0].filename, "a.png");
//! ```

mod body_structure;
mod envelope;
mod fetch;
mod response;
pub mod tokenizer;

pub use body_structure::{find_attachments, has_attachments, parse_body_structure};
pub use envelope::{parse_address, parse_address_list, parse_envelope, try_parse_envelope};
pub use fetch::{
    FetchGroup, fetch_header_seq, group_fetch_lines, parse_fetch_group, parse_fetch_response,
    parse_headers,
};
pub use response::{
    find_capabilities, parse_capability_line, parse_list_line, parse_list_response,
    parse_search_response, parse_select_response, parse_status_line, parse_status_response,
    response_code, untagged_payload,
};
