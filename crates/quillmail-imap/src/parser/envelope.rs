//! ENVELOPE and address-list parsing.

use crate::types::{Address, Envelope};
use crate::{Error, Result};

use super::tokenizer::{is_nil, nstring, parse_list, split_groups, split_items, strip_parens};

/// Parses an envelope, propagating structural errors.
///
/// `input` is the parenthesized 10-field expression; the enclosing
/// parentheses may already be stripped.
///
/// # Errors
///
/// Returns [`Error::Parse`] if there are fewer than 10 fields or an address
/// field is neither `NIL` nor a list.
pub fn try_parse_envelope(input: &str) -> Result<Envelope> {
    let inner = strip_parens(input).unwrap_or(input);
    let fields = split_items(inner);
    let [
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to,
        message_id,
        ..,
    ] = fields.as_slice()
    else {
        return Err(Error::parse("envelope", input));
    };

    Ok(Envelope {
        date: nstring(date),
        subject: nstring(subject),
        from: parse_address_list(from)?,
        sender: parse_address_list(sender)?,
        reply_to: parse_address_list(reply_to)?,
        to: parse_address_list(to)?,
        cc: parse_address_list(cc)?,
        bcc: parse_address_list(bcc)?,
        in_reply_to: nstring(in_reply_to),
        message_id: nstring(message_id),
    })
}

/// Parses an envelope, substituting [`Envelope::placeholder`] when it is
/// malformed. One bad envelope must not abort a batch fetch.
#[must_use]
pub fn parse_envelope(input: &str) -> Envelope {
    try_parse_envelope(input).unwrap_or_else(|e| {
        tracing::warn!(?e, "using placeholder for unreadable envelope");
        Envelope::placeholder()
    })
}

/// Parses an address list: `NIL` or `((name adl mailbox host) ...)`.
///
/// Individual malformed addresses are logged and skipped.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the field is neither `NIL` nor a list.
pub fn parse_address_list(input: &str) -> Result<Vec<Address>> {
    if is_nil(input) {
        return Ok(Vec::new());
    }
    let inner = strip_parens(input).ok_or_else(|| Error::parse("address list", input))?;

    let items = split_groups(inner);
    let mut addresses = Vec::with_capacity(items.len());
    for item in items {
        match parse_address(item) {
            Ok(address) => addresses.push(address),
            Err(e) => tracing::warn!(?e, "skipping unreadable address"),
        }
    }
    Ok(addresses)
}

/// Parses one `(name adl mailbox host)` tuple.
///
/// # Errors
///
/// Returns [`Error::Parse`] unless the input is a 4-item list.
pub fn parse_address(input: &str) -> Result<Address> {
    let fields = parse_list(input).ok_or_else(|| Error::parse("address", input))?;
    let [name, adl, mailbox, host] = fields.as_slice() else {
        return Err(Error::parse("address", input));
    };
    Ok(Address {
        name: nstring(name),
        adl: nstring(adl),
        mailbox: nstring(mailbox),
        host: nstring(host),
    })
}
