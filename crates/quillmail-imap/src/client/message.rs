//! Message operations on the selected mailbox.

use bytes::Bytes;

use super::Client;
use crate::command::{Command, FetchAttribute, FetchItems, SearchCriteria, StoreMode};
use crate::connection::Connector;
use crate::parser::{find_attachments, parse_fetch_response, parse_search_response};
use crate::types::{Attachment, BodySection, FetchedMessage};
use crate::Result;

/// Sequence numbers reported by `* n EXPUNGE` lines.
fn expunged<S: AsRef<str>>(lines: &[S]) -> Vec<u32> {
    lines
        .iter()
        .filter_map(|line| {
            let mut words = line.as_ref().strip_prefix("* ")?.split(' ');
            let seq = words.next()?.parse().ok()?;
            words
                .next()
                .is_some_and(|w| w.eq_ignore_ascii_case("EXPUNGE"))
                .then_some(seq)
        })
        .collect()
}

impl<C: Connector> Client<C> {
    /// Searches the selected mailbox; returns sequence numbers.
    pub async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<u32>> {
        self.search_with(criteria, false).await
    }

    /// Searches the selected mailbox; returns UIDs.
    pub async fn uid_search(&mut self, criteria: &SearchCriteria) -> Result<Vec<u32>> {
        self.search_with(criteria, true).await
    }

    async fn search_with(&mut self, criteria: &SearchCriteria, uid: bool) -> Result<Vec<u32>> {
        self.ready().await?;
        self.require_mailbox()?;
        let command = Command::Search {
            criteria: criteria.clone(),
            uid,
        };
        let lines = self.execute_command(&command).await?;
        parse_search_response(&lines)
    }

    /// Fetches `items` for the messages in `sequence` (e.g. `1:10`).
    pub async fn fetch(&mut self, sequence: &str, items: &FetchItems) -> Result<Vec<FetchedMessage>> {
        self.fetch_with(sequence, items, false).await
    }

    /// Fetches `items` for the messages whose UIDs are in `sequence`.
    pub async fn uid_fetch(
        &mut self,
        sequence: &str,
        items: &FetchItems,
    ) -> Result<Vec<FetchedMessage>> {
        self.fetch_with(sequence, items, true).await
    }

    async fn fetch_with(
        &mut self,
        sequence: &str,
        items: &FetchItems,
        uid: bool,
    ) -> Result<Vec<FetchedMessage>> {
        self.ready().await?;
        self.require_mailbox()?;
        let command = Command::Fetch {
            sequence: sequence.to_string(),
            items: items.clone(),
            uid,
        };
        let lines = self.execute_raw(&command).await?;
        let messages = parse_fetch_response(&lines);
        tracing::debug!(sequence, count = messages.len(), "Fetched messages");
        Ok(messages)
    }

    /// Lists the attachments of the message with `uid`.
    pub async fn attachments(&mut self, uid: u32) -> Result<Vec<Attachment>> {
        let items = FetchItems::Items(vec![FetchAttribute::Uid, FetchAttribute::BodyStructure]);
        let messages = self.uid_fetch(&uid.to_string(), &items).await?;
        Ok(messages
            .into_iter()
            .find_map(|m| m.body_structure)
            .map(|body| find_attachments(&body))
            .unwrap_or_default())
    }

    /// Fetches one body section (an attachment's `section`, for example)
    /// of the message with `uid`, without setting `\Seen`.
    pub async fn fetch_section(&mut self, uid: u32, section: &str) -> Result<Option<BodySection>> {
        let items = FetchItems::Items(vec![
            FetchAttribute::Uid,
            FetchAttribute::Body {
                section: Some(section.to_string()),
                peek: true,
            },
        ]);
        let messages = self.uid_fetch(&uid.to_string(), &items).await?;
        Ok(messages
            .into_iter()
            .find_map(|mut m| m.sections.remove(section)))
    }

    /// Changes the flags of the messages in `sequence`.
    pub async fn set_flags(&mut self, sequence: &str, mode: StoreMode, flags: &[String]) -> Result<()> {
        self.store_with(sequence, mode, flags, false).await
    }

    /// Changes the flags of the messages whose UIDs are in `sequence`.
    pub async fn uid_set_flags(
        &mut self,
        sequence: &str,
        mode: StoreMode,
        flags: &[String],
    ) -> Result<()> {
        self.store_with(sequence, mode, flags, true).await
    }

    async fn store_with(
        &mut self,
        sequence: &str,
        mode: StoreMode,
        flags: &[String],
        uid: bool,
    ) -> Result<()> {
        self.ready().await?;
        self.require_mailbox()?;
        let command = Command::Store {
            sequence: sequence.to_string(),
            mode,
            flags: flags.to_vec(),
            uid,
        };
        self.execute_command(&command).await?;
        Ok(())
    }

    /// Copies the messages in `sequence` to `mailbox`.
    pub async fn copy(&mut self, sequence: &str, mailbox: &str) -> Result<()> {
        self.copy_with(sequence, mailbox, false).await
    }

    /// Copies the messages whose UIDs are in `sequence` to `mailbox`.
    pub async fn uid_copy(&mut self, sequence: &str, mailbox: &str) -> Result<()> {
        self.copy_with(sequence, mailbox, true).await
    }

    async fn copy_with(&mut self, sequence: &str, mailbox: &str, uid: bool) -> Result<()> {
        self.ready().await?;
        self.require_mailbox()?;
        let command = Command::Copy {
            sequence: sequence.to_string(),
            mailbox: mailbox.to_string(),
            uid,
        };
        self.execute_command(&command).await?;
        Ok(())
    }

    /// Moves the messages in `sequence` to `mailbox`.
    ///
    /// Without the MOVE capability this is COPY, then STORE `\Deleted`,
    /// then EXPUNGE; the EXPUNGE also removes any other message already
    /// marked deleted.
    pub async fn move_messages(&mut self, sequence: &str, mailbox: &str) -> Result<()> {
        self.move_with(sequence, mailbox, false).await
    }

    /// Moves the messages whose UIDs are in `sequence` to `mailbox`.
    pub async fn uid_move_messages(&mut self, sequence: &str, mailbox: &str) -> Result<()> {
        self.move_with(sequence, mailbox, true).await
    }

    async fn move_with(&mut self, sequence: &str, mailbox: &str, uid: bool) -> Result<()> {
        self.ready().await?;
        self.require_mailbox()?;

        if self.capabilities.supports_move() {
            let command = Command::Move {
                sequence: sequence.to_string(),
                mailbox: mailbox.to_string(),
                uid,
            };
            self.execute_command(&command).await?;
            return Ok(());
        }

        tracing::debug!(sequence, mailbox, "MOVE not advertised, copying instead");
        self.copy_with(sequence, mailbox, uid).await?;
        self.store_with(sequence, StoreMode::Add, &["\\Deleted".to_string()], uid)
            .await?;
        self.expunge().await?;
        Ok(())
    }

    /// Permanently removes messages marked `\Deleted`.
    ///
    /// Returns the expunged sequence numbers in the order reported.
    pub async fn expunge(&mut self) -> Result<Vec<u32>> {
        self.ready().await?;
        self.require_mailbox()?;
        let lines = self.execute_command(&Command::Expunge).await?;
        let removed = expunged(&lines);
        if let Some(mailbox) = self.mailbox.as_mut() {
            let count = u32::try_from(removed.len()).unwrap_or(u32::MAX);
            mailbox.exists = mailbox.exists.saturating_sub(count);
        }
        Ok(removed)
    }

    /// Appends `message` to `mailbox`.
    ///
    /// The message is sent as a literal after the server's continuation.
    /// After a connection failure (not a timeout) with auto-reconnect
    /// enabled, the append is sent once more on the new connection. If the
    /// first attempt had already reached the server, the message may then
    /// be stored twice.
    pub async fn append(&mut self, mailbox: &str, message: &[u8], flags: &[String]) -> Result<()> {
        self.ready().await?;
        let command = Command::append(mailbox, flags, message);

        let mut literal = Vec::with_capacity(message.len() + 2);
        literal.extend_from_slice(message);
        literal.extend_from_slice(b"\r\n");
        let literal = Bytes::from(literal);

        let mut resent = false;
        loop {
            let timeout = self.config.command_timeout;
            let error = match self
                .exchange_with(&command, Some(literal.clone()), timeout)
                .await
            {
                Ok(_) => {
                    tracing::debug!(mailbox, size = message.len(), "Message appended");
                    return Ok(());
                }
                Err(e) => e,
            };

            let reconnected = self.recover_after(&error).await;
            if !reconnected || resent || error.is_timeout() {
                return Err(error);
            }
            resent = true;
            tracing::warn!(mailbox, "Resending APPEND after reconnect; it may be stored twice");
        }
    }
}
