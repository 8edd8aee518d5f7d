//! Mailbox operations.

use super::Client;
use crate::command::{Command, StatusItem};
use crate::connection::Connector;
use crate::parser::{parse_list_response, parse_select_response, parse_status_response};
use crate::types::{MailboxEntry, MailboxSnapshot, MailboxStatus};
use crate::{Error, Result};

impl<C: Connector> Client<C> {
    /// Lists mailboxes matching `pattern` under `reference`.
    ///
    /// The hierarchy delimiter of the result is remembered.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<MailboxEntry>> {
        self.ready().await?;
        let command = Command::List {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        };
        let lines = self.execute_command(&command).await?;
        let entries = parse_list_response(&lines);
        self.learn_delimiter(&entries);
        Ok(entries)
    }

    /// Lists subscribed mailboxes (LSUB).
    pub async fn list_subscribed(
        &mut self,
        reference: &str,
        pattern: &str,
    ) -> Result<Vec<MailboxEntry>> {
        self.ready().await?;
        let command = Command::Lsub {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        };
        let lines = self.execute_command(&command).await?;
        Ok(parse_list_response(&lines))
    }

    fn learn_delimiter(&mut self, entries: &[MailboxEntry]) {
        let Some(delimiter) = entries.iter().find_map(|e| e.delimiter.clone()) else {
            return;
        };
        if let Some(mailbox) = self.mailbox.as_mut()
            && mailbox.delimiter.is_none()
        {
            mailbox.delimiter = Some(delimiter.clone());
        }
        self.delimiter = Some(delimiter);
    }

    /// Requests `items` for `mailbox` without selecting it.
    pub async fn status(&mut self, mailbox: &str, items: &[StatusItem]) -> Result<MailboxStatus> {
        self.ready().await?;
        let command = Command::Status {
            mailbox: mailbox.to_string(),
            items: items.to_vec(),
        };
        let lines = self.execute_command(&command).await?;
        parse_status_response(&lines)
            .ok_or_else(|| Error::parse("STATUS response", lines.join("\r\n")))
    }

    /// Selects `mailbox` read-write.
    ///
    /// The snapshot's `unseen` is the unseen *count*, fetched with a
    /// follow-up STATUS; `first_unseen` keeps the sequence number from
    /// SELECT's `[UNSEEN n]`.
    pub async fn select(&mut self, mailbox: &str) -> Result<MailboxSnapshot> {
        self.open_mailbox(mailbox, false).await
    }

    /// Selects `mailbox` read-only.
    pub async fn examine(&mut self, mailbox: &str) -> Result<MailboxSnapshot> {
        self.open_mailbox(mailbox, true).await
    }

    pub(super) async fn open_mailbox(
        &mut self,
        name: &str,
        read_only: bool,
    ) -> Result<MailboxSnapshot> {
        self.ready().await?;
        let command = if read_only {
            Command::Examine {
                mailbox: name.to_string(),
            }
        } else {
            Command::Select {
                mailbox: name.to_string(),
            }
        };

        let lines = match self.execute_command(&command).await {
            Ok(lines) => lines,
            Err(e) => {
                // A refused SELECT leaves no mailbox selected.
                if matches!(e, Error::Command { .. }) {
                    self.mailbox = None;
                }
                return Err(e);
            }
        };

        let mut snapshot = parse_select_response(name, &lines);
        snapshot.read_only |= read_only;
        snapshot.delimiter.clone_from(&self.delimiter);
        self.mailbox = Some(snapshot);

        let status = Command::Status {
            mailbox: name.to_string(),
            items: vec![StatusItem::Unseen],
        };
        match self.execute_command(&status).await {
            Ok(lines) => {
                let unseen = parse_status_response(&lines).and_then(|s| s.unseen);
                if let Some(mailbox) = self.mailbox.as_mut() {
                    mailbox.unseen = unseen;
                }
            }
            Err(e) if e.is_connection_level() => return Err(e),
            Err(e) => tracing::warn!(?e, mailbox = name, "Unseen count unavailable"),
        }

        let snapshot = self.require_mailbox()?.clone();
        tracing::info!(
            mailbox = name,
            exists = snapshot.exists,
            read_only = snapshot.read_only,
            "Mailbox selected"
        );
        Ok(snapshot)
    }

    /// Closes the selected mailbox, expunging deleted messages.
    pub async fn close(&mut self) -> Result<()> {
        self.ready().await?;
        self.require_mailbox()?;
        self.execute_command(&Command::Close).await?;
        self.mailbox = None;
        Ok(())
    }

    /// Creates a mailbox.
    pub async fn create(&mut self, mailbox: &str) -> Result<()> {
        self.ready().await?;
        let command = Command::Create {
            mailbox: mailbox.to_string(),
        };
        self.execute_command(&command).await?;
        Ok(())
    }

    /// Deletes a mailbox. Deleting the selected mailbox deselects it.
    pub async fn delete(&mut self, mailbox: &str) -> Result<()> {
        self.ready().await?;
        let command = Command::Delete {
            mailbox: mailbox.to_string(),
        };
        self.execute_command(&command).await?;
        if self.is_selected(mailbox) {
            self.mailbox = None;
        }
        Ok(())
    }

    /// Renames a mailbox. Renaming the selected mailbox deselects it.
    pub async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.ready().await?;
        let command = Command::Rename {
            from: from.to_string(),
            to: to.to_string(),
        };
        self.execute_command(&command).await?;
        if self.is_selected(from) {
            self.mailbox = None;
        }
        Ok(())
    }

    /// Subscribes to a mailbox.
    pub async fn subscribe(&mut self, mailbox: &str) -> Result<()> {
        self.ready().await?;
        let command = Command::Subscribe {
            mailbox: mailbox.to_string(),
        };
        self.execute_command(&command).await?;
        Ok(())
    }

    /// Unsubscribes from a mailbox.
    pub async fn unsubscribe(&mut self, mailbox: &str) -> Result<()> {
        self.ready().await?;
        let command = Command::Unsubscribe {
            mailbox: mailbox.to_string(),
        };
        self.execute_command(&command).await?;
        Ok(())
    }

    fn is_selected(&self, name: &str) -> bool {
        self.mailbox.as_ref().is_some_and(|m| {
            m.name == name || (m.name.eq_ignore_ascii_case("INBOX") && name.eq_ignore_ascii_case("INBOX"))
        })
    }
}
