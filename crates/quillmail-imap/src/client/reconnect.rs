//! Reconnection with exponential backoff.

use std::time::Duration;

use super::{Client, Event};
use crate::connection::Connector;
use crate::{Error, Result};

/// Delay before attempt `attempt` (0-based): `base * 2^attempt`.
fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

impl<C: Connector> Client<C> {
    /// Re-establishes the session.
    ///
    /// Tears the connection down, then makes up to
    /// `max_reconnect_attempts` attempts to connect, authenticate and
    /// select the mailbox that was selected before. A failed re-selection
    /// does not fail the reconnection; [`Event::Reconnected`] then carries
    /// no mailbox. A call made while a reconnection is running does
    /// nothing.
    pub async fn reconnect(&mut self) -> Result<()> {
        if self.reconnecting {
            tracing::debug!("Reconnect already in progress");
            return Ok(());
        }

        self.reconnecting = true;
        let result = self.run_reconnect().await;
        self.reconnecting = false;
        result
    }

    async fn run_reconnect(&mut self) -> Result<()> {
        let previous = self
            .mailbox
            .as_ref()
            .map(|mailbox| (mailbox.name.clone(), mailbox.read_only));

        self.listeners.emit(&Event::Reconnecting);
        self.teardown().await;

        let attempts = self.config.max_reconnect_attempts;
        let mut last_error = None;

        for attempt in 0..attempts {
            self.reconnect_attempts = attempt + 1;
            let delay = backoff(self.config.reconnect_delay, attempt);
            tokio::time::sleep(delay).await;
            tracing::info!(attempt = attempt + 1, ?delay, "Attempting to reconnect");

            match self.establish().await {
                Ok(()) => {
                    self.active = true;
                    let mailbox = match previous {
                        Some((name, read_only)) => self.reselect(name, read_only).await,
                        None => None,
                    };
                    self.reconnect_attempts = 0;
                    tracing::info!(?mailbox, "Reconnected");
                    self.listeners.emit(&Event::Reconnected { mailbox });
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "Reconnect attempt failed");
                    self.teardown().await;
                    last_error = Some(e);
                }
            }
        }

        let message = format!("reconnect failed after {attempts} attempts");
        let event_error = match &last_error {
            Some(e) => Error::connection(format!("{message}: {e}")),
            None => Error::connection(message.clone()),
        };
        self.listeners.emit(&Event::ReconnectFailed(event_error));

        Err(match last_error {
            Some(e) => Error::connection_caused_by(message, e),
            None => Error::connection(message),
        })
    }

    /// Connect and authenticate, without reselecting.
    async fn establish(&mut self) -> Result<()> {
        self.open().await?;
        self.authenticate().await
    }

    async fn reselect(&mut self, name: String, read_only: bool) -> Option<String> {
        match self.open_mailbox(&name, read_only).await {
            Ok(_) => Some(name),
            Err(e) => {
                tracing::warn!(?e, mailbox = %name, "Failed to reselect mailbox");
                None
            }
        }
    }
}
