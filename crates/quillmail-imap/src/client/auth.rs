//! Authentication.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

use super::Client;
use crate::command::Command;
use crate::connection::{AuthMechanism, Connector};
use crate::parser::find_capabilities;
use crate::{Error, Result};

/// SASL PLAIN initial response: base64 of `\0user\0password`.
fn plain_response(username: &str, password: &str) -> String {
    STANDARD.encode(format!("\0{username}\0{password}"))
}

impl<C: Connector> Client<C> {
    /// Authenticates with the configured mechanism and credentials.
    ///
    /// The server must advertise `AUTH=<mechanism>`. Capabilities are
    /// refreshed afterwards, since servers often advertise more once
    /// authenticated. A rejection is reported as [`Error::Auth`] and is
    /// never retried.
    pub async fn authenticate(&mut self) -> Result<()> {
        if !self.connection.is_connected() {
            return Err(Error::NotConnected);
        }
        if self.authenticated {
            return Ok(());
        }

        let mechanism = self.config.auth_mechanism;
        if !self.capabilities.supports_auth(mechanism.as_str()) {
            return Err(Error::Capability(format!("AUTH={}", mechanism.as_str())));
        }

        let result = match mechanism {
            AuthMechanism::Plain => self.authenticate_plain().await,
            AuthMechanism::Login => {
                let command = Command::Login {
                    username: self.config.username.clone(),
                    password: self.config.password.clone(),
                };
                self.exchange(&command).await
            }
        };

        let lines = match result {
            Ok(lines) => lines,
            Err(Error::Command { response, .. }) => {
                tracing::warn!(user = %self.config.username, "Authentication rejected");
                return Err(Error::Auth(response));
            }
            Err(e) => return Err(e),
        };

        self.authenticated = true;
        match find_capabilities(&lines) {
            Some(capabilities) => self.capabilities = capabilities,
            None => self.refresh_capabilities().await?,
        }
        tracing::info!(
            user = %self.config.username,
            mechanism = mechanism.as_str(),
            "Authenticated"
        );
        Ok(())
    }

    /// `AUTHENTICATE PLAIN`, with the response inline when the server
    /// supports SASL-IR and after a continuation otherwise.
    async fn authenticate_plain(&mut self) -> Result<Vec<String>> {
        let response = plain_response(&self.config.username, &self.config.password);

        if self.capabilities.supports_sasl_ir() {
            let command = Command::Authenticate {
                mechanism: "PLAIN".to_string(),
                initial_response: Some(response),
            };
            return self.exchange(&command).await;
        }

        let command = Command::Authenticate {
            mechanism: "PLAIN".to_string(),
            initial_response: None,
        };
        let mut payload = response.into_bytes();
        payload.extend_from_slice(b"\r\n");
        let timeout = self.config.command_timeout;
        self.exchange_with(&command, Some(Bytes::from(payload)), timeout)
            .await
    }
}
