//! Client configuration types.

use std::fmt;
use std::time::Duration;

use rustls::pki_types::CertificateDer;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    None,
    /// TLS from the start (port 993). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 143,
            Self::Implicit => 993,
        }
    }
}

/// TLS sub-options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsOptions {
    /// Name to verify the certificate against, if it differs from the host.
    pub server_name: Option<String>,
    /// Certificates trusted in addition to the Mozilla root set.
    pub extra_roots: Vec<CertificateDer<'static>>,
}

/// SASL mechanism used to authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMechanism {
    /// `AUTHENTICATE PLAIN`.
    #[default]
    Plain,
    /// The `LOGIN` command.
    Login,
}

impl AuthMechanism {
    /// Name as advertised in `AUTH=` capabilities.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
        }
    }
}

/// Where and how to open the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// TLS options (ignored for [`Security::None`]).
    pub tls: TlsOptions,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// IMAP client configuration.
#[derive(Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// TLS options.
    pub tls: TlsOptions,
    /// Username for authentication.
    pub username: String,
    /// Password for authentication.
    pub password: String,
    /// Authentication mechanism.
    pub auth_mechanism: AuthMechanism,
    /// Reconnect and retry after a connection-level failure.
    pub auto_reconnect: bool,
    /// Reconnection attempts before giving up.
    pub max_reconnect_attempts: u32,
    /// Base delay of the exponential reconnection backoff.
    pub reconnect_delay: Duration,
    /// Bound on one command exchange.
    pub command_timeout: Duration,
    /// Bound on opening the transport.
    pub connection_timeout: Duration,
    /// Bound on a socket read and on connection idleness.
    pub socket_timeout: Duration,
    /// Bound on the LOGOUT exchange of a graceful disconnect.
    pub logout_timeout: Duration,
}

impl Config {
    /// Creates a configuration with implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// The endpoint handed to connectors.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            port: self.port,
            security: self.security,
            tls: self.tls.clone(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_mechanism", &self.auth_mechanism)
            .field("auto_reconnect", &self.auto_reconnect)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("command_timeout", &self.command_timeout)
            .field("connection_timeout", &self.connection_timeout)
            .field("socket_timeout", &self.socket_timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    tls: TlsOptions,
    username: String,
    password: String,
    auth_mechanism: AuthMechanism,
    auto_reconnect: bool,
    max_reconnect_attempts: u32,
    reconnect_delay: Duration,
    command_timeout: Duration,
    connection_timeout: Duration,
    socket_timeout: Duration,
    logout_timeout: Duration,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
            tls: TlsOptions::default(),
            username: String::new(),
            password: String::new(),
            auth_mechanism: AuthMechanism::Plain,
            auto_reconnect: true,
            max_reconnect_attempts: 3,
            reconnect_delay: Duration::from_secs(1),
            command_timeout: Duration::from_secs(60),
            connection_timeout: Duration::from_secs(30),
            socket_timeout: Duration::from_secs(300),
            logout_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the TLS options.
    #[must_use]
    pub fn tls(mut self, tls: TlsOptions) -> Self {
        self.tls = tls;
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the authentication mechanism.
    #[must_use]
    pub const fn auth_mechanism(mut self, mechanism: AuthMechanism) -> Self {
        self.auth_mechanism = mechanism;
        self
    }

    /// Enables or disables auto-reconnect.
    #[must_use]
    pub const fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Sets the number of reconnection attempts.
    #[must_use]
    pub const fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the base reconnection delay.
    #[must_use]
    pub const fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the command timeout.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the socket (read and inactivity) timeout.
    #[must_use]
    pub const fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    /// Sets the LOGOUT timeout used by a graceful disconnect.
    #[must_use]
    pub const fn logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            tls: self.tls,
            username: self.username,
            password: self.password,
            auth_mechanism: self.auth_mechanism,
            auto_reconnect: self.auto_reconnect,
            max_reconnect_attempts: self.max_reconnect_attempts,
            reconnect_delay: self.reconnect_delay,
            command_timeout: self.command_timeout,
            connection_timeout: self.connection_timeout,
            socket_timeout: self.socket_timeout,
            logout_timeout: self.logout_timeout,
        }
    }
}
