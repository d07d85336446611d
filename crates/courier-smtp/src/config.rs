//! Client configuration.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::parser::DEFAULT_MAX_REPLY_LENGTH;

/// Default SMTP port.
pub const DEFAULT_PORT: u16 = 25;

/// Hostname announced in EHLO/HELO when none is configured.
pub const DEFAULT_LOCAL_HOSTNAME: &str = "localhost";

/// Default connection timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Username and password for AUTH PLAIN.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Authentication identity.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates a new credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for an SMTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server hostname.
    pub host: String,
    /// Server port (default: 25).
    pub port: u16,
    /// Hostname sent in EHLO/HELO.
    pub local_hostname: String,
    /// Credentials for AUTH PLAIN; `None` skips authentication.
    pub credentials: Option<Credentials>,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Closes the connection after this long without traffic.
    pub idle_timeout: Option<Duration>,
    /// Largest unterminated reply accepted before the session fails.
    pub max_reply_length: usize,
}

impl ClientConfig {
    /// Creates a new configuration for `host` with defaults.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            local_hostname: DEFAULT_LOCAL_HOSTNAME.to_string(),
            credentials: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: None,
            max_reply_length: DEFAULT_MAX_REPLY_LENGTH,
        }
    }

    /// Sets the server port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the hostname announced in EHLO/HELO.
    #[must_use]
    pub fn local_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.local_hostname = hostname.into();
        self
    }

    /// Enables AUTH PLAIN with the given credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the idle timeout.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Sets the reply length cap.
    #[must_use]
    pub const fn max_reply_length(mut self, limit: usize) -> Self {
        self.max_reply_length = limit;
        self
    }

    /// Checks that the configuration can be used to connect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHost`] if no host is set.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::MissingHost);
        }
        Ok(())
    }
}
