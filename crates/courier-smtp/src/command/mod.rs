//! SMTP command builder.

use std::fmt;

use base64::Engine;

/// SMTP command.
///
/// `Display` renders the command line without its terminator;
/// [`Command::serialize`] appends `\r\n` for the wire.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Simple greeting
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// AUTH PLAIN with an initial response
    AuthPlain {
        /// Base64 of `\0authcid\0password`
        initial_response: String,
    },
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Reverse path, without angle brackets
        from: String,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Forward path, without angle brackets
        to: String,
    },
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// VRFY - Verify address
    Vrfy {
        /// Address to verify
        address: String,
    },
    /// NOOP - No operation
    Noop,
    /// QUIT - Close connection
    Quit,
    /// Any other command line, sent as-is
    Raw(String),
}

impl Command {
    /// Builds an `AUTH PLAIN` command for the given credentials.
    ///
    /// The username doubles as the authorization identity, which is left
    /// empty on the wire: `base64("\0username\0password")`.
    #[must_use]
    pub fn auth_plain(username: &str, password: &str) -> Self {
        let credentials = format!("\0{username}\0{password}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
        Self::AuthPlain {
            initial_response: encoded,
        }
    }

    /// Serializes the command to bytes, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = self.to_string().into_bytes();
        buf.extend_from_slice(b"\r\n");
        buf
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo { hostname } => write!(f, "HELO {hostname}"),
            Self::Ehlo { hostname } => write!(f, "EHLO {hostname}"),
            Self::AuthPlain { initial_response } => write!(f, "AUTH PLAIN {initial_response}"),
            Self::MailFrom { from } => write!(f, "MAIL FROM:<{from}>"),
            Self::RcptTo { to } => write!(f, "RCPT TO:<{to}>"),
            Self::Data => f.write_str("DATA"),
            Self::Rset => f.write_str("RSET"),
            Self::Vrfy { address } => write!(f, "VRFY {address}"),
            Self::Noop => f.write_str("NOOP"),
            Self::Quit => f.write_str("QUIT"),
            Self::Raw(line) => f.write_str(line),
        }
    }
}

// Keep credentials out of logs.
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthPlain { .. } => f.write_str("AuthPlain { .. }"),
            other => write!(f, "{:?}", other.to_string()),
        }
    }
}

impl From<&str> for Command {
    fn from(line: &str) -> Self {
        Self::Raw(line.to_string())
    }
}

impl From<String> for Command {
    fn from(line: String) -> Self {
        Self::Raw(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helo_command() {
        let cmd = Command::Helo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), b"HELO client.example.com\r\n");
    }

    #[test]
    fn test_ehlo_command() {
        let cmd = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), b"EHLO client.example.com\r\n");
    }

    #[test]
    fn test_auth_plain() {
        let cmd = Command::auth_plain("user", "pass");
        assert_eq!(cmd.serialize(), b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n");
    }

    #[test]
    fn test_auth_plain_debug_hides_secret() {
        let cmd = Command::auth_plain("user", "pass");
        assert_eq!(format!("{cmd:?}"), "AuthPlain { .. }");
    }

    #[test]
    fn test_mail_transaction_commands() {
        let from = Command::MailFrom {
            from: "sender@example.com".to_string(),
        };
        let to = Command::RcptTo {
            to: "recipient@example.com".to_string(),
        };
        assert_eq!(from.serialize(), b"MAIL FROM:<sender@example.com>\r\n");
        assert_eq!(to.serialize(), b"RCPT TO:<recipient@example.com>\r\n");
        assert_eq!(Command::Data.serialize(), b"DATA\r\n");
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::Rset.serialize(), b"RSET\r\n");
        assert_eq!(Command::Noop.serialize(), b"NOOP\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }

    #[test]
    fn test_vrfy_command() {
        let cmd = Command::Vrfy {
            address: "postmaster".to_string(),
        };
        assert_eq!(cmd.serialize(), b"VRFY postmaster\r\n");
        assert_eq!(format!("{cmd:?}"), "\"VRFY postmaster\"");
    }

    #[test]
    fn test_raw_from_str() {
        let cmd = Command::from("HELP");
        assert_eq!(cmd, Command::Raw("HELP".to_string()));
        assert_eq!(cmd.serialize(), b"HELP\r\n");
        assert_eq!(format!("{cmd:?}"), "\"HELP\"");
    }
}
