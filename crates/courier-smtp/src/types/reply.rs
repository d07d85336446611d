//! SMTP reply types.

use std::fmt;

/// One complete, possibly multi-line, SMTP reply.
///
/// The raw text is kept exactly as reassembled from the wire (each line
/// followed by `\r\n`), so callers can inspect what the server sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250). Zero when the server sent no numeric code.
    pub code: ReplyCode,
    /// Reply message lines, without code and separator.
    pub message: Vec<String>,
    raw: String,
}

impl Reply {
    /// Parses a reassembled reply unit.
    ///
    /// Parsing is lenient: a reply without a leading code still parses, with
    /// a zero code and the full line as its message.
    #[must_use]
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let lines: Vec<&str> = raw.split("\r\n").filter(|line| !line.is_empty()).collect();

        let code = lines
            .first()
            .map_or(ReplyCode::new(0), |first| ReplyCode::from_line(first));

        let message = lines
            .iter()
            .map(|line| {
                let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
                if rest.len() == line.len() {
                    return (*line).to_string();
                }
                rest.strip_prefix([' ', '-']).unwrap_or(rest).to_string()
            })
            .collect();

        Self { code, message, raw }
    }

    /// Returns the reply class: the single leading digit of the raw text.
    ///
    /// 1-3 are positive or intermediate completions, 4 and 5 are failures.
    #[must_use]
    pub fn class(&self) -> Option<u8> {
        self.raw
            .as_bytes()
            .first()
            .filter(|b| b.is_ascii_digit())
            .map(|b| b - b'0')
    }

    /// Returns true if the leading digit marks a failure (greater than 3).
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.class().is_some_and(|class| class > 3)
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        self.code.is_transient()
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code.is_permanent()
    }

    /// Returns the full message as a single string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Returns the raw reply text, line terminators included.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Consumes the reply and returns its raw text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.raw
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw.trim_end())
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Reads the leading digits of a reply line (at most three).
    #[must_use]
    pub fn from_line(line: &str) -> Self {
        let code = line
            .bytes()
            .take(3)
            .take_while(u8::is_ascii_digit)
            .fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'));
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Common reply codes
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCEEDED: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 334 Continue with authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 Service not available, closing transmission channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 450 Mailbox unavailable (busy)
    pub const MAILBOX_BUSY: Self = Self(450);
    /// 500 Syntax error, command unrecognized
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 502 Command not implemented
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// 535 Authentication credentials invalid
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 Mailbox unavailable (not found, access denied)
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
}
