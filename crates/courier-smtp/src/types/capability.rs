//! Server capabilities discovered during the handshake.

/// Capability flags derived from the EHLO reply.
///
/// Re-derived on every handshake and never carried across reconnects.
/// The flags are informational: nothing in this crate acts on STARTTLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// The server advertised PIPELINING.
    pub pipelining: bool,
    /// The server advertised STARTTLS.
    pub starttls: bool,
    /// The server accepted EHLO. Assumed until a HELO fallback proves otherwise.
    pub extended_hello: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            pipelining: false,
            starttls: false,
            extended_hello: true,
        }
    }
}

impl Capabilities {
    /// Scans an EHLO reply for advertised keywords.
    ///
    /// Matching is a case-insensitive substring search over the whole reply.
    #[must_use]
    pub fn from_ehlo(text: &str) -> Self {
        let upper = text.to_ascii_uppercase();
        Self {
            pipelining: upper.contains("PIPELINING"),
            starttls: upper.contains("STARTTLS"),
            extended_hello: true,
        }
    }

    /// Capabilities of a server that only speaks HELO.
    #[must_use]
    pub const fn helo_only() -> Self {
        Self {
            pipelining: false,
            starttls: false,
            extended_hello: false,
        }
    }
}
