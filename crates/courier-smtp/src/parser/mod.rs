//! Reply reassembly.
//!
//! Turns a raw byte stream into discrete reply units. SMTP replies can be
//! single-line or multi-line:
//! - Single: `250 OK\r\n`
//! - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`

use crate::error::{Error, Result};

/// Default cap on a buffered, unterminated reply (1 MB).
pub const DEFAULT_MAX_REPLY_LENGTH: usize = 1024 * 1024;

/// Line buffer that reassembles multi-line replies.
///
/// Holds only the undispatched prefix of the current reply, plus any
/// trailing bytes of a line whose `\r\n` has not arrived yet.
#[derive(Debug)]
pub struct Reassembler {
    lines: Vec<String>,
    partial: Vec<u8>,
    buffered: usize,
    max_length: usize,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REPLY_LENGTH)
    }
}

impl Reassembler {
    /// Creates a reassembler that fails once `max_length` bytes are buffered
    /// without a terminal line.
    #[must_use]
    pub const fn new(max_length: usize) -> Self {
        Self {
            lines: Vec::new(),
            partial: Vec::new(),
            buffered: 0,
            max_length,
        }
    }

    /// Appends a chunk read from the transport.
    pub fn push(&mut self, chunk: &[u8]) {
        self.partial.extend_from_slice(chunk);
    }

    /// Returns the next complete reply unit, if one is buffered.
    ///
    /// Each unit is its lines, each followed by `\r\n`, concatenated. Units
    /// completed ahead of an oversized reply are returned before the error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReplyTooLong`] once the reply being buffered exceeds
    /// the cap. Everything buffered is dropped.
    pub fn next_unit(&mut self) -> Result<Option<String>> {
        while let Some(pos) = find_crlf(&self.partial) {
            let line = String::from_utf8_lossy(&self.partial[..pos]).into_owned();
            self.partial.drain(..pos + 2);

            if line.is_empty() {
                continue;
            }

            self.buffered += pos + 2;
            if self.buffered > self.max_length {
                return Err(self.overflow());
            }

            let terminal = is_terminal_line(&line);
            self.lines.push(line);
            if terminal {
                return Ok(Some(self.take_unit()));
            }
        }

        if self.buffered + self.partial.len() > self.max_length {
            return Err(self.overflow());
        }
        Ok(None)
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.partial.is_empty()
    }

    /// Drops everything buffered.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.partial.clear();
        self.buffered = 0;
    }

    fn overflow(&mut self) -> Error {
        self.clear();
        Error::ReplyTooLong(self.max_length)
    }

    fn take_unit(&mut self) -> String {
        let mut unit = String::with_capacity(self.buffered);
        for line in self.lines.drain(..) {
            unit.push_str(&line);
            unit.push_str("\r\n");
        }
        self.buffered = 0;
        unit
    }
}

/// Checks if a line ends a reply.
///
/// The first run of digits must be followed by a space. A hyphen there marks
/// a continuation line.
#[must_use]
pub fn is_terminal_line(line: &str) -> bool {
    let bytes = line.as_bytes();
    let Some(start) = bytes.iter().position(u8::is_ascii_digit) else {
        return false;
    };
    let digits = bytes[start..].iter().take_while(|b| b.is_ascii_digit()).count();
    bytes.get(start + digits) == Some(&b' ')
}

/// Finds the position of CRLF in a buffer.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feed(reassembler: &mut Reassembler, chunk: &[u8]) -> Result<Vec<String>> {
        reassembler.push(chunk);
        let mut units = Vec::new();
        while let Some(unit) = reassembler.next_unit()? {
            units.push(unit);
        }
        Ok(units)
    }

    #[test]
    fn test_is_terminal_line() {
        assert!(is_terminal_line("250 OK"));
        assert!(is_terminal_line("220 "));
        assert!(!is_terminal_line("250-Continuing"));
        assert!(!is_terminal_line("250"));
        assert!(!is_terminal_line("no code here"));
    }

    #[test]
    fn test_single_line_reply() {
        let mut reassembler = Reassembler::default();
        let units = feed(&mut reassembler, b"250 OK\r\n").unwrap();
        assert_eq!(units, vec!["250 OK\r\n"]);
        assert!(reassembler.is_empty());
    }

    #[test]
    fn test_multi_line_reply_across_chunks() {
        let mut reassembler = Reassembler::default();
        assert!(feed(&mut reassembler, b"250-A\r\n").unwrap().is_empty());
        assert!(!reassembler.is_empty());
        let units = feed(&mut reassembler, b"250 B\r\n").unwrap();
        assert_eq!(units, vec!["250-A\r\n250 B\r\n"]);
        assert!(reassembler.is_empty());
    }

    #[test]
    fn test_several_replies_in_one_chunk() {
        let mut reassembler = Reassembler::default();
        let units = feed(&mut reassembler, b"250 OK\r\n250-two\r\n250 lines\r\n354 go\r\n").unwrap();
        assert_eq!(units, vec!["250 OK\r\n", "250-two\r\n250 lines\r\n", "354 go\r\n"]);
    }

    #[test]
    fn test_line_split_mid_chunk() {
        let mut reassembler = Reassembler::default();
        assert!(feed(&mut reassembler, b"250 O").unwrap().is_empty());
        assert!(feed(&mut reassembler, b"K\r").unwrap().is_empty());
        assert_eq!(feed(&mut reassembler, b"\n").unwrap(), vec!["250 OK\r\n"]);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut reassembler = Reassembler::default();
        let units = feed(&mut reassembler, b"\r\n\r\n250 OK\r\n\r\n").unwrap();
        assert_eq!(units, vec!["250 OK\r\n"]);
        assert!(reassembler.is_empty());
    }

    #[test]
    fn test_reply_length_limit() {
        let mut reassembler = Reassembler::new(20);
        assert!(feed(&mut reassembler, b"250-0123456789\r\n").unwrap().is_empty());
        let err = feed(&mut reassembler, b"250-0123456789\r\n").unwrap_err();
        assert!(matches!(err, Error::ReplyTooLong(20)));
        assert!(reassembler.is_empty());
    }

    #[test]
    fn test_unterminated_line_counts_toward_limit() {
        let mut reassembler = Reassembler::new(16);
        let err = feed(&mut reassembler, &[b'A'; 17]).unwrap_err();
        assert!(matches!(err, Error::ReplyTooLong(16)));
    }

    #[test]
    fn test_complete_reply_survives_later_overflow() {
        let mut reassembler = Reassembler::new(20);
        reassembler.push(b"250 OK\r\n250-");
        reassembler.push(&[b'x'; 30]);

        assert_eq!(reassembler.next_unit().unwrap().as_deref(), Some("250 OK\r\n"));
        let err = reassembler.next_unit().unwrap_err();
        assert!(matches!(err, Error::ReplyTooLong(20)));
        assert!(reassembler.is_empty());
    }

    #[test]
    fn test_oversized_line_is_rejected() {
        let mut reassembler = Reassembler::new(20);
        reassembler.push(b"250 this line is far too long\r\n");
        assert!(matches!(reassembler.next_unit(), Err(Error::ReplyTooLong(20))));
    }

    proptest! {
        #[test]
        fn any_chunking_yields_one_unit(
            lines in proptest::collection::vec("[a-zA-Z0-9 ]{0,20}", 0..6),
            cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..8),
        ) {
            let mut wire = String::new();
            for line in &lines {
                wire.push_str(&format!("250-{line}\r\n"));
            }
            wire.push_str("250 done\r\n");
            let bytes = wire.as_bytes();

            let mut points: Vec<usize> = cuts.iter().map(|i| i.index(bytes.len())).collect();
            points.push(0);
            points.push(bytes.len());
            points.sort_unstable();
            points.dedup();

            let mut reassembler = Reassembler::default();
            let mut units = Vec::new();
            for pair in points.windows(2) {
                units.extend(feed(&mut reassembler, &bytes[pair[0]..pair[1]]).unwrap());
            }

            prop_assert_eq!(units, vec![wire.clone()]);
            prop_assert!(reassembler.is_empty());
        }
    }
}
