//! Line framing for SMTP replies.
//!
//! The transport delivers bytes in arbitrary chunks. [`LineFramer`] turns
//! them into complete lines, holding any trailing partial line until the
//! rest of it arrives.

use bytes::BytesMut;

use crate::error::{Error, Result};

/// Default buffer size for reading.
pub(crate) const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Splits a byte stream into protocol lines.
///
/// Both `\r\n` and a bare `\n` terminate a line. Terminators are stripped
/// and empty lines are dropped.
#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
    /// Bytes at the front of `buffer` already known to hold no `\n`.
    scanned: usize,
    max_line_length: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    /// Creates a framer with the default line length limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_line_length(MAX_LINE_LENGTH)
    }

    /// Creates a framer that rejects partial lines longer than `max_line_length`.
    #[must_use]
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            scanned: 0,
            max_line_length,
        }
    }

    /// Appends a chunk and returns every line it completed, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the unterminated remainder grows past
    /// the line length limit. The buffer is cleared in that case.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let end = self.scanned + offset;
            let mut line = self.buffer.split_to(end + 1);
            self.scanned = 0;

            line.truncate(end);
            if line.last() == Some(&b'\r') {
                line.truncate(end - 1);
            }
            if !line.is_empty() {
                lines.push(String::from_utf8_lossy(&line).into_owned());
            }
        }
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_line_length {
            self.drain();
            return Err(Error::Protocol("line too long".to_string()));
        }

        Ok(lines)
    }

    /// Discards any buffered partial line and returns how many bytes were dropped.
    pub fn drain(&mut self) -> usize {
        let discarded = self.buffer.len();
        self.buffer.clear();
        self.scanned = 0;
        discarded
    }

    /// Returns the number of buffered bytes not yet forming a complete line.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_chunk() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"250-First\r\n250-Second\r\n250 Third\r\n").unwrap();
        assert_eq!(lines, vec!["250-First", "250-Second", "250 Third"]);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_partial_line_is_retained() {
        let mut framer = LineFramer::new();
        assert!(framer.feed(b"220 mx.exa").unwrap().is_empty());
        assert_eq!(framer.buffered(), 10);
        assert_eq!(framer.feed(b"mple.com\r\n").unwrap(), vec!["220 mx.example.com"]);
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut framer = LineFramer::new();
        assert!(framer.feed(b"250 OK\r").unwrap().is_empty());
        assert_eq!(framer.feed(b"\n").unwrap(), vec!["250 OK"]);
    }

    #[test]
    fn test_bare_lf_terminator() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"250-A\n250 B\n").unwrap();
        assert_eq!(lines, vec!["250-A", "250 B"]);
    }

    #[test]
    fn test_empty_lines_dropped() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"\r\n\n250 OK\r\n\r\n").unwrap();
        assert_eq!(lines, vec!["250 OK"]);
    }

    #[test]
    fn test_inner_cr_preserved() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"250 a\rb\r\n").unwrap();
        assert_eq!(lines, vec!["250 a\rb"]);
    }

    #[test]
    fn test_drain_discards_remainder() {
        let mut framer = LineFramer::new();
        framer.feed(b"250 OK\r\n250 inj").unwrap();
        assert_eq!(framer.drain(), 7);
        assert_eq!(framer.feed(b"220 fresh\r\n").unwrap(), vec!["220 fresh"]);
    }

    #[test]
    fn test_line_length_limit() {
        let mut framer = LineFramer::with_max_line_length(16);
        let result = framer.feed(&[b'A'; 17]);
        assert!(result.unwrap_err().to_string().contains("line too long"));
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_long_line_completed_within_limit() {
        let mut framer = LineFramer::with_max_line_length(16);
        framer.feed(b"250 0123456789").unwrap();
        assert_eq!(framer.feed(b"\r\n").unwrap(), vec!["250 0123456789"]);
    }

    fn wire_and_lines() -> impl Strategy<Value = (Vec<u8>, Vec<String>)> {
        prop::collection::vec(("[ -~]{1,40}", any::<bool>()), 1..12).prop_map(|entries| {
            let mut wire = Vec::new();
            let mut lines = Vec::new();
            for (line, crlf) in entries {
                wire.extend_from_slice(line.as_bytes());
                wire.extend_from_slice(if crlf { b"\r\n" } else { b"\n" });
                lines.push(line);
            }
            (wire, lines)
        })
    }

    proptest! {
        #[test]
        fn prop_split_invariance(
            (wire, expected) in wire_and_lines(),
            cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
        ) {
            let mut whole = LineFramer::new();
            let all_at_once = whole.feed(&wire).unwrap();
            prop_assert_eq!(&all_at_once, &expected);

            let mut points: Vec<usize> = cuts.iter().map(|i| i.index(wire.len() + 1)).collect();
            points.sort_unstable();

            let mut framer = LineFramer::new();
            let mut chunked = Vec::new();
            let mut start = 0;
            for point in points.into_iter().chain(std::iter::once(wire.len())) {
                chunked.extend(framer.feed(&wire[start..point]).unwrap());
                start = point;
            }
            prop_assert_eq!(chunked, expected);
            prop_assert_eq!(framer.buffered(), 0);
        }
    }
}
