//! Message body encoding for the DATA phase (RFC 5321 section 4.5.2).
//!
//! The body is sent as a stream of CRLF-terminated lines ended by a line
//! holding a single `.`. To keep that marker unambiguous, every body line
//! starting with `.` gets a second `.` prepended, and the receiver strips it.
//!
//! [`DataEncoder`] applies these rules to a payload delivered in chunks of
//! any size. Line-start and line-ending state carries over between chunks,
//! so the output does not depend on where the chunk boundaries fall.

/// Streaming encoder for the DATA phase.
///
/// - bare `\n` and bare `\r` become `\r\n`
/// - a `.` at the start of a line is doubled
/// - [`finish`](Self::finish) emits the `\r\n.\r\n` end-of-data marker,
///   sharing the payload's own final line ending when it has one
#[derive(Debug, Clone)]
pub struct DataEncoder {
    at_line_start: bool,
    pending_cr: bool,
    last_out: Option<u8>,
    bytes_in: u64,
    bytes_out: u64,
}

impl Default for DataEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DataEncoder {
    /// Creates an encoder positioned at the start of the payload.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            at_line_start: true,
            pending_cr: false,
            last_out: None,
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    /// Encodes one chunk of payload.
    pub fn encode(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chunk.len() + chunk.len() / 16 + 2);

        for &b in chunk {
            if self.pending_cr {
                // A CR was emitted last; whatever follows, the line ends here.
                self.pending_cr = false;
                self.at_line_start = true;
                out.push(b'\n');
                if b == b'\n' {
                    continue;
                }
            }

            match b {
                b'\r' => {
                    out.push(b'\r');
                    self.pending_cr = true;
                }
                b'\n' => {
                    out.extend_from_slice(b"\r\n");
                    self.at_line_start = true;
                }
                b'.' if self.at_line_start => {
                    out.extend_from_slice(b"..");
                    self.at_line_start = false;
                }
                _ => {
                    out.push(b);
                    self.at_line_start = false;
                }
            }
        }

        self.bytes_in += chunk.len() as u64;
        self.record(&out);
        out
    }

    /// Returns the bytes that terminate the body.
    ///
    /// The encoder is reset to the start of a new payload afterwards; the
    /// byte counters keep accumulating.
    pub fn finish(&mut self) -> Vec<u8> {
        let tail: &[u8] = match self.last_out {
            Some(b'\n') => b".\r\n",
            Some(b'\r') => b"\n.\r\n",
            _ => b"\r\n.\r\n",
        };
        let tail = tail.to_vec();
        self.record(&tail);

        self.at_line_start = true;
        self.pending_cr = false;
        self.last_out = None;
        tail
    }

    /// Encodes a complete payload, end-of-data marker included.
    #[must_use]
    pub fn encode_all(payload: &[u8]) -> Vec<u8> {
        let mut encoder = Self::new();
        let mut out = encoder.encode(payload);
        out.extend(encoder.finish());
        out
    }

    /// Payload bytes consumed so far.
    #[must_use]
    pub const fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Wire bytes produced so far, terminators included.
    #[must_use]
    pub const fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    fn record(&mut self, out: &[u8]) {
        if let Some(&last) = out.last() {
            self.last_out = Some(last);
        }
        self.bytes_out += out.len() as u64;
    }
}
