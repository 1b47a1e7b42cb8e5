//! SMTP reply parser.
//!
//! Replies are single-line or multi-line:
//! - Single: `250 OK\r\n`
//! - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
//!
//! Every line starts with the same three digit code. The fourth character is
//! `-` on continuation lines and a space on the final line. Lines reach this
//! module with their terminators already stripped by the line framer.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode, ReplyLine};

/// Parses a single reply line.
///
/// # Errors
///
/// Returns [`Error::MalformedReply`] if the line is shorter than four
/// characters, does not start with three digits, or has a separator other
/// than space or `-`.
pub fn parse_line(line: &str) -> Result<ReplyLine> {
    let bytes = line.as_bytes();
    if bytes.len() < 4 {
        return Err(Error::MalformedReply(format!("Reply too short: {line:?}")));
    }

    let code_bytes = &bytes[..3];
    if !code_bytes.iter().all(u8::is_ascii_digit) {
        return Err(Error::MalformedReply(format!("Invalid reply code: {line:?}")));
    }
    let code = code_bytes
        .iter()
        .fold(0u16, |acc, &b| acc * 10 + u16::from(b - b'0'));

    let is_final = match bytes[3] {
        b' ' => true,
        b'-' => false,
        _ => {
            return Err(Error::MalformedReply(format!(
                "Invalid reply separator: {line:?}"
            )));
        }
    };

    Ok(ReplyLine {
        code: ReplyCode::new(code),
        is_final,
        is_success: bytes[0] == b'2',
        text: line[4..].to_string(),
    })
}

/// Parses an SMTP reply from its complete run of lines.
///
/// # Errors
///
/// Returns an error if the reply is empty, a line is malformed, the codes
/// disagree, or the run does not end exactly at the final line.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let mut accumulator = ReplyAccumulator::new();
    let mut reply = None;

    for line in lines {
        if reply.is_some() {
            return Err(Error::MalformedReply(format!(
                "Line after final reply line: {line:?}"
            )));
        }
        reply = accumulator.push(parse_line(line)?)?;
    }

    reply.ok_or_else(|| Error::MalformedReply("Reply has no final line".into()))
}

/// Folds reply lines into one logical [`Reply`].
#[derive(Debug, Default, Clone)]
pub struct ReplyAccumulator {
    code: Option<ReplyCode>,
    message: Vec<String>,
}

impl ReplyAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            code: None,
            message: Vec::new(),
        }
    }

    /// Adds one line. Returns the complete reply once the final line arrives,
    /// leaving the accumulator empty for the next reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedReply`] if the line's code differs from the
    /// code of the lines before it.
    pub fn push(&mut self, line: ReplyLine) -> Result<Option<Reply>> {
        match self.code {
            Some(code) if code != line.code => {
                return Err(Error::MalformedReply(format!(
                    "Reply code changed mid-reply: {code} then {}",
                    line.code
                )));
            }
            Some(_) => {}
            None => self.code = Some(line.code),
        }

        self.message.push(line.text);

        if line.is_final {
            let message = std::mem::take(&mut self.message);
            let code = self.code.take().unwrap_or(line.code);
            return Ok(Some(Reply::new(code, message)));
        }
        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_line_final() {
        let line = parse_line("250 OK").unwrap();
        assert_eq!(line.code, ReplyCode::OK);
        assert!(line.is_final);
        assert!(line.is_success);
        assert_eq!(line.text, "OK");
    }

    #[test]
    fn test_parse_line_continuation() {
        let line = parse_line("250-PIPELINING").unwrap();
        assert!(!line.is_final);
        assert_eq!(line.text, "PIPELINING");
    }

    #[test]
    fn test_parse_line_failure_codes() {
        assert!(!parse_line("354 go ahead").unwrap().is_success);
        assert!(!parse_line("421 closing").unwrap().is_success);
        assert!(!parse_line("550 no").unwrap().is_success);
    }

    #[test]
    fn test_parse_line_empty_text() {
        let line = parse_line("250 ").unwrap();
        assert!(line.is_final);
        assert_eq!(line.text, "");
    }

    #[test]
    fn test_parse_line_too_short() {
        for short in ["", "2", "25", "250"] {
            assert!(matches!(parse_line(short), Err(Error::MalformedReply(_))));
        }
    }

    #[test]
    fn test_parse_line_bad_code() {
        assert!(matches!(parse_line("ABC OK"), Err(Error::MalformedReply(_))));
        assert!(matches!(parse_line("2x0 OK"), Err(Error::MalformedReply(_))));
    }

    #[test]
    fn test_parse_line_bad_separator() {
        assert!(matches!(parse_line("250+OK"), Err(Error::MalformedReply(_))));
    }

    #[test]
    fn test_parse_single_line_reply() {
        let reply = parse_reply(&lines(&["250 OK"])).unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(reply.message, vec!["OK"]);
        assert!(reply.is_success());
    }

    #[test]
    fn test_parse_multi_line_reply() {
        let reply = parse_reply(&lines(&["250-First", "250-Second", "250 Third"])).unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert!(reply.is_success());
        assert_eq!(reply.text(), "Third");
        assert_eq!(reply.message, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_intermediate_lines_are_not_final() {
        let parsed: Vec<ReplyLine> = ["250-First", "250-Second", "250 Third"]
            .iter()
            .map(|l| parse_line(l).unwrap())
            .collect();
        assert_eq!(
            parsed.iter().map(|l| l.is_final).collect::<Vec<_>>(),
            vec![false, false, true]
        );
    }

    #[test]
    fn test_parse_greeting() {
        let reply = parse_reply(&lines(&["220 smtp.example.com ESMTP ready"])).unwrap();
        assert_eq!(reply.code, ReplyCode::SERVICE_READY);
        assert_eq!(reply.text(), "smtp.example.com ESMTP ready");
    }

    #[test]
    fn test_parse_error_empty() {
        assert!(parse_reply(&[]).is_err());
    }

    #[test]
    fn test_parse_error_no_final_line() {
        assert!(matches!(
            parse_reply(&lines(&["250-First", "250-Second"])),
            Err(Error::MalformedReply(_))
        ));
    }

    #[test]
    fn test_parse_error_line_after_final() {
        assert!(parse_reply(&lines(&["250 First", "250 Second"])).is_err());
    }

    #[test]
    fn test_parse_error_code_mismatch() {
        assert!(matches!(
            parse_reply(&lines(&["250-First", "251 Second"])),
            Err(Error::MalformedReply(_))
        ));
    }

    #[test]
    fn test_accumulator_resets_after_reply() {
        let mut acc = ReplyAccumulator::new();
        assert!(acc.push(parse_line("220-hello").unwrap()).unwrap().is_none());
        let first = acc.push(parse_line("220 ready").unwrap()).unwrap().unwrap();
        assert_eq!(first.message.len(), 2);

        let second = acc.push(parse_line("250 OK").unwrap()).unwrap().unwrap();
        assert_eq!(second.code, ReplyCode::OK);
        assert_eq!(second.message, vec!["OK"]);
    }
}
