//! SMTP command builder.

use crate::error::{Error, Result};

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Legacy greeting
    Helo {
        /// Client identity
        hostname: String,
    },
    /// EHLO - Extended greeting
    Ehlo {
        /// Client identity
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Reverse path, sent verbatim between angle brackets
        from: String,
        /// SIZE parameter
        size: Option<usize>,
        /// SMTPUTF8 parameter
        smtputf8: bool,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Forward path, sent verbatim between angle brackets
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
    /// Any other command line, sent as given
    Raw(String),
}

impl Command {
    /// Serializes the command to bytes, including the CRLF terminator.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::Helo { hostname } => {
                buf.extend_from_slice(b"HELO ");
                buf.extend_from_slice(hostname.as_bytes());
            }
            Self::Ehlo { hostname } => {
                buf.extend_from_slice(b"EHLO ");
                buf.extend_from_slice(hostname.as_bytes());
            }
            Self::StartTls => {
                buf.extend_from_slice(b"STARTTLS");
            }
            Self::MailFrom {
                from,
                size,
                smtputf8,
            } => {
                buf.extend_from_slice(b"MAIL FROM:<");
                buf.extend_from_slice(from.as_bytes());
                buf.push(b'>');
                if let Some(msg_size) = size {
                    buf.extend_from_slice(format!(" SIZE={msg_size}").as_bytes());
                }
                if *smtputf8 {
                    buf.extend_from_slice(b" SMTPUTF8");
                }
            }
            Self::RcptTo { to } => {
                buf.extend_from_slice(b"RCPT TO:<");
                buf.extend_from_slice(to.as_bytes());
                buf.push(b'>');
            }
            Self::Data => {
                buf.extend_from_slice(b"DATA");
            }
            Self::Rset => {
                buf.extend_from_slice(b"RSET");
            }
            Self::Vrfy { address } => {
                buf.extend_from_slice(b"VRFY ");
                buf.extend_from_slice(address.as_bytes());
            }
            Self::Noop => {
                buf.extend_from_slice(b"NOOP");
            }
            Self::Quit => {
                buf.extend_from_slice(b"QUIT");
            }
            Self::Raw(line) => {
                buf.extend_from_slice(line.as_bytes());
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Serializes the command, refusing lines that would smuggle a second
    /// command onto the wire.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCommand`] if the command text contains CR or LF,
    /// or is empty.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        let data = self.serialize();
        let body = &data[..data.len() - 2];
        if body.is_empty() {
            return Err(Error::InvalidCommand("empty command line".into()));
        }
        if body.iter().any(|&b| b == b'\r' || b == b'\n') {
            return Err(Error::InvalidCommand(format!(
                "line break in command: {:?}",
                String::from_utf8_lossy(body)
            )));
        }
        Ok(data)
    }

    /// Returns the command verb, as used in log output.
    #[must_use]
    pub fn verb(&self) -> &str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::MailFrom { .. } => "MAIL",
            Self::RcptTo { .. } => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Vrfy { .. } => "VRFY",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
            Self::Raw(line) => line.split_whitespace().next().unwrap_or(""),
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
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
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
            hostname: "[127.0.0.1]".to_string(),
        };
        assert_eq!(cmd.serialize(), b"EHLO [127.0.0.1]\r\n");
    }

    #[test]
    fn test_starttls_command() {
        assert_eq!(Command::StartTls.serialize(), b"STARTTLS\r\n");
    }

    #[test]
    fn test_mail_from_simple() {
        let cmd = Command::MailFrom {
            from: "sender@example.com".to_string(),
            size: None,
            smtputf8: false,
        };
        assert_eq!(cmd.serialize(), b"MAIL FROM:<sender@example.com>\r\n");
    }

    #[test]
    fn test_mail_from_with_params() {
        let cmd = Command::MailFrom {
            from: "sender@example.com".to_string(),
            size: Some(12345),
            smtputf8: true,
        };
        assert_eq!(
            cmd.serialize(),
            b"MAIL FROM:<sender@example.com> SIZE=12345 SMTPUTF8\r\n"
        );
    }

    #[test]
    fn test_null_reverse_path() {
        let cmd = Command::MailFrom {
            from: String::new(),
            size: None,
            smtputf8: false,
        };
        assert_eq!(cmd.serialize(), b"MAIL FROM:<>\r\n");
    }

    #[test]
    fn test_rcpt_to_command() {
        let cmd = Command::RcptTo {
            to: "recipient@example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), b"RCPT TO:<recipient@example.com>\r\n");
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::Data.serialize(), b"DATA\r\n");
        assert_eq!(Command::Rset.serialize(), b"RSET\r\n");
        assert_eq!(Command::Noop.serialize(), b"NOOP\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }

    #[test]
    fn test_raw_command() {
        let cmd = Command::from("HELP ehlo");
        assert_eq!(cmd.serialize(), b"HELP ehlo\r\n");
        assert_eq!(cmd.verb(), "HELP");
    }

    #[test]
    fn test_to_wire_rejects_line_breaks() {
        let cmd = Command::from("NOOP\r\nQUIT");
        assert!(matches!(cmd.to_wire(), Err(Error::InvalidCommand(_))));

        let cmd = Command::RcptTo {
            to: "a@b\nDATA".to_string(),
        };
        assert!(cmd.to_wire().is_err());
    }

    #[test]
    fn test_to_wire_rejects_empty() {
        assert!(Command::from("").to_wire().is_err());
    }

    #[test]
    fn test_to_wire_accepts_plain_line() {
        assert_eq!(Command::Noop.to_wire().unwrap(), b"NOOP\r\n");
    }
}
