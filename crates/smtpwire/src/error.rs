//! Error types for SMTP sessions.

use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP session error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Operation did not settle before its deadline.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Server sent a line that is not a valid reply line.
    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    /// Server returned an error reply where the session cannot proceed.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// A command was issued while another one is still awaiting its reply.
    #[error("Another operation is still awaiting its reply")]
    OperationInProgress,

    /// The session is closing or closed.
    #[error("Session is closed")]
    Closed,

    /// Protocol error (unexpected data on the wire).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Command line cannot be sent as-is.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Message exceeds the size limit the server advertised.
    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 400 && *code < 500)
    }

    /// Returns true if this error leaves the session unusable.
    ///
    /// Transport, TLS and parse failures are fatal. Timeouts, usage errors
    /// and rejected commands only affect the operation that raised them.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Tls(_)
                | Self::InvalidDnsName(_)
                | Self::MalformedReply(_)
                | Self::Protocol(_)
        )
    }
}
