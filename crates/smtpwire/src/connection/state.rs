//! Session state types.

use std::fmt;

/// Where a [`Session`](super::Session) is in its conversation.
///
/// ```text
/// Idle → Connecting → AwaitingGreeting → NegotiatingCapabilities
///        ┌──────────────────────────────────────┘
///        ├─→ PlainReady ⇄ InCommand
///        └─→ Upgrading → NegotiatingCapabilities → SecureReady ⇄ InCommand
/// any ready state → Closing → Closed
/// any non-terminal state → Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No transport yet.
    #[default]
    Idle,
    /// Opening the transport.
    Connecting,
    /// Transport open, waiting for the server's 220 greeting.
    AwaitingGreeting,
    /// EHLO/HELO exchange in progress.
    NegotiatingCapabilities,
    /// STARTTLS accepted, TLS handshake in progress.
    Upgrading,
    /// Ready for commands over a plaintext transport.
    PlainReady,
    /// Ready for commands over an encrypted transport.
    SecureReady,
    /// A command is awaiting its reply.
    InCommand,
    /// Shutting the transport down.
    Closing,
    /// Transport closed; no more I/O.
    Closed,
    /// Unrecoverable transport or protocol failure.
    Failed,
}

impl SessionState {
    /// Returns true if a command may be issued.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::PlainReady | Self::SecureReady)
    }

    /// Returns true if the session has ended.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
    }

    #[test]
    fn test_is_ready() {
        assert!(SessionState::PlainReady.is_ready());
        assert!(SessionState::SecureReady.is_ready());
        assert!(!SessionState::InCommand.is_ready());
        assert!(!SessionState::AwaitingGreeting.is_ready());
    }

    #[test]
    fn test_is_terminal() {
        assert!(SessionState::Closed.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Closing.is_terminal());
        assert!(!SessionState::Idle.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::SecureReady.to_string(), "SecureReady");
    }
}
