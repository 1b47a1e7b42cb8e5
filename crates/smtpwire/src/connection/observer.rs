//! Session event observers.
//!
//! A [`Session`](super::Session) reports what it does through a
//! [`SessionObserver`]: state transitions, command lines written and reply
//! lines received. The default [`TracingObserver`] turns these into
//! `tracing` events.
//!
//! # Example
//!
//! ```ignore
//! use smtpwire::connection::{SessionObserver, SessionState};
//!
//! struct Transcript(Vec<String>);
//!
//! impl SessionObserver for Transcript {
//!     fn on_command(&mut self, line: &str) {
//!         self.0.push(format!("C: {line}"));
//!     }
//! }
//! ```

use super::SessionState;
use crate::types::ReplyLine;

/// Receives session events.
///
/// All methods default to doing nothing.
pub trait SessionObserver: Send {
    /// Called on every state transition.
    fn on_state_change(&mut self, from: SessionState, to: SessionState) {
        let _ = (from, to);
    }

    /// Called after a command line (without terminator) is written.
    fn on_command(&mut self, line: &str) {
        let _ = line;
    }

    /// Called for every reply line received for an outstanding operation.
    fn on_reply_line(&mut self, line: &ReplyLine) {
        let _ = line;
    }

    /// Called for a line that arrived while no operation was outstanding.
    /// Such lines are discarded.
    fn on_unsolicited(&mut self, line: &str) {
        let _ = line;
    }
}

/// An observer that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// An observer that logs session events using tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_state_change(&mut self, from: SessionState, to: SessionState) {
        tracing::debug!(%from, %to, "state");
    }

    fn on_command(&mut self, line: &str) {
        tracing::trace!(line, "C:");
    }

    fn on_reply_line(&mut self, line: &ReplyLine) {
        tracing::trace!(code = line.code.as_u16(), is_final = line.is_final, text = %line.text, "S:");
    }

    fn on_unsolicited(&mut self, line: &str) {
        tracing::warn!(line, "discarding unsolicited line");
    }
}
