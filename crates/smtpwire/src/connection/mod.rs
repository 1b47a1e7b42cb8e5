//! SMTP session management.
//!
//! [`Session`] runs the conversation, [`Connector`] supplies its transport,
//! and [`LineFramer`] and [`Deadline`] are the building blocks it reads and
//! waits with.

mod config;
mod deadline;
mod framer;
mod observer;
mod session;
mod state;
mod stream;

pub use config::{Config, ConfigBuilder, TlsMode, default_identity, identity_for_hostname};
pub use deadline::Deadline;
pub use framer::{LineFramer, MAX_LINE_LENGTH};
pub use observer::{NoopObserver, SessionObserver, TracingObserver};
pub use session::Session;
pub use state::SessionState;
pub use stream::{Connector, SmtpStream, TcpConnector};

use crate::types::Extensions;

/// What the server told us about itself.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Extensions advertised in the latest EHLO reply.
    pub extensions: Extensions,
}

impl ServerInfo {
    /// Checks if the server advertised an extension keyword.
    #[must_use]
    pub fn supports(&self, keyword: &str) -> bool {
        self.extensions.contains(keyword)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.extensions.supports_starttls()
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.max_size()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::types::{Reply, ReplyCode};

    #[test]
    fn test_server_info() {
        let reply = Reply::new(
            ReplyCode::OK,
            vec![
                "mx.example.com".to_string(),
                "STARTTLS".to_string(),
                "SIZE 1000".to_string(),
            ],
        );
        let info = ServerInfo {
            hostname: "mx.example.com".to_string(),
            extensions: Extensions::from_ehlo(&reply),
        };

        assert!(info.supports("starttls"));
        assert!(info.supports_starttls());
        assert_eq!(info.max_message_size(), Some(1000));
        assert!(!info.supports("PIPELINING"));
    }
}
