//! Session configuration types.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use super::framer::MAX_LINE_LENGTH;

/// Transport security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// Never encrypt, even if the server offers STARTTLS.
    Disabled,
    /// Upgrade with STARTTLS when offered, continue in plaintext otherwise.
    #[default]
    Opportunistic,
    /// Require a successful STARTTLS upgrade; fail the session otherwise.
    Mandatory,
    /// TLS from the start (port 465), no STARTTLS.
    Implicit,
}

impl TlsMode {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Disabled | Self::Opportunistic | Self::Mandatory => 25,
            Self::Implicit => 465,
        }
    }

    /// Returns true if the session should attempt STARTTLS.
    #[must_use]
    pub const fn wants_starttls(self) -> bool {
        matches!(self, Self::Opportunistic | Self::Mandatory)
    }
}

/// SMTP session configuration.
///
/// A zero timeout disables the corresponding deadline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname; also used as the TLS server name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Identity sent with EHLO/HELO.
    pub identity: String,
    /// Security mode.
    pub tls: TlsMode,
    /// Deadline for opening the transport and for the TLS handshake.
    pub connect_timeout: Duration,
    /// Deadline for one command and its reply.
    pub command_timeout: Duration,
    /// Deadline for sending a message body and reading the final reply.
    pub data_timeout: Duration,
    /// Deadline for shutting the transport down.
    pub close_timeout: Duration,
    /// Longest reply line accepted from the server.
    pub max_line_length: usize,
}

impl Config {
    /// Creates a configuration with opportunistic STARTTLS on port 25.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self::builder(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Ipv4Addr::LOCALHOST.to_string())
    }
}

/// Builder for session configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    identity: Option<String>,
    tls: TlsMode,
    connect_timeout: Duration,
    command_timeout: Duration,
    data_timeout: Duration,
    close_timeout: Duration,
    max_line_length: usize,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            identity: None,
            tls: TlsMode::Opportunistic,
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
            data_timeout: Duration::from_secs(600),
            close_timeout: Duration::from_secs(5),
            max_line_length: MAX_LINE_LENGTH,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the identity announced with EHLO/HELO.
    #[must_use]
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-command timeout.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the message body timeout.
    #[must_use]
    pub const fn data_timeout(mut self, timeout: Duration) -> Self {
        self.data_timeout = timeout;
        self
    }

    /// Sets the close timeout.
    #[must_use]
    pub const fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Sets the maximum reply line length.
    #[must_use]
    pub const fn max_line_length(mut self, length: usize) -> Self {
        self.max_line_length = length;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.tls.default_port()),
            identity: self.identity.unwrap_or_else(default_identity),
            tls: self.tls,
            connect_timeout: self.connect_timeout,
            command_timeout: self.command_timeout,
            data_timeout: self.data_timeout,
            close_timeout: self.close_timeout,
            max_line_length: self.max_line_length,
        }
    }
}

/// Returns the EHLO identity derived from the local host name.
#[must_use]
pub fn default_identity() -> String {
    identity_for_hostname(&gethostname::gethostname().to_string_lossy())
}

/// Turns a host name into a valid EHLO identity (RFC 5321 section 4.1.4).
///
/// Address literals are bracketed, a name that is not fully qualified is
/// replaced by the loopback literal.
#[must_use]
pub fn identity_for_hostname(hostname: &str) -> String {
    match hostname.parse::<IpAddr>() {
        Ok(IpAddr::V4(addr)) => format!("[{addr}]"),
        Ok(IpAddr::V6(addr)) => format!("[IPv6:{addr}]"),
        Err(_) if hostname.contains('.') => hostname.to_string(),
        Err(_) => format!("[{}]", Ipv4Addr::LOCALHOST),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(TlsMode::Disabled.default_port(), 25);
        assert_eq!(TlsMode::Opportunistic.default_port(), 25);
        assert_eq!(TlsMode::Mandatory.default_port(), 25);
        assert_eq!(TlsMode::Implicit.default_port(), 465);
    }

    #[test]
    fn test_wants_starttls() {
        assert!(TlsMode::Opportunistic.wants_starttls());
        assert!(TlsMode::Mandatory.wants_starttls());
        assert!(!TlsMode::Disabled.wants_starttls());
        assert!(!TlsMode::Implicit.wants_starttls());
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("smtp.example.com");
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 25);
        assert_eq!(config.tls, TlsMode::Opportunistic);
        assert!(!config.identity.is_empty());
    }

    #[test]
    fn test_config_default_host() {
        assert_eq!(Config::default().host, "127.0.0.1");
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder("smtp.example.com")
            .port(587)
            .identity("client.example.org")
            .tls(TlsMode::Mandatory)
            .connect_timeout(Duration::from_secs(10))
            .command_timeout(Duration::from_secs(20))
            .data_timeout(Duration::ZERO)
            .close_timeout(Duration::from_secs(1))
            .max_line_length(4096)
            .build();

        assert_eq!(config.port, 587);
        assert_eq!(config.identity, "client.example.org");
        assert_eq!(config.tls, TlsMode::Mandatory);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.command_timeout, Duration::from_secs(20));
        assert_eq!(config.data_timeout, Duration::ZERO);
        assert_eq!(config.close_timeout, Duration::from_secs(1));
        assert_eq!(config.max_line_length, 4096);
    }

    #[test]
    fn test_config_builder_default_port() {
        let config = Config::builder("smtp.example.com")
            .tls(TlsMode::Implicit)
            .build();
        assert_eq!(config.port, 465);
    }

    #[test]
    fn test_identity_for_hostname() {
        assert_eq!(identity_for_hostname("mail.example.com"), "mail.example.com");
        assert_eq!(identity_for_hostname("192.168.1.1"), "[192.168.1.1]");
        assert_eq!(identity_for_hostname("::1"), "[IPv6:::1]");
        assert_eq!(identity_for_hostname("laptop"), "[127.0.0.1]");
        assert_eq!(identity_for_hostname(""), "[127.0.0.1]");
    }
}
