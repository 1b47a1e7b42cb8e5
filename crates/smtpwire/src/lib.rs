//! # smtpwire
//!
//! A client-side SMTP session engine (RFC 5321).
//!
//! ## Features
//!
//! - **Session state machine**: greeting, EHLO with HELO fallback, STARTTLS
//!   upgrade and a strict one-command-at-a-time reply cycle
//! - **Deadlines everywhere**: connect, every command, the message body and
//!   close each run under their own timeout
//! - **TLS support**: implicit TLS (port 465), opportunistic or mandatory
//!   STARTTLS, via rustls
//! - **Streaming message bodies**: dot-stuffing and CRLF normalization over
//!   any [`AsyncRead`](tokio::io::AsyncRead)
//! - **Pluggable transport**: the [`Connector`] trait supplies the byte
//!   stream, so sessions run over TCP or an in-memory mock
//!
//! ## Quick Start
//!
//! ```ignore
//! use smtpwire::{Command, Config, Session, TcpConnector};
//!
//! #[tokio::main]
//! async fn main() -> smtpwire::Result<()> {
//!     let config = Config::builder("smtp.example.com").port(25).build();
//!     let mut session = Session::new(config, TcpConnector::new());
//!
//!     session.connect().await?;
//!     println!("secure: {}", session.is_secure());
//!
//!     session.send(Command::MailFrom {
//!         from: "sender@example.com".into(),
//!         size: None,
//!         smtputf8: false,
//!     }).await?;
//!     session.send(Command::RcptTo { to: "recipient@example.com".into() }).await?;
//!
//!     let reply = session
//!         .send_message(b"Subject: Test\r\n\r\nHello, World!\r\n")
//!         .await?;
//!     println!("{reply}");
//!
//!     session.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Session, transport, framing and deadlines
//! - [`data`]: Message body encoding
//! - [`parser`]: Reply parser
//! - [`types`]: Core SMTP types (extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
pub mod data;
mod error;
pub mod parser;
pub mod types;

pub use command::Command;
pub use connection::{
    Config, ConfigBuilder, Connector, Deadline, LineFramer, NoopObserver, ServerInfo, Session,
    SessionObserver, SessionState, SmtpStream, TcpConnector, TlsMode, TracingObserver,
};
pub use data::DataEncoder;
pub use error::{Error, Result};
pub use types::{Extensions, Reply, ReplyCode, ReplyLine};
