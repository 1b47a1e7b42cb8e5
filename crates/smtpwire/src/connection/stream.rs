//! Transports for SMTP sessions.
//!
//! The session never opens sockets itself. It asks a [`Connector`] for a
//! byte stream and, after a successful STARTTLS, hands the stream back to
//! the same connector to be wrapped in TLS.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::error::{Error, Result};

/// Opens transports and upgrades them to TLS.
pub trait Connector {
    /// Bidirectional byte stream produced by this connector.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Opens a connection to `host:port`, negotiating TLS first if
    /// `implicit_tls` is set.
    fn connect(
        &self,
        host: &str,
        port: u16,
        implicit_tls: bool,
    ) -> impl Future<Output = Result<Self::Stream>> + Send;

    /// Wraps an open plaintext stream in TLS over the same connection.
    fn upgrade(
        &self,
        stream: Self::Stream,
        host: &str,
    ) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// SMTP stream (TCP or TLS).
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Plain(TcpStream),
    /// TLS-encrypted connection (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl SmtpStream {
    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for SmtpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SmtpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Connector for TCP with rustls-based TLS.
#[derive(Clone)]
pub struct TcpConnector {
    tls: TlsConnector,
}

impl std::fmt::Debug for TcpConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnector").finish_non_exhaustive()
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpConnector {
    /// Creates a connector trusting the webpki root certificates.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tls: create_tls_connector(),
        }
    }

    /// Creates a connector with a caller-supplied TLS client configuration.
    #[must_use]
    pub fn with_tls_config(config: Arc<ClientConfig>) -> Self {
        Self {
            tls: TlsConnector::from(config),
        }
    }

    async fn handshake(&self, tcp: TcpStream, host: &str) -> Result<SmtpStream> {
        let server_name = ServerName::try_from(host.to_string())?;
        let tls = self.tls.connect(server_name, tcp).await?;
        Ok(SmtpStream::Tls(Box::new(tls)))
    }
}

impl Connector for TcpConnector {
    type Stream = SmtpStream;

    async fn connect(&self, host: &str, port: u16, implicit_tls: bool) -> Result<SmtpStream> {
        let addr = format!("{host}:{port}");
        let tcp = TcpStream::connect(&addr).await?;
        tcp.set_nodelay(true)?;
        tracing::debug!(%addr, implicit_tls, "connected");

        if implicit_tls {
            self.handshake(tcp, host).await
        } else {
            Ok(SmtpStream::Plain(tcp))
        }
    }

    async fn upgrade(&self, stream: SmtpStream, host: &str) -> Result<SmtpStream> {
        match stream {
            SmtpStream::Plain(tcp) => self.handshake(tcp, host).await,
            SmtpStream::Tls(_) => Err(Error::InvalidState("Stream is already TLS".into())),
        }
    }
}

/// Creates a TLS connector with system root certificates.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
