//! Byte transports and the connectors that open them.

use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::error::TransportError;

/// Anything a connection can run over.
pub trait IoStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> IoStream for T {}

/// Read half of a split [`Transport`].
pub type TransportReader = ReadHalf<Box<dyn IoStream>>;
/// Write half of a split [`Transport`].
pub type TransportWriter = WriteHalf<Box<dyn IoStream>>;

/// An open connection to a server.
pub struct Transport {
    stream: Box<dyn IoStream>,
    tls: bool,
}

impl Transport {
    /// Plain TCP, with keepalive probes enabled.
    pub fn tcp(stream: TcpStream) -> Self {
        if let Err(e) = Self::enable_keepalive(&stream) {
            warn!("failed to enable TCP keepalive: {}", e);
        }
        Self {
            stream: Box::new(stream),
            tls: false,
        }
    }

    fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
        use socket2::{SockRef, TcpKeepalive};

        let sock = SockRef::from(stream);
        let keepalive = TcpKeepalive::new()
            .with_time(Duration::from_secs(120))
            .with_interval(Duration::from_secs(30));

        sock.set_tcp_keepalive(&keepalive)
    }

    /// Client-side TLS over TCP.
    #[cfg(feature = "tls")]
    pub fn tls(stream: tokio_rustls::client::TlsStream<TcpStream>) -> Self {
        Self {
            stream: Box::new(stream),
            tls: true,
        }
    }

    /// Any other stream, e.g. an in-memory pipe.
    pub fn from_stream<S: IoStream + 'static>(stream: S) -> Self {
        Self {
            stream: Box::new(stream),
            tls: false,
        }
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Split into independently owned read and write halves.
    pub fn into_split(self) -> (TransportReader, TransportWriter) {
        tokio::io::split(self.stream)
    }
}

/// Opens transports for the connection supervisor.
pub trait Connector: Send + Sync {
    fn connect<'a>(
        &'a self,
        server: &'a ServerConfig,
    ) -> BoxFuture<'a, Result<Transport, TransportError>>;
}

/// Connects over TCP, wrapping in TLS when the server config asks for it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect<'a>(
        &'a self,
        server: &'a ServerConfig,
    ) -> BoxFuture<'a, Result<Transport, TransportError>> {
        Box::pin(async move {
            let tcp = TcpStream::connect((server.hostname.as_str(), server.port)).await?;
            debug!(host = %server.hostname, port = server.port, "tcp connected");

            if server.tls {
                return tls::wrap(tcp, &server.hostname).await;
            }
            Ok(Transport::tcp(tcp))
        })
    }
}

#[cfg(feature = "tls")]
mod tls {
    use std::sync::Arc;

    use tokio::net::TcpStream;
    use tokio_rustls::rustls::{self, pki_types::ServerName};
    use tokio_rustls::TlsConnector;
    use tracing::debug;

    use super::Transport;
    use crate::error::TransportError;

    pub(super) async fn wrap(tcp: TcpStream, hostname: &str) -> Result<Transport, TransportError> {
        let root_store =
            rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(config));

        let server_name = ServerName::try_from(hostname.to_owned())
            .map_err(|_| TransportError::InvalidServerName(hostname.to_owned()))?;
        let stream = connector.connect(server_name, tcp).await?;
        debug!(host = hostname, "tls handshake complete");
        Ok(Transport::tls(stream))
    }
}

#[cfg(not(feature = "tls"))]
mod tls {
    use tokio::net::TcpStream;

    use super::Transport;
    use crate::error::TransportError;

    pub(super) async fn wrap(_tcp: TcpStream, hostname: &str) -> Result<Transport, TransportError> {
        Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("TLS requested for {} but the `tls` feature is disabled", hostname),
        )))
    }
}
