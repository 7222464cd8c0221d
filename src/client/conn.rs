//! Options for connecting to IRC servers, and the stream type those connections produce.

use std::pin::Pin;
use tokio::net::TcpStream;

/// The minimal config necessary to connect to an IRC server.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct ServerAddr {
    /// The address to connect to.
    pub address: String,
    /// Whether to use TLS.
    pub tls: bool,
    /// An optional port number if a non-default one should be used.
    pub port: Option<u16>,
}

impl PartialEq for ServerAddr {
    fn eq(&self, other: &Self) -> bool {
        self.tls == other.tls
            && self.port_num() == other.port_num()
            && self.address == other.address
    }
}

impl Eq for ServerAddr {}

impl std::hash::Hash for ServerAddr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write(self.address.as_bytes());
        state.write_u8(self.tls as u8);
        state.write_u16(self.port_num());
    }
}

impl Default for ServerAddr {
    fn default() -> Self {
        ServerAddr::from_host("localhost")
    }
}

impl std::fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plus = if self.tls { "+" } else { "" };
        write!(f, "{}:{plus}{}", self.address, self.port_num())
    }
}

impl ServerAddr {
    /// Creates a new `ServerAddr` with `tls = true` and a default port number.
    pub fn from_host(address: impl Into<String>) -> Self {
        ServerAddr { address: address.into(), tls: true, port: None }
    }
    /// Returns the port number that should be used for connecting to the network.
    pub const fn port_num(&self) -> u16 {
        if let Some(no) = self.port {
            no
        } else if self.tls {
            6697
        } else {
            6667
        }
    }
    /// Creates an asynchronous connection, ignoring the `tls` flag.
    pub async fn connect_no_tls(&self) -> std::io::Result<StreamTokio> {
        let sock = TcpStream::connect((self.address.as_str(), self.port_num())).await?;
        sock.set_nodelay(true)?;
        Ok(StreamTokio(StreamInner::Tcp(sock)))
    }
    /// Creates an asynchronous connection.
    #[cfg(feature = "tls")]
    pub async fn connect(&self, config: super::tls::TlsConfig) -> std::io::Result<StreamTokio> {
        use std::io::{Error, ErrorKind};
        if !self.tls {
            return self.connect_no_tls().await;
        }
        let name = rustls::pki_types::ServerName::try_from(self.address.clone())
            .map_err(|e| Error::new(ErrorKind::InvalidInput, e))?;
        let conn: tokio_rustls::TlsConnector = config.into();
        let sock = TcpStream::connect((self.address.as_str(), self.port_num())).await?;
        sock.set_nodelay(true)?;
        let tls = conn.connect(name, sock).await?;
        Ok(StreamTokio(StreamInner::Tls(Box::new(tls))))
    }
}

/// An abstraction of common I/O stream types.
#[derive(Debug, Default)]
pub struct StreamTokio(StreamInner);

#[derive(Debug, Default)]
enum StreamInner {
    #[default]
    Closed,
    Tcp(TcpStream),
    #[cfg(feature = "tls")]
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl StreamTokio {
    /// Returns `true` if this stream is encrypted.
    pub fn is_tls(&self) -> bool {
        match self.0 {
            #[cfg(feature = "tls")]
            StreamInner::Tls(_) => true,
            _ => false,
        }
    }
}

impl tokio::io::AsyncRead for StreamTokio {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match &mut (self.get_mut()).0 {
            StreamInner::Closed => std::task::Poll::Ready(Ok(())),
            StreamInner::Tcp(tcp) => Pin::new(tcp).poll_read(cx, buf),
            #[cfg(feature = "tls")]
            StreamInner::Tls(tls) => Pin::new(tls.as_mut()).poll_read(cx, buf),
        }
    }
}

impl tokio::io::AsyncWrite for StreamTokio {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<Result<usize, std::io::Error>> {
        match &mut (self.get_mut()).0 {
            StreamInner::Closed => std::task::Poll::Ready(Ok(0)),
            StreamInner::Tcp(tcp) => Pin::new(tcp).poll_write(cx, buf),
            #[cfg(feature = "tls")]
            StreamInner::Tls(tls) => Pin::new(tls.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), std::io::Error>> {
        match &mut (self.get_mut()).0 {
            StreamInner::Closed => std::task::Poll::Ready(Ok(())),
            StreamInner::Tcp(tcp) => Pin::new(tcp).poll_flush(cx),
            #[cfg(feature = "tls")]
            StreamInner::Tls(tls) => Pin::new(tls.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), std::io::Error>> {
        match &mut (self.get_mut()).0 {
            StreamInner::Closed => std::task::Poll::Ready(Ok(())),
            StreamInner::Tcp(tcp) => Pin::new(tcp).poll_shutdown(cx),
            #[cfg(feature = "tls")]
            StreamInner::Tls(tls) => Pin::new(tls.as_mut()).poll_shutdown(cx),
        }
    }
}
