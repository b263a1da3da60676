use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::MmioStream;

/// TCP listener transport.
///
/// Provides bind/accept/connect over IPv4 or IPv6 TCP. On Unix the standard
/// library sets `SO_REUSEADDR` on listening sockets, so a restarted server can
/// rebind its port while old connections linger in `TIME_WAIT`.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on a TCP address such as `127.0.0.1:9090`.
    ///
    /// Port `0` binds an ephemeral port; use [`local_addr`](Self::local_addr)
    /// to discover it.
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<(MmioStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok((MmioStream::from_tcp(stream)?, peer))
    }

    /// Connect to a listening device (blocking, OS default connect timeout).
    pub fn connect(addr: &str) -> Result<MmioStream> {
        let stream = TcpStream::connect(addr).map_err(|e| TransportError::Connect {
            addr: addr.to_string(),
            source: e,
        })?;
        debug!(addr, "connected to tcp device");
        MmioStream::from_tcp(stream)
    }

    /// Connect with an explicit per-address connect timeout.
    ///
    /// Every resolved address is tried in order; the last error is reported if
    /// none accepts.
    pub fn connect_timeout(addr: &str, timeout: Duration) -> Result<MmioStream> {
        let candidates = addr
            .to_socket_addrs()
            .map_err(|e| TransportError::Connect {
                addr: addr.to_string(),
                source: e,
            })?;

        let mut last_err = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => {
                    debug!(addr, %candidate, "connected to tcp device");
                    return MmioStream::from_tcp(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }

        match last_err {
            Some(source) => Err(TransportError::Connect {
                addr: addr.to_string(),
                source,
            }),
            None => Err(TransportError::Unresolved(addr.to_string())),
        }
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_bind_accept_connect() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().to_string();

        let handle = std::thread::spawn(move || {
            let mut client = TcpTransport::connect(&addr).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let (mut server, peer) = listener.accept().unwrap();
        assert!(peer.ip().is_loopback());
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_bind_ephemeral_port_is_reported() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        assert_ne!(listener.local_addr().port(), 0);
        assert_eq!(listener.transport_name(), "tcp");
    }

    #[test]
    fn test_bind_rejects_unparseable_address() {
        let result = TcpTransport::bind("not an address");
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[test]
    fn test_connect_refused_reports_address() {
        // Bind then drop to find a port with nothing listening.
        let addr = {
            let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
            listener.local_addr().to_string()
        };

        let err = TcpTransport::connect_timeout(&addr, Duration::from_millis(500)).unwrap_err();
        match err {
            TransportError::Connect { addr: reported, .. } => assert_eq!(reported, addr),
            other => panic!("expected connect error, got {other:?}"),
        }
    }

    #[test]
    fn test_read_timeout_surfaces_as_io_error() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().to_string();
        let _client = TcpTransport::connect(&addr).unwrap();

        let (mut server, _) = listener.accept().unwrap();
        server
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let mut buf = [0u8; 1];
        let err = server.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ));
    }

    #[test]
    fn test_shutdown_unblocks_clone() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().to_string();
        let client = TcpTransport::connect(&addr).unwrap();
        let (_server, _) = listener.accept().unwrap();

        let mut reader = client.try_clone().unwrap();
        client.shutdown().unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }
}
