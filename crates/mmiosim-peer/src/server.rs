use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mmiosim_device::SharedRegion;
use mmiosim_transport::TcpTransport;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::Result;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);
const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// The fake MMIO device: listens for connections and serves each one on its
/// own thread against a single shared region.
pub struct MmioServer {
    transport: TcpTransport,
    region: SharedRegion,
    config: ServerConfig,
    next_conn_id: AtomicU64,
    active: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
}

impl MmioServer {
    /// Bind to `addr` with an otherwise default configuration.
    pub fn bind(addr: &str) -> Result<Self> {
        Self::bind_with_config(ServerConfig {
            listen: addr.to_string(),
            ..ServerConfig::default()
        })
    }

    /// Bind using explicit configuration and a fresh zeroed region.
    pub fn bind_with_config(config: ServerConfig) -> Result<Self> {
        let region = SharedRegion::with_capacity(config.region_capacity)?;
        Self::bind_with_region(config, region)
    }

    /// Bind using explicit configuration and an existing region.
    ///
    /// `config.region_capacity` is ignored in favour of the region's own size.
    pub fn bind_with_region(config: ServerConfig, region: SharedRegion) -> Result<Self> {
        let transport = TcpTransport::bind(&config.listen)?;
        info!(
            addr = %transport.local_addr(),
            capacity = region.capacity(),
            "fake mmio device ready"
        );
        Ok(Self {
            transport,
            region,
            config,
            next_conn_id: AtomicU64::new(1),
            active: Arc::new(AtomicUsize::new(0)),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Bound socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Handle to the region every connection shares.
    pub fn region(&self) -> SharedRegion {
        self.region.clone()
    }

    /// Active configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Connections currently being served by [`serve`](Self::serve).
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// A handle that stops [`serve`](Self::serve) from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            addr: self.local_addr(),
        }
    }

    /// Accept the next connection and assign it an id.
    pub fn accept(&self) -> Result<Connection> {
        let (stream, peer) = self.transport.accept()?;
        let id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        Connection::new(
            format!("conn-{id}"),
            peer,
            stream,
            self.region.clone(),
            &self.config,
        )
    }

    /// Accept connections until shut down, one thread per connection.
    ///
    /// At most `max_connections` are served at once; a connection accepted
    /// past the cap is closed immediately. A failed accept or a failed handler
    /// never stops the loop.
    pub fn serve(&self) -> Result<()> {
        while !self.is_shutting_down() {
            let conn = match self.accept() {
                Ok(conn) => conn,
                Err(err) => {
                    if self.is_shutting_down() {
                        break;
                    }
                    warn!(error = %err, "accept failed");
                    std::thread::sleep(ACCEPT_BACKOFF);
                    continue;
                }
            };

            if self.is_shutting_down() {
                debug!(id = conn.id(), "dropping connection accepted during shutdown");
                break;
            }

            if self.active.load(Ordering::SeqCst) >= self.config.max_connections {
                warn!(
                    id = conn.id(),
                    peer = %conn.peer_addr(),
                    max = self.config.max_connections,
                    "connection limit reached, closing"
                );
                continue;
            }

            self.active.fetch_add(1, Ordering::SeqCst);
            let slot = ActiveSlot(Arc::clone(&self.active));
            let name = format!("mmiosim-{}", conn.id());
            if let Err(err) = std::thread::Builder::new().name(name).spawn(move || {
                let _slot = slot;
                conn.run();
            }) {
                warn!(error = %err, "failed to spawn connection thread");
            }
        }

        info!("server stopped accepting connections");
        Ok(())
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Releases one connection slot when the handler thread ends, or when the
/// closure holding it is dropped unrun.
struct ActiveSlot(Arc<AtomicUsize>);

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Stops a running [`MmioServer::serve`] loop.
///
/// Connections already being served finish on their own; only the accept
/// loop stops.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl ShutdownHandle {
    /// Request shutdown and wake the blocked accept.
    pub fn shutdown(&self) {
        if self.flag.swap(true, Ordering::SeqCst) {
            return;
        }
        let target = wake_address(self.addr);
        match TcpTransport::connect_timeout(&target.to_string(), WAKE_TIMEOUT) {
            Ok(stream) => drop(stream),
            Err(err) => debug!(error = %err, "wake connect failed"),
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A wildcard bind address cannot be connected to; use loopback instead.
fn wake_address(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}
