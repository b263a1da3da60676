use std::time::Duration;

use mmiosim_device::DEFAULT_CAPACITY;
use mmiosim_frame::DEFAULT_MAX_PAYLOAD;

/// Concurrent connections a server serves by default.
pub const DEFAULT_MAX_CONNECTIONS: usize = 64;

/// Address the server binds when none is configured.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:9090";

/// Configuration for [`MmioServer`](crate::MmioServer).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address, `host:port`.
    pub listen: String,
    /// Region size in bytes. Must be a positive multiple of 4.
    pub region_capacity: usize,
    /// Per-frame read timeout. A request that takes longer to arrive in full
    /// disconnects the peer.
    pub read_timeout: Option<Duration>,
    /// Per-response write timeout.
    pub write_timeout: Option<Duration>,
    /// Connections served at once. Further connections are closed on accept.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN_ADDR.to_string(),
            region_capacity: DEFAULT_CAPACITY,
            read_timeout: Some(Duration::from_secs(30)),
            write_timeout: Some(Duration::from_secs(30)),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Configuration for [`MmioClient`](crate::MmioClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Timeout applied to every blocking send and receive.
    pub io_timeout: Option<Duration>,
    /// Largest read response the client will buffer.
    pub max_payload_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            io_timeout: Some(Duration::from_secs(5)),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
