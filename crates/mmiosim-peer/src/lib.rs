//! Fake MMIO device server and host-side client.
//!
//! [`MmioServer`] owns one [`SharedRegion`](mmiosim_device::SharedRegion) and
//! serves every accepted connection on its own thread. [`MmioClient`] drives a
//! device one synchronous round trip at a time.
//!
//! ```no_run
//! use mmiosim_peer::{MmioClient, MmioServer};
//!
//! let server = MmioServer::bind("127.0.0.1:0")?;
//! let addr = server.local_addr().to_string();
//! std::thread::spawn(move || server.serve());
//!
//! let mut client = MmioClient::connect(&addr)?;
//! assert!(client.handshake()?);
//! assert!(client.write_data(b"hello")?);
//! assert_eq!(client.read_data(5)?.as_ref(), b"hello");
//! # Ok::<(), mmiosim_peer::PeerError>(())
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod server;

pub use client::MmioClient;
pub use config::{ClientConfig, ServerConfig, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_CONNECTIONS};
pub use connection::{CloseReason, Connection, ConnectionSummary};
pub use error::{PeerError, Result};
pub use server::{MmioServer, ShutdownHandle};
