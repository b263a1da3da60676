//! Fake block-RAM device serving a 64 KiB region until the process is killed.
//!
//! Run with:
//!   cargo run --example fake-bram-server
//!
//! In another terminal:
//!   cargo run --example transfer-client

use mmiosim::peer::{MmioServer, ServerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listen = std::env::args()
        .nth(1)
        .unwrap_or_else(|| mmiosim::peer::DEFAULT_LISTEN_ADDR.to_string());

    let server = MmioServer::bind_with_config(ServerConfig {
        listen,
        ..ServerConfig::default()
    })?;
    eprintln!(
        "Fake BRAM listening on {} ({} bytes)",
        server.local_addr(),
        server.region().capacity()
    );

    server.serve()?;
    Ok(())
}
