//! Host-side transfer check against a running device.
//!
//! Run with:
//!   cargo run --example transfer-client -- 127.0.0.1:9090

use mmiosim::peer::MmioClient;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| mmiosim::peer::DEFAULT_LISTEN_ADDR.to_string());

    let mut client = MmioClient::connect(&addr)?;
    if !client.handshake()? {
        return Err("device did not acknowledge handshake".into());
    }
    eprintln!("Handshake ok with {}", client.peer_addr()?);

    // Increasing transfer sizes, including ones that end mid-word.
    for len in [1usize, 4, 5, 64, 1023, 4096] {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        if !client.write_data(&data)? {
            return Err(format!("device rejected {len}-byte write").into());
        }
        let back = client.read_data(len)?;
        if back.as_ref() != data.as_slice() {
            return Err(format!("mismatch after {len}-byte transfer").into());
        }
        eprintln!("Transferred {len} bytes");
    }

    client.close()?;
    Ok(())
}
