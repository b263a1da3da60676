//! Fake memory-mapped I/O device served over TCP.
//!
//! mmiosim stands in for an FPGA block-RAM window during host driver
//! development: a server holds a zero-initialized byte region, and a client
//! issues handshake, write and read commands against it over a tiny fixed
//! binary protocol.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP listener and stream wrappers
//! - [`frame`]: request/response wire format, blocking reader and writer
//! - [`device`]: word-granular memory region and command dispatcher
//! - [`peer`]: threaded server and host-side client (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use mmiosim_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use mmiosim_frame::*;
}

/// Re-export device types.
pub mod device {
    pub use mmiosim_device::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use mmiosim_peer::*;
}
