//! TCP transport for the mmiosim fake MMIO device.
//!
//! This is the lowest layer of mmiosim. It owns socket setup (bind, accept,
//! connect, timeouts) and hands out [`MmioStream`] values that the frame
//! layer reads requests from and writes responses to.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::MmioStream;
pub use tcp::TcpTransport;
