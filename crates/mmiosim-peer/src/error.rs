/// Errors that can occur in server or client operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] mmiosim_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] mmiosim_frame::FrameError),

    /// Region could not be created or accessed.
    #[error("region error: {0}")]
    Region(#[from] mmiosim_device::RegionError),

    /// Connection state machine was driven out of order.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] mmiosim_device::DispatchError),

    /// The device rejected a read because it exceeds region capacity.
    #[error("device rejected read of {requested} bytes: out of bounds")]
    OutOfBounds { requested: usize },

    /// The device answered with a status that does not fit the request.
    #[error(
        "unexpected {command} response status 0x{status:08X} ({})",
        mmiosim_frame::status_name(*.status)
    )]
    UnexpectedResponse { command: &'static str, status: u32 },

    /// The device returned a different number of bytes than requested.
    #[error("read returned {received} bytes, expected {requested}")]
    LengthMismatch { requested: usize, received: usize },

    /// Request timed out.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, PeerError>;
