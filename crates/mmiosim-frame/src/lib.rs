//! Fixed-layout request/response framing for the mmiosim protocol.
//!
//! Requests carry a 4-byte header:
//! - A 2-byte big-endian command ID (handshake, write, read)
//! - A 2-byte big-endian payload length
//!
//! followed by the payload for writes only. Responses are a 4-byte big-endian
//! status word, except reads which answer with an 8-byte tagged header and the
//! data. No partial reads, no buffer management in user code.

pub mod codec;
pub mod command;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_request, decode_request_header, decode_response, encode_request, encode_response,
    FrameConfig, Request, RequestHeader, Response, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
    MAX_REQUEST_PAYLOAD, READ_HEADER_SIZE, STATUS_SIZE,
};
pub use command::{
    command_name, status_name, HANDSHAKE, READ, READ_TAG, STATUS_HANDSHAKE, STATUS_OUT_OF_BOUNDS,
    STATUS_UNKNOWN_COMMAND, STATUS_WRITE_ACK, WRITE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
