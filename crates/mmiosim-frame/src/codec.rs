use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::command::{
    HANDSHAKE, READ, READ_TAG, STATUS_HANDSHAKE, STATUS_OUT_OF_BOUNDS, STATUS_UNKNOWN_COMMAND,
    STATUS_WRITE_ACK, WRITE,
};
use crate::error::{FrameError, Result};

/// Request header: command (2) + length (2) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Plain status response: 4 bytes.
pub const STATUS_SIZE: usize = 4;

/// Read response header: tag (4) + size (4) = 8 bytes.
pub const READ_HEADER_SIZE: usize = 8;

/// Largest payload a request can describe in its `u16` length field.
pub const MAX_REQUEST_PAYLOAD: usize = u16::MAX as usize;

/// Default maximum read response payload accepted by a reader: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// The fixed 4-byte header that starts every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Command ID.
    pub command: u16,
    /// Payload length for writes, requested length for reads, ignored otherwise.
    pub length: u16,
}

impl RequestHeader {
    /// Number of payload bytes that follow this header on the wire.
    ///
    /// Only writes carry a payload; the length field of every other command
    /// is metadata.
    pub fn payload_len(&self) -> usize {
        if self.command == WRITE {
            usize::from(self.length)
        } else {
            0
        }
    }
}

/// A decoded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Liveness check.
    Handshake,
    /// Merge the payload into the region at offset 0.
    Write(Bytes),
    /// Read `length` bytes from the region at offset 0.
    Read { length: u16 },
    /// A command ID the device does not recognize.
    Unknown { command: u16, length: u16 },
}

impl Request {
    /// Create a write request.
    pub fn write(payload: impl Into<Bytes>) -> Self {
        Self::Write(payload.into())
    }

    /// Create a read request.
    pub fn read(length: u16) -> Self {
        Self::Read { length }
    }

    /// Command ID carried in the header.
    pub fn command(&self) -> u16 {
        match self {
            Request::Handshake => HANDSHAKE,
            Request::Write(_) => WRITE,
            Request::Read { .. } => READ,
            Request::Unknown { command, .. } => *command,
        }
    }

    /// Build the wire header for this request.
    pub fn header(&self) -> Result<RequestHeader> {
        let length = match self {
            Request::Handshake => 0,
            Request::Write(payload) => {
                u16::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
                    size: payload.len(),
                    max: MAX_REQUEST_PAYLOAD,
                })?
            }
            Request::Read { length } => *length,
            Request::Unknown { length, .. } => *length,
        };
        Ok(RequestHeader {
            command: self.command(),
            length,
        })
    }

    /// Reassemble a request from its header and payload.
    ///
    /// `payload` must hold exactly [`RequestHeader::payload_len`] bytes.
    pub fn from_parts(header: RequestHeader, payload: Bytes) -> Self {
        match header.command {
            HANDSHAKE => Request::Handshake,
            WRITE => Request::Write(payload),
            READ => Request::Read {
                length: header.length,
            },
            command => Request::Unknown {
                command,
                length: header.length,
            },
        }
    }

    /// The total wire size of this request (header + payload).
    pub fn wire_size(&self) -> usize {
        match self {
            Request::Write(payload) => HEADER_SIZE + payload.len(),
            _ => HEADER_SIZE,
        }
    }
}

/// A device response.
///
/// Every response except read data is a single status word; the status word
/// `READ_TAG` only ever introduces read data, so responses decode without
/// knowing which request produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A 4-byte status word.
    Status(u32),
    /// Read data, preceded on the wire by `READ_TAG` and its length.
    Data(Bytes),
}

impl Response {
    /// Handshake reply.
    pub fn handshake() -> Self {
        Self::Status(STATUS_HANDSHAKE)
    }

    /// Successful write acknowledgement.
    pub fn write_ack() -> Self {
        Self::Status(STATUS_WRITE_ACK)
    }

    /// Range rejected because it exceeds region capacity.
    pub fn out_of_bounds() -> Self {
        Self::Status(STATUS_OUT_OF_BOUNDS)
    }

    /// Reply to an unrecognized command ID.
    pub fn unknown_command() -> Self {
        Self::Status(STATUS_UNKNOWN_COMMAND)
    }

    /// Read data reply.
    pub fn data(bytes: impl Into<Bytes>) -> Self {
        Self::Data(bytes.into())
    }

    /// The leading status word on the wire.
    pub fn status(&self) -> u32 {
        match self {
            Response::Status(status) => *status,
            Response::Data(_) => READ_TAG,
        }
    }

    /// The total wire size of this response.
    pub fn wire_size(&self) -> usize {
        match self {
            Response::Status(_) => STATUS_SIZE,
            Response::Data(data) => READ_HEADER_SIZE + data.len(),
        }
    }
}

/// Encode a request into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬──────────────────────┐
/// │ Command (2B) │ Length (2B)  │ Payload (write only) │
/// │ big-endian   │ big-endian   │ (Length bytes)       │
/// └──────────────┴──────────────┴──────────────────────┘
/// ```
pub fn encode_request(request: &Request, dst: &mut BytesMut) -> Result<()> {
    let header = request.header()?;
    dst.reserve(request.wire_size());
    dst.put_u16(header.command);
    dst.put_u16(header.length);
    if let Request::Write(payload) = request {
        dst.put_slice(payload);
    }
    Ok(())
}

/// Peek at a request header without consuming it.
///
/// Returns `None` if fewer than [`HEADER_SIZE`] bytes are buffered.
pub fn decode_request_header(src: &[u8]) -> Option<RequestHeader> {
    if src.len() < HEADER_SIZE {
        return None;
    }
    Some(RequestHeader {
        command: u16::from_be_bytes([src[0], src[1]]),
        length: u16::from_be_bytes([src[2], src[3]]),
    })
}

/// Decode a request from a buffer.
///
/// Returns `None` if the buffer doesn't contain a complete request yet.
/// On success, consumes the request bytes from the buffer.
pub fn decode_request(src: &mut BytesMut) -> Option<Request> {
    let header = decode_request_header(src)?;
    let payload_len = header.payload_len();
    if src.len() < HEADER_SIZE + payload_len {
        return None; // Need more data
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    Some(Request::from_parts(header, payload))
}

/// Encode a response into the wire format.
///
/// Wire format:
/// ```text
/// status:  ┌──────────────────┐
///          │ Status (4B BE)   │
///          └──────────────────┘
/// read:    ┌──────────────┬─────────────┬──────────────────┐
///          │ Tag = 2 (4B) │ Size (4B)   │ Data (Size bytes)│
///          └──────────────┴─────────────┴──────────────────┘
/// ```
pub fn encode_response(response: &Response, dst: &mut BytesMut) -> Result<()> {
    match response {
        Response::Status(status) => {
            dst.reserve(STATUS_SIZE);
            dst.put_u32(*status);
        }
        Response::Data(data) => {
            let size = u32::try_from(data.len()).map_err(|_| FrameError::PayloadTooLarge {
                size: data.len(),
                max: u32::MAX as usize,
            })?;
            dst.reserve(READ_HEADER_SIZE + data.len());
            dst.put_u32(READ_TAG);
            dst.put_u32(size);
            dst.put_slice(data);
        }
    }
    Ok(())
}

/// Decode a response from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete response yet.
/// On success, consumes the response bytes from the buffer.
pub fn decode_response(src: &mut BytesMut, max_data: usize) -> Result<Option<Response>> {
    if src.len() < STATUS_SIZE {
        return Ok(None); // Need more data
    }

    let status = u32::from_be_bytes([src[0], src[1], src[2], src[3]]);
    if status != READ_TAG {
        src.advance(STATUS_SIZE);
        return Ok(Some(Response::Status(status)));
    }

    if src.len() < READ_HEADER_SIZE {
        return Ok(None);
    }

    let size = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;
    if size > max_data {
        return Err(FrameError::PayloadTooLarge {
            size,
            max: max_data,
        });
    }

    if src.len() < READ_HEADER_SIZE + size {
        return Ok(None);
    }

    src.advance(READ_HEADER_SIZE);
    let data = src.split_to(size).freeze();
    Ok(Some(Response::Data(data)))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum read response payload in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
