use std::io::{ErrorKind, Read};
use std::time::Instant;

use bytes::{Buf, Bytes, BytesMut};
use mmiosim_transport::MmioStream;
use tracing::trace;

use crate::codec::{
    decode_request_header, decode_response, FrameConfig, Request, RequestHeader, Response,
    HEADER_SIZE,
};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete requests or responses from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// The server side uses [`read_header`](Self::read_header) and
/// [`read_payload`](Self::read_payload) to step through a request; the client
/// side uses [`read_response`](Self::read_response).
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next 4-byte request header (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached before
    /// any header byte arrives.
    pub fn read_header(&mut self) -> Result<RequestHeader> {
        loop {
            if let Some(header) = decode_request_header(&self.buf) {
                self.buf.advance(HEADER_SIZE);
                return Ok(header);
            }
            self.fill(false)?;
        }
    }

    /// Read exactly `len` payload bytes following a header (blocking).
    pub fn read_payload(&mut self, len: usize) -> Result<Bytes> {
        while self.buf.len() < len {
            self.fill(true)?;
        }
        Ok(self.buf.split_to(len).freeze())
    }

    /// Read the next complete request (blocking).
    pub fn read_request(&mut self) -> Result<Request> {
        let header = self.read_header()?;
        let payload = self.read_payload(header.payload_len())?;
        Ok(Request::from_parts(header, payload))
    }

    /// Read the next complete response (blocking).
    pub fn read_response(&mut self) -> Result<Response> {
        loop {
            if let Some(response) = decode_response(&mut self.buf, self.config.max_payload_size)? {
                return Ok(response);
            }
            self.fill(false)?;
        }
    }

    /// Pull one chunk from the stream into the buffer.
    ///
    /// EOF with nothing buffered outside a frame is a clean close; anything
    /// else is a truncated frame.
    fn fill(&mut self, mid_frame: bool) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                trace!(mid_frame, buffered = self.buf.len(), "stream reached eof");
                if mid_frame || !self.buf.is_empty() {
                    return Err(FrameError::Truncated {
                        buffered: self.buf.len(),
                    });
                }
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
            return Ok(());
        }
    }

    /// Number of bytes received but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<MmioStream> {
    /// Create a frame reader for `MmioStream` and apply read timeout from config.
    pub fn with_config_stream(inner: MmioStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }

    /// Like [`read_header`](FrameReader::read_header), but fails with a
    /// `TimedOut` I/O error once `deadline` passes, however the bytes trickle
    /// in. `None` waits under the stream's own read timeout only.
    pub fn read_header_by(&mut self, deadline: Option<Instant>) -> Result<RequestHeader> {
        loop {
            if let Some(header) = decode_request_header(&self.buf) {
                self.buf.advance(HEADER_SIZE);
                return Ok(header);
            }
            self.fill_by(false, deadline)?;
        }
    }

    /// Like [`read_payload`](FrameReader::read_payload), bounded by `deadline`.
    pub fn read_payload_by(&mut self, len: usize, deadline: Option<Instant>) -> Result<Bytes> {
        while self.buf.len() < len {
            self.fill_by(true, deadline)?;
        }
        Ok(self.buf.split_to(len).freeze())
    }

    /// Shrink the socket read timeout to what is left before `deadline`, then
    /// fill.
    fn fill_by(&mut self, mid_frame: bool, deadline: Option<Instant>) -> Result<()> {
        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                trace!(buffered = self.buf.len(), "frame deadline elapsed");
                return Err(FrameError::Io(std::io::Error::new(
                    ErrorKind::TimedOut,
                    "frame deadline elapsed",
                )));
            }
            self.inner
                .set_read_timeout(Some(remaining))
                .map_err(transport_to_frame_error)?;
        }
        self.fill(mid_frame)
    }
}

pub(crate) fn transport_to_frame_error(err: mmiosim_transport::TransportError) -> FrameError {
    match err {
        mmiosim_transport::TransportError::Io(io)
        | mmiosim_transport::TransportError::Accept(io) => FrameError::Io(io),
        mmiosim_transport::TransportError::Bind { source, .. }
        | mmiosim_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other @ mmiosim_transport::TransportError::Unresolved(_) => {
            FrameError::Io(std::io::Error::new(ErrorKind::NotFound, other.to_string()))
        }
    }
}
