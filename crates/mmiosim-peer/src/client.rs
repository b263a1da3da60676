use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use mmiosim_frame::{
    command_name, status_name, FrameConfig, FrameError, FrameReader, FrameWriter, Request,
    Response, MAX_REQUEST_PAYLOAD, STATUS_HANDSHAKE, STATUS_OUT_OF_BOUNDS, STATUS_WRITE_ACK,
};
use mmiosim_transport::{MmioStream, TcpTransport};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{PeerError, Result};

/// Host-side driver for a fake (or real) MMIO device.
///
/// Every operation is exactly one synchronous round trip.
pub struct MmioClient {
    addr: String,
    reader: FrameReader<MmioStream>,
    writer: FrameWriter<MmioStream>,
    io_timeout: Option<Duration>,
}

impl MmioClient {
    /// Connect with default configuration.
    pub fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_config(addr, &ClientConfig::default())
    }

    /// Connect with explicit configuration.
    pub fn connect_with_config(addr: &str, config: &ClientConfig) -> Result<Self> {
        let stream = TcpTransport::connect_timeout(addr, config.connect_timeout)?;
        let reader_stream = stream.try_clone()?;

        let frame_config = FrameConfig {
            max_payload_size: config.max_payload_size,
            read_timeout: config.io_timeout,
            write_timeout: config.io_timeout,
        };

        let reader = FrameReader::with_config_stream(reader_stream, frame_config.clone())?;
        let writer = FrameWriter::with_config_stream(stream, frame_config)?;

        Ok(Self {
            addr: addr.to_string(),
            reader,
            writer,
            io_timeout: config.io_timeout,
        })
    }

    /// Liveness check. True iff the device answers with the handshake status.
    pub fn handshake(&mut self) -> Result<bool> {
        let response = self.request(&Request::Handshake)?;
        Ok(response == Response::Status(STATUS_HANDSHAKE))
    }

    /// Write `data` to the device window. True iff the device acknowledges.
    ///
    /// A write the device rejects as out of bounds returns `Ok(false)`.
    /// Payloads longer than the `u16` length field fail before anything is
    /// sent.
    pub fn write_data(&mut self, data: &[u8]) -> Result<bool> {
        if data.len() > MAX_REQUEST_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: data.len(),
                max: MAX_REQUEST_PAYLOAD,
            }
            .into());
        }
        let response = self.request(&Request::write(Bytes::copy_from_slice(data)))?;
        Ok(response == Response::Status(STATUS_WRITE_ACK))
    }

    /// Read the first `length` bytes of the device window.
    pub fn read_data(&mut self, length: usize) -> Result<Bytes> {
        let wire_length = u16::try_from(length).map_err(|_| FrameError::PayloadTooLarge {
            size: length,
            max: MAX_REQUEST_PAYLOAD,
        })?;

        match self.request(&Request::read(wire_length))? {
            Response::Data(data) if data.len() == length => Ok(data),
            Response::Data(data) => Err(PeerError::LengthMismatch {
                requested: length,
                received: data.len(),
            }),
            Response::Status(STATUS_OUT_OF_BOUNDS) => {
                Err(PeerError::OutOfBounds { requested: length })
            }
            Response::Status(status) => Err(PeerError::UnexpectedResponse {
                command: "READ",
                status,
            }),
        }
    }

    /// Send one raw request and wait for its response.
    pub fn request(&mut self, request: &Request) -> Result<Response> {
        self.writer
            .write_request(request)
            .map_err(|err| self.map_frame_error(err))?;
        let response = self
            .reader
            .read_response()
            .map_err(|err| self.map_frame_error(err))?;
        debug!(
            addr = %self.addr,
            command = command_name(request.command()),
            status = status_name(response.status()),
            "round trip complete"
        );
        Ok(response)
    }

    /// Address of the connected device.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.writer.get_ref().peer_addr().map_err(Into::into)
    }

    /// Close the connection.
    pub fn close(self) -> Result<()> {
        self.writer.get_ref().shutdown()?;
        Ok(())
    }

    fn map_frame_error(&self, err: FrameError) -> PeerError {
        match (err.is_timeout(), self.io_timeout) {
            (true, Some(timeout)) => PeerError::Timeout(timeout),
            _ => PeerError::Frame(err),
        }
    }
}

impl std::fmt::Debug for MmioClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmioClient")
            .field("addr", &self.addr)
            .field("io_timeout", &self.io_timeout)
            .finish()
    }
}
