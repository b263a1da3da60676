use std::net::SocketAddr;
use std::time::{Duration, Instant};

use mmiosim_device::{DispatchState, DispatchStats, Dispatcher, SharedRegion};
use mmiosim_frame::{
    command_name, FrameConfig, FrameError, FrameReader, FrameWriter, Request, DEFAULT_MAX_PAYLOAD,
    WRITE,
};
use mmiosim_transport::MmioStream;
use tracing::{debug, info, info_span, trace, warn};

use crate::config::ServerConfig;
use crate::error::{PeerError, Result};

/// Why a connection stopped serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed the socket between frames.
    PeerClosed,
    /// The peer closed the socket part way through a frame.
    Truncated,
    /// No complete frame arrived within the read timeout.
    TimedOut,
    /// Any other I/O or protocol failure.
    Failed(String),
}

/// Final accounting for a connection.
#[derive(Debug, Clone)]
pub struct ConnectionSummary {
    pub id: String,
    pub peer: SocketAddr,
    pub stats: DispatchStats,
    pub reason: CloseReason,
}

/// One accepted device connection.
///
/// Strictly request/response: each request is fully read, executed and
/// answered before the next header is read. Dropping the connection closes
/// the socket.
pub struct Connection {
    id: String,
    peer: SocketAddr,
    reader: FrameReader<MmioStream>,
    writer: FrameWriter<MmioStream>,
    dispatcher: Dispatcher,
    frame_timeout: Option<Duration>,
}

impl Connection {
    pub(crate) fn new(
        id: String,
        peer: SocketAddr,
        stream: MmioStream,
        region: SharedRegion,
        config: &ServerConfig,
    ) -> Result<Self> {
        let reader_stream = stream.try_clone()?;

        let frame_config = FrameConfig {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        };

        let reader = FrameReader::with_config_stream(reader_stream, frame_config.clone())?;
        let writer = FrameWriter::with_config_stream(stream, frame_config)?;

        Ok(Self {
            id,
            peer,
            reader,
            writer,
            dispatcher: Dispatcher::new(region),
            frame_timeout: config.read_timeout,
        })
    }

    /// Connection identifier, `conn-<n>`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Remote socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Current dispatcher state.
    pub fn state(&self) -> DispatchState {
        self.dispatcher.state()
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Serve exactly one request/response cycle (blocking).
    ///
    /// The read timeout bounds the whole request, header and payload
    /// together, from the moment this call starts waiting.
    pub fn serve_one(&mut self) -> Result<()> {
        let deadline = self.frame_timeout.map(|timeout| Instant::now() + timeout);
        let header = self.reader.read_header_by(deadline)?;
        trace!(
            command = command_name(header.command),
            length = header.length,
            "header received"
        );

        if header.command == WRITE {
            self.dispatcher.await_payload()?;
        }
        let payload = self.reader.read_payload_by(header.payload_len(), deadline)?;
        let request = Request::from_parts(header, payload);

        let response = self.dispatcher.dispatch(&request)?;
        self.writer.write_response(&response)?;
        self.dispatcher.finish_response()?;
        Ok(())
    }

    /// Serve until the peer goes away or an error occurs.
    ///
    /// Errors never propagate past this connection; they are logged and
    /// reported in the summary.
    pub fn run(mut self) -> ConnectionSummary {
        let span = info_span!("conn", id = %self.id, peer = %self.peer);
        let _guard = span.enter();
        info!("connection opened");

        let reason = loop {
            if let Err(err) = self.serve_one() {
                break classify_close(err);
            }
        };
        self.dispatcher.close();

        let stats = self.dispatcher.stats();
        match &reason {
            CloseReason::PeerClosed => debug!(frames = stats.frames, "peer closed connection"),
            CloseReason::Truncated => {
                warn!(frames = stats.frames, "peer closed connection mid-frame")
            }
            CloseReason::TimedOut => warn!(frames = stats.frames, "connection timed out"),
            CloseReason::Failed(error) => warn!(frames = stats.frames, %error, "connection failed"),
        }
        info!(
            frames = stats.frames,
            bytes_written = stats.bytes_written,
            bytes_read = stats.bytes_read,
            rejected = stats.rejected,
            unknown = stats.unknown,
            "connection closed"
        );

        ConnectionSummary {
            id: self.id,
            peer: self.peer,
            stats,
            reason,
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &self.dispatcher.state())
            .finish()
    }
}

fn classify_close(err: PeerError) -> CloseReason {
    match err {
        PeerError::Frame(FrameError::ConnectionClosed) => CloseReason::PeerClosed,
        PeerError::Frame(FrameError::Truncated { .. }) => CloseReason::Truncated,
        PeerError::Frame(ref frame) if frame.is_timeout() => CloseReason::TimedOut,
        PeerError::Frame(ref frame) if frame.is_disconnect() => CloseReason::PeerClosed,
        other => CloseReason::Failed(other.to_string()),
    }
}
