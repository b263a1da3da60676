use mmiosim_frame::{command_name, Request, Response};
use tracing::{debug, trace, warn};

use crate::error::DispatchError;
use crate::region::SharedRegion;

/// Where a connection is within its current request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Waiting for the 4-byte request header.
    AwaitingHeader,
    /// Header received for a write; waiting for its payload.
    AwaitingPayload,
    /// Executing the request against the region.
    Processing,
    /// Response produced; waiting for it to be sent.
    Responding,
    /// The connection is finished. Terminal.
    Closed,
}

/// Per-connection command counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub frames: u64,
    pub handshakes: u64,
    pub writes: u64,
    pub reads: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub rejected: u64,
    pub unknown: u64,
}

/// Interprets decoded requests against the shared region.
///
/// One dispatcher exists per connection. It drives the
/// `AwaitingHeader → AwaitingPayload → Processing → Responding` cycle and
/// refuses out-of-order transitions. All region access goes through
/// [`SharedRegion`], which serializes commands across connections.
#[derive(Debug)]
pub struct Dispatcher {
    region: SharedRegion,
    state: DispatchState,
    stats: DispatchStats,
}

impl Dispatcher {
    /// Create a dispatcher waiting for its first header.
    pub fn new(region: SharedRegion) -> Self {
        Self {
            region,
            state: DispatchState::AwaitingHeader,
            stats: DispatchStats::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// The region this dispatcher operates on.
    pub fn region(&self) -> &SharedRegion {
        &self.region
    }

    /// A write header arrived; its payload is next.
    pub fn await_payload(&mut self) -> Result<(), DispatchError> {
        self.transition(DispatchState::AwaitingPayload, |s| {
            s == DispatchState::AwaitingHeader
        })
    }

    /// Execute a complete request and produce its response.
    ///
    /// Moves through `Processing` and leaves the dispatcher in `Responding`.
    /// A write must arrive from `AwaitingPayload`; every other request comes
    /// straight from `AwaitingHeader`.
    pub fn dispatch(&mut self, request: &Request) -> Result<Response, DispatchError> {
        let from = if matches!(request, Request::Write(_)) {
            DispatchState::AwaitingPayload
        } else {
            DispatchState::AwaitingHeader
        };
        self.transition(DispatchState::Processing, |s| s == from)?;

        let response = self.execute(request);

        self.transition(DispatchState::Responding, |s| {
            s == DispatchState::Processing
        })?;
        Ok(response)
    }

    /// The response has been sent; wait for the next header.
    pub fn finish_response(&mut self) -> Result<(), DispatchError> {
        self.transition(DispatchState::AwaitingHeader, |s| {
            s == DispatchState::Responding
        })
    }

    /// Enter the terminal state. Idempotent.
    pub fn close(&mut self) {
        if self.state != DispatchState::Closed {
            trace!(from = ?self.state, "dispatcher closed");
            self.state = DispatchState::Closed;
        }
    }

    fn transition(
        &mut self,
        to: DispatchState,
        allowed_from: impl FnOnce(DispatchState) -> bool,
    ) -> Result<(), DispatchError> {
        if !allowed_from(self.state) {
            return Err(DispatchError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        trace!(from = ?self.state, to = ?to, "dispatcher transition");
        self.state = to;
        Ok(())
    }

    fn execute(&mut self, request: &Request) -> Response {
        self.stats.frames += 1;
        let command = request.command();

        match request {
            Request::Handshake => {
                self.stats.handshakes += 1;
                debug!(command = command_name(command), "handshake");
                Response::handshake()
            }
            Request::Write(payload) => match self.region.write_at(0, payload) {
                Ok(()) => {
                    self.stats.writes += 1;
                    self.stats.bytes_written += payload.len() as u64;
                    debug!(command = command_name(command), len = payload.len(), "write merged");
                    Response::write_ack()
                }
                Err(err) => {
                    self.stats.rejected += 1;
                    warn!(command = command_name(command), len = payload.len(), error = %err, "write rejected");
                    Response::out_of_bounds()
                }
            },
            Request::Read { length } => {
                let len = usize::from(*length);
                match self.region.read_range(0, len) {
                    Ok(data) => {
                        self.stats.reads += 1;
                        self.stats.bytes_read += data.len() as u64;
                        debug!(command = command_name(command), len, "read served");
                        Response::Data(data)
                    }
                    Err(err) => {
                        self.stats.rejected += 1;
                        warn!(command = command_name(command), len, error = %err, "read rejected");
                        Response::out_of_bounds()
                    }
                }
            }
            Request::Unknown { command, length } => {
                self.stats.unknown += 1;
                warn!(command = *command, length = *length, "unknown command");
                Response::unknown_command()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mmiosim_frame::{
        Request, Response, STATUS_HANDSHAKE, STATUS_OUT_OF_BOUNDS, STATUS_UNKNOWN_COMMAND,
        STATUS_WRITE_ACK,
    };

    use super::*;

    fn dispatcher(capacity: usize) -> Dispatcher {
        Dispatcher::new(SharedRegion::with_capacity(capacity).unwrap())
    }

    fn run(d: &mut Dispatcher, request: Request) -> Response {
        if matches!(request, Request::Write(_)) {
            d.await_payload().unwrap();
        }
        let response = d.dispatch(&request).unwrap();
        d.finish_response().unwrap();
        response
    }

    #[test]
    fn handshake_replies_zero_and_leaves_region_alone() {
        let mut d = dispatcher(16);
        d.region().write_at(0, &[1, 2, 3, 4]).unwrap();

        for _ in 0..3 {
            assert_eq!(run(&mut d, Request::Handshake).status(), STATUS_HANDSHAKE);
        }
        assert_eq!(
            d.region().read_range(0, 4).unwrap().as_ref(),
            &[1, 2, 3, 4]
        );
        assert_eq!(d.stats().handshakes, 3);
    }

    #[test]
    fn write_then_read_returns_prefix() {
        let mut d = dispatcher(64);
        let response = run(&mut d, Request::write(&b"\x01\x02\x03\x04\x05"[..]));
        assert_eq!(response.status(), STATUS_WRITE_ACK);

        let response = run(&mut d, Request::read(5));
        assert_eq!(response, Response::data(&b"\x01\x02\x03\x04\x05"[..]));

        let stats = d.stats();
        assert_eq!(stats.bytes_written, 5);
        assert_eq!(stats.bytes_read, 5);
        assert_eq!(stats.frames, 2);
    }

    #[test]
    fn short_write_preserves_tail_of_first_word() {
        let mut d = dispatcher(16);
        run(&mut d, Request::write(&b"\xAA\xBB\xCC\xDD\xEE"[..]));
        run(&mut d, Request::write(&b"\x11"[..]));

        let response = run(&mut d, Request::read(5));
        assert_eq!(response, Response::data(&b"\x11\xBB\xCC\xDD\xEE"[..]));
    }

    #[test]
    fn out_of_bounds_write_is_rejected_without_mutation() {
        let mut d = dispatcher(8);
        run(&mut d, Request::write(&b"keepme!!"[..]));

        let response = run(&mut d, Request::write(vec![0u8; 9]));
        assert_eq!(response.status(), STATUS_OUT_OF_BOUNDS);
        assert_eq!(d.region().read_range(0, 8).unwrap().as_ref(), b"keepme!!");
        assert_eq!(d.stats().rejected, 1);
    }

    #[test]
    fn out_of_bounds_read_is_rejected() {
        let mut d = dispatcher(8);
        assert_eq!(run(&mut d, Request::read(9)).status(), STATUS_OUT_OF_BOUNDS);
        assert_eq!(run(&mut d, Request::read(8)), Response::data(vec![0u8; 8]));
    }

    #[test]
    fn unknown_command_keeps_dispatcher_usable() {
        let mut d = dispatcher(8);
        let response = run(
            &mut d,
            Request::Unknown {
                command: 99,
                length: 0,
            },
        );
        assert_eq!(response.status(), STATUS_UNKNOWN_COMMAND);
        assert_eq!(d.state(), DispatchState::AwaitingHeader);
        assert_eq!(run(&mut d, Request::Handshake).status(), STATUS_HANDSHAKE);
        assert_eq!(d.stats().unknown, 1);
    }

    #[test]
    fn state_machine_walks_full_cycle() {
        let mut d = dispatcher(8);
        assert_eq!(d.state(), DispatchState::AwaitingHeader);
        d.await_payload().unwrap();
        assert_eq!(d.state(), DispatchState::AwaitingPayload);
        d.dispatch(&Request::write(&b"ab"[..])).unwrap();
        assert_eq!(d.state(), DispatchState::Responding);
        d.finish_response().unwrap();
        assert_eq!(d.state(), DispatchState::AwaitingHeader);
        d.close();
        assert_eq!(d.state(), DispatchState::Closed);
        d.close();
        assert_eq!(d.state(), DispatchState::Closed);
    }

    #[test]
    fn out_of_order_transitions_are_refused() {
        let mut d = dispatcher(8);
        assert_eq!(
            d.finish_response().unwrap_err(),
            DispatchError::InvalidTransition {
                from: DispatchState::AwaitingHeader,
                to: DispatchState::AwaitingHeader,
            }
        );

        // A write payload only follows a write header.
        assert_eq!(
            d.dispatch(&Request::write(&b"ab"[..])).unwrap_err(),
            DispatchError::InvalidTransition {
                from: DispatchState::AwaitingHeader,
                to: DispatchState::Processing,
            }
        );
        d.await_payload().unwrap();
        assert_eq!(
            d.dispatch(&Request::Handshake).unwrap_err(),
            DispatchError::InvalidTransition {
                from: DispatchState::AwaitingPayload,
                to: DispatchState::Processing,
            }
        );
        assert!(d.dispatch(&Request::read(1)).is_err());
        d.dispatch(&Request::write(&b"ab"[..])).unwrap();
        d.finish_response().unwrap();

        d.dispatch(&Request::Handshake).unwrap();
        assert!(d.dispatch(&Request::Handshake).is_err());
        assert!(d.await_payload().is_err());

        d.close();
        assert!(matches!(
            d.dispatch(&Request::Handshake),
            Err(DispatchError::InvalidTransition {
                from: DispatchState::Closed,
                ..
            })
        ));
    }
}
