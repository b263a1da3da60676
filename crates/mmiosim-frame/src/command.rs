//! Built-in command IDs and response status words.
//!
//! Command IDs travel in the first `u16` of every request header. Status words
//! are the first `u32` of every response.

/// Liveness/identity check. No payload.
pub const HANDSHAKE: u16 = 0;

/// Merge the payload into the region starting at offset 0.
pub const WRITE: u16 = 1;

/// Read `payloadLength` bytes from the region starting at offset 0.
pub const READ: u16 = 2;

/// Status returned for a handshake.
pub const STATUS_HANDSHAKE: u32 = 0x0000_0000;

/// Status returned for a successful write.
pub const STATUS_WRITE_ACK: u32 = 0x0000_0001;

/// Tag leading a read response header.
pub const READ_TAG: u32 = 0x0000_0002;

/// Status returned when a write or read range exceeds region capacity.
pub const STATUS_OUT_OF_BOUNDS: u32 = 0xFFFF_FFFE;

/// Status returned for an unrecognized command ID.
pub const STATUS_UNKNOWN_COMMAND: u32 = 0xFFFF_FFFF;

/// Returns a human-readable name for a command ID.
pub fn command_name(id: u16) -> &'static str {
    match id {
        HANDSHAKE => "HANDSHAKE",
        WRITE => "WRITE",
        READ => "READ",
        _ => "UNKNOWN",
    }
}

/// Returns a human-readable name for a response status word.
pub fn status_name(status: u32) -> &'static str {
    match status {
        STATUS_HANDSHAKE => "HANDSHAKE",
        STATUS_WRITE_ACK => "WRITE_ACK",
        READ_TAG => "READ",
        STATUS_OUT_OF_BOUNDS => "OUT_OF_BOUNDS",
        STATUS_UNKNOWN_COMMAND => "UNKNOWN_COMMAND",
        _ => "UNRECOGNIZED",
    }
}
