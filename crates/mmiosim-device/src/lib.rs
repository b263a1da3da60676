//! Simulated MMIO device: the memory region and the command dispatcher.
//!
//! The region stands in for a device's register/data window (an FPGA BRAM,
//! for example). It is word-granular: sub-word writes are merged into their
//! containing 4-byte words with a read-modify-write so neighbouring bytes are
//! preserved. The dispatcher turns decoded requests into region accesses and
//! response frames.

pub mod dispatcher;
pub mod error;
pub mod region;

pub use dispatcher::{DispatchState, DispatchStats, Dispatcher};
pub use error::{DispatchError, RegionError, Result};
pub use region::{MemoryRegion, SharedRegion, DEFAULT_CAPACITY, WORD_BYTES};
