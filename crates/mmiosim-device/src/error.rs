use crate::dispatcher::DispatchState;

/// Errors that can occur when accessing the memory region.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegionError {
    /// The requested range does not fit inside the region.
    #[error("range [{offset}, {offset}+{len}) exceeds region capacity {capacity}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// The region capacity is zero or not a whole number of words.
    #[error("invalid region capacity {0} (must be a positive multiple of 4)")]
    InvalidCapacity(usize),
}

/// Errors raised by the command dispatcher state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// A transition was requested from a state that does not allow it.
    #[error("invalid dispatcher transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: DispatchState,
        to: DispatchState,
    },
}

pub type Result<T> = std::result::Result<T, RegionError>;
