//! Unified error type for the handle table.
//!
//! Follows the shape of `slopos_mm::error::MmError`: a small `Copy` enum with
//! a `Display` impl and a `Result` alias. `NullHandle` and the validation
//! "silent false" convention are not variants here — they are the return
//! shape of `alloc_handle` and the `is_handle_valid` family, not errors that
//! flow through `Result`.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleError {
    /// A caller-supplied handle or index was out of range, or an assign
    /// target was already occupied.
    InvalidParameter,
    /// The backing allocator refused to grow the slot array.
    NoMemory,
    /// A free-list invariant was violated; the operation aborted without
    /// mutating the table.
    Corruption,
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter => write!(f, "invalid handle table parameter"),
            Self::NoMemory => write!(f, "allocator refused to grow the handle table"),
            Self::Corruption => write!(f, "handle table free-list corruption detected"),
        }
    }
}

/// Convenience result type for handle table operations.
pub type HandleResult<T = ()> = Result<T, HandleError>;
